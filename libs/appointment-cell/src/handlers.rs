// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AnnotateAppointmentRequest, AppointmentError, BookAppointmentRequest};
use crate::services::booking::BookingService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::slots::SlotGeneratorService;
use crate::services::video_access::VideoAccessService;

fn map_appointment_error(err: AppointmentError) -> AppError {
    match err {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::ProviderNotFound => AppError::NotFound("Provider not found".to_string()),
        AppointmentError::NoAvailability => {
            AppError::NotFound("No availability set by provider".to_string())
        }
        AppointmentError::ProviderUnavailable => {
            AppError::BadRequest("Provider is not accepting bookings".to_string())
        }
        AppointmentError::InvalidRange(msg) => AppError::BadRequest(msg),
        // Distinct from every other kind so callers know to re-query slots.
        AppointmentError::SlotTaken => {
            AppError::Conflict("This time slot is already booked".to_string())
        }
        AppointmentError::NotAuthorized => {
            AppError::Forbidden("Not authorized for this appointment".to_string())
        }
        AppointmentError::TooEarly(msg) => AppError::BadRequest(msg),
        AppointmentError::NotScheduled => {
            AppError::BadRequest("Appointment is not currently scheduled".to_string())
        }
        AppointmentError::ExternalService(msg) => AppError::ExternalService(msg),
        AppointmentError::Database(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// SLOT DISCOVERY
// ==============================================================================

/// Free slots for a provider over the rolling booking horizon.
#[axum::debug_handler]
pub async fn get_provider_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SlotGeneratorService::new(&state);
    let days = service
        .generate_slots(provider_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "days": days
    })))
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    // Clients book for themselves; admins may book on a client's behalf.
    let is_own_booking = request.client_id.to_string() == user.id;
    if !is_own_booking && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to book for this client".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let appointment = service
        .book_appointment(request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    if !appointment.involves(&user.id) && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized for this appointment".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_provider_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if provider_id.to_string() != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view these appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let appointments = service
        .provider_appointments(provider_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_client_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if client_id.to_string() != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view these appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let appointments = service
        .client_appointments(client_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service
        .cancel(appointment_id, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service
        .complete(appointment_id, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn annotate_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<AnnotateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service
        .annotate(appointment_id, &user, &request.note, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// VIDEO ACCESS
// ==============================================================================

#[axum::debug_handler]
pub async fn request_join_token(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = VideoAccessService::new(&state);
    let join = service
        .request_join_token(appointment_id, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "video_session_id": join.video_session_id,
        "token": join.token,
        "expires_at": join.expires_at
    })))
}
