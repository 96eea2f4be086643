// libs/provider-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::time::parse_canonical;

use crate::models::{AvailabilityError, AvailabilityQueryParams, CreateAvailabilityRequest};
use crate::services::{AvailabilityService, ProviderService};

fn map_availability_error(err: AvailabilityError) -> AppError {
    match err {
        AvailabilityError::InvalidRange(msg) => AppError::BadRequest(msg),
        AvailabilityError::Overlap => {
            AppError::Conflict("This window overlaps with existing availability".to_string())
        }
        AvailabilityError::ProviderNotFound => AppError::NotFound("Provider not found".to_string()),
        AvailabilityError::Database(msg) => AppError::Database(msg),
    }
}

fn own_provider_id(user: &User) -> Result<Uuid, AppError> {
    if !user.is_provider() {
        return Err(AppError::Forbidden(
            "Only providers can manage availability".to_string(),
        ));
    }
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

/// Publish a new availability window for the authenticated provider.
#[axum::debug_handler]
pub async fn set_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let provider_id = own_provider_id(&user)?;

    let start_time = parse_canonical(&request.start_time).map_err(AppError::BadRequest)?;
    let end_time = parse_canonical(&request.end_time).map_err(AppError::BadRequest)?;

    let service = AvailabilityService::new(&state);
    let window = service
        .add_window(provider_id, start_time, end_time, auth.token())
        .await
        .map_err(map_availability_error)?;

    Ok(Json(json!({
        "success": true,
        "window": window
    })))
}

/// List the authenticated provider's windows, optionally restricted to the
/// half-open range `[from, to)`.
#[axum::debug_handler]
pub async fn my_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(params): Query<AvailabilityQueryParams>,
) -> Result<Json<Value>, AppError> {
    let provider_id = own_provider_id(&user)?;

    let service = AvailabilityService::new(&state);
    let windows = match (params.from, params.to) {
        (Some(from), Some(to)) => service
            .list_windows(provider_id, from, to, auth.token())
            .await,
        _ => service.all_windows(provider_id, auth.token()).await,
    }
    .map_err(map_availability_error)?;

    Ok(Json(json!({
        "success": true,
        "windows": windows
    })))
}

/// Public profile of a provider.
#[axum::debug_handler]
pub async fn get_provider(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ProviderService::new(&state);
    let provider = service
        .get_provider(provider_id, auth.token())
        .await
        .map_err(map_availability_error)?;

    Ok(Json(json!({
        "success": true,
        "provider": provider
    })))
}
