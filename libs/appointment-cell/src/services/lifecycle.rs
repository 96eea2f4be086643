// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// Owns every post-creation transition of an appointment. Transitions are
/// monotonic: scheduled is the only live state, cancelled and completed are
/// terminal and never reopen.
pub struct AppointmentLifecycleService {
    supabase: Arc<SupabaseClient>,
    clock: Arc<dyn Clock>,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            clock,
        }
    }

    /// All valid next statuses for a given current status.
    pub fn valid_transitions(current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => {
                vec![AppointmentStatus::Cancelled, AppointmentStatus::Completed]
            }
            // Terminal states - no transitions allowed
            AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::Completed => vec![],
        }
    }

    pub fn validate_transition(
        current: &AppointmentStatus,
        next: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition {} -> {}", current, next);

        if !Self::valid_transitions(current).contains(next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(AppointmentError::NotScheduled);
        }

        Ok(())
    }

    /// Cancel a scheduled appointment. Either party may cancel, at any time.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        actor: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch(appointment_id, auth_token).await?;

        if !appointment.involves(&actor.id) {
            return Err(AppointmentError::NotAuthorized);
        }
        Self::validate_transition(&appointment.status, &AppointmentStatus::Cancelled)?;

        let updated = self
            .update_status(appointment_id, AppointmentStatus::Cancelled, auth_token)
            .await?;
        info!("Appointment {} cancelled by {}", appointment_id, actor.id);
        Ok(updated)
    }

    /// Mark a scheduled appointment completed. Provider only, and never
    /// before the scheduled end has passed.
    pub async fn complete(
        &self,
        appointment_id: Uuid,
        actor: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch(appointment_id, auth_token).await?;

        if !appointment.is_provider(&actor.id) {
            return Err(AppointmentError::NotAuthorized);
        }
        Self::validate_transition(&appointment.status, &AppointmentStatus::Completed)?;

        let now = self.clock.now();
        if now < appointment.window.end_time {
            return Err(AppointmentError::TooEarly(
                "cannot mark an appointment completed before its scheduled end".to_string(),
            ));
        }

        let updated = self
            .update_status(appointment_id, AppointmentStatus::Completed, auth_token)
            .await?;
        info!("Appointment {} completed by provider {}", appointment_id, actor.id);
        Ok(updated)
    }

    /// Attach or replace the provider's note. Status is untouched.
    pub async fn annotate(
        &self,
        appointment_id: Uuid,
        actor: &User,
        note: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch(appointment_id, auth_token).await?;

        if !appointment.is_provider(&actor.id) {
            return Err(AppointmentError::NotAuthorized);
        }
        if appointment.status.is_terminal() {
            return Err(AppointmentError::NotScheduled);
        }

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows = self
            .supabase
            .update_returning(
                &path,
                Some(auth_token),
                json!({
                    "provider_note": note,
                    "updated_at": self.clock.now().to_rfc3339()
                }),
            )
            .await?;

        let row = rows
            .first()
            .ok_or_else(|| AppointmentError::Database("Failed to update notes".to_string()))?;
        serde_json::from_value(row.clone()).map_err(|e| AppointmentError::Database(e.to_string()))
    }

    async fn fetch(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let row = result.first().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row.clone()).map_err(|e| AppointmentError::Database(e.to_string()))
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows = self
            .supabase
            .update_returning(
                &path,
                Some(auth_token),
                json!({
                    "status": status,
                    "updated_at": self.clock.now().to_rfc3339()
                }),
            )
            .await?;

        let row = rows
            .first()
            .ok_or_else(|| AppointmentError::Database("Failed to update status".to_string()))?;
        serde_json::from_value(row.clone()).map_err(|e| AppointmentError::Database(e.to_string()))
    }
}
