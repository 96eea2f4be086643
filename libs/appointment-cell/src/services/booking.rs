// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use provider_cell::services::ProviderService;
use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};
use shared_models::time::TimeWindow;
use shared_utils::clock::{Clock, SystemClock};
use video_session_cell::VideoSessionClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, SchedulingRules,
};

/// The write path. The read-side overlap check here is advisory; the store's
/// exclusion constraint over scheduled rows is what actually guarantees at
/// most one committed appointment per overlapping interval per provider. Two
/// callers can both pass the pre-check — only one insert commits, the other
/// sees a conflict and retries against fresh state.
pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    providers: ProviderService,
    video: Option<VideoSessionClient>,
    clock: Arc<dyn Clock>,
    rules: SchedulingRules,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            providers: ProviderService::with_client(Arc::clone(&supabase)),
            video: VideoSessionClient::new(config).ok(),
            supabase,
            clock,
            rules: SchedulingRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: SchedulingRules) -> Self {
        self.rules = rules;
        self
    }

    /// Book an appointment, all-or-nothing: either a scheduled appointment
    /// with a provisioned video session exists afterwards, or nothing does.
    ///
    /// On `SlotTaken` the caller is expected to re-query the slot generator
    /// and pick a different slot; there is no automatic re-offer here.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for client {} with provider {}",
            request.client_id, request.provider_id
        );

        // Step 1: provider must exist and be open for bookings
        let provider = self
            .providers
            .get_provider(request.provider_id, auth_token)
            .await?;
        if !provider.accepts_bookings() {
            return Err(AppointmentError::ProviderUnavailable);
        }

        // Step 2: the requested window must be well-formed and in the future
        let window = TimeWindow::new(request.start_time, request.end_time)
            .map_err(|e| AppointmentError::InvalidRange(e.to_string()))?;
        if window.start_time < self.clock.now() {
            return Err(AppointmentError::InvalidRange(
                "appointment cannot start in the past".to_string(),
            ));
        }

        // Step 3: guarded insert
        let created = self.insert_scheduled(&request, window, auth_token).await?;

        // Step 4: provision the video session; roll the appointment back if
        // that fails so no scheduled row exists without a session
        match self.provision_video(&created, auth_token).await {
            Ok(appointment) => {
                info!(
                    "Appointment {} booked for provider {}",
                    appointment.id, appointment.provider_id
                );
                Ok(appointment)
            }
            Err(e) => {
                warn!(
                    "Rolling back appointment {} after provisioning failure: {}",
                    created.id, e
                );
                self.rollback_appointment(created.id, auth_token).await;
                Err(e)
            }
        }
    }

    /// Existence check plus conditional insert, retried a bounded number of
    /// times when the store reports a concurrent-write conflict.
    async fn insert_scheduled(
        &self,
        request: &BookAppointmentRequest,
        window: TimeWindow,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        for attempt in 1..=self.rules.max_booking_attempts {
            debug!(
                "Booking attempt {} for provider {} at {}",
                attempt, request.provider_id, window.start_time
            );

            let conflicts = self
                .overlapping_scheduled(request.provider_id, window, auth_token)
                .await?;
            if !conflicts.is_empty() {
                warn!(
                    "Appointment conflict for provider {} at {}: {} overlapping",
                    request.provider_id,
                    window.start_time,
                    conflicts.len()
                );
                return Err(AppointmentError::SlotTaken);
            }

            let appointment_id = Uuid::new_v4();
            let now = self.clock.now();
            let appointment_data = json!({
                "id": appointment_id,
                "provider_id": request.provider_id,
                "client_id": request.client_id,
                "start_time": window.start_time.to_rfc3339(),
                "end_time": window.end_time.to_rfc3339(),
                "status": AppointmentStatus::Scheduled,
                "client_note": request.client_note,
                "created_at": now.to_rfc3339(),
                "updated_at": now.to_rfc3339()
            });

            match self
                .supabase
                .insert_returning("/rest/v1/appointments", Some(auth_token), appointment_data)
                .await
            {
                Ok(rows) => {
                    let row = rows.first().ok_or_else(|| {
                        AppointmentError::Database("Failed to create appointment".to_string())
                    })?;
                    return serde_json::from_value(row.clone())
                        .map_err(|e| AppointmentError::Database(e.to_string()));
                }
                // Lost the race against a concurrent insert; re-check
                // against fresh state and try again.
                Err(StoreError::Conflict(_)) if attempt < self.rules.max_booking_attempts => {
                    warn!(
                        "Concurrent booking conflict, retrying attempt {}/{}",
                        attempt, self.rules.max_booking_attempts
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(100 * attempt as u64))
                        .await;
                }
                Err(StoreError::Conflict(_)) => return Err(AppointmentError::SlotTaken),
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppointmentError::SlotTaken)
    }

    /// Scheduled appointments overlapping the window, via the single
    /// half-open predicate: existing.start < new.end AND existing.end > new.start.
    async fn overlapping_scheduled(
        &self,
        provider_id: Uuid,
        window: TimeWindow,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&status=eq.scheduled&start_time=lt.{}&end_time=gt.{}",
            provider_id,
            urlencoding::encode(&window.end_time.to_rfc3339()),
            urlencoding::encode(&window.start_time.to_rfc3339()),
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
            })
            .collect()
    }

    async fn provision_video(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let video = self.video.as_ref().ok_or_else(|| {
            AppointmentError::ExternalService("Video service is not configured".to_string())
        })?;

        let session_id = video
            .create_session()
            .await
            .map_err(|e| AppointmentError::ExternalService(e.to_string()))?;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let rows = self
            .supabase
            .update_returning(
                &path,
                Some(auth_token),
                json!({
                    "video_session_id": session_id,
                    "updated_at": self.clock.now().to_rfc3339()
                }),
            )
            .await?;

        let row = rows.first().ok_or_else(|| {
            AppointmentError::Database("Failed to attach video session".to_string())
        })?;
        serde_json::from_value(row.clone()).map_err(|e| AppointmentError::Database(e.to_string()))
    }

    /// Compensating delete. Best effort: a failure here is logged, the
    /// original error still reaches the caller.
    async fn rollback_appointment(&self, appointment_id: Uuid, auth_token: &str) {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        if let Err(e) = self.supabase.delete(&path, Some(auth_token)).await {
            error!("Failed to roll back appointment {}: {}", appointment_id, e);
        }
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get_appointment(
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

    /// A provider's scheduled appointments, soonest first.
    pub async fn provider_appointments(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&status=eq.scheduled&order=start_time.asc",
            provider_id
        );
        self.fetch_appointments(&path, auth_token).await
    }

    /// Everything a client has booked, soonest first.
    pub async fn client_appointments(
        &self,
        client_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?client_id=eq.{}&order=start_time.asc",
            client_id
        );
        self.fetch_appointments(&path, auth_token).await
    }

    async fn fetch_appointments(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
            })
            .collect()
    }
}
