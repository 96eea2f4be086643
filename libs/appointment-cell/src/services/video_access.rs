// libs/appointment-cell/src/services/video_access.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;
use shared_models::time::TimeWindow;
use shared_utils::clock::{Clock, SystemClock};
use video_session_cell::VideoSessionClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, JoinTokenResponse, SchedulingRules,
};

/// Issues time-boxed join credentials for an appointment's video session.
/// Not a status transition: the appointment stays scheduled throughout.
pub struct VideoAccessService {
    supabase: Arc<SupabaseClient>,
    video: Option<VideoSessionClient>,
    clock: Arc<dyn Clock>,
    rules: SchedulingRules,
}

impl VideoAccessService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            video: VideoSessionClient::new(config).ok(),
            clock,
            rules: SchedulingRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: SchedulingRules) -> Self {
        self.rules = rules;
        self
    }

    /// Issue a join credential for a party to a scheduled appointment,
    /// valid from the pre-window through a grace period past the end.
    pub async fn request_join_token(
        &self,
        appointment_id: Uuid,
        actor: &User,
        auth_token: &str,
    ) -> Result<JoinTokenResponse, AppointmentError> {
        debug!("Join token requested for appointment {} by {}", appointment_id, actor.id);

        let appointment = self.fetch(appointment_id, auth_token).await?;

        if !appointment.involves(&actor.id) {
            return Err(AppointmentError::NotAuthorized);
        }
        if appointment.status != AppointmentStatus::Scheduled {
            return Err(AppointmentError::NotScheduled);
        }
        validate_join_time(self.clock.now(), &appointment.window, &self.rules)?;

        let session_id = appointment.video_session_id.clone().ok_or_else(|| {
            AppointmentError::ExternalService(
                "No video session attached to this appointment".to_string(),
            )
        })?;

        let video = self.video.as_ref().ok_or_else(|| {
            AppointmentError::ExternalService("Video service is not configured".to_string())
        })?;

        let expires_at =
            appointment.window.end_time + Duration::minutes(self.rules.token_grace_minutes);
        let metadata = json!({
            "user_id": actor.id,
            "role": actor.role
        });

        let token = video
            .generate_access_token(&session_id, "publisher", expires_at, metadata)
            .await
            .map_err(|e| AppointmentError::ExternalService(e.to_string()))?;

        // Keep the most recently issued token on the row.
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let _: Vec<Value> = self
            .supabase
            .update_returning(
                &path,
                Some(auth_token),
                json!({
                    "video_access_token": token,
                    "updated_at": self.clock.now().to_rfc3339()
                }),
            )
            .await?;

        info!("Join token issued for appointment {} to {}", appointment_id, actor.id);
        Ok(JoinTokenResponse {
            video_session_id: session_id,
            token,
            expires_at,
        })
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
}

/// Wall-clock gate for join requests: open from `join_window_minutes` before
/// the start through the scheduled end. Evaluated at call time; there is no
/// background timer, a stale request simply fails here.
pub fn validate_join_time(
    now: DateTime<Utc>,
    window: &TimeWindow,
    rules: &SchedulingRules,
) -> Result<(), AppointmentError> {
    let opens_at = window.start_time - Duration::minutes(rules.join_window_minutes);

    if now < opens_at {
        return Err(AppointmentError::TooEarly(format!(
            "the call opens {} minutes before the scheduled start",
            rules.join_window_minutes
        )));
    }
    if now > window.end_time {
        return Err(AppointmentError::TooEarly(
            "the join window for this appointment has closed".to_string(),
        ));
    }

    Ok(())
}
