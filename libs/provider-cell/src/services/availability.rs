use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::time::TimeWindow;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{AvailabilityError, AvailabilityStatus, AvailabilityWindow};

/// Owns a provider's open availability windows: insertion with overlap
/// rejection and pruning of windows that have already ended.
pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            clock,
        }
    }

    /// Publish a new availability window for a provider.
    ///
    /// Rejects inverted ranges and any window that overlaps or exactly
    /// duplicates existing availability, then sweeps the provider's expired
    /// windows before inserting. The sweep is maintenance, not part of the
    /// conflict check.
    pub async fn add_window(
        &self,
        provider_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        debug!("Creating availability window for provider: {}", provider_id);

        let window = TimeWindow::new(start_time, end_time)
            .map_err(|e| AvailabilityError::InvalidRange(e.to_string()))?;

        let existing = self.available_windows(provider_id, auth_token).await?;
        for current in &existing {
            // One inclusive overlap test plus one equality test covers
            // containment in either direction as well.
            if current.window.overlaps(&window) || current.window == window {
                warn!(
                    "Availability window {} - {} overlaps existing window {} for provider {}",
                    window.start_time, window.end_time, current.id, provider_id
                );
                return Err(AvailabilityError::Overlap);
            }
        }

        let now = self.clock.now();
        self.sweep_expired_windows(provider_id, now, auth_token).await?;

        let window_data = json!({
            "provider_id": provider_id,
            "start_time": window.start_time.to_rfc3339(),
            "end_time": window.end_time.to_rfc3339(),
            "status": AvailabilityStatus::Available,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/availability_windows", Some(auth_token), window_data)
            .await?;

        if result.is_empty() {
            return Err(AvailabilityError::Database(
                "Failed to create availability window".to_string(),
            ));
        }

        let created: AvailabilityWindow = serde_json::from_value(result[0].clone())
            .map_err(|e| AvailabilityError::Database(e.to_string()))?;
        debug!("Availability window created with ID: {}", created.id);

        Ok(created)
    }

    /// The provider's current open windows, ordered by start time. This is
    /// the read path the slot generator consumes.
    pub async fn available_windows(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let path = format!(
            "/rest/v1/availability_windows?provider_id=eq.{}&status=eq.available&order=start_time.asc",
            provider_id
        );

        self.fetch_windows(&path, auth_token).await
    }

    /// Windows intersecting the half-open range `[from, to)`.
    pub async fn list_windows(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let path = format!(
            "/rest/v1/availability_windows?provider_id=eq.{}&start_time=lt.{}&end_time=gt.{}&order=start_time.asc",
            provider_id,
            urlencoding::encode(&to.to_rfc3339()),
            urlencoding::encode(&from.to_rfc3339()),
        );

        self.fetch_windows(&path, auth_token).await
    }

    /// Every window the provider has published, past or future.
    pub async fn all_windows(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let path = format!(
            "/rest/v1/availability_windows?provider_id=eq.{}&order=start_time.asc",
            provider_id
        );

        self.fetch_windows(&path, auth_token).await
    }

    async fn fetch_windows(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| AvailabilityError::Database(e.to_string()))
            })
            .collect()
    }

    async fn sweep_expired_windows(
        &self,
        provider_id: Uuid,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<(), AvailabilityError> {
        debug!("Sweeping expired availability windows for provider: {}", provider_id);

        let path = format!(
            "/rest/v1/availability_windows?provider_id=eq.{}&status=eq.available&end_time=lt.{}",
            provider_id,
            urlencoding::encode(&now.to_rfc3339()),
        );

        self.supabase.delete(&path, Some(auth_token)).await?;
        Ok(())
    }
}
