// libs/appointment-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use provider_cell::services::{AvailabilityService, ProviderService};
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::time::{
    canonical_date, canonical_day_start, format_canonical_day, format_canonical_time, TimeWindow,
};
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{Appointment, AppointmentError, BookableSlot, DaySlots, SchedulingRules};

/// Derives the sequence of bookable slots for a rolling multi-day horizon
/// from a provider's open availability windows and the appointments already
/// on the books.
///
/// This is a read-only projection: it takes no locks and commits nothing.
/// The output can go stale the instant another client books; the booking
/// path re-validates against the store before committing.
pub struct SlotGeneratorService {
    supabase: Arc<SupabaseClient>,
    providers: ProviderService,
    availability: AvailabilityService,
    clock: Arc<dyn Clock>,
    rules: SchedulingRules,
}

impl SlotGeneratorService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            providers: ProviderService::with_client(Arc::clone(&supabase)),
            availability: AvailabilityService::with_clock(config, Arc::clone(&clock)),
            supabase,
            clock,
            rules: SchedulingRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: SchedulingRules) -> Self {
        self.rules = rules;
        self
    }

    /// Free slots per day over the booking horizon, days in chronological
    /// order and slots chronological within each day. Callers picking "the
    /// next available slot" rely on that ordering.
    pub async fn generate_slots(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<DaySlots>, AppointmentError> {
        debug!("Generating slots for provider: {}", provider_id);

        let provider = self.providers.get_provider(provider_id, auth_token).await?;
        if !provider.accepts_bookings() {
            return Err(AppointmentError::ProviderUnavailable);
        }

        let windows = self
            .availability
            .available_windows(provider_id, auth_token)
            .await?;
        if windows.is_empty() {
            return Err(AppointmentError::NoAvailability);
        }
        let windows: Vec<TimeWindow> = windows.iter().map(|w| w.window).collect();

        let now = self.clock.now();
        let today = canonical_date(now);
        let horizon_start = canonical_day_start(today);
        let horizon_end = canonical_day_start(today + Duration::days(self.rules.horizon_days));

        let booked: Vec<TimeWindow> = self
            .scheduled_appointments_between(provider_id, horizon_start, horizon_end, auth_token)
            .await?
            .iter()
            .map(|a| a.window)
            .collect();

        let slot_length = Duration::minutes(self.rules.slot_length_minutes);
        let mut days = Vec::with_capacity(self.rules.horizon_days as usize);

        for offset in 0..self.rules.horizon_days {
            let date = today + Duration::days(offset);
            let slots = slots_for_day(provider_id, &windows, date, now, &booked, slot_length);
            let display_date = slots
                .first()
                .map(|s| format_canonical_day(s.start_time))
                .unwrap_or_else(|| format_canonical_day(canonical_day_start(date)));

            days.push(DaySlots {
                date,
                display_date,
                slots,
            });
        }

        debug!(
            "Generated {} slots for provider {} over {} days",
            days.iter().map(|d| d.slots.len()).sum::<usize>(),
            provider_id,
            self.rules.horizon_days
        );
        Ok(days)
    }

    async fn scheduled_appointments_between(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&status=eq.scheduled&start_time=lt.{}&end_time=gt.{}&order=start_time.asc",
            provider_id,
            urlencoding::encode(&to.to_rfc3339()),
            urlencoding::encode(&from.to_rfc3339()),
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
}

/// Walk the availability windows projected onto one calendar date in
/// fixed-length steps. A candidate `[cursor, cursor + slot_length)` is
/// emitted only when it is not in the past, lies entirely inside the
/// projected window, and overlaps none of the booked windows.
pub fn slots_for_day(
    provider_id: Uuid,
    windows: &[TimeWindow],
    date: NaiveDate,
    now: DateTime<Utc>,
    booked: &[TimeWindow],
    slot_length: Duration,
) -> Vec<BookableSlot> {
    let mut slots = Vec::new();

    for window in windows {
        let projected = window.project_onto(date);
        let mut cursor = projected.start_time;

        loop {
            let slot_end = cursor + slot_length;
            if slot_end > projected.end_time {
                // No partial trailing slot.
                break;
            }

            let candidate = TimeWindow {
                start_time: cursor,
                end_time: slot_end,
            };
            let in_past = cursor < now;
            let taken = booked.iter().any(|existing| existing.overlaps(&candidate));

            if !in_past && !taken {
                slots.push(BookableSlot {
                    provider_id,
                    start_time: cursor,
                    end_time: slot_end,
                    formatted: format!(
                        "{} - {}",
                        format_canonical_time(cursor),
                        format_canonical_time(slot_end)
                    ),
                    day: date,
                });
            }

            cursor = slot_end;
        }
    }

    slots.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    slots
}
