// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use provider_cell::models::AvailabilityError;
use shared_database::StoreError;
use shared_models::time::TimeWindow;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub client_id: Uuid,
    #[serde(flatten)]
    pub window: TimeWindow,
    pub status: AppointmentStatus,
    pub client_note: Option<String>,
    pub provider_note: Option<String>,
    pub video_session_id: Option<String>,
    pub video_access_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// True if the given identity is a party to this appointment.
    pub fn involves(&self, user_id: &str) -> bool {
        self.provider_id.to_string() == user_id || self.client_id.to_string() == user_id
    }

    pub fn is_provider(&self, user_id: &str) -> bool {
        self.provider_id.to_string() == user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub provider_id: Uuid,
    pub client_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub client_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateAppointmentRequest {
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinTokenResponse {
    pub video_session_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// ==============================================================================
// DERIVED SLOT MODELS
// ==============================================================================

/// A currently bookable fixed-length sub-interval of an availability window.
/// Computed on demand, never persisted, stale the moment someone else books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookableSlot {
    pub provider_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub formatted: String,
    pub day: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub display_date: String,
    pub slots: Vec<BookableSlot>,
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub horizon_days: i64,
    pub slot_length_minutes: i64,
    pub join_window_minutes: i64,
    pub token_grace_minutes: i64,
    pub max_booking_attempts: u32,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            horizon_days: 4,             // Offer slots for today plus the next 3 days
            slot_length_minutes: 30,
            join_window_minutes: 30,     // Call opens 30 minutes before the start
            token_grace_minutes: 60,     // Tokens outlive the appointment by an hour
            max_booking_attempts: 3,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Provider not found")]
    ProviderNotFound,

    #[error("Provider is not accepting bookings")]
    ProviderUnavailable,

    #[error("Invalid appointment time: {0}")]
    InvalidRange(String),

    #[error("This time slot is already booked")]
    SlotTaken,

    #[error("No availability set by provider")]
    NoAvailability,

    #[error("Not authorized for this appointment")]
    NotAuthorized,

    #[error("Too early: {0}")]
    TooEarly(String),

    #[error("Appointment is not currently scheduled")]
    NotScheduled,

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        // The booking path matches `StoreError::Conflict` explicitly before
        // this conversion runs; anything that reaches here is infrastructure.
        AppointmentError::Database(err.to_string())
    }
}

impl From<AvailabilityError> for AppointmentError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::ProviderNotFound => AppointmentError::ProviderNotFound,
            AvailabilityError::InvalidRange(msg) => AppointmentError::InvalidRange(msg),
            AvailabilityError::Overlap => {
                AppointmentError::Database("Unexpected availability conflict".to_string())
            }
            AvailabilityError::Database(msg) => AppointmentError::Database(msg),
        }
    }
}
