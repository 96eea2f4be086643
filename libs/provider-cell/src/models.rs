// libs/provider-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::time::TimeWindow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: Option<String>,
    pub bio: Option<String>,
    pub is_verified: bool,
    pub is_bookable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// A provider can be booked against only once verified and open for
    /// bookings.
    pub fn accepts_bookings(&self) -> bool {
        self.is_verified && self.is_bookable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    // Reserved for a later consumption flow; nothing creates this today.
    Consumed,
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailabilityStatus::Available => write!(f, "available"),
            AvailabilityStatus::Consumed => write!(f, "consumed"),
        }
    }
}

/// A provider-declared open interval during which bookings are allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub provider_id: Uuid,
    #[serde(flatten)]
    pub window: TimeWindow,
    pub status: AvailabilityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wall-clock strings; parsed in the canonical offset at the handler
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQueryParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Invalid availability range: {0}")]
    InvalidRange(String),

    #[error("This window overlaps with existing availability")]
    Overlap,

    #[error("Provider not found")]
    ProviderNotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<StoreError> for AvailabilityError {
    fn from(err: StoreError) -> Self {
        match err {
            // The windows table carries its own exclusion constraint; a 409
            // racing past the in-memory check is still an overlap.
            StoreError::Conflict(_) => AvailabilityError::Overlap,
            other => AvailabilityError::Database(other.to_string()),
        }
    }
}
