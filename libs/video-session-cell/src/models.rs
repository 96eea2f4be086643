use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoSessionError {
    #[error("Video service is not configured")]
    NotConfigured,

    #[error("Video service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Video service returned an unreadable response: {0}")]
    Parse(String),

    #[error("Video service transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenRequest {
    pub role: String,
    pub expires_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub token: String,
}
