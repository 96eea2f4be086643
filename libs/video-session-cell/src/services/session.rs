// libs/video-session-cell/src/services/session.rs
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{
    AccessTokenRequest, AccessTokenResponse, CreateSessionResponse, VideoSessionError,
};

/// Client for the video provisioning API.
#[derive(Debug)]
pub struct VideoSessionClient {
    client: Client,
    app_id: String,
    api_token: String,
    base_url: String,
}

impl VideoSessionClient {
    pub fn new(config: &AppConfig) -> Result<Self, VideoSessionError> {
        if !config.is_video_configured() {
            return Err(VideoSessionError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            app_id: config.video_api_app_id.clone(),
            api_token: config.video_api_token.clone(),
            base_url: config.video_api_base_url.clone(),
        })
    }

    /// Provision a new session and return its opaque handle.
    /// POST /apps/{appId}/sessions/new
    pub async fn create_session(&self) -> Result<String, VideoSessionError> {
        info!("Creating new video session");

        let url = format!("{}/apps/{}/sessions/new", self.base_url, self.app_id);
        debug!("Sending session creation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Video session creation failed: {} - {}", status, response_text);
            return Err(VideoSessionError::Api {
                status: status.as_u16(),
                message: response_text,
            });
        }

        let session: CreateSessionResponse = serde_json::from_str(&response_text)
            .map_err(|e| VideoSessionError::Parse(e.to_string()))?;

        info!("Successfully created video session: {}", session.session_id);
        Ok(session.session_id)
    }

    /// Mint an access credential for an existing session, valid until
    /// `expires_at`. `metadata` travels opaquely to the session service and
    /// comes back attached to the connection.
    /// POST /apps/{appId}/sessions/{sessionId}/tokens
    pub async fn generate_access_token(
        &self,
        session_id: &str,
        role: &str,
        expires_at: DateTime<Utc>,
        metadata: serde_json::Value,
    ) -> Result<String, VideoSessionError> {
        info!("Generating access token for video session: {}", session_id);

        let url = format!(
            "{}/apps/{}/sessions/{}/tokens",
            self.base_url, self.app_id, session_id
        );

        let request_body = AccessTokenRequest {
            role: role.to_string(),
            expires_at,
            metadata,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Video token generation failed: {} - {}", status, response_text);
            return Err(VideoSessionError::Api {
                status: status.as_u16(),
                message: response_text,
            });
        }

        let token: AccessTokenResponse = serde_json::from_str(&response_text)
            .map_err(|e| VideoSessionError::Parse(e.to_string()))?;

        debug!("Access token issued for session {}", session_id);
        Ok(token.token)
    }
}
