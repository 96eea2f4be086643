use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Errors surfaced by the REST store. `Conflict` is the one kind callers may
/// retry on: it maps HTTP 409, which the appointments table produces through
/// its exclusion constraint on `(provider_id, tstzrange(start_time, end_time))`
/// over scheduled rows. That constraint is what turns check-then-insert into
/// an atomic conditional commit.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None)
            .await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Store API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => StoreError::Auth(error_text),
                404 => StoreError::NotFound(error_text),
                409 => StoreError::Conflict(error_text),
                code => StoreError::Api {
                    status: code,
                    message: error_text,
                },
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// POST a row and return the representation the store persisted.
    pub async fn insert_returning(
        &self,
        path: &str,
        auth_token: Option<&str>,
        body: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        self.request_with_headers(Method::POST, path, auth_token, Some(body), Some(headers))
            .await
    }

    /// PATCH matching rows and return the updated representations.
    pub async fn update_returning(
        &self,
        path: &str,
        auth_token: Option<&str>,
        body: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        self.request_with_headers(Method::PATCH, path, auth_token, Some(body), Some(headers))
            .await
    }

    pub async fn delete(&self, path: &str, auth_token: Option<&str>) -> Result<(), StoreError> {
        // Ask for the deleted rows back so the response always carries a JSON
        // body (a bare DELETE answers 204 with none).
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let _: Vec<Value> = self
            .request_with_headers(Method::DELETE, path, auth_token, None, Some(headers))
            .await?;
        Ok(())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
