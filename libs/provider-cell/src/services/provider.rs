use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{AvailabilityError, Provider};

pub struct ProviderService {
    supabase: Arc<SupabaseClient>,
}

impl ProviderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Fetch a provider profile.
    pub async fn get_provider(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Provider, AvailabilityError> {
        debug!("Fetching provider: {}", provider_id);

        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if result.is_empty() {
            return Err(AvailabilityError::ProviderNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AvailabilityError::Database(e.to_string()))
    }
}
