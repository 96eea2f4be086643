use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role reported by the identity provider. The core trusts this mapping and
/// never re-verifies credentials itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Provider,
    Client,
    Admin,
    Unassigned,
}

impl Role {
    pub fn parse(value: Option<&str>) -> Role {
        match value {
            Some("PROVIDER") => Role::Provider,
            Some("CLIENT") => Role::Client,
            Some("ADMIN") => Role::Admin,
            _ => Role::Unassigned,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Provider => write!(f, "PROVIDER"),
            Role::Client => write!(f, "CLIENT"),
            Role::Admin => write!(f, "ADMIN"),
            Role::Unassigned => write!(f, "UNASSIGNED"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Role,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_provider(&self) -> bool {
        self.role == Role::Provider
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }
}
