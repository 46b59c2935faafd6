use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields;

/// Persisted authentication session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            user: None,
        }
    }

    pub fn with_user(mut self, user: Value) -> Self {
        self.user = Some(user);
        self
    }

    /// Both tokens present; the only shape allowed in durable storage.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// Identity derived from the cached user profile, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.user.as_ref().and_then(Identity::from_profile)
    }
}

/// Resolved identity exposed to the application layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub role: Option<String>,
    pub email: Option<String>,
}

const ID_KEYS: &[&str] = &["id", "_id", "userId"];
const ROLE_KEYS: &[&str] = &["role", "userType", "type"];
const EMAIL_KEYS: &[&str] = &["email"];

impl Identity {
    pub fn from_profile(profile: &Value) -> Option<Self> {
        let id = fields::resolve_scalar(profile, ID_KEYS)?;
        Some(Self {
            id,
            role: fields::resolve_scalar(profile, ROLE_KEYS),
            email: fields::resolve_scalar(profile, EMAIL_KEYS),
        })
    }
}
