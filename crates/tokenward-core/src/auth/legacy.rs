use std::sync::Arc;

use serde_json::{Map, Value};

use super::fields::{self, ACCESS_TOKEN_KEYS, REFRESH_TOKEN_KEYS, USER_KEYS};
use super::{CredentialStore, Identity, StoreError};

pub const LEGACY_KEY: &str = "legacy_auth";

/// Best-effort copy of the credentials in the older flat record format.
///
/// Nothing here can fail the caller: every error is logged and dropped.
#[derive(Clone)]
pub struct LegacyMirror {
    backend: Arc<dyn CredentialStore>,
}

impl LegacyMirror {
    pub fn new(backend: Arc<dyn CredentialStore>) -> Self {
        Self { backend }
    }

    /// Mirror a raw login response.
    pub fn write(&self, login_response: &Value) {
        let mut record = Map::new();
        if let Some(access) = fields::resolve_string(login_response, ACCESS_TOKEN_KEYS) {
            record.insert("token".into(), Value::String(access.clone()));
            record.insert("accessToken".into(), Value::String(access));
        }
        if let Some(refresh) = fields::resolve_string(login_response, REFRESH_TOKEN_KEYS) {
            record.insert("refreshToken".into(), Value::String(refresh));
        }
        if let Some(identity) = fields::resolve_object(login_response, USER_KEYS)
            .as_ref()
            .and_then(Identity::from_profile)
        {
            record.insert("userId".into(), Value::String(identity.id));
            if let Some(role) = identity.role {
                record.insert("role".into(), Value::String(role));
            }
            if let Some(email) = identity.email {
                record.insert("email".into(), Value::String(email));
            }
        }
        self.persist(&record);
    }

    /// Replace the access token in the existing record, creating one if needed.
    pub fn update_token(&self, access_token: &str) {
        let mut record = self.load().unwrap_or_default();
        record.insert("token".into(), Value::String(access_token.to_owned()));
        record.insert("accessToken".into(), Value::String(access_token.to_owned()));
        self.persist(&record);
    }

    /// Current record, if one exists and parses.
    pub fn load(&self) -> Option<Map<String, Value>> {
        let raw = match self.backend.load(LEGACY_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(error = %err, "legacy auth record unreadable");
                return None;
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %err, "legacy auth record is not valid JSON");
                None
            }
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.backend.delete(LEGACY_KEY) {
            tracing::warn!(error = %err, "failed to clear legacy auth record");
        }
    }

    fn persist(&self, record: &Map<String, Value>) {
        let result = serde_json::to_string(record)
            .map_err(StoreError::from)
            .and_then(|payload| self.backend.save(LEGACY_KEY, &payload));
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to mirror legacy auth record");
        }
    }
}
