//! Resolution of loosely-named fields in auth responses.
//!
//! Servers spell the same concept several ways. Each concept gets an ordered
//! list of accepted keys; the first non-empty match wins. Nothing downstream of
//! this module looks at raw response keys.

use serde_json::Value;

use super::SessionError;

pub const ACCESS_TOKEN_KEYS: &[&str] = &["accessToken", "token", "jwt"];
pub const REFRESH_TOKEN_KEYS: &[&str] = &["refreshToken", "refresh_token", "refresh"];
pub const USER_KEYS: &[&str] = &["user"];

/// Access/refresh pair extracted from an auth response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn from_response(body: &Value) -> Result<Self, SessionError> {
        let access_token = resolve_string(body, ACCESS_TOKEN_KEYS)
            .ok_or(SessionError::MissingField("access token"))?;
        let refresh_token = resolve_string(body, REFRESH_TOKEN_KEYS)
            .ok_or(SessionError::MissingField("refresh token"))?;
        Ok(Self {
            access_token,
            refresh_token,
        })
    }
}

/// First non-empty string value among `keys`.
pub fn resolve_string(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| body.get(*key))
        .filter_map(Value::as_str)
        .find(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// Like [`resolve_string`] but also accepts numbers (ids are often numeric).
pub fn resolve_scalar(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| body.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// First object value among `keys`.
pub fn resolve_object(body: &Value, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| body.get(*key))
        .find(|value| value.is_object())
        .cloned()
}
