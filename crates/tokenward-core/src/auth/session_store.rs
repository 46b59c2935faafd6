use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CredentialStore, Session, SessionError};

pub const SESSION_KEY: &str = "session";

/// Typed access to the durable session entry.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn CredentialStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn CredentialStore>) -> Self {
        Self { backend }
    }

    pub fn load(&self) -> Result<Option<Session>, SessionError> {
        let Some(raw) = self.backend.load(SESSION_KEY)? else {
            return Ok(None);
        };
        let envelope: SessionEnvelope = serde_json::from_str(&raw)?;
        Ok(Some(envelope.session))
    }

    /// Replace the stored session. Last write wins.
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        if !session.is_complete() {
            return Err(SessionError::IncompleteSession);
        }
        let envelope = SessionEnvelope {
            version: 1,
            saved_at: Utc::now(),
            session: session.clone(),
        };
        let payload = serde_json::to_string(&envelope)?;
        self.backend.save(SESSION_KEY, &payload)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.backend.delete(SESSION_KEY)?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionEnvelope {
    version: u32,
    saved_at: DateTime<Utc>,
    session: Session,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{FileCredentialStore, MemoryCredentialStore};
    use crate::config::ConfigLocator;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_session() -> Session {
        Session::new("access", "refresh").with_user(json!({ "id": "u1", "role": "agent" }))
    }

    #[test]
    fn round_trip_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ConfigLocator::at(temp_dir.path()).unwrap();
        let store = SessionStore::new(Arc::new(FileCredentialStore::new(locator)));
        let session = sample_session();
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));
    }

    #[test]
    fn missing_session_is_none() {
        let store = SessionStore::new(Arc::new(MemoryCredentialStore::new()));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn clear_is_immediate() {
        let store = SessionStore::new(Arc::new(MemoryCredentialStore::new()));
        store.save(&sample_session()).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn rejects_incomplete_session() {
        let store = SessionStore::new(Arc::new(MemoryCredentialStore::new()));
        let err = store.save(&Session::new("access", "")).unwrap_err();
        assert!(matches!(err, SessionError::IncompleteSession));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_is_an_error() {
        let backend = Arc::new(MemoryCredentialStore::new());
        backend.save(SESSION_KEY, "not json").unwrap();
        let store = SessionStore::new(backend);
        assert!(matches!(store.load().unwrap_err(), SessionError::Serde(_)));
    }
}
