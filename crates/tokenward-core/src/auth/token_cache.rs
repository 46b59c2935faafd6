use std::sync::Arc;

use parking_lot::Mutex;

/// In-memory holder of the current access token.
///
/// The lock is never held across an await point.
#[derive(Debug, Clone, Default)]
pub struct AccessTokenCache {
    token: Arc<Mutex<Option<String>>>,
}

impl AccessTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.token.lock().clone()
    }

    /// `None` forgets the credential.
    pub fn set(&self, token: Option<String>) {
        *self.token.lock() = token;
    }

    /// Install `token` only if nothing is cached yet. Returns whether it was installed.
    pub fn fill_if_empty(&self, token: String) -> bool {
        let mut slot = self.token.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(token);
        true
    }
}
