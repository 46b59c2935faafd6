use std::collections::HashMap;

use keyring::Entry;
use parking_lot::Mutex;

use super::{CredentialStore, StoreError};

/// Credential storage backed by the platform secret service
/// (Keychain, Credential Manager, kernel keyutils).
///
/// Entries are created once per key and reused, so a backend that scopes
/// secrets to an `Entry` handle still sees its own writes.
pub struct KeyringCredentialStore {
    service: String,
    entries: Mutex<HashMap<String, Entry>>,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn with_entry<T>(
        &self,
        key: &str,
        op: impl FnOnce(&Entry) -> keyring::Result<T>,
    ) -> Result<T, StoreError> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            let entry = Entry::new(&self.service, key)?;
            entries.insert(key.to_owned(), entry);
        }
        match entries.get(key) {
            Some(entry) => Ok(op(entry)?),
            None => Err(StoreError::Keyring(keyring::Error::NoEntry)),
        }
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.with_entry(key, |entry| entry.get_password()) {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::Keyring(keyring::Error::NoEntry)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.with_entry(key, |entry| entry.set_password(value))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.with_entry(key, |entry| entry.delete_credential()) {
            Ok(()) | Err(StoreError::Keyring(keyring::Error::NoEntry)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}
