use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{ClientConfig, ConfigLocator, StorageBackend};

use super::{KeyringCredentialStore, StoreError};

/// Persistence abstraction for raw secret entries addressed by key.
///
/// Implementations return `Ok(None)` for a missing entry and treat deleting a
/// missing entry as success.
pub trait CredentialStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Build the backend selected in `config`.
pub fn open_store(config: &ClientConfig) -> Result<Arc<dyn CredentialStore>, StoreError> {
    let store: Arc<dyn CredentialStore> = match config.storage {
        StorageBackend::Keyring => Arc::new(KeyringCredentialStore::new(&config.service_name)),
        StorageBackend::File => Arc::new(FileCredentialStore::with_default_locator()?),
        StorageBackend::Memory => Arc::new(MemoryCredentialStore::new()),
    };
    Ok(store)
}

/// Filesystem-backed storage located in the user configuration directory.
pub struct FileCredentialStore {
    locator: ConfigLocator,
}

impl FileCredentialStore {
    pub fn new(locator: ConfigLocator) -> Self {
        Self { locator }
    }

    pub fn with_default_locator() -> Result<Self, StoreError> {
        Ok(Self::new(ConfigLocator::new()?))
    }

    fn write_file(path: &Path, payload: &str) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perm = file.metadata()?.permissions();
            perm.set_mode(0o600);
            fs::set_permissions(path, perm)?;
        }

        file.write_all(payload.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.locator.credential_file(key);
        match fs::read_to_string(path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.locator.credential_file(key);
        Self::write_file(&path, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.locator.credential_file(key);
        match fs::remove_file(path) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local storage; nothing survives a restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
