use std::env;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use thiserror::Error;
use url::Url;

pub const DEFAULT_SERVICE_NAME: &str = "tokenward";
const DEFAULT_USER_AGENT: &str = "tokenward/0.1.0";

/// Locates the per-user directory used by the file-backed credential store.
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    root: PathBuf,
}

impl ConfigLocator {
    /// Attempt to discover the persistent configuration directory, creating it if needed.
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from("app", "tokenward", "tokenward")
            .ok_or(ConfigError::MissingProjectDirs)?;
        Self::at(dirs.config_dir())
    }

    /// Use an explicit directory, creating it with user-only permissions.
    pub fn at(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(ConfigError::CreateDir)?;
        set_user_only_permissions(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Path of the file holding the entry stored under `key`.
    pub fn credential_file(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn set_user_only_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        let metadata = fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o700);
        fs::set_permissions(path, permissions)?;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

/// Which backend holds the durable session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Keyring,
    File,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyring" | "keychain" | "secure" => Ok(StorageBackend::Keyring),
            "file" => Ok(StorageBackend::File),
            "memory" | "ephemeral" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::InvalidStorage(other.to_owned())),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            StorageBackend::Keyring => "keyring",
            StorageBackend::File => "file",
            StorageBackend::Memory => "memory",
        };
        write!(f, "{value}")
    }
}

/// What the core does with local state once a renewal attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenewalFailurePolicy {
    /// Leave the session and cached credential untouched; the application decides.
    #[default]
    Retain,
    /// Purge the session and cached credential so the next request is anonymous.
    SignOut,
}

/// Client configuration supplied by consumers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
    pub refresh_timeout: Duration,
    pub revoke_timeout: Duration,
    pub user_agent: String,
    pub failure_policy: RenewalFailurePolicy,
    pub storage: StorageBackend,
    pub service_name: String,
}

impl ClientConfig {
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            request_timeout: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(15),
            revoke_timeout: Duration::from_secs(5),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            failure_policy: RenewalFailurePolicy::Retain,
            storage: StorageBackend::Keyring,
            service_name: DEFAULT_SERVICE_NAME.to_owned(),
        }
    }

    /// Build a configuration from `TOKENWARD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = env::var("TOKENWARD_BASE_URL").map_err(|_| ConfigError::MissingBaseUrl)?;
        let mut config = Self::new(Url::parse(&raw)?);
        if let Ok(value) = env::var("TOKENWARD_STORAGE") {
            config.storage = value.parse()?;
        }
        if env::var_os("TOKENWARD_SIGN_OUT_ON_RENEWAL_FAILURE").is_some() {
            config.failure_policy = RenewalFailurePolicy::SignOut;
        }
        Ok(config)
    }

    pub fn with_storage(mut self, storage: StorageBackend) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_failure_policy(mut self, policy: RenewalFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_revoke_timeout(mut self, timeout: Duration) -> Self {
        self.revoke_timeout = timeout;
        self
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Resolve `path` against the base URL. Leading slashes are ignored so that
    /// a base with a path prefix (e.g. `/v1/`) is preserved.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }
}

/// Errors that can occur while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to determine configuration directory for tokenward")]
    MissingProjectDirs,
    #[error("failed to create configuration directory: {0}")]
    CreateDir(#[source] std::io::Error),
    #[error("filesystem error: {0}")]
    Io(#[source] std::io::Error),
    #[error("TOKENWARD_BASE_URL is not set")]
    MissingBaseUrl,
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("invalid storage backend '{0}'")]
    InvalidStorage(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn credential_file_appends_key() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ConfigLocator::at(temp_dir.path()).unwrap();
        let path = locator.credential_file("session");
        assert!(path.ends_with("session.json"));
    }

    #[cfg(unix)]
    #[test]
    fn locator_restricts_directory_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested");
        let locator = ConfigLocator::at(&root).unwrap();
        let mode = fs::metadata(locator.root()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let config = ClientConfig::new(Url::parse("https://api.example.com/v1").unwrap());
        assert_eq!(config.base_url.as_str(), "https://api.example.com/v1/");
        let url = config.endpoint("/auth/refresh").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/auth/refresh");
    }

    #[test]
    fn parse_storage_variants() {
        assert_eq!(
            "keyring".parse::<StorageBackend>().unwrap(),
            StorageBackend::Keyring
        );
        assert_eq!("FILE".parse::<StorageBackend>().unwrap(), StorageBackend::File);
        assert_eq!(
            "ephemeral".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
        let err = "vault".parse::<StorageBackend>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStorage(value) if value == "vault"));
    }

    #[test]
    fn defaults_retain_session_on_failure() {
        let config = ClientConfig::new(Url::parse("https://api.example.com").unwrap());
        assert_eq!(config.failure_policy, RenewalFailurePolicy::Retain);
        assert_eq!(config.storage, StorageBackend::Keyring);
    }

    // Only test that touches TOKENWARD_* variables.
    #[test]
    fn reads_environment_overrides() {
        env::remove_var("TOKENWARD_BASE_URL");
        assert!(matches!(
            ClientConfig::from_env(),
            Err(ConfigError::MissingBaseUrl)
        ));

        env::set_var("TOKENWARD_BASE_URL", "https://api.example.com/v2");
        env::set_var("TOKENWARD_STORAGE", "memory");
        env::set_var("TOKENWARD_SIGN_OUT_ON_RENEWAL_FAILURE", "1");
        let config = ClientConfig::from_env().unwrap();
        env::remove_var("TOKENWARD_BASE_URL");
        env::remove_var("TOKENWARD_STORAGE");
        env::remove_var("TOKENWARD_SIGN_OUT_ON_RENEWAL_FAILURE");

        assert_eq!(config.base_url.as_str(), "https://api.example.com/v2/");
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.failure_policy, RenewalFailurePolicy::SignOut);
    }
}
