mod credential_store;
mod error;
pub mod fields;
mod keyring_store;
mod legacy;
mod manager;
mod refresh;
mod remote;
mod session;
mod session_store;
mod token_cache;

pub use credential_store::{open_store, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{SessionError, StoreError};
pub use fields::TokenPair;
pub use keyring_store::KeyringCredentialStore;
pub use legacy::{LegacyMirror, LEGACY_KEY};
pub use manager::{SessionManager, SessionStatus};
pub use refresh::RefreshCoordinator;
pub use remote::{AuthApi, AuthEndpoints, LoginOutcome, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH};
pub use session::{Identity, Session};
pub use session_store::{SessionStore, SESSION_KEY};
pub use token_cache::AccessTokenCache;
