use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::{watch, OnceCell};

use crate::config::{ClientConfig, RenewalFailurePolicy};

use super::fields::TokenPair;
use super::{
    open_store, AccessTokenCache, AuthApi, AuthEndpoints, CredentialStore, Identity,
    LegacyMirror, RefreshCoordinator, Session, SessionError, SessionStore,
};

/// Authentication state as seen by the application layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Authenticated,
    /// The last renewal attempt failed; the application decides whether to
    /// send the user back to login.
    RenewalFailed,
}

/// State shared by the manager, the refresh coordinator and the renewal task.
pub(crate) struct SessionContext {
    config: ClientConfig,
    api: AuthApi,
    store: SessionStore,
    cache: AccessTokenCache,
    legacy: LegacyMirror,
    status: watch::Sender<SessionStatus>,
    // Bumped by logout so a renewal that straddles it cannot resurrect the session.
    epoch: AtomicU64,
    // Held across a renewal commit and across a purge, never across an await.
    commit: Mutex<()>,
}

impl SessionContext {
    fn publish(&self, status: SessionStatus) {
        self.status.send_replace(status);
    }

    /// One renewal round trip. Runs inside the coordinator's spawned task.
    pub(crate) async fn renew_once(&self) -> Option<String> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let refresh_token = match self.store.load() {
            Ok(Some(session)) => session.refresh_token,
            Ok(None) => {
                tracing::debug!("no stored session; skipping token renewal");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "stored session unreadable; skipping token renewal");
                return None;
            }
        };

        let result =
            tokio::time::timeout(self.config.refresh_timeout, self.api.refresh(&refresh_token))
                .await
                .unwrap_or(Err(SessionError::Timeout));

        match result {
            Ok(pair) => self.commit_renewal(pair, epoch),
            Err(err) => {
                tracing::warn!(error = %err, "token renewal failed");
                self.renewal_failed()
            }
        }
    }

    fn commit_renewal(&self, pair: TokenPair, epoch: u64) -> Option<String> {
        let _guard = self.commit.lock();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::info!("session ended during renewal; discarding renewed tokens");
            return None;
        }

        let user = match self.store.load() {
            Ok(existing) => existing.and_then(|session| session.user),
            Err(err) => {
                tracing::warn!(error = %err, "could not read cached profile during renewal");
                None
            }
        };
        let session = Session {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user,
        };
        if let Err(err) = self.store.save(&session) {
            tracing::warn!(error = %err, "failed to persist renewed session");
        }

        self.cache.set(Some(session.access_token.clone()));
        self.legacy.update_token(&session.access_token);
        self.publish(SessionStatus::Authenticated);
        tracing::info!("access token renewed");
        Some(session.access_token)
    }

    fn renewal_failed(&self) -> Option<String> {
        if self.config.failure_policy == RenewalFailurePolicy::SignOut {
            self.purge_local();
        }
        self.publish(SessionStatus::RenewalFailed);
        None
    }

    fn purge_local(&self) {
        let _guard = self.commit.lock();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %err, "failed to clear stored session");
        }
        self.legacy.clear();
        self.cache.set(None);
    }
}

/// Owns the session for the lifetime of the application.
///
/// Cloning is cheap; every clone shares the same cache, store and renewal state.
#[derive(Clone)]
pub struct SessionManager {
    ctx: Arc<SessionContext>,
    http: Client,
    refresher: RefreshCoordinator,
    hydrated: Arc<OnceCell<()>>,
}

impl SessionManager {
    pub fn new(
        config: ClientConfig,
        backend: Arc<dyn CredentialStore>,
    ) -> Result<Self, SessionError> {
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;
        Self::with_http(config, backend, http)
    }

    /// Build a manager with the storage backend named in `config`.
    pub fn from_config(config: ClientConfig) -> Result<Self, SessionError> {
        let backend = open_store(&config)?;
        Self::new(config, backend)
    }

    pub fn with_http(
        config: ClientConfig,
        backend: Arc<dyn CredentialStore>,
        http: Client,
    ) -> Result<Self, SessionError> {
        let api = AuthApi::new(http.clone(), AuthEndpoints::from_config(&config)?);
        let (status, _) = watch::channel(SessionStatus::Anonymous);
        let ctx = Arc::new(SessionContext {
            config,
            api,
            store: SessionStore::new(backend.clone()),
            cache: AccessTokenCache::new(),
            legacy: LegacyMirror::new(backend),
            status,
            epoch: AtomicU64::new(0),
            commit: Mutex::new(()),
        });
        Ok(Self {
            refresher: RefreshCoordinator::new(ctx.clone()),
            ctx,
            http,
            hydrated: Arc::new(OnceCell::new()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.ctx.config
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn legacy(&self) -> &LegacyMirror {
        &self.ctx.legacy
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let outcome = self.ctx.api.login(email, password).await?;
        let session = Session {
            access_token: outcome.tokens.access_token,
            refresh_token: outcome.tokens.refresh_token,
            user: outcome.user,
        };
        self.ctx.store.save(&session)?;
        self.ctx.cache.set(Some(session.access_token.clone()));
        let _ = self.hydrated.set(());
        self.ctx.legacy.write(&outcome.raw);
        self.ctx.publish(SessionStatus::Authenticated);
        tracing::info!("logged in");
        Ok(session)
    }

    /// Current access token, loading it from durable storage on first use.
    pub async fn access_token(&self) -> Option<String> {
        self.hydrate().await;
        self.ctx.cache.get()
    }

    /// One attempt per process to seed the cache from durable storage.
    async fn hydrate(&self) {
        if self.ctx.cache.get().is_some() {
            return;
        }
        self.hydrated
            .get_or_init(|| async {
                match self.ctx.store.load() {
                    Ok(Some(session)) => {
                        if self.ctx.cache.fill_if_empty(session.access_token) {
                            self.ctx.publish(SessionStatus::Authenticated);
                        }
                    }
                    Ok(None) => tracing::debug!("no stored session"),
                    Err(err) => tracing::warn!(
                        error = %err,
                        "stored session unavailable; continuing unauthenticated"
                    ),
                }
            })
            .await;
    }

    /// Renew the access token through the single-flight coordinator.
    pub async fn renew(&self) -> Option<String> {
        self.refresher.renew().await
    }

    /// Credential to retry with after a request sent with `sent_with` was rejected.
    ///
    /// A newer cached token (installed by a renewal that finished after the
    /// request left) is reused without another round trip.
    pub async fn recover(&self, sent_with: Option<&str>) -> Option<String> {
        if let Some(current) = self.ctx.cache.get() {
            if sent_with != Some(current.as_str()) && !self.refresher.is_pending() {
                tracing::debug!("retrying with token renewed by another request");
                return Some(current);
            }
        }
        self.renew().await
    }

    pub fn current_session(&self) -> Result<Option<Session>, SessionError> {
        self.ctx.store.load()
    }

    /// Replace the cached user profile, keeping the tokens.
    pub fn update_user(&self, user: Value) -> Result<Session, SessionError> {
        let mut session = self
            .ctx
            .store
            .load()?
            .ok_or(SessionError::NotAuthenticated)?;
        session.user = Some(user);
        self.ctx.store.save(&session)?;
        Ok(session)
    }

    /// Identity resolved from the stored profile. Storage errors read as "unknown".
    pub fn identity(&self) -> Option<Identity> {
        match self.ctx.store.load() {
            Ok(session) => session.and_then(|session| session.identity()),
            Err(err) => {
                tracing::warn!(error = %err, "stored session unavailable");
                None
            }
        }
    }

    pub fn status(&self) -> SessionStatus {
        *self.ctx.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.ctx.status.subscribe()
    }

    /// Forget the session locally, then ask the server to revoke it.
    ///
    /// Local state is always cleared; revocation is attempted once and its
    /// outcome is only logged.
    pub async fn logout(&self) {
        let refresh_token = match self.ctx.store.load() {
            Ok(session) => session.map(|session| session.refresh_token),
            Err(err) => {
                tracing::warn!(error = %err, "stored session unreadable during logout");
                None
            }
        };

        self.ctx.purge_local();
        self.ctx.publish(SessionStatus::Anonymous);
        tracing::info!("logged out");

        let Some(refresh_token) = refresh_token else {
            return;
        };
        let revoke = self.ctx.api.revoke(&refresh_token);
        match tokio::time::timeout(self.ctx.config.revoke_timeout, revoke).await {
            Ok(Ok(())) => tracing::debug!("refresh token revoked"),
            Ok(Err(err)) => tracing::debug!(error = %err, "refresh token revocation failed"),
            Err(_) => tracing::debug!("refresh token revocation timed out"),
        }
    }
}
