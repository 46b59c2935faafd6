//! Single-flight renewal of the access token.
//!
//! The coordinator is a two-state machine. `Idle` means no renewal is running;
//! the first caller to ask for one spawns the renewal task and stores its
//! shared handle as `Pending`. Every caller arriving while `Pending` awaits a
//! clone of that handle instead of calling the server again. The task puts the
//! state back to `Idle` once it has settled, whatever the outcome.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use super::manager::SessionContext;

type SharedRenewal = Shared<BoxFuture<'static, Option<String>>>;

enum RefreshState {
    Idle,
    Pending(SharedRenewal),
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    ctx: Arc<SessionContext>,
    state: Arc<Mutex<RefreshState>>,
}

impl RefreshCoordinator {
    pub(crate) fn new(ctx: Arc<SessionContext>) -> Self {
        Self {
            ctx,
            state: Arc::new(Mutex::new(RefreshState::Idle)),
        }
    }

    /// Obtain a renewed access token, joining an in-flight renewal if there is one.
    pub async fn renew(&self) -> Option<String> {
        let handle = {
            let mut state = self.state.lock();
            match &*state {
                RefreshState::Pending(handle) => {
                    tracing::debug!("joining in-flight token renewal");
                    handle.clone()
                }
                RefreshState::Idle => {
                    let handle = self.start();
                    *state = RefreshState::Pending(handle.clone());
                    handle
                }
            }
        };
        handle.await
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Pending(_))
    }

    // Called with the state lock held. The spawned task needs the same lock to
    // settle, so it cannot reset the state before `Pending` is stored.
    fn start(&self) -> SharedRenewal {
        let ctx = self.ctx.clone();
        let state = self.state.clone();
        let task = tokio::spawn(async move {
            let outcome = ctx.renew_once().await;
            *state.lock() = RefreshState::Idle;
            outcome
        });

        let state = self.state.clone();
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(error = %err, "token renewal task aborted");
                    *state.lock() = RefreshState::Idle;
                    None
                }
            }
        }
        .boxed()
        .shared()
    }
}
