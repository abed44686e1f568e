//! Maps the DMA token to the internal user id.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::{ResolutionStatus, TokenStore};
use crate::error::Error;
use crate::metrics::{Metrics, MetricsRecorder};

/// A backend able to turn a DMA token into a user id.
#[async_trait::async_trait]
pub trait ResolveUserId: Send + Sync {
    async fn resolve(&self, dma_token: &str) -> Result<String, Error>;
}

/// Retry policy. `max_attempts` is at least 1; the delay grows linearly.
#[derive(Debug, Clone, Copy)]
pub struct ResolverPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl ResolverPolicy {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        ResolverPolicy {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }
}

/// Watches the session and resolves the user id whenever a DMA token is
/// present without one.
pub struct UserIdResolver {
    store: Arc<TokenStore>,
    backend: Arc<dyn ResolveUserId>,
    policy: ResolverPolicy,
    metrics: Metrics,
}

impl UserIdResolver {
    pub fn new(
        store: Arc<TokenStore>,
        backend: Arc<dyn ResolveUserId>,
        policy: ResolverPolicy,
        metrics: Metrics,
    ) -> Self {
        UserIdResolver {
            store,
            backend,
            policy,
            metrics,
        }
    }

    /// Starts the background task. It reacts to every session change and
    /// ends when the token store goes away or the handle is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.store.subscribe();
        tokio::spawn(async move {
            loop {
                let pending = {
                    let session = rx.borrow_and_update();
                    session
                        .needs_resolution()
                        .then(|| (session.dma_token().map(str::to_string), session.epoch()))
                };
                if let Some((Some(token), epoch)) = pending {
                    self.resolve_for(&token, epoch).await;
                    continue;
                }
                if rx.changed().await.is_err() {
                    debug!("token store dropped, stopping user id resolver");
                    break;
                }
            }
        })
    }

    /// Runs one resolution cycle for the current session if it needs one,
    /// and returns the resulting status.
    pub async fn resolve_pending(&self) -> ResolutionStatus {
        let session = self.store.snapshot();
        if session.needs_resolution() {
            if let Some(token) = session.dma_token() {
                self.resolve_for(token, session.epoch()).await;
            }
        }
        self.store.snapshot().resolution().clone()
    }

    async fn resolve_for(&self, token: &str, epoch: u64) {
        let mut last_error = String::new();
        for attempt in 1..=self.policy.max_attempts {
            if !self
                .store
                .set_resolution(epoch, ResolutionStatus::Resolving { attempt })
            {
                debug!("session changed during user id resolution, abandoning attempt");
                return;
            }
            match self.backend.resolve(token).await {
                Ok(user_id) => {
                    self.metrics.record_resolver_attempt("success");
                    if self.store.set_user_id(token, user_id) {
                        info!(
                            event_name = "session.resolver.resolved",
                            event_domain = "session",
                            attempt,
                            "user id resolved"
                        );
                    }
                    return;
                }
                Err(e) => {
                    self.metrics.record_resolver_attempt("failure");
                    warn!(
                        event_name = "session.resolver.attempt_failed",
                        event_domain = "session",
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "user id resolution attempt failed"
                    );
                    last_error = e.to_string();
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.retry_delay * attempt).await;
                    }
                }
            }
        }

        self.store.set_resolution(
            epoch,
            ResolutionStatus::NeedsReconnect {
                attempts: self.policy.max_attempts,
                last_error,
            },
        );
        warn!(
            event_name = "session.resolver.exhausted",
            event_domain = "session",
            attempts = self.policy.max_attempts,
            "giving up on user id resolution; reconnect required"
        );
    }
}
