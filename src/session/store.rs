//! Process-wide session holder.
//!
//! All mutation goes through [`TokenStore`]'s named operations, each applied
//! as one `watch` update so readers never see a half-applied change.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Error;

/// Where the two-step sign-in currently stands.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Anonymous,
    BasicAuthenticated,
    FullyAuthenticated,
}

/// Progress of mapping the DMA token to an internal user id.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolutionStatus {
    #[default]
    Unresolved,
    Resolving {
        attempt: u32,
    },
    Resolved,
    NeedsReconnect {
        attempts: u32,
        last_error: String,
    },
}

/// Tokens of the current browser session plus the resolved user id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    access_token: Option<String>,
    dma_token: Option<String>,
    user_id: Option<String>,
    resolution: ResolutionStatus,
    epoch: u64,
}

impl Session {
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn dma_token(&self) -> Option<&str> {
        self.dma_token.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn resolution(&self) -> &ResolutionStatus {
        &self.resolution
    }

    /// Bumped every time the DMA token changes or the session is cleared.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_basic_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn is_fully_authenticated(&self) -> bool {
        self.dma_token.is_some()
    }

    pub fn auth_state(&self) -> AuthState {
        if self.is_fully_authenticated() {
            AuthState::FullyAuthenticated
        } else if self.is_basic_authenticated() {
            AuthState::BasicAuthenticated
        } else {
            AuthState::Anonymous
        }
    }

    /// Token for general data calls: the DMA token when present, else the basic one.
    pub fn bearer(&self) -> Option<&str> {
        self.dma_token().or_else(|| self.access_token())
    }

    /// Fully authenticated, no user id yet, and nobody working on it.
    pub fn needs_resolution(&self) -> bool {
        self.is_fully_authenticated()
            && self.user_id.is_none()
            && self.resolution == ResolutionStatus::Unresolved
    }
}

/// Token values observed in one callback. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUpdate {
    pub access_token: Option<String>,
    pub dma_token: Option<String>,
}

impl TokenUpdate {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.dma_token.is_none()
    }

    /// Stable identity of the token set, used to recognise replays.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.access_token.hash(&mut hasher);
        self.dma_token.hash(&mut hasher);
        hasher.finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct TokenStore {
    id: Uuid,
    tx: watch::Sender<Session>,
    consumed: Mutex<HashSet<u64>>,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::default());
        let id = Uuid::new_v4();
        debug!(session_id = %id, "created token store");
        TokenStore {
            id,
            tx,
            consumed: Mutex::new(HashSet::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Stores the tokens of `update` together. A new DMA token drops any
    /// user id resolved for the previous one. Returns whether anything changed.
    pub fn set_tokens(&self, update: TokenUpdate) -> bool {
        let access = non_empty(update.access_token);
        let dma = non_empty(update.dma_token);
        self.tx.send_if_modified(|session| {
            let mut changed = false;
            if let Some(access) = access {
                if session.access_token.as_deref() != Some(access.as_str()) {
                    session.access_token = Some(access);
                    changed = true;
                }
            }
            if let Some(dma) = dma {
                if session.dma_token.as_deref() != Some(dma.as_str()) {
                    session.dma_token = Some(dma);
                    session.user_id = None;
                    session.resolution = ResolutionStatus::Unresolved;
                    session.epoch += 1;
                    changed = true;
                }
            }
            changed
        })
    }

    /// Records `user_id` as resolved for `for_dma_token`. Rejected when the
    /// session has moved on to another token (or was cleared) meanwhile.
    pub fn set_user_id(&self, for_dma_token: &str, user_id: impl Into<String>) -> bool {
        let user_id = user_id.into();
        self.tx.send_if_modified(|session| {
            if session.dma_token.as_deref() != Some(for_dma_token) {
                return false;
            }
            session.user_id = Some(user_id);
            session.resolution = ResolutionStatus::Resolved;
            true
        })
    }

    /// Updates the resolution status if the session is still at `epoch`.
    pub(crate) fn set_resolution(&self, epoch: u64, status: ResolutionStatus) -> bool {
        self.tx.send_if_modified(|session| {
            if session.epoch != epoch || session.user_id.is_some() || session.resolution == status {
                return false;
            }
            session.resolution = status;
            true
        })
    }

    /// Turns `NeedsReconnect` back into `Unresolved`, which re-arms the resolver.
    pub fn reset_resolution(&self) -> bool {
        self.tx.send_if_modified(|session| {
            if matches!(session.resolution, ResolutionStatus::NeedsReconnect { .. }) {
                session.resolution = ResolutionStatus::Unresolved;
                true
            } else {
                false
            }
        })
    }

    /// Drops both tokens and the user id in one update.
    pub fn clear_tokens(&self) {
        self.tx.send_modify(|session| {
            let epoch = session.epoch + 1;
            *session = Session {
                epoch,
                ..Session::default()
            };
        });
        info!(
            event_name = "session.cleared",
            event_domain = "session",
            session_id = %self.id,
            "session tokens cleared"
        );
    }

    /// Marks a callback token set as consumed. Returns false if it already was.
    pub(crate) fn mark_consumed(&self, fingerprint: u64) -> bool {
        let mut consumed = match self.consumed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        consumed.insert(fingerprint)
    }

    /// Waits until the user id is known. Fails fast when there is no DMA
    /// token or when resolution gave up.
    pub async fn wait_for_user_id(&self, timeout: Duration) -> Result<String, Error> {
        let mut rx = self.tx.subscribe();
        let wait = async {
            let session = rx
                .wait_for(|s| {
                    s.user_id.is_some()
                        || !s.is_fully_authenticated()
                        || matches!(s.resolution, ResolutionStatus::NeedsReconnect { .. })
                })
                .await
                .map_err(|_| Error::Resolution("session closed".to_string()))?;
            user_id_of(&session)
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(Error::Resolution(
                "timed out waiting for the user id".to_string(),
            )),
        }
    }
}

fn user_id_of(session: &Session) -> Result<String, Error> {
    if let Some(id) = session.user_id() {
        return Ok(id.to_string());
    }
    if !session.is_fully_authenticated() {
        return Err(Error::AuthRequired("dma token"));
    }
    match session.resolution() {
        ResolutionStatus::NeedsReconnect { last_error, .. } => {
            Err(Error::Resolution(last_error.clone()))
        }
        _ => Err(Error::Resolution("user id not resolved yet".to_string())),
    }
}
