//! OAuth redirect handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use url::{form_urlencoded, Url};

use super::store::{AuthState, TokenStore, TokenUpdate};

/// Query parameters the identity provider may append; all of them are
/// removed from the visible URL after processing.
pub const CALLBACK_PARAMS: [&str; 5] = ["access_token", "dma_token", "user_id", "code", "state"];

/// The subset of callback parameters that carry session data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub access_token: Option<String>,
    pub dma_token: Option<String>,
    /// Untrusted; only the resolver may set the session's user id.
    pub user_id: Option<String>,
}

impl CallbackParams {
    pub fn from_query(query: &str) -> Self {
        let mut params = CallbackParams::default();
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "access_token" => params.access_token = Some(value.to_string()),
                "dma_token" => params.dma_token = Some(value.to_string()),
                "user_id" => params.user_id = Some(value.to_string()),
                _ => {}
            }
        }
        params
    }

    pub fn from_url(url: &Url) -> Self {
        url.query().map(Self::from_query).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.dma_token.is_none() && self.user_id.is_none()
    }

    fn token_update(&self) -> TokenUpdate {
        TokenUpdate {
            access_token: self.access_token.clone(),
            dma_token: self.dma_token.clone(),
        }
    }
}

/// Query string with the callback parameters removed, or `None` if nothing is left.
pub fn scrub_query(query: &str) -> Option<String> {
    let kept: Vec<(String, String)> = form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .filter(|(k, _)| !CALLBACK_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        return None;
    }
    Some(
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish(),
    )
}

/// `url` without the callback parameters; other parameters and the fragment survive.
pub fn scrub_url(url: &Url) -> Url {
    let mut scrubbed = url.clone();
    let query = url.query().and_then(scrub_query);
    scrubbed.set_query(query.as_deref());
    scrubbed
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackOutcome {
    /// This processor already ran.
    Skipped,
    /// No token parameters in the URL.
    NoParams,
    /// The same token set was consumed by an earlier page load.
    AlreadyConsumed,
    Applied { state: AuthState },
}

impl CallbackOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackOutcome::Skipped => "skipped",
            CallbackOutcome::NoParams => "no_params",
            CallbackOutcome::AlreadyConsumed => "already_consumed",
            CallbackOutcome::Applied { .. } => "applied",
        }
    }
}

/// Consumes the callback parameters of one page load.
///
/// Create one per page load; `process` does its work only the first time
/// it is called on an instance.
pub struct CallbackProcessor {
    store: Arc<TokenStore>,
    done: AtomicBool,
}

impl CallbackProcessor {
    pub fn new(store: Arc<TokenStore>) -> Self {
        CallbackProcessor {
            store,
            done: AtomicBool::new(false),
        }
    }

    /// Applies the tokens found in `url` and returns the outcome together
    /// with the scrubbed URL to show instead.
    pub fn process(&self, url: &Url) -> (CallbackOutcome, Url) {
        let scrubbed = scrub_url(url);
        if self.done.swap(true, Ordering::SeqCst) {
            return (CallbackOutcome::Skipped, scrubbed);
        }
        (self.apply(&CallbackParams::from_url(url)), scrubbed)
    }

    fn apply(&self, params: &CallbackParams) -> CallbackOutcome {
        if let Some(hint) = &params.user_id {
            debug!(user_id_hint = hint.as_str(), "ignoring user_id callback parameter");
        }
        let update = params.token_update();
        if update.is_empty() {
            return CallbackOutcome::NoParams;
        }
        if !self.store.mark_consumed(update.fingerprint()) {
            debug!(
                event_name = "session.callback.replay",
                event_domain = "session",
                "callback parameters were already consumed"
            );
            return CallbackOutcome::AlreadyConsumed;
        }

        self.store.set_tokens(update);
        let state = self.store.snapshot().auth_state();
        info!(
            event_name = "session.callback.applied",
            event_domain = "session",
            session_id = %self.store.id(),
            has_access_token = params.access_token.is_some(),
            has_dma_token = params.dma_token.is_some(),
            auth_state = ?state,
            "callback tokens stored"
        );
        CallbackOutcome::Applied { state }
    }
}
