//! Shared application state.
//!
//! Holds the single browser session, the post pipeline and the data clients
//! that every request handler works with.

use std::sync::Arc;

use tracing::info;
use url::Url;

use crate::api::{DashboardClient, PartnerClient};
use crate::config::ConfigV1;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::posts::PostPipeline;
use crate::session::{CallbackOutcome, CallbackProcessor, TokenStore};

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    pub session: Arc<TokenStore>,
    pub posts: Arc<PostPipeline>,
    pub dashboard: Arc<DashboardClient>,
    pub partners: Arc<PartnerClient>,
    pub metrics: Metrics,
}

impl AppState {
    /// Consumes the callback parameters of one page load and returns the
    /// outcome with the scrubbed URL. When the token used for data calls
    /// changes, everything fetched under the previous one is dropped.
    pub async fn apply_callback(&self, url: &Url) -> (CallbackOutcome, Url) {
        let before = self.session.snapshot().bearer().map(str::to_string);
        let processor = CallbackProcessor::new(self.session.clone());
        let (outcome, scrubbed) = processor.process(url);
        self.metrics.record_callback(outcome.as_str());

        let after = self.session.snapshot();
        if before.is_some() && before.as_deref() != after.bearer() {
            self.drop_cached_data().await;
            info!(
                event_name = "session.token.switched",
                event_domain = "session",
                session_id = %self.session.id(),
                "data token changed; cached data dropped"
            );
        }
        (outcome, scrubbed)
    }

    /// Logout / start over: empties the session first, then drops every
    /// cache and stops the refresh timers.
    pub async fn reset_session(&self) {
        self.session.clear_tokens();
        self.drop_cached_data().await;
        info!(
            event_name = "session.reset",
            event_domain = "session",
            session_id = %self.session.id(),
            "session reset"
        );
    }

    async fn drop_cached_data(&self) {
        self.posts.clear_cache().await;
        self.dashboard.clear().await;
        self.partners.clear().await;
    }
}
