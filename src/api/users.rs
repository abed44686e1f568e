use std::time::Instant;

#[cfg(not(test))]
use cached::proc_macro::cached;
use cached::Return;
use tracing::{debug, info};

use super::client::{build_http_client, ensure_success, read_json, ApiClient};
use crate::error::Error;
use crate::metrics::MetricsRecorder;
use crate::session::ResolveUserId;
use crate::utils::log_throttle::should_emit;
use crate::utils::value::opt_string;

const RESOLVE_PATH: &str = "resolve-user";

/// Resolves user ids through the `resolve-user` function.
pub struct HttpUserIdResolver {
    client: ApiClient,
}

impl HttpUserIdResolver {
    pub fn new(client: ApiClient) -> Self {
        HttpUserIdResolver { client }
    }
}

#[async_trait::async_trait]
impl ResolveUserId for HttpUserIdResolver {
    async fn resolve(&self, dma_token: &str) -> Result<String, Error> {
        let start = Instant::now();
        let result = query_user_id(
            self.client.endpoint(RESOLVE_PATH),
            self.client.api_key().map(str::to_string),
            self.client.timeout().map(|t| t.as_millis() as u64),
            dma_token.to_string(),
        )
        .await;

        let metrics = self.client.metrics();
        metrics.record_remote_duration(RESOLVE_PATH, start.elapsed().as_secs_f64());
        match result {
            Ok(resolved) => {
                if resolved.was_cached {
                    metrics.record_cache_lookup(RESOLVE_PATH, "hit");
                    if let Some(suppressed) =
                        should_emit("api.resolve_user.cache_hit", std::time::Duration::from_secs(60))
                    {
                        debug!(
                            event_name = "api.resolve_user.cache_hit",
                            event_domain = "api",
                            suppressed,
                            "user id served from cache"
                        );
                    }
                } else {
                    metrics.record_remote_call(RESOLVE_PATH, "success");
                }
                Ok(resolved.value)
            }
            Err(e) => {
                metrics.record_remote_call(RESOLVE_PATH, "failure");
                Err(e)
            }
        }
    }
}

/// Asks the resolver function for the user id behind a DMA token.
#[cfg_attr(
    not(test),
    cached(time = 300, result = true, with_cached_flag = true)
)]
async fn query_user_id(
    url: String,
    api_key: Option<String>,
    timeout_in_ms: Option<u64>,
    token: String,
) -> Result<Return<String>, Error> {
    let http = build_http_client(timeout_in_ms.map(std::time::Duration::from_millis))?;
    let mut request = http.get(&url).bearer_auth(&token);
    if let Some(key) = &api_key {
        request = request.header("apikey", key);
    }

    debug!("Sending user id resolution request to: {}", url);
    let response = request.send().await.map_err(|e| Error::Network {
        operation: "user id resolution",
        status: None,
        detail: e.to_string(),
    })?;
    let response = ensure_success(response, "user id resolution").await?;
    let body = read_json(response, "user id resolution").await?;

    let root = body.get("data").filter(|v| v.is_object()).unwrap_or(&body);
    let user_id = opt_string(root, &["userId", "user_id"]).ok_or_else(|| {
        Error::Validation("user id resolution response has no userId".to_string())
    })?;
    info!(
        event_name = "api.resolve_user.resolved",
        event_domain = "api",
        "resolved user id for DMA token"
    );
    Ok(Return::new(user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::metrics::Metrics;
    use mockito::Server;

    fn resolver(base_url: String) -> HttpUserIdResolver {
        let config = ApiConfig {
            base_url,
            api_key: Some("anon".into()),
            timeout_in_ms: Some(2000),
        };
        HttpUserIdResolver::new(ApiClient::new(&config, Metrics::new()).unwrap())
    }

    #[tokio::test]
    async fn resolves_user_id() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/resolve-user")
            .match_header("authorization", "Bearer dma-1")
            .match_header("apikey", "anon")
            .with_status(200)
            .with_body(r#"{"userId": "u-123"}"#)
            .create_async()
            .await;

        let id = resolver(server.url()).resolve("dma-1").await.unwrap();
        assert_eq!(id, "u-123");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn accepts_snake_case_alias() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/resolve-user")
            .with_status(200)
            .with_body(r#"{"user_id": 77}"#)
            .create_async()
            .await;

        assert_eq!(resolver(server.url()).resolve("t").await.unwrap(), "77");
    }

    #[tokio::test]
    async fn http_500_is_a_network_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/resolve-user")
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let err = resolver(server.url()).resolve("t").await.unwrap_err();
        assert!(matches!(err, Error::Network { status: Some(500), .. }));
    }

    #[tokio::test]
    async fn missing_user_id_is_validation_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/resolve-user")
            .with_status(200)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let err = resolver(server.url()).resolve("t").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn http_500_leaves_session_fully_authenticated_without_user_id() {
        use crate::session::{ResolutionStatus, ResolverPolicy, TokenStore, TokenUpdate, UserIdResolver};
        use std::sync::Arc;
        use std::time::Duration;

        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/resolve-user")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let store = Arc::new(TokenStore::new());
        store.set_tokens(TokenUpdate {
            access_token: None,
            dma_token: Some("dma".into()),
        });
        let background = UserIdResolver::new(
            store.clone(),
            Arc::new(resolver(server.url())),
            ResolverPolicy::new(2, Duration::from_millis(1)),
            Metrics::new(),
        );
        let status = background.resolve_pending().await;
        assert!(matches!(status, ResolutionStatus::NeedsReconnect { attempts: 2, .. }));

        let session = store.snapshot();
        assert!(session.user_id().is_none());
        assert!(session.is_fully_authenticated());
        m.assert_async().await;
    }
}
