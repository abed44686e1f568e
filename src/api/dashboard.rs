use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::json;

use super::client::ApiClient;
use crate::error::Error;
use crate::fetch::{FetchFn, Fetched, QueryCache};
use crate::models::DashboardData;
use crate::session::TokenStore;

const DASHBOARD_KEY: &str = "dashboard";

/// Profile metrics from the `dashboard-data` function, cached and refreshed
/// in the background.
pub struct DashboardClient {
    client: ApiClient,
    session: Arc<TokenStore>,
    cache: QueryCache<DashboardData>,
}

impl DashboardClient {
    pub fn new(
        client: ApiClient,
        session: Arc<TokenStore>,
        ttl: Duration,
        refresh_interval: Option<Duration>,
    ) -> Self {
        let cache = QueryCache::new("dashboard", ttl, refresh_interval, client.metrics().clone());
        DashboardClient {
            client,
            session,
            cache,
        }
    }

    pub async fn dashboard(&self) -> Result<Fetched<DashboardData>, Error> {
        self.cache.get_or_fetch(DASHBOARD_KEY, self.fetcher()).await
    }

    pub async fn refresh(&self) -> Result<DashboardData, Error> {
        self.cache.invalidate(DASHBOARD_KEY).await;
        Ok(self.dashboard().await?.value)
    }

    pub async fn clear(&self) {
        self.cache.clear().await;
    }

    fn fetcher(&self) -> FetchFn<DashboardData> {
        let client = self.client.clone();
        let session = self.session.clone();
        Arc::new(move || {
            let client = client.clone();
            let session = session.clone();
            async move {
                let bearer = session
                    .snapshot()
                    .bearer()
                    .map(str::to_string)
                    .ok_or(Error::AuthRequired("access token"))?;
                let value = client
                    .post_json("dashboard-data", "dashboard fetch", &bearer, &json!({}))
                    .await?;
                Ok::<DashboardData, Error>(DashboardData::from_value(&value))
            }
            .boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::metrics::Metrics;
    use crate::session::TokenUpdate;
    use mockito::Server;

    fn dashboard_client(base_url: String) -> (DashboardClient, Arc<TokenStore>) {
        let config = ApiConfig {
            base_url,
            api_key: None,
            timeout_in_ms: None,
        };
        let store = Arc::new(TokenStore::new());
        store.set_tokens(TokenUpdate {
            access_token: Some("basic".into()),
            dma_token: None,
        });
        let client = DashboardClient::new(
            ApiClient::new(&config, Metrics::new()).unwrap(),
            store.clone(),
            Duration::from_secs(300),
            None,
        );
        (client, store)
    }

    #[tokio::test]
    async fn caches_dashboard_between_calls() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/dashboard-data")
            .match_header("authorization", "Bearer basic")
            .with_status(200)
            .with_body(r#"{"profile": {"name": "Ada"}, "followers": 120, "connections": "80"}"#)
            .expect(1)
            .create_async()
            .await;

        let (client, _store) = dashboard_client(server.url());
        let first = client.dashboard().await.unwrap();
        assert!(!first.was_cached);
        assert_eq!(first.value.name, "Ada");
        assert_eq!(first.value.connections, 80);

        let second = client.dashboard().await.unwrap();
        assert!(second.was_cached);
        assert_eq!(second.value, first.value);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_fields_default_to_zero() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/dashboard-data")
            .with_status(200)
            .with_body(r#"{"followers": "lots", "profile": []}"#)
            .create_async()
            .await;

        let (client, _store) = dashboard_client(server.url());
        let data = client.dashboard().await.unwrap().value;
        assert_eq!(data.followers, 0);
        assert_eq!(data.name, "");
    }

    #[tokio::test]
    async fn signed_out_session_is_auth_required() {
        let (client, store) = dashboard_client("http://127.0.0.1:9".into());
        store.clear_tokens();
        let err = client.dashboard().await.unwrap_err();
        assert_eq!(err, Error::AuthRequired("access token"));
    }
}
