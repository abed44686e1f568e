//! Synergy partners and invitations.
//!
//! Every call goes to the `synergy-partners` function as an action envelope
//! `{ "action": .., "userId": .., ... }` answered with `{ success, data?, error? }`.
//! All calls are user-scoped and wait for the user id to be resolved.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::{json, Map, Value};
use tracing::info;

use super::client::ApiClient;
use crate::error::Error;
use crate::fetch::{FetchFn, Fetched, QueryCache};
use crate::models::{Invitation, Partner, UserSummary};
use crate::session::TokenStore;
use crate::utils::value::{array, field, flag, opt_string};

const PARTNERS_PATH: &str = "synergy-partners";
const OPERATION: &str = "synergy partners";

async fn call_action(
    client: &ApiClient,
    bearer: &str,
    action: &str,
    user_id: &str,
    params: Value,
) -> Result<Value, Error> {
    let mut body = Map::new();
    body.insert("action".to_string(), Value::from(action));
    body.insert("userId".to_string(), Value::from(user_id));
    if let Value::Object(extra) = params {
        body.extend(extra);
    }
    let reply = client
        .post_json(PARTNERS_PATH, OPERATION, bearer, &Value::Object(body))
        .await?;

    // A reply without the flag is taken as success.
    let success = field(&reply, &["success"]).map_or(true, |_| flag(&reply, &["success"]));
    if !success {
        let detail = opt_string(&reply, &["error", "message"])
            .unwrap_or_else(|| format!("{} was rejected", action));
        return Err(Error::Network {
            operation: OPERATION,
            status: None,
            detail,
        });
    }
    Ok(reply.get("data").cloned().unwrap_or(Value::Null))
}

/// Items of a list reply: `data` is either the array itself or an object
/// holding it under `key`.
fn list_items<'a>(data: &'a Value, key: &str) -> &'a [Value] {
    match data {
        Value::Array(items) => items.as_slice(),
        other => array(other, &[key, "items"]),
    }
}

fn bearer_of(session: &TokenStore) -> Result<String, Error> {
    session
        .snapshot()
        .bearer()
        .map(str::to_string)
        .ok_or(Error::AuthRequired("access token"))
}

pub struct PartnerClient {
    client: ApiClient,
    session: Arc<TokenStore>,
    user_wait: Duration,
    partners: QueryCache<Vec<Partner>>,
    invitations: QueryCache<Vec<Invitation>>,
}

impl PartnerClient {
    pub fn new(
        client: ApiClient,
        session: Arc<TokenStore>,
        user_wait: Duration,
        ttl: Duration,
        refresh_interval: Option<Duration>,
    ) -> Self {
        let metrics = client.metrics().clone();
        PartnerClient {
            partners: QueryCache::new("partners", ttl, refresh_interval, metrics.clone()),
            invitations: QueryCache::new("invitations", ttl, refresh_interval, metrics),
            client,
            session,
            user_wait,
        }
    }

    async fn user_id(&self) -> Result<String, Error> {
        self.session.wait_for_user_id(self.user_wait).await
    }

    pub async fn partners(&self) -> Result<Fetched<Vec<Partner>>, Error> {
        let user_id = self.user_id().await?;
        let fetch = self.list_fetcher(user_id.clone(), "list_partners", "partners", Partner::from_value);
        self.partners
            .get_or_fetch(&partners_key(&user_id), fetch)
            .await
    }

    pub async fn invitations(&self) -> Result<Fetched<Vec<Invitation>>, Error> {
        let user_id = self.user_id().await?;
        let fetch = self.list_fetcher(
            user_id.clone(),
            "list_invitations",
            "invitations",
            Invitation::from_value,
        );
        self.invitations
            .get_or_fetch(&invitations_key(&user_id), fetch)
            .await
    }

    /// Users matching `query`. A blank query returns nothing without a remote call.
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let user_id = self.user_id().await?;
        let data = self
            .action("search_users", &user_id, json!({ "query": query }))
            .await?;
        Ok(list_items(&data, "users")
            .iter()
            .filter_map(UserSummary::from_value)
            .filter(|u| u.id != user_id)
            .collect())
    }

    pub async fn send_invitation(
        &self,
        to_user_id: &str,
        message: Option<&str>,
    ) -> Result<Option<Invitation>, Error> {
        let user_id = self.user_id().await?;
        if to_user_id.trim().is_empty() {
            return Err(Error::Validation("invitation needs a recipient".to_string()));
        }
        let data = self
            .action(
                "send_invitation",
                &user_id,
                json!({ "toUserId": to_user_id, "message": message }),
            )
            .await?;
        self.invitations.invalidate(&invitations_key(&user_id)).await;
        info!(
            event_name = "partners.invitation.sent",
            event_domain = "partners",
            "synergy invitation sent"
        );
        Ok(Invitation::from_value(&data))
    }

    pub async fn accept_invitation(&self, invitation_id: &str) -> Result<(), Error> {
        let user_id = self.user_id().await?;
        self.action(
            "accept_invitation",
            &user_id,
            json!({ "invitationId": invitation_id }),
        )
        .await?;
        self.invitations.invalidate(&invitations_key(&user_id)).await;
        self.partners.invalidate(&partners_key(&user_id)).await;
        Ok(())
    }

    pub async fn decline_invitation(&self, invitation_id: &str) -> Result<(), Error> {
        let user_id = self.user_id().await?;
        self.action(
            "decline_invitation",
            &user_id,
            json!({ "invitationId": invitation_id }),
        )
        .await?;
        self.invitations.invalidate(&invitations_key(&user_id)).await;
        Ok(())
    }

    pub async fn remove_partner(&self, partner_id: &str) -> Result<(), Error> {
        let user_id = self.user_id().await?;
        self.action("remove_partner", &user_id, json!({ "partnerId": partner_id }))
            .await?;
        self.partners.invalidate(&partners_key(&user_id)).await;
        Ok(())
    }

    /// Drops cached lists and stops their refresh timers.
    pub async fn clear(&self) {
        self.partners.clear().await;
        self.invitations.clear().await;
    }

    async fn action(&self, action: &str, user_id: &str, params: Value) -> Result<Value, Error> {
        let bearer = bearer_of(&self.session)?;
        call_action(&self.client, &bearer, action, user_id, params).await
    }

    fn list_fetcher<T>(
        &self,
        user_id: String,
        action: &'static str,
        key: &'static str,
        parse: fn(&Value) -> Option<T>,
    ) -> FetchFn<Vec<T>>
    where
        T: Send + 'static,
    {
        let client = self.client.clone();
        let session = self.session.clone();
        Arc::new(move || {
            let client = client.clone();
            let session = session.clone();
            let user_id = user_id.clone();
            async move {
                let bearer = bearer_of(&session)?;
                let data = call_action(&client, &bearer, action, &user_id, json!({})).await?;
                Ok::<Vec<T>, Error>(list_items(&data, key).iter().filter_map(parse).collect())
            }
            .boxed()
        })
    }
}

fn partners_key(user_id: &str) -> String {
    format!("partners:{}", user_id)
}

fn invitations_key(user_id: &str) -> String {
    format!("invitations:{}", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::metrics::Metrics;
    use crate::session::TokenUpdate;
    use mockito::{Matcher, Server};

    fn partner_client(base_url: String, resolved: bool) -> PartnerClient {
        let config = ApiConfig {
            base_url,
            api_key: None,
            timeout_in_ms: None,
        };
        let store = Arc::new(TokenStore::new());
        store.set_tokens(TokenUpdate {
            access_token: Some("basic".into()),
            dma_token: Some("dma".into()),
        });
        if resolved {
            store.set_user_id("dma", "me");
        }
        PartnerClient::new(
            ApiClient::new(&config, Metrics::new()).unwrap(),
            store,
            Duration::from_millis(50),
            Duration::from_secs(300),
            None,
        )
    }

    #[tokio::test]
    async fn lists_partners_once_then_from_cache() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/synergy-partners")
            .match_header("authorization", "Bearer dma")
            .match_body(Matcher::Json(json!({"action": "list_partners", "userId": "me"})))
            .with_status(200)
            .with_body(r#"{"success": true, "data": [{"partner": {"id": "u2", "name": "Bo"}}]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = partner_client(server.url(), true);
        let first = client.partners().await.unwrap();
        assert_eq!(first.value.len(), 1);
        assert_eq!(first.value[0].user.name, "Bo");
        assert!(client.partners().await.unwrap().was_cached);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn unsuccessful_reply_is_network_error_with_remote_message() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/synergy-partners")
            .with_status(200)
            .with_body(r#"{"success": false, "error": "not allowed"}"#)
            .create_async()
            .await;

        let err = partner_client(server.url(), true)
            .invitations()
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::Network {
                operation: OPERATION,
                status: None,
                detail: "not allowed".into()
            }
        );
    }

    #[tokio::test]
    async fn accepting_invalidates_both_lists() {
        let mut server = Server::new_async().await;
        let lists = server
            .mock("POST", "/synergy-partners")
            .match_body(Matcher::PartialJson(json!({"action": "list_invitations"})))
            .with_status(200)
            .with_body(r#"{"success": true, "data": {"invitations": [{"id": "i1", "toUserId": "me"}]}}"#)
            .expect(2)
            .create_async()
            .await;
        let accept = server
            .mock("POST", "/synergy-partners")
            .match_body(Matcher::PartialJson(
                json!({"action": "accept_invitation", "invitationId": "i1"}),
            ))
            .with_status(200)
            .with_body(r#"{"success": true}"#)
            .create_async()
            .await;

        let client = partner_client(server.url(), true);
        let invitations = client.invitations().await.unwrap().value;
        assert!(invitations[0].is_pending_for("me"));
        client.accept_invitation("i1").await.unwrap();
        assert!(!client.invitations().await.unwrap().was_cached);
        lists.assert_async().await;
        accept.assert_async().await;
    }

    #[tokio::test]
    async fn search_skips_blank_queries_and_self() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/synergy-partners")
            .match_body(Matcher::PartialJson(json!({"action": "search_users", "query": "bo"})))
            .with_status(200)
            .with_body(r#"{"success": true, "data": {"users": [{"id": "me"}, {"id": "u2", "name": "Bo"}]}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = partner_client(server.url(), true);
        assert!(client.search_users("   ").await.unwrap().is_empty());
        let found = client.search_users(" bo ").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "u2");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn unresolved_user_id_fails_with_resolution_error() {
        let err = partner_client("http://127.0.0.1:9".into(), false)
            .partners()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }
}
