use std::sync::Arc;

use serde_json::json;

use super::client::ApiClient;
use crate::error::Error;
use crate::models::PostsResponse;
use crate::posts::{PostScope, PostSource};
use crate::session::TokenStore;

/// Fetches posts from the `posts` function with the session's bearer token.
pub struct HttpPostSource {
    client: ApiClient,
    session: Arc<TokenStore>,
}

impl HttpPostSource {
    pub fn new(client: ApiClient, session: Arc<TokenStore>) -> Self {
        HttpPostSource { client, session }
    }
}

#[async_trait::async_trait]
impl PostSource for HttpPostSource {
    async fn fetch(&self, scope: PostScope) -> Result<PostsResponse, Error> {
        let bearer = self
            .session
            .snapshot()
            .bearer()
            .map(str::to_string)
            .ok_or(Error::AuthRequired("access token"))?;
        let body = json!({
            "timeScope": if scope.all_time { "all" } else { "recent" },
            "allTime": scope.all_time,
        });
        let value = self
            .client
            .post_json("posts", "post fetch", &bearer, &body)
            .await?;
        Ok(PostsResponse::from_value(&value))
    }
}
