mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, build_app, request, send, test_config};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};

fn remote_posts() -> Value {
    json!({
        "posts": [
            {"id": "p1", "text": "New year #launch", "createdAt": "2024-01-01T09:00:00Z", "likes": 5, "comments": 1},
            {"id": "p2", "text": "Hiring", "createdAt": "2024-01-02T09:00:00Z", "likes": 9},
            {"id": "p3", "text": "Demo reel", "createdAt": "2024-01-03T09:00:00Z", "likes": 1, "mediaType": "video"},
            {"id": "p4", "text": "Roadmap #launch", "createdAt": "2024-01-04T09:00:00Z", "engagement": {"likes": 9, "shares": 2}},
            {"id": "p5", "text": "Thanks all", "createdAt": "2024-01-05T09:00:00Z", "likes": 3},
            {"text": "no id, dropped"}
        ],
        "isCached": false,
        "timestamp": "2024-06-01T10:00:00Z"
    })
}

async fn signed_in_app(server: &ServerGuard) -> axum::Router {
    let (app, _) = build_app(test_config(&server.url()));
    send(&app, request(Method::GET, "/callback?access_token=basic-1")).await;
    app
}

fn ids(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|p| p["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn posts_are_filtered_sorted_and_paged() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/posts")
        .match_header("authorization", "Bearer basic-1")
        .match_body(Matcher::Json(json!({"timeScope": "recent", "allTime": false})))
        .with_status(200)
        .with_body(remote_posts().to_string())
        .expect(1)
        .create_async()
        .await;
    let app = signed_in_app(&server).await;

    let response = send(&app, request(Method::GET, "/api/posts?sort=likes&page=2")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(ids(&body), vec!["p1", "p5"]);
    assert_eq!(body["pagination"]["total_pages"], 3);
    assert_eq!(body["pagination"]["total_items"], 5);
    assert_eq!(body["pagination"]["has_prev"], true);
    assert_eq!(body["items"][0]["engagement"], 6);
    assert_eq!(body["items"][0]["repurpose_eligible"], true);
    assert_eq!(body["cache"]["from_cache"], false);
    assert_eq!(body["cache"]["server_timestamp"], "2024-06-01T10:00:00Z");
    assert_eq!(body["state"]["state"], "success");

    // Served from the cached set; an out-of-range page clamps to the last one.
    let body = body_json(send(&app, request(Method::GET, "/api/posts?sort=likes&page=9")).await).await;
    assert_eq!(ids(&body), vec!["p3"]);
    assert_eq!(body["pagination"]["current_page"], 3);
    assert_eq!(body["cache"]["from_cache"], true);

    let body = body_json(
        send(&app, request(Method::GET, "/api/posts?sort=likes&page_size=10")).await,
    )
    .await;
    assert_eq!(ids(&body), vec!["p4", "p2", "p1", "p5", "p3"]);

    let body = body_json(
        send(&app, request(Method::GET, "/api/posts?media_type=video")).await,
    )
    .await;
    assert_eq!(ids(&body), vec!["p3"]);
    assert_eq!(body["filters"]["media_type"], "video");

    let body = body_json(
        send(&app, request(Method::GET, "/api/posts?search=LAUNCH&sort=oldest")).await,
    )
    .await;
    assert_eq!(ids(&body), vec!["p1", "p4"]);

    mock.assert_async().await;
}

#[tokio::test]
async fn clearing_the_cache_refetches() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/posts")
        .with_status(200)
        .with_body(remote_posts().to_string())
        .expect(2)
        .create_async()
        .await;
    let app = signed_in_app(&server).await;

    send(&app, request(Method::GET, "/api/posts")).await;
    send(&app, request(Method::GET, "/api/posts")).await;
    let response = send(&app, request(Method::DELETE, "/api/posts/cache")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let body = body_json(send(&app, request(Method::GET, "/api/posts")).await).await;
    assert_eq!(body["cache"]["from_cache"], false);

    mock.assert_async().await;
}

#[tokio::test]
async fn forced_refresh_bypasses_fresh_cache() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/posts")
        .with_status(200)
        .with_body(remote_posts().to_string())
        .expect(2)
        .create_async()
        .await;
    let app = signed_in_app(&server).await;

    send(&app, request(Method::GET, "/api/posts")).await;
    let body = body_json(send(&app, request(Method::GET, "/api/posts?refresh=true")).await).await;
    assert_eq!(body["cache"]["from_cache"], false);
    mock.assert_async().await;
}

#[tokio::test]
async fn posts_need_a_token() {
    let (app, _) = build_app(test_config("http://127.0.0.1:9"));
    let response = send(&app, request(Method::GET, "/api/posts")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn remote_failure_is_bad_gateway() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/posts")
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;
    let app = signed_in_app(&server).await;

    let response = send(&app, request(Method::GET, "/api/posts")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn analytics_use_the_all_time_set() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/posts")
        .match_body(Matcher::Json(json!({"timeScope": "all", "allTime": true})))
        .with_status(200)
        .with_body(remote_posts().to_string())
        .expect(1)
        .create_async()
        .await;
    let app = signed_in_app(&server).await;

    let response = send(&app, request(Method::GET, "/api/analytics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["totals"]["posts"], 5);
    assert_eq!(report["totals"]["likes"], 27);
    assert_eq!(report["top_hashtags"][0], json!({"tag": "launch", "count": 2}));
    assert_eq!(report["repurpose_candidates"], 5);
    mock.assert_async().await;
}

#[tokio::test]
async fn dashboard_is_cached() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/dashboard-data")
        .with_status(200)
        .with_body(r#"{"profile": {"name": "Ada", "headline": "Engineer"}, "followers": 120}"#)
        .expect(1)
        .create_async()
        .await;
    let app = signed_in_app(&server).await;

    let first = body_json(send(&app, request(Method::GET, "/api/dashboard")).await).await;
    assert_eq!(first["data"]["name"], "Ada");
    assert_eq!(first["data"]["followers"], 120);
    assert_eq!(first["was_cached"], false);

    let second = body_json(send(&app, request(Method::GET, "/api/dashboard")).await).await;
    assert_eq!(second["was_cached"], true);
    mock.assert_async().await;
}

#[tokio::test]
async fn dashboard_refresh_retries_after_failure() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("POST", "/dashboard-data")
        .with_status(500)
        .with_body("down")
        .expect(1)
        .create_async()
        .await;
    let app = signed_in_app(&server).await;

    let response = send(&app, request(Method::GET, "/api/dashboard")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["retryable"], true);
    failing.assert_async().await;
    failing.remove_async().await;

    let ok = server
        .mock("POST", "/dashboard-data")
        .with_status(200)
        .with_body(r#"{"profile": {"name": "Ada"}, "followers": 3}"#)
        .expect(2)
        .create_async()
        .await;
    let first = body_json(send(&app, request(Method::GET, "/api/dashboard?refresh=true")).await).await;
    assert_eq!(first["data"]["name"], "Ada");
    assert_eq!(first["was_cached"], false);

    // A refresh skips the cached value even when one is present.
    let again = body_json(send(&app, request(Method::GET, "/api/dashboard?refresh=true")).await).await;
    assert_eq!(again["was_cached"], false);
    let cached = body_json(send(&app, request(Method::GET, "/api/dashboard")).await).await;
    assert_eq!(cached["was_cached"], true);
    ok.assert_async().await;
}

#[tokio::test]
async fn new_data_token_drops_data_fetched_with_the_old_one() {
    let mut server = Server::new_async().await;
    let basic = server
        .mock("POST", "/posts")
        .match_header("authorization", "Bearer basic-1")
        .with_status(200)
        .with_body(json!({"posts": [{"id": "owned-by-basic"}]}).to_string())
        .expect(1)
        .create_async()
        .await;
    let dma = server
        .mock("POST", "/posts")
        .match_header("authorization", "Bearer dma-2")
        .with_status(200)
        .with_body(json!({"posts": [{"id": "owned-by-dma"}]}).to_string())
        .expect(1)
        .create_async()
        .await;
    let dashboard_basic = server
        .mock("POST", "/dashboard-data")
        .match_header("authorization", "Bearer basic-1")
        .with_status(200)
        .with_body(r#"{"profile": {"name": "Before"}}"#)
        .expect(1)
        .create_async()
        .await;
    let dashboard_dma = server
        .mock("POST", "/dashboard-data")
        .match_header("authorization", "Bearer dma-2")
        .with_status(200)
        .with_body(r#"{"profile": {"name": "After"}}"#)
        .expect(1)
        .create_async()
        .await;
    let app = signed_in_app(&server).await;

    let body = body_json(send(&app, request(Method::GET, "/api/posts")).await).await;
    assert_eq!(ids(&body), vec!["owned-by-basic"]);
    let dash = body_json(send(&app, request(Method::GET, "/api/dashboard")).await).await;
    assert_eq!(dash["data"]["name"], "Before");

    send(&app, request(Method::GET, "/callback?dma_token=dma-2")).await;

    let body = body_json(send(&app, request(Method::GET, "/api/posts")).await).await;
    assert_eq!(ids(&body), vec!["owned-by-dma"]);
    assert_eq!(body["cache"]["from_cache"], false);
    let dash = body_json(send(&app, request(Method::GET, "/api/dashboard")).await).await;
    assert_eq!(dash["data"]["name"], "After");
    assert_eq!(dash["was_cached"], false);

    basic.assert_async().await;
    dma.assert_async().await;
    dashboard_basic.assert_async().await;
    dashboard_dma.assert_async().await;
}
