mod common;

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use bridge_engine::Engine;
use common::{start_mock_backend, test_config, SampleRoutes, API_KEY};

async fn started_engine(routes: SampleRoutes) -> (Engine, String) {
    let storage = start_mock_backend().await;
    let cache = start_mock_backend().await;
    let mut engine = Engine::new(test_config(storage, cache)).with_routes(routes);
    engine.start().await.unwrap();
    let base = format!("http://{}", engine.local_addr().unwrap());
    (engine, base)
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn root_returns_cached_specification() {
    let (mut engine, base) = started_engine(SampleRoutes::default()).await;

    let response = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert!(response.headers().contains_key("x-request-id"));

    let body = response.bytes().await.unwrap();
    let specification = engine.specification().unwrap();
    assert_eq!(&body, specification.rendered());

    let document: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(document["paths"]["/contacts"]["get"]["summary"], "List contacts");

    engine.shutdown().await;
}

#[tokio::test]
async fn rate_limit_runs_before_authentication() {
    let (mut engine, base) = started_engine(SampleRoutes::default()).await;
    let client = reqwest::Client::new();

    let first = client.get(format!("{base}/keys")).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(first.headers()["x-ratelimit-remaining"], "0");
    let body: Value = first.json().await.unwrap();
    assert_eq!(body["error"], "Missing authorization header");

    // The limiter answers before credentials are even looked at.
    let second = client
        .get(format!("{base}/keys"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = second.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Too many requests"));

    engine.shutdown().await;
}

#[tokio::test]
async fn authenticated_route_sees_principal() {
    let (mut engine, base) = started_engine(SampleRoutes::default()).await;

    let response = reqwest::Client::new()
        .get(format!("{base}/keys"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "key:test-key");

    engine.shutdown().await;
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let (mut engine, base) = started_engine(SampleRoutes::default()).await;

    let response = reqwest::get(format!("{base}/buckets/unknown")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "error": "Route not found" }));

    engine.shutdown().await;
}

#[tokio::test]
async fn route_context_exposes_storage_state() {
    let (mut engine, base) = started_engine(SampleRoutes::default()).await;

    let storage = Arc::clone(engine.storage().unwrap());
    eventually(|| storage.ready_state().code() == 1).await;

    let body = reqwest::get(format!("{base}/database")).await.unwrap().text().await.unwrap();
    assert_eq!(body, "1");

    engine.shutdown().await;
}

#[tokio::test]
async fn in_flight_responses_are_counted_until_finished() {
    let routes = SampleRoutes::default();
    let release = Arc::clone(&routes.release);
    let (mut engine, base) = started_engine(routes).await;
    let registry = Arc::clone(engine.registry());

    let client = reqwest::Client::new();
    let request = tokio::spawn({
        let client = client.clone();
        async move { client.get(format!("{base}/wait")).send().await.unwrap().text().await.unwrap() }
    });

    eventually(|| registry.count() == 1).await;
    assert_eq!(engine.server().unwrap().active_connections(), 1);

    release.notify_one();
    assert_eq!(request.await.unwrap(), "released");

    // The keep-alive connection is still open, so the sweep leaves the entry.
    assert_eq!(registry.sweep(), 0);
    assert_eq!(registry.len(), 1);

    eventually(|| registry.count() == 0).await;
    assert!(registry.is_empty());

    engine.shutdown().await;
}
