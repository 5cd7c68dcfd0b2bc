//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use storyloom_core::clock::Clock;
use storyloom_core::notifier::TurnNotifier;
use storyloom_core::rng::DeterministicRng;
use storyloom_event_store::InMemoryEventRepository;
use storyloom_test_support::{FixedClock, MockRng, RecordingNotifier};
use tower::ServiceExt;

use storyloom_api::state::AppState;

/// Build the full app over a fresh in-memory event store, a fixed clock and
/// an RNG that always draws success tokens first.
pub fn build_test_app() -> Router {
    build_test_app_with(Arc::new(RecordingNotifier::new()))
}

/// Like `build_test_app`, publishing facts to `notifier`.
pub fn build_test_app_with(notifier: Arc<RecordingNotifier>) -> Router {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::standard());
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(MockRng));
    let notifier: Arc<dyn TurnNotifier> = notifier;
    let event_repository = Arc::new(InMemoryEventRepository::new());

    storyloom_api::app(AppState::new(clock, rng, event_repository, notifier))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    // Extractor rejections answer in plain text.
    let json = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: &Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(body)).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: &Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "PUT", uri, Some(body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}
