#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::Utc;
use coach_api::events::BroadcastPublisher;
use coach_api::metrics::Metrics;
use coach_api::{app, AppState};
use coach_core::{ManualClock, Seat, SeatType};
use coach_hold::{HoldSettings, SeatLockManager};
use coach_shared::SeatEvent;
use coach_store::app_config::RateLimitConfig;
use coach_store::MemoryStore;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::broadcast;
use tower::ServiceExt;

/// The trip every test app is seeded with.
pub const TRIP: i64 = 1;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub sse_tx: broadcast::Sender<SeatEvent>,
}

/// Builds the production router over an in-memory store whose trip 1 has
/// seats "1" to "5", without Redis.
pub async fn build_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    store
        .seed_trip(
            TRIP,
            (1..=5)
                .map(|n| Seat::new(n.to_string(), SeatType::Aisle))
                .collect(),
        )
        .await;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let (sse_tx, _) = broadcast::channel(16);

    let holds = SeatLockManager::from_store(store.clone(), clock.clone(), HoldSettings::default())
        .with_events(Arc::new(BroadcastPublisher::new(sse_tx.clone())));

    let state = AppState {
        holds: Arc::new(holds),
        redis: None,
        sse_tx: sse_tx.clone(),
        metrics: Arc::new(Metrics::new().unwrap()),
        rate_limit: RateLimitConfig::default(),
    };

    TestApp { router: app(state), store, clock, sse_tx }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}
