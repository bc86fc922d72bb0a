use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use tessera_api::middleware::CustomerClaims;
use tessera_api::{app, metrics::Metrics, worker, AppState, AuthConfig};
use tessera_catalog::AvailabilityResolver;
use tessera_core::{ManualClock, ReservationPolicy};
use tessera_order::{MockPaymentGateway, PaymentOrchestrator, ReservationCoordinator};
use tessera_store::MemoryStore;

const SECRET: &str = "test-secret";

struct TestApp {
    state: AppState,
    clock: Arc<ManualClock>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::seeded(6, 3));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let policy = ReservationPolicy::default();

        let coordinator = Arc::new(ReservationCoordinator::new(store.clone(), clock.clone(), policy));
        let resolver = Arc::new(AvailabilityResolver::new(store, clock.clone(), policy.holding_window));
        let payments = Arc::new(PaymentOrchestrator::new(
            Arc::new(MockPaymentGateway::new()),
            coordinator.clone(),
        ));
        let (sse_tx, _) = tokio::sync::broadcast::channel(64);

        let state = AppState {
            coordinator,
            resolver,
            payments,
            redis: None,
            kafka: None,
            sse_tx,
            auth: AuthConfig {
                secret: SECRET.to_string(),
            },
            metrics: Arc::new(Metrics::new().unwrap()),
            rate_limit: 0,
        };
        Self { state, clock }
    }

    fn router(&self) -> Router {
        app(self.state.clone())
    }
}

fn token(user_id: i64) -> String {
    let claims = CustomerClaims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(router: Router, method: &str, uri: &str, user: Option<i64>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user {
        builder = builder.header("authorization", format!("Bearer {}", token(user_id)));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn status_of(seats: &Value, seat_id: i64) -> String {
    seats["seats"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["seat_id"] == seat_id)
        .map(|s| s["status"].as_str().unwrap().to_string())
        .unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let t = TestApp::new();
    let response = t
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_customer_routes_require_token() {
    let t = TestApp::new();
    let (status, body) = send(t.router(), "GET", "/v1/seats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "fail");

    let response = t
        .router()
        .oneshot(
            Request::builder()
                .uri("/v1/seats")
                .header("authorization", "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reservation_is_visible_per_viewer_and_lapses() {
    let t = TestApp::new();

    let (status, body) = send(t.router(), "POST", "/v1/reservations", Some(1), Some(json!({ "seat_ids": [1] }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["seat_ids"], json!([1]));

    let (_, mine) = send(t.router(), "GET", "/v1/seats", Some(1), None).await;
    assert_eq!(status_of(&mine, 1), "reserved_by_me");
    let (_, theirs) = send(t.router(), "GET", "/v1/seats", Some(2), None).await;
    assert_eq!(status_of(&theirs, 1), "reserved");

    let (status, body) = send(t.router(), "POST", "/v1/reservations", Some(2), Some(json!({ "seat_ids": [1] }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "conflict");

    t.clock.advance(Duration::minutes(16));
    let (_, mine) = send(t.router(), "GET", "/v1/seats", Some(1), None).await;
    assert_eq!(status_of(&mine, 1), "available");
    let (_, theirs) = send(t.router(), "GET", "/v1/seats", Some(2), None).await;
    assert_eq!(status_of(&theirs, 1), "available");

    let (status, _) = send(t.router(), "POST", "/v1/reservations", Some(2), Some(json!({ "seat_ids": [1] }))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_bad_reservation_requests() {
    let t = TestApp::new();

    let (status, body) = send(t.router(), "POST", "/v1/reservations", Some(1), Some(json!({ "seat_ids": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");

    let (status, _) = send(t.router(), "POST", "/v1/reservations", Some(1), Some(json!({ "seat_ids": [99] }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        t.router(),
        "POST",
        "/v1/reservations",
        Some(1),
        Some(json!({ "seat_ids": [1, 2, 3, 4, 5, 6] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn test_payment_round_trip() {
    let t = TestApp::new();
    let mut events = t.state.sse_tx.subscribe();

    let (_, reserved) = send(t.router(), "POST", "/v1/reservations", Some(1), Some(json!({ "seat_ids": [2, 3] }))).await;
    let order_id = reserved["order_id"].as_str().unwrap().to_string();
    assert_eq!(events.try_recv().unwrap().status, "reserved");

    let (status, summary) = send(t.router(), "GET", &format!("/v1/orders/{}", order_id), Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["gross_amount"], 200_000);
    assert_eq!(summary["state"], "reserved");

    let (status, _) = send(t.router(), "GET", &format!("/v1/orders/{}", order_id), Some(2), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, payment) = send(t.router(), "POST", &format!("/v1/orders/{}/payment", order_id), Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(payment["redirect_url"].as_str().unwrap().contains(payment["token"].as_str().unwrap()));

    let notification = json!({ "order_id": order_id, "transaction_status": "settlement" });
    let (status, body) = send(t.router(), "POST", "/v1/webhooks/payments", None, Some(notification.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "confirmed");

    let (_, body) = send(t.router(), "POST", "/v1/webhooks/payments", None, Some(notification)).await;
    assert_eq!(body["result"], "already_final");

    let (_, mine) = send(t.router(), "GET", "/v1/seats", Some(1), None).await;
    assert_eq!(status_of(&mine, 2), "purchased_by_me");
    let (_, theirs) = send(t.router(), "GET", "/v1/seats", Some(2), None).await;
    assert_eq!(status_of(&theirs, 3), "sold");

    let (status, _) = send(t.router(), "POST", &format!("/v1/orders/{}/payment", order_id), Some(1), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_failed_payment_releases_seats() {
    let t = TestApp::new();

    let (_, reserved) = send(t.router(), "POST", "/v1/reservations", Some(1), Some(json!({ "seat_ids": [4] }))).await;
    let order_id = reserved["order_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        t.router(),
        "POST",
        "/v1/webhooks/payments",
        None,
        Some(json!({ "order_id": order_id, "transaction_status": "deny" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "released");

    let (_, theirs) = send(t.router(), "GET", "/v1/seats", Some(2), None).await;
    assert_eq!(status_of(&theirs, 4), "available");
}

#[tokio::test]
async fn test_sweep_and_metrics() {
    let t = TestApp::new();
    send(t.router(), "POST", "/v1/reservations", Some(1), Some(json!({ "seat_ids": [5] }))).await;
    send(t.router(), "POST", "/v1/reservations", Some(2), Some(json!({ "seat_ids": [5] }))).await;

    t.clock.advance(Duration::minutes(20));
    assert_eq!(worker::sweep_once(&t.state).await, 1);
    assert_eq!(worker::sweep_once(&t.state).await, 0);

    let response = t
        .router()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("tessera_reservations_total{outcome=\"reserved\"} 1"));
    assert!(text.contains("tessera_reservations_total{outcome=\"conflict\"} 1"));
}
