use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use rihla_api::{app, metrics::ApiMetrics, middleware::Claims, AppState};
use rihla_catalog::{Listing, MemoryCatalog, MemoryInventoryLedger};
use rihla_core::notify::BroadcastNotifier;
use rihla_core::{PriceSnapshot, ResourceRef};
use rihla_order::{OrderBook, ReservationOrchestrator};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    ledger: Arc<MemoryInventoryLedger>,
    hotel: ResourceRef,
}

fn test_app(capacity: u32) -> TestApp {
    let ledger = Arc::new(MemoryInventoryLedger::new());
    let catalog = Arc::new(MemoryCatalog::new(ledger.clone()));
    let hotel = ResourceRef::Hotel(Uuid::new_v4());
    catalog
        .add(
            Listing::new(hotel, "Madinah Oberoi", PriceSnapshot::new(Decimal::new(80000, 2), Decimal::new(21300, 2))),
            capacity,
        )
        .unwrap();

    let events = BroadcastNotifier::new(16);
    let orchestrator = ReservationOrchestrator::new(ledger.clone(), catalog, Arc::new(OrderBook::new()))
        .with_notifier(Arc::new(events.clone()));
    let state = AppState::new(
        Arc::new(orchestrator),
        events,
        Arc::new(ApiMetrics::new().unwrap()),
        SECRET,
    );

    TestApp {
        router: app(state),
        ledger,
        hotel,
    }
}

fn token(sub: &str, role: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn call(router: &Router, method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn hotel_booking(hotel: ResourceRef, quantity: u32) -> Value {
    json!({
        "booking_type": "hotel",
        "hotel": hotel.id(),
        "quantity": quantity,
        "total_price_sar": "1600.00",
        "total_price_usd": "426.00",
        "payment_method": "amex",
        "customer_name": "Huda Al-Qahtani",
        "customer_email": "huda@example.com",
        "customer_phone": "+966533333333",
        "check_in_date": "2026-04-01",
        "check_out_date": "2026-04-03"
    })
}

#[tokio::test]
async fn test_booking_lifecycle_over_http() {
    let t = test_app(5);
    let customer = token("user-1", "customer");

    let (status, booking) = call(&t.router, "POST", "/v1/bookings", Some(&customer), Some(hotel_booking(t.hotel, 2))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["payment_status"], "completed");
    assert_eq!(booking["currency"], "SAR");
    assert!(booking["reference"].as_str().unwrap().starts_with("BK"));
    assert_eq!(t.ledger.snapshot(t.hotel).unwrap().available, 3);

    let id = booking["id"].as_str().unwrap().to_string();

    let (status, payments) = call(&t.router, "GET", &format!("/v1/bookings/{id}/payments"), Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payments.as_array().unwrap().len(), 1);
    assert_eq!(payments[0]["status"], "completed");

    let availability_uri = format!("/v1/resources/hotel/{}/availability", t.hotel.id());
    let (status, availability) = call(&t.router, "GET", &availability_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(availability["available_capacity"], 3);

    let (status, cancelled) = call(&t.router, "POST", &format!("/v1/bookings/{id}/cancel"), Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(t.ledger.snapshot(t.hotel).unwrap().available, 5);

    let (status, body) = call(&t.router, "POST", &format!("/v1/bookings/{id}/cancel"), Some(&customer), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_transition");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let t = test_app(1);

    let (status, body) = call(&t.router, "GET", "/v1/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");

    let (status, body) = call(&t.router, "GET", "/v1/bookings", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");

    let (status, body) = call(&t.router, "GET", "/v1/bookings", Some(&token("x", "pilot")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    let (status, _) = call(&t.router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_validation_and_capacity_errors() {
    let t = test_app(1);
    let customer = token("user-1", "customer");

    let mut incomplete = hotel_booking(t.hotel, 1);
    incomplete.as_object_mut().unwrap().remove("customer_email");
    let (status, body) = call(&t.router, "POST", "/v1/bookings", Some(&customer), Some(incomplete)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: customer_email");

    let (status, body) = call(&t.router, "POST", "/v1/bookings", Some(&customer), Some(hotel_booking(t.hotel, 2))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "insufficient_capacity");
    assert_eq!(t.ledger.snapshot(t.hotel).unwrap().available, 1);
}

#[tokio::test]
async fn test_customers_only_see_their_own_bookings() {
    let t = test_app(4);
    let alice = token("alice", "customer");
    let bob = token("bob", "customer");
    let staff = token("agent", "staff");

    let (_, booking) = call(&t.router, "POST", "/v1/bookings", Some(&alice), Some(hotel_booking(t.hotel, 1))).await;
    call(&t.router, "POST", "/v1/bookings", Some(&bob), Some(hotel_booking(t.hotel, 1))).await;
    let id = booking["id"].as_str().unwrap().to_string();

    let (_, mine) = call(&t.router, "GET", "/v1/bookings", Some(&alice), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, all) = call(&t.router, "GET", "/v1/bookings", Some(&staff), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, _) = call(&t.router, "GET", &format!("/v1/bookings/{id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&t.router, "POST", &format!("/v1/bookings/{id}/cancel"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&t.router, "GET", "/v1/events", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_refund_workflow_over_http() {
    let t = test_app(2);
    let customer = token("user-1", "customer");
    let admin = token("root", "admin");

    let (_, booking) = call(&t.router, "POST", "/v1/bookings", Some(&customer), Some(hotel_booking(t.hotel, 2))).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();
    let (_, payments) = call(&t.router, "GET", &format!("/v1/bookings/{booking_id}/payments"), Some(&customer), None).await;
    let payment_id = payments[0]["id"].as_str().unwrap().to_string();

    let (status, refund) = call(
        &t.router,
        "POST",
        "/v1/refunds",
        Some(&customer),
        Some(json!({ "booking_id": booking_id, "payment_id": payment_id, "reason": "family emergency" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(refund["status"], "requested");
    let refund_id = refund["id"].as_str().unwrap().to_string();
    let process_uri = format!("/v1/refunds/{refund_id}/process");

    let (status, _) = call(&t.router, "POST", &process_uri, Some(&customer), Some(json!({ "action": "approve" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, processing) = call(&t.router, "POST", &process_uri, Some(&admin), Some(json!({ "action": "process" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(processing["status"], "processing");

    let (status, approved) = call(
        &t.router,
        "POST",
        &process_uri,
        Some(&admin),
        Some(json!({ "action": "approve", "notes": "documents verified" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "completed");
    assert_eq!(approved["processed_by"], "root");
    assert_eq!(t.ledger.snapshot(t.hotel).unwrap().available, 2);

    let (_, booking) = call(&t.router, "GET", &format!("/v1/bookings/{booking_id}"), Some(&customer), None).await;
    assert_eq!(booking["status"], "refunded");
    assert_eq!(booking["payment_status"], "refunded");

    let (_, refunds) = call(&t.router, "GET", "/v1/refunds", Some(&customer), None).await;
    assert_eq!(refunds.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_metrics_endpoint_counts_placements() {
    let t = test_app(3);
    let customer = token("user-1", "customer");
    call(&t.router, "POST", "/v1/bookings", Some(&customer), Some(hotel_booking(t.hotel, 1))).await;
    call(&t.router, "POST", "/v1/bookings", Some(&customer), Some(hotel_booking(t.hotel, 9))).await;

    let response = t
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    assert!(text.contains("rihla_bookings_placed_total{kind=\"hotel\"} 1"));
    assert!(text.contains("rihla_booking_rejections_total{reason=\"insufficient_capacity\"} 1"));
}
