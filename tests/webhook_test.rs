//! Webhook reconciliation through the router: signature checking,
//! exactly-once fulfillment, acknowledgement semantics.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use common::{completed_session_event, TestApp};

#[tokio::test]
async fn paid_company_order_is_fulfilled_exactly_once_across_redeliveries() {
    let app = TestApp::spawn().await;
    app.mock_latest_class("c1", "cls1", "200.00").await;
    app.mock_session_created().await;

    let (status, body) = app
        .post_json(
            "/api/v1/business/checkout",
            json!({ "items": [{ "courseId": "c1", "qtySeats": 3, "companyCoveragePercent": 100.0 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let order_id = body["orderId"].as_str().unwrap().to_string();

    let event = completed_session_event("evt_1", &order_id, "company");
    let (status, ack) = app.post_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "received": true }));

    let backend = app.backend.clone();
    let expected = order_id.clone();
    common::wait_until(move || backend.company.lock().unwrap().contains(&expected)).await;

    // Provider redelivery: acknowledged again, but no second fulfillment.
    let (status, ack) = app.post_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "received": true }));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(app.backend.total_calls(), 1);
}

#[tokio::test]
async fn individual_order_routes_to_the_individual_backend() {
    let app = TestApp::spawn().await;

    let event = completed_session_event("evt_7", "ord_7_abc", "individual");
    let (status, _) = app.post_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);

    let backend = app.backend.clone();
    common::wait_until(move || !backend.individual.lock().unwrap().is_empty()).await;
    assert_eq!(
        app.backend.individual.lock().unwrap().as_slice(),
        ["ord_7_abc"]
    );
}

#[tokio::test]
async fn unsigned_delivery_is_rejected() {
    let app = TestApp::spawn().await;
    let event = completed_session_event("evt_1", "ord_1_abc", "individual");

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/payments/webhook")
        .header("content-type", "application/json")
        .body(Body::from(event.to_string()))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("signature"));
    assert_eq!(app.backend.total_calls(), 0);
}

#[tokio::test]
async fn wrongly_signed_delivery_is_rejected() {
    let app = TestApp::spawn().await;
    let event = completed_session_event("evt_1", "ord_1_abc", "individual");
    let body_text = event.to_string();
    let bad_header = common::sign_webhook("whsec_wrong", &body_text);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/payments/webhook")
        .header("content-type", "application/json")
        .header("stripe-signature", bad_header)
        .body(Body::from(body_text))
        .unwrap();
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.backend.total_calls(), 0);
}

#[tokio::test]
async fn irrelevant_event_types_are_acknowledged_without_side_effects() {
    let app = TestApp::spawn().await;
    let event = json!({
        "id": "evt_9",
        "type": "charge.refunded",
        "data": { "object": {} }
    });

    let (status, ack) = app.post_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "received": true }));
    assert_eq!(app.backend.total_calls(), 0);
}

#[tokio::test]
async fn unpaid_completed_session_is_acknowledged_without_fulfillment() {
    let app = TestApp::spawn().await;
    let event = json!({
        "id": "evt_2",
        "type": "checkout.session.completed",
        "data": { "object": {
            "payment_status": "unpaid",
            "metadata": { "order_id": "ord_2_abc", "order_kind": "individual" }
        }}
    });

    let (status, _) = app.post_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.backend.total_calls(), 0);
}
