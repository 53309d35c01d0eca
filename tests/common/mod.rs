//! Shared harness for integration tests: a full router wired to mock
//! catalog and payment-provider servers, plus a recording fulfillment
//! backend.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use courseset_api::clients::catalog::HttpCatalogClient;
use courseset_api::clients::payments::StripeGateway;
use courseset_api::config::AppConfig;
use courseset_api::errors::ServiceError;
use courseset_api::events;
use courseset_api::models::{CheckoutDraft, FulfillmentEvent};
use courseset_api::services::fulfillment::FulfillmentBackend;
use courseset_api::services::AppServices;
use courseset_api::{app_router, AppState};

pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// Backend that records which orders were fulfilled, per kind.
#[derive(Default)]
pub struct RecordingBackend {
    pub individual: Mutex<Vec<String>>,
    pub company: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub fn total_calls(&self) -> usize {
        self.individual.lock().unwrap().len() + self.company.lock().unwrap().len()
    }
}

#[async_trait]
impl FulfillmentBackend for RecordingBackend {
    async fn fulfill_individual(
        &self,
        event: &FulfillmentEvent,
        _draft: Option<&CheckoutDraft>,
    ) -> Result<(), ServiceError> {
        self.individual.lock().unwrap().push(event.order_id.clone());
        Ok(())
    }

    async fn fulfill_company(
        &self,
        event: &FulfillmentEvent,
        _draft: Option<&CheckoutDraft>,
    ) -> Result<(), ServiceError> {
        self.company.lock().unwrap().push(event.order_id.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub catalog: MockServer,
    pub payments: MockServer,
    pub backend: Arc<RecordingBackend>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let catalog = MockServer::start().await;
        let payments = MockServer::start().await;

        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            environment: "development".into(),
            log_level: "info".into(),
            log_json: false,
            site_url: Some("https://courses.example.com".into()),
            catalog_url: catalog.uri(),
            catalog_token: Some("catalog-token".into()),
            payment_api_url: payments.uri(),
            payment_secret_key: "sk_test_integration".into(),
            payment_webhook_secret: Some(WEBHOOK_SECRET.into()),
            payment_webhook_tolerance_secs: 300,
            currency: "mxn".into(),
            max_cart_quantity: 9999,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
        };

        let (event_sender, mut event_rx) = events::channel(256);
        tokio::spawn(async move { while event_rx.recv().await.is_some() {} });

        let backend = Arc::new(RecordingBackend::default());
        let services = AppServices::new(
            &config,
            Arc::new(HttpCatalogClient::new(&config)),
            Arc::new(StripeGateway::new(&config).unwrap()),
            backend.clone(),
            event_sender.clone(),
        );

        let state = AppState {
            config: Arc::new(config),
            services,
            event_sender,
        };

        Self {
            router: app_router(state),
            catalog,
            payments,
            backend,
        }
    }

    /// Mounts a catalog class as the latest one for a course.
    pub async fn mock_latest_class(&self, course_id: &str, class_id: &str, price: &str) {
        Mock::given(method("GET"))
            .and(path("/items/Classes"))
            .and(query_param("filter[course][_eq]", course_id))
            .and(query_param("sort", "-date_updated"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "id": class_id,
                    "course": course_id,
                    "price": price,
                    "date_created": "2026-01-10T12:00:00Z",
                    "date_updated": "2026-02-01T12:00:00Z"
                }]
            })))
            .mount(&self.catalog)
            .await;
    }

    /// Mounts an empty class list for a course on both sort passes.
    pub async fn mock_no_classes(&self, course_id: &str) {
        Mock::given(method("GET"))
            .and(path("/items/Classes"))
            .and(query_param("filter[course][_eq]", course_id))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&self.catalog)
            .await;
    }

    pub async fn mock_course(&self, course_id: &str, title: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/items/courses/{}", course_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "id": course_id, "title": title, "description": null, "summary": null }
            })))
            .mount(&self.catalog)
            .await;
    }

    /// Mounts a successful hosted-session response from the provider.
    pub async fn mock_session_created(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_abc123",
                "url": "https://pay.example.com/c/cs_test_abc123"
            })))
            .mount(&self.payments)
            .await;
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    /// Posts a signed provider event to the webhook endpoint.
    pub async fn post_webhook(&self, event: &Value) -> (StatusCode, Value) {
        let body = event.to_string();
        let header = sign_webhook(WEBHOOK_SECRET, &body);
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json")
            .header("stripe-signature", header)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

/// Signs a webhook body the way the provider does: `t=...,v1=hex(hmac)`.
pub fn sign_webhook(secret: &str, body: &str) -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, body).as_bytes());
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

pub fn completed_session_event(event_id: &str, order_id: &str, kind: &str) -> Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": { "object": {
            "payment_status": "paid",
            "metadata": { "order_id": order_id, "order_kind": kind }
        }}
    })
}

/// Polls until the condition holds; fulfillment runs on a detached task.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within timeout");
}
