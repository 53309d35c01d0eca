//! HTTP catalog client behavior against a mock backend.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use courseset_api::clients::catalog::{CatalogApi, CoursePatch, HttpCatalogClient};
use courseset_api::config::AppConfig;
use courseset_api::errors::ServiceError;

fn client_for(server: &MockServer, token: Option<&str>) -> HttpCatalogClient {
    let config = AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        environment: "development".into(),
        log_level: "info".into(),
        log_json: false,
        site_url: None,
        catalog_url: server.uri(),
        catalog_token: token.map(str::to_string),
        payment_api_url: "https://api.stripe.com".into(),
        payment_secret_key: "sk_test".into(),
        payment_webhook_secret: None,
        payment_webhook_tolerance_secs: 300,
        currency: "mxn".into(),
        max_cart_quantity: 9999,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
    };
    HttpCatalogClient::new(&config)
}

#[tokio::test]
async fn latest_class_prefers_the_update_timestamp_pass() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/Classes"))
        .and(query_param("sort", "-date_updated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "cls-updated", "course": "c1", "price": "150.00",
                       "date_created": null, "date_updated": "2026-02-01T00:00:00Z" }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let offering = client.latest_class_for_course("c1").await.unwrap().unwrap();
    assert_eq!(offering.id, "cls-updated");
}

#[tokio::test]
async fn latest_class_falls_back_to_creation_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/Classes"))
        .and(query_param("sort", "-date_updated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items/Classes"))
        .and(query_param("sort", "-date_created"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "cls-created", "course": "c1", "price": "99.00",
                       "date_created": "2026-01-01T00:00:00Z", "date_updated": null }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let offering = client.latest_class_for_course("c1").await.unwrap().unwrap();
    assert_eq!(offering.id, "cls-created");
}

#[tokio::test]
async fn numeric_ids_come_back_as_strings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/Classes"))
        .and(query_param("sort", "-date_updated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": 42, "course": 7, "price": "10.00",
                       "date_created": null, "date_updated": null }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let offering = client.latest_class_for_course("7").await.unwrap().unwrap();
    assert_eq!(offering.id, "42");
    assert_eq!(offering.course_id, "7");
}

#[tokio::test]
async fn missing_course_is_none_but_server_errors_are_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/courses/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    // Unmatched path: the mock server answers 404.
    assert!(client.course_by_id("missing").await.unwrap().is_none());

    let err = client.course_by_id("broken").await.unwrap_err();
    assert!(matches!(err, ServiceError::CatalogUnreachable(_)));
}

#[tokio::test]
async fn patch_requires_a_token_and_sends_it() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/items/courses/c1"))
        .and(header("authorization", "Bearer catalog-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "c1", "title": "New title" }
        })))
        .mount(&server)
        .await;

    let patch = CoursePatch {
        title: Some("New title".into()),
        description: None,
        summary: None,
    };

    let without_token = client_for(&server, None);
    let err = without_token.patch_course("c1", &patch).await.unwrap_err();
    assert!(matches!(err, ServiceError::MissingConfiguration(_)));

    let with_token = client_for(&server, Some("catalog-token"));
    let updated = with_token.patch_course("c1", &patch).await.unwrap();
    assert_eq!(updated["data"]["title"], "New title");
}

#[tokio::test]
async fn patch_of_unknown_course_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/items/courses/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("catalog-token"));
    let err = client
        .patch_course("ghost", &CoursePatch::from_value(&json!({ "title": "x" })))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn client_is_usable_behind_the_trait_object() {
    let server = MockServer::start().await;
    let client: Arc<dyn CatalogApi> = Arc::new(client_for(&server, None));
    assert!(client.class_by_id("nope").await.unwrap().is_none());
}
