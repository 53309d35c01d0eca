//! Checkout computation and order-reconciliation core for a course store.
//!
//! Prices are resolved from the catalog backend, never trusted from
//! clients; hosted payment sessions carry an order id in their metadata,
//! and the webhook path turns the provider's at-least-once deliveries into
//! exactly-once fulfillment.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use http::HeaderValue;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod cart;
pub mod clients;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod services;

#[cfg(test)]
pub mod test_support;

use config::AppConfig;
use events::EventSender;
use services::AppServices;

/// Shared state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: AppServices,
    pub event_sender: EventSender,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The complete application router: versioned API, health probe, tracing,
/// CORS, and a request timeout.
pub fn app_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .nest("/api/v1", handlers::api_routes())
        .route("/health", get(handlers::health::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if let Some(origins) = &config.cors_allowed_origins {
        let parsed: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(%origin, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        if !parsed.is_empty() {
            return CorsLayer::new()
                .allow_origin(parsed)
                .allow_methods(Any)
                .allow_headers(Any);
        }
    }

    if config.should_allow_permissive_cors() {
        CorsLayer::permissive()
    } else {
        // No origins configured outside development: same-origin only.
        CorsLayer::new()
    }
}
