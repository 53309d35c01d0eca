use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub mod business;
pub mod checkout;
pub mod common;
pub mod courses;
pub mod health;
pub mod prices;
pub mod webhooks;

/// All versioned API routes. Health lives outside the version prefix.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout::create_checkout))
        .route("/business/checkout", post(business::create_business_checkout))
        .route("/prices", post(prices::lookup_prices))
        .route(
            "/courses/:id",
            get(courses::get_course).patch(courses::patch_course),
        )
        .route("/payments/webhook", post(webhooks::handle_payment_webhook))
}
