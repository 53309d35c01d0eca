use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::AppState;

/// Liveness probe with a summary of which optional settings are present.
/// Secrets themselves are never echoed.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "environment": state.config.environment,
        "site_url_configured": state.config.site_url.is_some(),
        "webhook_secret_configured": state.config.payment_webhook_secret.is_some(),
        "catalog_token_configured": state.config.catalog_token.is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
