//! Inbound payment-provider webhook endpoint.

use axum::extract::State;
use axum::http::HeaderMap;
use bytes::Bytes;
use axum::Json;
use serde_json::{json, Value};
use tracing::instrument;

use crate::errors::ServiceError;
use crate::AppState;

/// Verifies and processes one delivery, then acknowledges it.
///
/// Every verified delivery is acknowledged with `{"received": true}` whether
/// or not it triggered fulfillment; the provider only needs to know the
/// payload landed. Fulfillment side effects run on their own task.
#[instrument(skip(state, headers, body))]
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ServiceError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok());

    state
        .services
        .fulfillment
        .process_webhook(&body, signature)
        .await?;

    Ok(Json(json!({ "received": true })))
}
