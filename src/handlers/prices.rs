//! Bulk price lookup for course listings.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PriceLookupRequest {
    #[serde(rename = "courseIds", default)]
    pub course_ids: Vec<String>,
}

#[instrument(skip(state, request), fields(id_count = request.course_ids.len()))]
pub async fn lookup_prices(
    State(state): State<AppState>,
    Json(request): Json<PriceLookupRequest>,
) -> Result<Json<Value>, ServiceError> {
    if request.course_ids.is_empty() {
        return Ok(Json(json!({ "prices": {} })));
    }

    let prices = state.services.pricing.lookup_prices(&request.course_ids).await;
    Ok(Json(json!({ "prices": prices })))
}
