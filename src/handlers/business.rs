//! Company checkout: seats bought in bulk with partial cost coverage.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::cart::{clamp_coverage_percent, clamp_seat_quantity};
use crate::errors::ServiceError;
use crate::handlers::common::redirect_targets;
use crate::models::{Assignment, CompanyBuyLine, CompanyInfo, OrderKind};
use crate::services::checkout::BuildSessionInput;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BusinessCheckoutRequest {
    pub items: Vec<BusinessItemPayload>,
    #[serde(default)]
    pub company: Option<CompanyPayload>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Deserialize)]
pub struct BusinessItemPayload {
    #[serde(rename = "courseId")]
    pub course_id: String,
    #[serde(rename = "qtySeats", default = "default_seats")]
    pub qty_seats: u32,
    /// Accepted as a float and clamped; clients send whatever their slider
    /// produced.
    #[serde(rename = "companyCoveragePercent", default = "default_coverage")]
    pub coverage_percent: f64,
}

fn default_seats() -> u32 {
    1
}

fn default_coverage() -> f64 {
    100.0
}

#[derive(Debug, Deserialize)]
pub struct CompanyPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "adminEmail", default)]
    pub admin_email: Option<String>,
}

#[instrument(skip(state, request), fields(item_count = request.items.len()))]
pub async fn create_business_checkout(
    State(state): State<AppState>,
    Json(request): Json<BusinessCheckoutRequest>,
) -> Result<Json<Value>, ServiceError> {
    let targets = redirect_targets(&state.config, "/business")?;

    let lines: Vec<CompanyBuyLine> = request
        .items
        .into_iter()
        .map(|item| CompanyBuyLine {
            course_id: item.course_id,
            seat_quantity: clamp_seat_quantity(item.qty_seats),
            coverage_percent: clamp_coverage_percent(item.coverage_percent),
        })
        .collect();

    let split = state.services.company.split_company_order(&lines).await?;

    let company = request.company.map(|c| CompanyInfo {
        name: c.name,
        admin_email: c.admin_email,
    });

    let mut extra_metadata = BTreeMap::new();
    extra_metadata.insert("mode".to_string(), "business".to_string());

    let built = state
        .services
        .checkout
        .build_session(BuildSessionInput {
            kind: OrderKind::Company,
            lines: split.priced_lines,
            targets,
            company,
            assignments: request.assignments,
            extra_metadata,
        })
        .await?;

    Ok(Json(json!({
        "url": built.url,
        "orderId": built.order_id,
        "companyTotal": built.draft.company_total,
        "draft": built.draft,
    })))
}
