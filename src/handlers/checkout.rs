//! Individual checkout: buy-now for one class, or the whole cart.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::errors::ServiceError;
use crate::handlers::common::redirect_targets;
use crate::models::{CartLine, OrderKind, PricedLine};
use crate::services::checkout::BuildSessionInput;
use crate::AppState;

/// Two accepted payload shapes, distinguished by their fields: a single
/// class purchase carries `courseId`/`classId`, a cart purchase carries
/// `items`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CheckoutRequest {
    Single {
        #[serde(rename = "courseId")]
        course_id: String,
        #[serde(rename = "classId")]
        class_id: String,
    },
    Cart { items: Vec<CartItemPayload> },
}

#[derive(Debug, Deserialize)]
pub struct CartItemPayload {
    pub id: String,
    #[serde(default = "one")]
    pub qty: u32,
}

fn one() -> u32 {
    1
}

#[instrument(skip(state, request))]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<Value>, ServiceError> {
    let targets = redirect_targets(&state.config, "/cart")?;

    let (lines, mode) = match request {
        CheckoutRequest::Single {
            course_id,
            class_id,
        } => (
            vec![price_single_class(&state, &course_id, &class_id).await?],
            "single",
        ),
        CheckoutRequest::Cart { items } => (price_cart_items(&state, items).await?, "cart"),
    };

    let mut extra_metadata = BTreeMap::new();
    extra_metadata.insert("mode".to_string(), mode.to_string());

    let built = state
        .services
        .checkout
        .build_session(BuildSessionInput {
            kind: OrderKind::Individual,
            lines,
            targets,
            company: None,
            assignments: vec![],
            extra_metadata,
        })
        .await?;

    Ok(Json(json!({ "url": built.url })))
}

/// Resolves a specific class, checking it really belongs to the declared
/// course. The price still comes from the catalog record, never the client.
async fn price_single_class(
    state: &AppState,
    course_id: &str,
    class_id: &str,
) -> Result<PricedLine, ServiceError> {
    let offering = state
        .services
        .catalog
        .class_by_id(class_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("class {}", class_id)))?;

    if offering.course_id != course_id {
        return Err(ServiceError::invalid_order_for(
            "Class does not belong to course",
            course_id,
        ));
    }
    if !offering.is_purchasable() {
        return Err(ServiceError::invalid_order_for(
            "Invalid class price",
            course_id,
        ));
    }

    let title = state
        .services
        .catalog
        .course_by_id(course_id)
        .await
        .ok()
        .flatten()
        .and_then(|course| course.title);

    Ok(PricedLine {
        course_id: course_id.to_string(),
        class_id: offering.id,
        title,
        unit_price: offering.price,
        quantity: 1,
        coverage_percent: None,
        company_unit_price: None,
    })
}

async fn price_cart_items(
    state: &AppState,
    items: Vec<CartItemPayload>,
) -> Result<Vec<PricedLine>, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError("Cart is empty".into()));
    }

    let lines: Vec<CartLine> = items
        .into_iter()
        .map(|item| CartLine {
            course_id: item.id,
            quantity: item.qty,
        })
        .collect();

    let pricing = state.services.pricing.price_cart(&lines).await;
    if !pricing.unpriceable_course_ids.is_empty() {
        return Err(ServiceError::invalid_order(format!(
            "Cart contains items without a published price: {}",
            pricing.unpriceable_course_ids.join(", ")
        )));
    }

    Ok(pricing.priced_lines)
}
