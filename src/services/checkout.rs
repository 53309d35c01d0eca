//! Checkout session construction.
//!
//! Turns a priced line set into a hosted payment session. The generated
//! order id, embedded in session metadata, is the only correlation channel
//! between the session and the webhook that later confirms it — it is never
//! omitted. Session creation is a single request/response to the provider;
//! failures surface to the caller and are never retried here.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{info, instrument};

use crate::clients::payments::{
    CheckoutSessionRequest, PaymentGateway, SessionLineItem,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    generate_order_id, Assignment, CheckoutDraft, CompanyInfo, OrderKind, PricedLine,
};

/// Success/cancel redirect targets for a hosted session.
#[derive(Debug, Clone)]
pub struct RedirectTargets {
    pub success_url: String,
    pub cancel_url: String,
}

/// Everything needed to build one session and its draft.
#[derive(Debug, Clone)]
pub struct BuildSessionInput {
    pub kind: OrderKind,
    /// All priced lines; zero-coverage company lines ride along for later
    /// seat assignment even though they produce no session line item.
    pub lines: Vec<PricedLine>,
    pub targets: RedirectTargets,
    pub company: Option<CompanyInfo>,
    pub assignments: Vec<Assignment>,
    /// Flow-specific metadata (mode, course ids) merged into the session
    /// metadata alongside the correlation keys.
    pub extra_metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct BuiltSession {
    pub url: String,
    pub order_id: String,
    pub draft: CheckoutDraft,
}

#[derive(Clone)]
pub struct CheckoutService {
    gateway: Arc<dyn PaymentGateway>,
    event_sender: EventSender,
    drafts: Arc<DashMap<String, CheckoutDraft>>,
}

/// Converts a decimal price to integral minor units (`round(price × 100)`).
pub fn to_minor_units(price: Decimal) -> Result<i64, ServiceError> {
    (price * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("price {} out of range for minor units", price))
        })
}

impl CheckoutService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, event_sender: EventSender) -> Self {
        Self {
            gateway,
            event_sender,
            drafts: Arc::new(DashMap::new()),
        }
    }

    /// Builds a hosted checkout session and registers the in-memory draft.
    ///
    /// The charged amount is derived only from server-resolved prices in
    /// `input.lines`. An input producing zero session line items is
    /// rejected; a session is never created with an empty line-item list.
    #[instrument(skip(self, input), fields(kind = input.kind.as_str(), line_count = input.lines.len()))]
    pub async fn build_session(
        &self,
        input: BuildSessionInput,
    ) -> Result<BuiltSession, ServiceError> {
        if input.lines.is_empty() {
            return Err(ServiceError::ValidationError("no items to check out".into()));
        }

        let (line_items, session_total) = self.session_line_items(&input)?;
        if line_items.is_empty() {
            return Err(ServiceError::invalid_order("company covers nothing"));
        }

        let order_id = generate_order_id(input.kind);

        let mut metadata = BTreeMap::new();
        metadata.insert("order_id".to_string(), order_id.clone());
        metadata.insert("order_kind".to_string(), input.kind.as_str().to_string());
        if let Some(company) = &input.company {
            metadata.insert(
                "company_email".to_string(),
                company.admin_email.clone().unwrap_or_default(),
            );
        }
        metadata.extend(input.extra_metadata.clone());

        let session = self
            .gateway
            .create_checkout_session(CheckoutSessionRequest {
                line_items,
                success_url: input.targets.success_url.clone(),
                cancel_url: input.targets.cancel_url.clone(),
                metadata,
            })
            .await?;

        let draft = CheckoutDraft {
            order_id: order_id.clone(),
            kind: input.kind,
            lines: input.lines,
            company_total: session_total,
            company: input.company,
            assignments: input.assignments,
            created_at: Utc::now(),
        };
        self.drafts.insert(order_id.clone(), draft.clone());

        self.event_sender
            .send_or_log(Event::CheckoutSessionBuilt {
                order_id: order_id.clone(),
                kind: input.kind,
                line_count: draft.lines.len(),
                amount: session_total,
            })
            .await;

        info!(%order_id, session_id = %session.id, "checkout session created");

        Ok(BuiltSession {
            url: session.url,
            order_id,
            draft,
        })
    }

    /// Maps priced lines to provider line items and totals the charge.
    ///
    /// Individual orders charge the full unit price per line; company
    /// orders charge the per-unit company share and skip zero-coverage
    /// lines entirely.
    fn session_line_items(
        &self,
        input: &BuildSessionInput,
    ) -> Result<(Vec<SessionLineItem>, Decimal), ServiceError> {
        let mut items = Vec::new();
        let mut total = Decimal::ZERO;

        for line in &input.lines {
            let (label, description, unit_price) = match input.kind {
                OrderKind::Individual => (
                    line.title.clone().unwrap_or_else(|| "Course".to_string()),
                    None,
                    line.unit_price,
                ),
                OrderKind::Company => {
                    let company_unit = line.company_unit_price.unwrap_or(Decimal::ZERO);
                    if company_unit <= Decimal::ZERO {
                        continue;
                    }
                    (
                        format!("Corporate license: {}", line.course_id),
                        Some(format!(
                            "Company coverage {}% (class {})",
                            line.coverage_percent.unwrap_or(100),
                            line.class_id
                        )),
                        company_unit,
                    )
                }
            };

            total += unit_price * Decimal::from(line.quantity);
            items.push(SessionLineItem {
                name: label,
                description,
                unit_amount_minor: to_minor_units(unit_price)?,
                quantity: line.quantity,
            });
        }

        Ok((items, total))
    }

    /// The draft registered for an order id, if the session was built by
    /// this process and the draft has not been consumed.
    pub fn draft(&self, order_id: &str) -> Option<CheckoutDraft> {
        self.drafts.get(order_id).map(|entry| entry.clone())
    }

    /// Removes and returns a draft once fulfillment has consumed it.
    pub fn take_draft(&self, order_id: &str) -> Option<CheckoutDraft> {
        self.drafts.remove(order_id).map(|(_, draft)| draft)
    }
}
