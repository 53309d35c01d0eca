//! Webhook verification and idempotent order fulfillment.
//!
//! The payment provider redelivers events at-least-once; the ledger here
//! turns that into exactly-once side effects per (order id, event type).
//! Verification failures are the caller's problem (400); a fulfillment
//! failure after verification is not, so dispatch happens on a background
//! task and the webhook is acknowledged regardless.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{CheckoutDraft, FulfillmentEvent, OrderKind};

use super::checkout::CheckoutService;

type HmacSha256 = Hmac<Sha256>;

const COMPLETED_EVENT: &str = "checkout.session.completed";

/// Downstream collaborator that records the paid order and grants access.
///
/// Implementations must tolerate being called with the same order id more
/// than once across process restarts; within one process the ledger already
/// deduplicates.
#[async_trait]
pub trait FulfillmentBackend: Send + Sync {
    async fn fulfill_individual(
        &self,
        event: &FulfillmentEvent,
        draft: Option<&CheckoutDraft>,
    ) -> Result<(), ServiceError>;

    async fn fulfill_company(
        &self,
        event: &FulfillmentEvent,
        draft: Option<&CheckoutDraft>,
    ) -> Result<(), ServiceError>;
}

/// Default backend: logs what would be fulfilled. Stands in until an order
/// store is wired up.
pub struct LoggingFulfillment;

#[async_trait]
impl FulfillmentBackend for LoggingFulfillment {
    async fn fulfill_individual(
        &self,
        event: &FulfillmentEvent,
        draft: Option<&CheckoutDraft>,
    ) -> Result<(), ServiceError> {
        info!(
            order_id = %event.order_id,
            event_id = %event.event_id,
            has_draft = draft.is_some(),
            "individual order paid; no backend configured"
        );
        Ok(())
    }

    async fn fulfill_company(
        &self,
        event: &FulfillmentEvent,
        draft: Option<&CheckoutDraft>,
    ) -> Result<(), ServiceError> {
        info!(
            order_id = %event.order_id,
            event_id = %event.event_id,
            seats = draft.map(|d| d.lines.iter().map(|l| l.quantity).sum::<u32>()),
            "company order paid; no backend configured"
        );
        Ok(())
    }
}

/// Outcome of processing one webhook delivery. Every variant is acknowledged
/// with 200 at the HTTP layer; the distinction exists for logging and tests.
#[derive(Debug)]
pub enum WebhookDisposition {
    /// First delivery for this (order, event type); side effects are running
    /// on the returned task.
    Dispatched {
        order_id: String,
        task: JoinHandle<()>,
    },
    /// A redelivery; the ledger already holds this (order, event type).
    Duplicate { order_id: String },
    /// A verified event type this core does not act on.
    Ignored { event_type: String },
    /// A completed session with no order id in its metadata.
    NotCorrelated,
}

#[derive(Debug, Deserialize)]
struct ProviderEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: ProviderEventData,
}

#[derive(Debug, Deserialize)]
struct ProviderEventData {
    object: ProviderSession,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProviderSession {
    payment_status: String,
    metadata: std::collections::BTreeMap<String, String>,
}

pub struct FulfillmentService {
    webhook_secret: Option<String>,
    tolerance_secs: u64,
    checkout: Arc<CheckoutService>,
    backend: Arc<dyn FulfillmentBackend>,
    event_sender: EventSender,
    /// Exactly-once guard: first insert wins per (order id, event type).
    ledger: DashMap<(String, String), ()>,
}

impl FulfillmentService {
    pub fn new(
        webhook_secret: Option<String>,
        tolerance_secs: u64,
        checkout: Arc<CheckoutService>,
        backend: Arc<dyn FulfillmentBackend>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            webhook_secret,
            tolerance_secs,
            checkout,
            backend,
            event_sender,
            ledger: DashMap::new(),
        }
    }

    /// Verifies and processes one raw webhook delivery.
    ///
    /// `InvalidSignature` covers a missing header, a malformed header, a
    /// digest mismatch, and a stale timestamp alike; the caller cannot tell
    /// which, on purpose.
    #[instrument(skip(self, body, signature_header))]
    pub async fn process_webhook(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookDisposition, ServiceError> {
        let secret = self.webhook_secret.as_deref().ok_or_else(|| {
            ServiceError::MissingConfiguration("payment webhook secret is not set".into())
        })?;

        let header = signature_header
            .ok_or_else(|| ServiceError::InvalidSignature("missing signature header".into()))?;
        verify_signature(secret, header, body, self.tolerance_secs, unix_now())?;

        let event: ProviderEvent = serde_json::from_slice(body)
            .map_err(|e| ServiceError::ValidationError(format!("malformed event payload: {}", e)))?;

        if event.event_type != COMPLETED_EVENT {
            self.event_sender
                .send_or_log(Event::UnhandledProviderEvent {
                    event_type: event.event_type.clone(),
                })
                .await;
            return Ok(WebhookDisposition::Ignored {
                event_type: event.event_type,
            });
        }

        let session = event.data.object;
        if !matches!(session.payment_status.as_str(), "paid" | "no_payment_required") {
            info!(
                event_id = %event.id,
                payment_status = %session.payment_status,
                "completed session not yet paid; acknowledged without fulfillment"
            );
            return Ok(WebhookDisposition::Ignored {
                event_type: event.event_type,
            });
        }

        let Some(order_id) = session.metadata.get("order_id").cloned() else {
            warn!(event_id = %event.id, "completed session carries no order id");
            return Ok(WebhookDisposition::NotCorrelated);
        };

        let kind = session
            .metadata
            .get("order_kind")
            .and_then(|k| OrderKind::parse(k))
            .unwrap_or_else(|| infer_kind(&order_id));

        // Atomic check-and-set: only the first delivery gets a vacant entry.
        let ledger_key = (order_id.clone(), event.event_type.clone());
        if self.ledger.insert(ledger_key, ()).is_some() {
            self.event_sender
                .send_or_log(Event::DuplicateEventSkipped {
                    order_id: order_id.clone(),
                    event_type: event.event_type,
                })
                .await;
            return Ok(WebhookDisposition::Duplicate { order_id });
        }

        let fulfillment = FulfillmentEvent {
            event_id: event.id,
            order_id: order_id.clone(),
            kind,
            event_type: event.event_type,
            payment_status: session.payment_status,
        };

        self.event_sender
            .send_or_log(Event::PaymentConfirmed {
                order_id: order_id.clone(),
                kind,
                event_id: fulfillment.event_id.clone(),
            })
            .await;

        let task = self.dispatch(fulfillment);
        Ok(WebhookDisposition::Dispatched { order_id, task })
    }

    /// Runs the backend call on its own task so a slow or failing backend
    /// never delays the webhook acknowledgement past the provider's timeout.
    fn dispatch(&self, event: FulfillmentEvent) -> JoinHandle<()> {
        let checkout = self.checkout.clone();
        let backend = self.backend.clone();
        let event_sender = self.event_sender.clone();

        tokio::spawn(async move {
            let draft = checkout.take_draft(&event.order_id);
            if draft.is_none() {
                warn!(
                    order_id = %event.order_id,
                    "no draft for paid order; fulfilling from event metadata only"
                );
            }

            let result = match event.kind {
                OrderKind::Individual => {
                    backend.fulfill_individual(&event, draft.as_ref()).await
                }
                OrderKind::Company => backend.fulfill_company(&event, draft.as_ref()).await,
            };

            match result {
                Ok(()) => {
                    event_sender
                        .send_or_log(Event::FulfillmentDispatched {
                            order_id: event.order_id.clone(),
                            kind: event.kind,
                        })
                        .await;
                }
                Err(e) => {
                    // The delivery was already acknowledged; this order needs
                    // operator attention or a provider redelivery replay.
                    error!(
                        order_id = %event.order_id,
                        event_id = %event.event_id,
                        error = %e,
                        "fulfillment backend failed after acknowledgement"
                    );
                }
            }
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn infer_kind(order_id: &str) -> OrderKind {
    if order_id.starts_with("corp_") {
        OrderKind::Company
    } else {
        OrderKind::Individual
    }
}

/// Verifies a `t=...,v1=...` signature header against the raw body.
///
/// The signed payload is `"{t}.{body}"` and the digest is HMAC-SHA256 under
/// the endpoint secret. Comparison is constant-time over all candidate
/// `v1` values; any of them matching passes.
pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    tolerance_secs: u64,
    now: u64,
) -> Result<(), ServiceError> {
    let mut timestamp: Option<u64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| ServiceError::InvalidSignature("signature header has no timestamp".into()))?;
    if candidates.is_empty() {
        return Err(ServiceError::InvalidSignature(
            "signature header has no v1 digest".into(),
        ));
    }

    if now.abs_diff(timestamp) > tolerance_secs {
        return Err(ServiceError::InvalidSignature(
            "signature timestamp outside tolerance".into(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("hmac key setup failed: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);

    let matched = candidates
        .into_iter()
        .any(|candidate| mac.clone().verify_slice(&candidate).is_ok());
    if matched {
        Ok(())
    } else {
        Err(ServiceError::InvalidSignature(
            "signature digest mismatch".into(),
        ))
    }
}
