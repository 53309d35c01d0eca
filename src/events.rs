//! Order-correlated lifecycle events.
//!
//! Every state transition of a purchase emits an [`Event`] tagged with the
//! order id, delivered over an mpsc channel to a background consumer. These
//! events are the tracing spine for a purchase end-to-end and the raw
//! material for an external idempotency ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::models::OrderKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A hosted payment session was created and a draft registered.
    CheckoutSessionBuilt {
        order_id: String,
        kind: OrderKind,
        line_count: usize,
        amount: Decimal,
    },
    /// A verified provider event confirmed payment for an order.
    PaymentConfirmed {
        order_id: String,
        kind: OrderKind,
        event_id: String,
    },
    /// Fulfillment side effects were handed to the downstream collaborator.
    FulfillmentDispatched { order_id: String, kind: OrderKind },
    /// A redelivered provider event was acknowledged without side effects.
    DuplicateEventSkipped {
        order_id: String,
        event_type: String,
    },
    /// A verified event type this core does not act on was acknowledged.
    UnhandledProviderEvent { event_type: String },
    /// An allow-listed course patch was forwarded to the catalog.
    CoursePatched { course_id: String },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the consumer is gone.
    /// Event delivery must never fail a checkout or webhook request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Event delivery failed: {}", e);
        }
    }
}

/// Creates a connected sender/receiver pair with the given channel capacity.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Background consumer: logs each event with its correlation key.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::CheckoutSessionBuilt {
                order_id,
                kind,
                line_count,
                amount,
            } => info!(
                %order_id,
                kind = kind.as_str(),
                line_count,
                %amount,
                "checkout session built"
            ),
            Event::PaymentConfirmed {
                order_id,
                kind,
                event_id,
            } => info!(
                %order_id,
                kind = kind.as_str(),
                %event_id,
                "payment confirmed"
            ),
            Event::FulfillmentDispatched { order_id, kind } => {
                info!(%order_id, kind = kind.as_str(), "fulfillment dispatched")
            }
            Event::DuplicateEventSkipped {
                order_id,
                event_type,
            } => warn!(%order_id, %event_type, "duplicate provider event skipped"),
            Event::UnhandledProviderEvent { event_type } => {
                info!(%event_type, "unhandled provider event acknowledged")
            }
            Event::CoursePatched { course_id } => info!(%course_id, "course patched"),
        }
    }
    info!("Event channel closed; event processor exiting");
}
