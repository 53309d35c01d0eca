use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A course as stored by the catalog backend. Read-only to this crate
/// except for the allow-listed patch in [`crate::clients::catalog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
}

/// A priced, purchasable instance of a course ("class" in the catalog).
///
/// The most recently updated class for a course is the authoritative price
/// source; client-declared prices are never trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassOffering {
    pub id: String,
    pub course_id: String,
    pub price: Decimal,
    pub date_created: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
}

impl ClassOffering {
    /// A class is purchasable only with a strictly positive price.
    pub fn is_purchasable(&self) -> bool {
        self.price > Decimal::ZERO
    }
}

/// One line of an individual buyer's cart. Ephemeral; owned by the buyer's
/// session and never persisted server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub course_id: String,
    pub quantity: u32,
}

/// One line of a company purchase: seats for a course with the share of the
/// seat price the company covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyBuyLine {
    pub course_id: String,
    pub seat_quantity: u32,
    /// Clamped to 0..=100 at every mutation, so stored values are valid.
    pub coverage_percent: u8,
}

/// A cart or company line resolved against the authoritative class price.
/// Transient: recomputed on every checkout request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedLine {
    pub course_id: String,
    pub class_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_percent: Option<u8>,
    /// The company's share of one seat, rounded once per unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_unit_price: Option<Decimal>,
}

/// Whether an order was placed by an individual buyer or a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Individual,
    Company,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Individual => "individual",
            OrderKind::Company => "company",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "individual" => Some(OrderKind::Individual),
            "company" => Some(OrderKind::Company),
            _ => None,
        }
    }
}

/// Company details attached to a business purchase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_email: Option<String>,
}

/// A pending seat assignment carried on a company draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub email: String,
    #[serde(rename = "courseId")]
    pub course_id: String,
}

/// In-memory record of a checkout in progress, keyed by order id.
///
/// Created when the payment session is built and referenced again only when
/// the matching webhook event arrives. Durable persistence before the
/// redirect is the order-storage collaborator's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutDraft {
    pub order_id: String,
    pub kind: OrderKind,
    pub lines: Vec<PricedLine>,
    pub company_total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanyInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<Assignment>,
    pub created_at: DateTime<Utc>,
}

/// A payment-provider event that survived signature verification and
/// carries enough metadata to correlate back to a draft.
#[derive(Debug, Clone)]
pub struct FulfillmentEvent {
    pub event_id: String,
    pub order_id: String,
    pub kind: OrderKind,
    pub event_type: String,
    pub payment_status: String,
}

/// Generates an order id: kind prefix, millisecond timestamp, random tail.
/// This id is the sole correlation key threaded through provider metadata.
pub fn generate_order_id(kind: OrderKind) -> String {
    let prefix = match kind {
        OrderKind::Individual => "ord",
        OrderKind::Company => "corp",
    };
    let millis = Utc::now().timestamp_millis();
    let tail: u64 = rand::thread_rng().gen();
    format!("{}_{}_{:012x}", prefix, millis, tail & 0xffff_ffff_ffff)
}
