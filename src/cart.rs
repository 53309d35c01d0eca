//! Client-held cart and company-buy state as explicit value types.
//!
//! The buyer's cart and the company purchase selection are plain values
//! with pure transition functions; persistence is an injected [`CartStore`]
//! capability at the process boundary, not a global.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::models::Assignment;

pub const SEAT_QUANTITY_MAX: u32 = 9999;

/// One line of the individual buyer's cart, including the display price the
/// client last saw. The display price is never trusted at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    pub qty: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<CartItem>,
}

impl CartState {
    pub fn count(&self) -> u32 {
        self.items.iter().map(|it| it.qty).sum()
    }

    /// Display subtotal over the client-held prices. Informational only;
    /// the authoritative subtotal is recomputed server-side at checkout.
    pub fn subtotal(&self) -> Decimal {
        self.items
            .iter()
            .map(|it| it.price * Decimal::from(it.qty))
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CartAction {
    Add { item: CartItem },
    Remove { id: String },
    SetQty { id: String, qty: u32 },
    Clear,
    Hydrate { state: CartState },
}

/// Pure transition function for the buyer's cart.
///
/// Adding an already-present course merges quantities; quantities are
/// clamped to at least 1 so a stored state is always checkout-ready.
pub fn apply_cart_action(state: CartState, action: CartAction) -> CartState {
    match action {
        CartAction::Hydrate { state } => state,

        CartAction::Add { item } => {
            let qty = item.qty.max(1);
            let mut items = state.items;
            match items.iter_mut().find(|x| x.id == item.id) {
                Some(existing) => existing.qty = existing.qty.saturating_add(qty),
                None => items.push(CartItem { qty, ..item }),
            }
            CartState { items }
        }

        CartAction::Remove { id } => CartState {
            items: state.items.into_iter().filter(|x| x.id != id).collect(),
        },

        CartAction::SetQty { id, qty } => CartState {
            items: state
                .items
                .into_iter()
                .map(|mut x| {
                    if x.id == id {
                        x.qty = qty.max(1);
                    }
                    x
                })
                .collect(),
        },

        CartAction::Clear => CartState::default(),
    }
}

/// One line of the company purchase selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyItem {
    pub course_id: String,
    pub qty_seats: u32,
    pub unit_price: Option<Decimal>,
    pub title: Option<String>,
    pub company_coverage_percent: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyBuyState {
    pub items: Vec<BuyItem>,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BuyAction {
    SetItems { items: Vec<BuyItem> },
    SetCoverage { course_id: String, percent: f64 },
    SetQty { course_id: String, qty_seats: u32 },
    SetAssignments { assignments: Vec<Assignment> },
    Reset,
    Hydrate { state: CompanyBuyState },
}

/// Clamps a raw coverage input to an integral percent in 0..=100.
///
/// Applied at mutation time, never at computation time, so stored coverage
/// values are always already valid. Idempotent: clamping a clamped value is
/// a no-op.
pub fn clamp_coverage_percent(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// Clamps a seat quantity to 0..=SEAT_QUANTITY_MAX.
pub fn clamp_seat_quantity(raw: u32) -> u32 {
    raw.min(SEAT_QUANTITY_MAX)
}

/// Pure transition function for the company purchase selection.
pub fn apply_buy_action(state: CompanyBuyState, action: BuyAction) -> CompanyBuyState {
    match action {
        BuyAction::Hydrate { state } => state,

        BuyAction::SetItems { items } => CompanyBuyState { items, ..state },

        BuyAction::SetCoverage { course_id, percent } => CompanyBuyState {
            items: state
                .items
                .into_iter()
                .map(|mut it| {
                    if it.course_id == course_id {
                        it.company_coverage_percent = clamp_coverage_percent(percent);
                    }
                    it
                })
                .collect(),
            ..state
        },

        BuyAction::SetQty {
            course_id,
            qty_seats,
        } => CompanyBuyState {
            items: state
                .items
                .into_iter()
                .map(|mut it| {
                    if it.course_id == course_id {
                        it.qty_seats = clamp_seat_quantity(qty_seats);
                    }
                    it
                })
                .collect(),
            ..state
        },

        BuyAction::SetAssignments { assignments } => CompanyBuyState {
            assignments,
            ..state
        },

        BuyAction::Reset => CompanyBuyState::default(),
    }
}

/// Load/save capability for client-held state, injected at the process
/// boundary by whoever hosts the cart (browser bridge, test harness).
pub trait CartStore: Send + Sync {
    fn load(&self) -> Result<Option<CartState>, ServiceError>;
    fn save(&self, state: &CartState) -> Result<(), ServiceError>;
}
