//! Company purchase cost splitting.
//!
//! A company buys seats for its employees and covers a percentage of each
//! seat's price; the remainder is presumed billed to the employee later.
//! Unlike the individual cart, a company order is all-or-nothing priceable.

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::instrument;

use crate::errors::ServiceError;
use crate::models::{CompanyBuyLine, PricedLine};

use super::pricing::PricingService;

/// Rounds to 2 decimal places, half-up.
///
/// Applied once per unit price before multiplying by the seat count, so
/// rounding error never compounds across seats.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A fully priced company order.
///
/// `priced_lines` keeps every surviving line, including zero-coverage ones
/// (needed later for seat assignment); only lines with a positive company
/// unit price are payable through the checkout session.
#[derive(Debug, Clone, Serialize)]
pub struct CompanySplit {
    pub priced_lines: Vec<PricedLine>,
    pub company_total: Decimal,
}

impl CompanySplit {
    /// Lines the company actually pays for.
    pub fn payable_lines(&self) -> impl Iterator<Item = &PricedLine> {
        self.priced_lines
            .iter()
            .filter(|line| line.company_unit_price.is_some_and(|p| p > Decimal::ZERO))
    }
}

#[derive(Clone)]
pub struct CompanySplitService {
    pricing: Arc<PricingService>,
}

impl CompanySplitService {
    pub fn new(pricing: Arc<PricingService>) -> Self {
        Self { pricing }
    }

    /// Prices a company order and computes the company's payable share.
    ///
    /// Zero-seat and empty-id lines are dropped up front. Every surviving
    /// line must resolve to a published positive price or the whole batch
    /// fails; a batch where the company covers nothing anywhere fails too.
    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn split_company_order(
        &self,
        lines: &[CompanyBuyLine],
    ) -> Result<CompanySplit, ServiceError> {
        let survivors: Vec<&CompanyBuyLine> = lines
            .iter()
            .filter(|line| line.seat_quantity > 0 && !line.course_id.is_empty())
            .collect();

        if survivors.is_empty() {
            return Err(ServiceError::invalid_order("no valid items"));
        }

        let resolutions = join_all(
            survivors
                .iter()
                .map(|line| self.pricing.resolve_latest_offering(&line.course_id)),
        )
        .await;

        let mut priced_lines = Vec::with_capacity(survivors.len());
        let mut company_total = Decimal::ZERO;

        for (line, resolution) in survivors.iter().zip(resolutions) {
            let offering = match resolution? {
                Some(offering) if offering.is_purchasable() => offering,
                _ => {
                    return Err(ServiceError::invalid_order_for(
                        "no published price",
                        line.course_id.clone(),
                    ));
                }
            };

            let company_unit_price = round2(
                offering.price * Decimal::from(line.coverage_percent) / Decimal::from(100),
            );

            if company_unit_price > Decimal::ZERO {
                company_total += company_unit_price * Decimal::from(line.seat_quantity);
            }

            priced_lines.push(PricedLine {
                course_id: line.course_id.clone(),
                class_id: offering.id,
                title: None,
                unit_price: offering.price,
                quantity: line.seat_quantity,
                coverage_percent: Some(line.coverage_percent),
                company_unit_price: Some(company_unit_price),
            });
        }

        let split = CompanySplit {
            priced_lines,
            company_total,
        };

        if split.payable_lines().next().is_none() {
            return Err(ServiceError::invalid_order("company covers nothing"));
        }

        Ok(split)
    }
}
