//! Authoritative price resolution and cart pricing.
//!
//! The catalog backend owns all prices; nothing the client declares is ever
//! used in an amount. A course is purchasable iff its latest class exists
//! and carries a strictly positive price.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{instrument, warn};

use crate::clients::catalog::CatalogApi;
use crate::errors::ServiceError;
use crate::models::{CartLine, ClassOffering, PricedLine};

/// Result of pricing an individual buyer's cart.
///
/// A partially priceable cart is a normal outcome, not an error: lines that
/// could not be priced are reported so the caller can block checkout until
/// the buyer removes them.
#[derive(Debug, Clone, Serialize)]
pub struct CartPricing {
    pub priced_lines: Vec<PricedLine>,
    pub unpriceable_course_ids: Vec<String>,
    pub subtotal: Decimal,
}

/// One entry of a bulk price lookup. Failures are reported inline per
/// course id; a bad id never fails the batch.
#[derive(Debug, Clone, Serialize)]
pub struct PriceEntry {
    #[serde(rename = "courseId")]
    pub course_id: String,
    #[serde(rename = "classId")]
    pub class_id: Option<String>,
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

const LOOKUP_FAILED: &str = "class_lookup_failed";

#[derive(Clone)]
pub struct PricingService {
    catalog: Arc<dyn CatalogApi>,
    max_cart_quantity: u32,
}

impl PricingService {
    pub fn new(catalog: Arc<dyn CatalogApi>, max_cart_quantity: u32) -> Self {
        Self {
            catalog,
            max_cart_quantity: max_cart_quantity.max(1),
        }
    }

    /// The authoritative priced offering for a course.
    ///
    /// `Ok(None)` means the catalog has no class for the course; `Err` means
    /// the catalog could not be reached. Cart pricing treats both as
    /// "unpurchasable"; company splitting fails the whole batch on either.
    pub async fn resolve_latest_offering(
        &self,
        course_id: &str,
    ) -> Result<Option<ClassOffering>, ServiceError> {
        self.catalog.latest_class_for_course(course_id).await
    }

    /// Clamps a requested cart quantity into the configured range.
    pub fn clamp_quantity(&self, quantity: u32) -> u32 {
        quantity.clamp(1, self.max_cart_quantity)
    }

    /// Prices every cart line concurrently and computes the subtotal over
    /// the priceable lines. Side-effect free and safe to call on every cart
    /// mutation; a failing resolution for one line never fails its siblings.
    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn price_cart(&self, lines: &[CartLine]) -> CartPricing {
        let resolutions = join_all(lines.iter().map(|line| async {
            let quantity = self.clamp_quantity(line.quantity);
            let offering = self.resolve_latest_offering(&line.course_id).await;
            let course = self.catalog.course_by_id(&line.course_id).await;
            (line.course_id.clone(), quantity, offering, course)
        }))
        .await;

        let mut priced_lines = Vec::new();
        let mut unpriceable_course_ids = Vec::new();
        let mut subtotal = Decimal::ZERO;

        for (course_id, quantity, offering, course) in resolutions {
            let offering = match offering {
                Ok(Some(offering)) if offering.is_purchasable() => offering,
                Ok(_) => {
                    unpriceable_course_ids.push(course_id);
                    continue;
                }
                Err(e) => {
                    warn!(%course_id, error = %e, "price resolution failed; line unpriceable");
                    unpriceable_course_ids.push(course_id);
                    continue;
                }
            };

            let title = match course {
                Ok(Some(course)) => course.title,
                Ok(None) => None,
                Err(e) => {
                    // Title is cosmetic; a lookup failure never blocks pricing.
                    warn!(%course_id, error = %e, "course title lookup failed");
                    None
                }
            };

            subtotal += offering.price * Decimal::from(quantity);
            priced_lines.push(PricedLine {
                course_id,
                class_id: offering.id,
                title,
                unit_price: offering.price,
                quantity,
                coverage_percent: None,
                company_unit_price: None,
            });
        }

        CartPricing {
            priced_lines,
            unpriceable_course_ids,
            subtotal,
        }
    }

    /// Bulk price lookup keyed by course id. Each id's failure is reported
    /// inline; the batch itself never fails.
    #[instrument(skip(self, course_ids), fields(id_count = course_ids.len()))]
    pub async fn lookup_prices(&self, course_ids: &[String]) -> HashMap<String, PriceEntry> {
        let entries = join_all(course_ids.iter().map(|course_id| async move {
            let entry = match self.resolve_latest_offering(course_id).await {
                Ok(Some(offering)) => PriceEntry {
                    course_id: course_id.clone(),
                    class_id: Some(offering.id),
                    price: Some(offering.price),
                    error: None,
                },
                Ok(None) => PriceEntry {
                    course_id: course_id.clone(),
                    class_id: None,
                    price: None,
                    error: Some(LOOKUP_FAILED),
                },
                Err(e) => {
                    warn!(%course_id, error = %e, "bulk price lookup failed for id");
                    PriceEntry {
                        course_id: course_id.clone(),
                        class_id: None,
                        price: None,
                        error: Some(LOOKUP_FAILED),
                    }
                }
            };
            (course_id.clone(), entry)
        }))
        .await;

        entries.into_iter().collect()
    }
}
