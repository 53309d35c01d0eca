pub mod checkout;
pub mod company;
pub mod fulfillment;
pub mod pricing;

use std::sync::Arc;

use crate::clients::catalog::CatalogApi;
use crate::clients::payments::PaymentGateway;
use crate::config::AppConfig;
use crate::events::EventSender;

/// Services layer that encapsulates business logic used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<dyn CatalogApi>,
    pub pricing: Arc<pricing::PricingService>,
    pub company: Arc<company::CompanySplitService>,
    pub checkout: Arc<checkout::CheckoutService>,
    pub fulfillment: Arc<fulfillment::FulfillmentService>,
}

impl AppServices {
    pub fn new(
        config: &AppConfig,
        catalog: Arc<dyn CatalogApi>,
        gateway: Arc<dyn PaymentGateway>,
        backend: Arc<dyn fulfillment::FulfillmentBackend>,
        event_sender: EventSender,
    ) -> Self {
        let pricing = Arc::new(pricing::PricingService::new(
            catalog.clone(),
            config.max_cart_quantity,
        ));
        let company = Arc::new(company::CompanySplitService::new(pricing.clone()));
        let checkout = Arc::new(checkout::CheckoutService::new(
            gateway,
            event_sender.clone(),
        ));
        let fulfillment = Arc::new(fulfillment::FulfillmentService::new(
            config.payment_webhook_secret.clone(),
            config.payment_webhook_tolerance_secs,
            checkout.clone(),
            backend,
            event_sender,
        ));

        Self {
            catalog,
            pricing,
            company,
            checkout,
            fulfillment,
        }
    }
}
