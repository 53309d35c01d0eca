//! Client for the payment provider's hosted checkout session API.
//!
//! The provider is a black box behind [`PaymentGateway`]: this crate builds
//! a session request with provider-native line items and correlation
//! metadata, and gets back a redirect URL. Session creation is never
//! retried here; the buyer retries by re-submitting.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// One provider-native line item: integral minor units, fixed currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLineItem {
    pub name: String,
    pub description: Option<String>,
    pub unit_amount_minor: i64,
    pub quantity: u32,
}

/// A request for a hosted, one-time-payment checkout session.
///
/// `metadata` is the only channel correlating the later webhook back to the
/// order draft; it must carry `order_id` and `order_kind`.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

/// A created hosted session.
#[derive(Debug, Clone)]
pub struct HostedSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<HostedSession, ServiceError>;
}

/// Stripe-style gateway speaking the form-encoded checkout sessions API.
#[derive(Debug, Clone)]
pub struct StripeGateway {
    http: reqwest::Client,
    api_url: String,
    secret_key: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorEnvelope {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        if config.payment_secret_key.trim().is_empty() {
            return Err(ServiceError::MissingConfiguration(
                "payment_secret_key is not set".to_string(),
            ));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.payment_api_url.trim_end_matches('/').to_string(),
            secret_key: config.payment_secret_key.clone(),
            currency: config.currency.to_lowercase(),
        })
    }

    /// Flattens the request into the provider's bracketed form encoding.
    fn form_pairs(&self, request: &CheckoutSessionRequest) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
        ];

        for (i, item) in request.line_items.iter().enumerate() {
            pairs.push((
                format!("line_items[{}][quantity]", i),
                item.quantity.to_string(),
            ));
            pairs.push((
                format!("line_items[{}][price_data][currency]", i),
                self.currency.clone(),
            ));
            pairs.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_amount_minor.to_string(),
            ));
            pairs.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            if let Some(description) = &item.description {
                pairs.push((
                    format!("line_items[{}][price_data][product_data][description]", i),
                    description.clone(),
                ));
            }
        }

        for (key, value) in &request.metadata {
            pairs.push((format!("metadata[{}]", key), value.clone()));
        }

        pairs
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(line_count = request.line_items.len()))]
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<HostedSession, ServiceError> {
        let pairs = self.form_pairs(&request);

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_url))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(&pairs)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentProvider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ProviderErrorEnvelope>()
                .await
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| format!("provider responded {}", status));
            return Err(ServiceError::PaymentProvider(message));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::PaymentProvider(e.to_string()))?;

        let url = session.url.ok_or_else(|| {
            ServiceError::PaymentProvider("no checkout URL returned".to_string())
        })?;

        Ok(HostedSession {
            id: session.id,
            url,
        })
    }
}
