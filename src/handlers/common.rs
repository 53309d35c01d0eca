//! Helpers shared across handlers.

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::services::checkout::RedirectTargets;

/// Builds the hosted-session redirect targets from the configured site URL.
///
/// The `{CHECKOUT_SESSION_ID}` placeholder is substituted by the payment
/// provider, not by this crate.
pub fn redirect_targets(
    config: &AppConfig,
    cancel_path: &str,
) -> Result<RedirectTargets, ServiceError> {
    let site_url = config
        .site_url
        .as_deref()
        .map(|url| url.trim_end_matches('/'))
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ServiceError::MissingConfiguration("site_url is not set".into()))?;

    Ok(RedirectTargets {
        success_url: format!(
            "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
            site_url
        ),
        cancel_url: format!("{}{}", site_url, cancel_path),
    })
}
