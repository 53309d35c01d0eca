use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard JSON error body returned by every handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Course id involved, when the error is about a specific course
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid order: {reason}")]
    InvalidOrder {
        reason: String,
        course_id: Option<String>,
    },

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Catalog unreachable: {0}")]
    CatalogUnreachable(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn invalid_order(reason: impl Into<String>) -> Self {
        ServiceError::InvalidOrder {
            reason: reason.into(),
            course_id: None,
        }
    }

    pub fn invalid_order_for(reason: impl Into<String>, course_id: impl Into<String>) -> Self {
        ServiceError::InvalidOrder {
            reason: reason.into(),
            course_id: Some(course_id.into()),
        }
    }

    /// Single source of truth for error-to-status mapping.
    ///
    /// Payment-provider failures deliberately surface as 500 (the buyer
    /// retries by re-submitting); webhook signature mismatches surface as
    /// 400 so the provider stops redelivering a payload we will never accept.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOrder { .. } | Self::InvalidSignature(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::MissingConfiguration(_)
            | Self::PaymentProvider(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CatalogUnreachable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message suitable for HTTP responses. Internal details are not leaked.
    pub fn response_message(&self) -> String {
        match self {
            Self::InternalError(_) => "Internal server error".to_string(),
            Self::InvalidOrder { reason, .. } => reason.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let course_id = match &self {
            ServiceError::InvalidOrder { course_id, .. } => course_id.clone(),
            _ => None,
        };

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            course_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}
