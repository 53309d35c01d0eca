//! Client for the catalog backend (courses, priced classes, page content).
//!
//! The backend is consumed as a read/patch HTTP API. Transport failures are
//! surfaced as [`ServiceError::CatalogUnreachable`] and kept distinct from
//! "no data" (`Ok(None)`) so callers can choose a retry policy; the pricing
//! layer collapses both into "unpurchasable" for individual carts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::{ClassOffering, Course};

/// Read/patch access to the catalog backend.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// The most recently updated priced class for a course, falling back to
    /// the most recently created one when no update timestamps exist.
    async fn latest_class_for_course(
        &self,
        course_id: &str,
    ) -> Result<Option<ClassOffering>, ServiceError>;

    async fn class_by_id(&self, class_id: &str) -> Result<Option<ClassOffering>, ServiceError>;

    async fn course_by_id(&self, course_id: &str) -> Result<Option<Course>, ServiceError>;

    /// Applies an allow-listed partial update to a course.
    async fn patch_course(&self, course_id: &str, patch: &CoursePatch)
        -> Result<Value, ServiceError>;
}

/// The only fields a course patch may carry. Anything else in an inbound
/// payload is silently dropped before dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoursePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl CoursePatch {
    /// Extracts the patchable fields from an arbitrary JSON payload,
    /// keeping only string-typed values for allow-listed keys.
    pub fn from_value(body: &Value) -> Self {
        let pick = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        };
        Self {
            title: pick("title"),
            description: pick("description"),
            summary: pick("summary"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.summary.is_none()
    }
}

/// HTTP implementation against a Directus-style items API.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ItemEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct RawClass {
    id: Value,
    course: Value,
    price: Option<Decimal>,
    date_created: Option<DateTime<Utc>>,
    date_updated: Option<DateTime<Utc>>,
}

impl RawClass {
    fn into_offering(self) -> ClassOffering {
        ClassOffering {
            id: value_to_id(&self.id),
            course_id: value_to_id(&self.course),
            price: self.price.unwrap_or(Decimal::ZERO),
            date_created: self.date_created,
            date_updated: self.date_updated,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCourse {
    id: Value,
    title: Option<String>,
    description: Option<String>,
    summary: Option<String>,
}

/// Catalog ids may arrive as strings or numbers; normalize to strings.
fn value_to_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl HttpCatalogClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.catalog_url.trim_end_matches('/').to_string(),
            token: config.catalog_token.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn query_classes(
        &self,
        course_id: &str,
        sort: &str,
    ) -> Result<Option<ClassOffering>, ServiceError> {
        let response = self
            .request(reqwest::Method::GET, "/items/Classes")
            .query(&[
                ("filter[course][_eq]", course_id),
                ("sort", sort),
                ("limit", "1"),
                ("fields", "id,course,price,date_created,date_updated"),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::CatalogUnreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::CatalogUnreachable(format!(
                "catalog responded {}",
                response.status()
            )));
        }

        let envelope: ItemsEnvelope<RawClass> = response
            .json()
            .await
            .map_err(|e| ServiceError::CatalogUnreachable(e.to_string()))?;

        Ok(envelope.data.into_iter().next().map(RawClass::into_offering))
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogClient {
    #[instrument(skip(self))]
    async fn latest_class_for_course(
        &self,
        course_id: &str,
    ) -> Result<Option<ClassOffering>, ServiceError> {
        // Two-pass selection: newest update wins, newest creation breaks
        // the tie when update timestamps are absent.
        if let Some(offering) = self.query_classes(course_id, "-date_updated").await? {
            return Ok(Some(offering));
        }
        self.query_classes(course_id, "-date_created").await
    }

    #[instrument(skip(self))]
    async fn class_by_id(&self, class_id: &str) -> Result<Option<ClassOffering>, ServiceError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/items/Classes/{}", class_id),
            )
            .query(&[("fields", "id,course,price,date_created,date_updated")])
            .send()
            .await
            .map_err(|e| ServiceError::CatalogUnreachable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ServiceError::CatalogUnreachable(format!(
                "catalog responded {}",
                response.status()
            )));
        }

        let envelope: ItemEnvelope<RawClass> = response
            .json()
            .await
            .map_err(|e| ServiceError::CatalogUnreachable(e.to_string()))?;

        Ok(Some(envelope.data.into_offering()))
    }

    #[instrument(skip(self))]
    async fn course_by_id(&self, course_id: &str) -> Result<Option<Course>, ServiceError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/items/courses/{}", course_id),
            )
            .query(&[("fields", "id,title,description,summary")])
            .send()
            .await
            .map_err(|e| ServiceError::CatalogUnreachable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ServiceError::CatalogUnreachable(format!(
                "catalog responded {}",
                response.status()
            )));
        }

        let envelope: ItemEnvelope<RawCourse> = response
            .json()
            .await
            .map_err(|e| ServiceError::CatalogUnreachable(e.to_string()))?;

        let raw = envelope.data;
        Ok(Some(Course {
            id: value_to_id(&raw.id),
            title: raw.title,
            description: raw.description,
            summary: raw.summary,
        }))
    }

    #[instrument(skip(self, patch))]
    async fn patch_course(
        &self,
        course_id: &str,
        patch: &CoursePatch,
    ) -> Result<Value, ServiceError> {
        if self.token.is_none() {
            return Err(ServiceError::MissingConfiguration(
                "catalog_token is required for course patches".to_string(),
            ));
        }

        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/items/courses/{}", course_id),
            )
            .json(patch)
            .send()
            .await
            .map_err(|e| ServiceError::CatalogUnreachable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(format!(
                "Course {} not found",
                course_id
            )));
        }
        if !response.status().is_success() {
            return Err(ServiceError::CatalogUnreachable(format!(
                "catalog responded {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::CatalogUnreachable(e.to_string()))
    }
}
