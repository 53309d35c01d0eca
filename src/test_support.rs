//! Shared fakes for unit tests: an in-memory catalog, a recording payment
//! gateway, and a counting fulfillment backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::clients::catalog::{CatalogApi, CoursePatch};
use crate::clients::payments::{CheckoutSessionRequest, HostedSession, PaymentGateway};
use crate::errors::ServiceError;
use crate::models::{CheckoutDraft, ClassOffering, Course, FulfillmentEvent};
use crate::services::fulfillment::FulfillmentBackend;

/// In-memory catalog: priced classes per course, course titles, plus ids
/// that fail with a transient error.
#[derive(Default)]
pub struct FakeCatalog {
    pub classes: HashMap<String, ClassOffering>,
    pub failing: Vec<String>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, course_id: &str, class_id: &str, price: Decimal) -> Self {
        self.classes.insert(
            course_id.to_string(),
            ClassOffering {
                id: class_id.to_string(),
                course_id: course_id.to_string(),
                price,
                date_created: None,
                date_updated: None,
            },
        );
        self
    }

    pub fn with_failure(mut self, course_id: &str) -> Self {
        self.failing.push(course_id.to_string());
        self
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn latest_class_for_course(
        &self,
        course_id: &str,
    ) -> Result<Option<ClassOffering>, ServiceError> {
        if self.failing.iter().any(|id| id == course_id) {
            return Err(ServiceError::CatalogUnreachable("connection refused".into()));
        }
        Ok(self.classes.get(course_id).cloned())
    }

    async fn class_by_id(&self, class_id: &str) -> Result<Option<ClassOffering>, ServiceError> {
        Ok(self.classes.values().find(|c| c.id == class_id).cloned())
    }

    async fn course_by_id(&self, course_id: &str) -> Result<Option<Course>, ServiceError> {
        Ok(Some(Course {
            id: course_id.to_string(),
            title: Some(format!("Course {}", course_id)),
            description: None,
            summary: None,
        }))
    }

    async fn patch_course(
        &self,
        course_id: &str,
        patch: &CoursePatch,
    ) -> Result<Value, ServiceError> {
        Ok(serde_json::json!({ "data": { "id": course_id, "title": patch.title } }))
    }
}

/// Gateway that records every session request and returns a fixed URL.
#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<CheckoutSessionRequest>>,
    pub fail_with: Mutex<Option<String>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_with: Mutex::new(Some(message.to_string())),
        }
    }

    pub fn last_request(&self) -> Option<CheckoutSessionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<HostedSession, ServiceError> {
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(ServiceError::PaymentProvider(message));
        }
        self.requests.lock().unwrap().push(request);
        Ok(HostedSession {
            id: "cs_test_123".into(),
            url: "https://checkout.example.com/c/pay/cs_test_123".into(),
        })
    }
}

/// Backend that counts fulfillment invocations per order id.
#[derive(Default)]
pub struct CountingBackend {
    pub individual: Mutex<Vec<String>>,
    pub company: Mutex<Vec<String>>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_calls(&self) -> usize {
        self.individual.lock().unwrap().len() + self.company.lock().unwrap().len()
    }
}

#[async_trait]
impl FulfillmentBackend for CountingBackend {
    async fn fulfill_individual(
        &self,
        event: &FulfillmentEvent,
        _draft: Option<&CheckoutDraft>,
    ) -> Result<(), ServiceError> {
        self.individual.lock().unwrap().push(event.order_id.clone());
        Ok(())
    }

    async fn fulfill_company(
        &self,
        event: &FulfillmentEvent,
        _draft: Option<&CheckoutDraft>,
    ) -> Result<(), ServiceError> {
        self.company.lock().unwrap().push(event.order_id.clone());
        Ok(())
    }
}
