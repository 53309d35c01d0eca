//! Course read and allow-listed patch endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;
use tracing::instrument;

use crate::clients::catalog::CoursePatch;
use crate::errors::ServiceError;
use crate::events::Event;
use crate::models::Course;
use crate::AppState;

#[instrument(skip(state))]
pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<Course>, ServiceError> {
    let course = state
        .services
        .catalog
        .course_by_id(&course_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Course {} not found", course_id)))?;
    Ok(Json(course))
}

/// Accepts an arbitrary JSON body, forwards only the allow-listed fields.
#[instrument(skip(state, body))]
pub async fn patch_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ServiceError> {
    let patch = CoursePatch::from_value(&body);
    if patch.is_empty() {
        return Err(ServiceError::ValidationError(
            "no updatable fields in patch".into(),
        ));
    }

    let updated = state.services.catalog.patch_course(&course_id, &patch).await?;

    state
        .event_sender
        .send_or_log(Event::CoursePatched {
            course_id: course_id.clone(),
        })
        .await;

    Ok(Json(updated))
}
