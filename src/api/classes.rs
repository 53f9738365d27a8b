//! Class API endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::{error, require_admin, success, ApiResult};
use crate::errors::AppError;
use crate::models::{ClassSession, CreateClassRequest, ToggleRequest, UpdateClassRequest, Viewer};
use crate::qa::MutationGateway;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ClassListQuery {
    /// Only classes starting on this UTC day (`YYYY-MM-DD`).
    pub day: Option<String>,
}

/// GET /api/classes - List classes, optionally for one day.
pub async fn list_classes(
    State(state): State<AppState>,
    Query(query): Query<ClassListQuery>,
) -> ApiResult<Vec<ClassSession>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let day = match query.day.as_deref().map(|d| d.parse::<NaiveDate>()) {
        None => None,
        Some(Ok(day)) => Some(day),
        Some(Err(_)) => {
            return error(
                AppError::Validation("day must be formatted as YYYY-MM-DD".to_string()),
                revision_id,
            )
        }
    };

    match state.repo.list_classes(day).await {
        Ok(classes) => success(classes, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/classes/:id - Get a single class.
pub async fn get_class(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ClassSession> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.require_class(&id).await {
        Ok(class) => success(class, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/classes - Schedule a class.
pub async fn create_class(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(request): Json<CreateClassRequest>,
) -> ApiResult<ClassSession> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_admin(&viewer, "schedule classes") {
        return error(e, revision_id);
    }
    if request.title.trim().is_empty() {
        return error(
            AppError::Validation("Title is required".to_string()),
            revision_id,
        );
    }
    if request.duration_minutes <= 0 {
        return error(
            AppError::Validation("Duration must be positive".to_string()),
            revision_id,
        );
    }

    match state.repo.create_class(&request).await {
        Ok(class) => {
            tracing::info!(class_id = %class.id, title = %class.title, "Class scheduled");
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(class, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/classes/:id - Edit a class.
pub async fn update_class(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Json(request): Json<UpdateClassRequest>,
) -> ApiResult<ClassSession> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_admin(&viewer, "edit classes") {
        return error(e, revision_id);
    }
    if request.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return error(
            AppError::Validation("Title cannot be empty".to_string()),
            revision_id,
        );
    }
    if request.duration_minutes.is_some_and(|d| d <= 0) {
        return error(
            AppError::Validation("Duration must be positive".to_string()),
            revision_id,
        );
    }

    match state.repo.update_class(&id, &request).await {
        Ok(class) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(class, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/classes/:id - Delete a class and everything attached to it.
pub async fn delete_class(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_admin(&viewer, "delete classes") {
        return error(e, revision_id);
    }

    match state.repo.delete_class(&id).await {
        Ok(()) => {
            tracing::info!(class_id = %id, "Class deleted");
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/classes/:id/qa/toggle - Open or close the Q&A.
pub async fn toggle_qa(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<ClassSession> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let gateway = MutationGateway::new(state.repo.clone(), viewer.role);
    match gateway.toggle_qa_open(&id, request.current_state).await {
        Ok(open) => {
            tracing::info!(class_id = %id, open, "Q&A toggled");
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            match state.repo.require_class(&id).await {
                Ok(class) => success(class, new_revision),
                Err(e) => error(e, new_revision),
            }
        }
        Err(e) => error(e, revision_id),
    }
}
