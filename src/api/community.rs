//! Attendance, speaker suggestion and slide endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{error, require_admin, success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    Attendance, CheckInRequest, CreateSlideRequest, CreateSuggestionRequest, Slide,
    SpeakerSuggestion, Viewer,
};
use crate::AppState;

/// Account id of a signed-in caller, or `Unauthorized`.
fn require_user<'a>(viewer: &'a Viewer, action: &str) -> Result<&'a str, AppError> {
    viewer
        .voter
        .as_ref()
        .and_then(|v| v.user_id())
        .ok_or_else(|| AppError::Unauthorized(format!("Sign in to {}", action)))
}

// ==================== ATTENDANCE ====================

/// GET /api/classes/:id/attendance - List check-ins.
pub async fn list_attendance(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> ApiResult<Vec<Attendance>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_attendance(&class_id).await {
        Ok(attendance) => success(attendance, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/classes/:id/attendance - Check the caller in.
pub async fn check_in(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(class_id): Path<String>,
    Json(request): Json<CheckInRequest>,
) -> ApiResult<Attendance> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let user_id = match require_user(&viewer, "check in") {
        Ok(user_id) => user_id,
        Err(e) => return error(e, revision_id),
    };
    let name = request.attendee_name.trim();
    if name.is_empty() {
        return error(
            AppError::Validation("Attendee name is required".to_string()),
            revision_id,
        );
    }
    if let Err(e) = state.repo.require_class(&class_id).await {
        return error(e, revision_id);
    }

    match state.repo.check_in(&class_id, user_id, name).await {
        Ok(attendance) => {
            tracing::info!(class_id = %class_id, user_id = %user_id, "Checked in");
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(attendance, new_revision)
        }
        Err(AppError::Conflict(_)) => error(
            AppError::Conflict("Already checked in to this class".to_string()),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/classes/:id/attendance - Check the caller out.
pub async fn check_out(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(class_id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let user_id = match require_user(&viewer, "check out") {
        Ok(user_id) => user_id,
        Err(e) => return error(e, revision_id),
    };

    match state.repo.check_out(&class_id, user_id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

// ==================== SPEAKER SUGGESTIONS ====================

/// GET /api/classes/:id/suggestions - List suggestions, most voted first.
pub async fn list_suggestions(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(class_id): Path<String>,
) -> ApiResult<Vec<SpeakerSuggestion>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let user_id = viewer.voter.as_ref().and_then(|v| v.user_id());
    match state.repo.list_suggestions(&class_id, user_id).await {
        Ok(suggestions) => success(suggestions, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/classes/:id/suggestions - Suggest a guest speaker.
pub async fn create_suggestion(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
    Json(request): Json<CreateSuggestionRequest>,
) -> ApiResult<SpeakerSuggestion> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.trim().is_empty() || request.topic.trim().is_empty() {
        return error(
            AppError::Validation("Speaker name and topic are required".to_string()),
            revision_id,
        );
    }
    if let Err(e) = state.repo.require_class(&class_id).await {
        return error(e, revision_id);
    }

    match state.repo.create_suggestion(&class_id, &request).await {
        Ok(suggestion) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(suggestion, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/suggestions/:id/vote - Vote for a speaker, once per member.
pub async fn vote_suggestion(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(suggestion_id): Path<String>,
) -> ApiResult<SpeakerSuggestion> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let user_id = match require_user(&viewer, "vote for speakers") {
        Ok(user_id) => user_id,
        Err(e) => return error(e, revision_id),
    };

    match state.repo.vote_suggestion(&suggestion_id, user_id).await {
        Ok(suggestion) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(suggestion, new_revision)
        }
        Err(AppError::Conflict(_)) => error(
            AppError::Conflict("You already voted for this speaker".to_string()),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

// ==================== SLIDES ====================

/// GET /api/classes/:id/slides - List published slides.
pub async fn list_slides(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> ApiResult<Vec<Slide>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_slides(&class_id).await {
        Ok(slides) => success(slides, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/classes/:id/slides - Publish a slide link.
pub async fn create_slide(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(class_id): Path<String>,
    Json(request): Json<CreateSlideRequest>,
) -> ApiResult<Slide> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_admin(&viewer, "publish slides") {
        return error(e, revision_id);
    }
    if request.title.trim().is_empty() {
        return error(
            AppError::Validation("Slide title is required".to_string()),
            revision_id,
        );
    }
    let url = request.url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return error(
            AppError::Validation("Slide url must be an http(s) link".to_string()),
            revision_id,
        );
    }
    if let Err(e) = state.repo.require_class(&class_id).await {
        return error(e, revision_id);
    }

    match state.repo.create_slide(&class_id, &request).await {
        Ok(slide) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(slide, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/slides/:id - Remove a slide.
pub async fn delete_slide(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(slide_id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_admin(&viewer, "delete slides") {
        return error(e, revision_id);
    }

    match state.repo.delete_slide(&slide_id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
