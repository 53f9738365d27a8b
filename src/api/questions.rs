//! Q&A API endpoints.
//!
//! Reads return a full snapshot for the calling viewer. Writes go through the
//! mutation gateway; clients reload after every write.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use futures_util::stream::{self, Stream};
use serde::Serialize;

use super::{error, require_admin, success, ApiResult};
use crate::errors::{AppError, AppErrorWithRevision};
use crate::models::{Question, Reply, TextRequest, ToggleRequest, UpvoteToggleRequest, Viewer};
use crate::qa::{MutationGateway, Snapshot, SnapshotLoader, UpvoteOutcome};
use crate::realtime::ChannelEvent;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteToggleResponse {
    pub outcome: UpvoteOutcome,
    pub voted: bool,
}

/// GET /api/classes/:id/questions - Snapshot of the class's Q&A.
pub async fn get_snapshot(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(class_id): Path<String>,
) -> ApiResult<Snapshot> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let loader = SnapshotLoader::new(state.repo.clone());
    match loader.load(&class_id, viewer.voter.as_ref()).await {
        Ok(snapshot) => success(snapshot, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/classes/:id/questions - Ask a question.
pub async fn submit_question(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(class_id): Path<String>,
    Json(request): Json<TextRequest>,
) -> ApiResult<Question> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let class = match state.repo.require_class(&class_id).await {
        Ok(class) => class,
        Err(e) => return error(e, revision_id),
    };

    let gateway = MutationGateway::new(state.repo.clone(), viewer.role);
    match gateway.submit_question(&class, &request.text).await {
        Ok(question) => {
            tracing::info!(class_id = %class_id, question_id = %question.id, "Question submitted");
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(question, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/questions/:id/upvote/toggle - Add or remove the caller's upvote.
pub async fn toggle_upvote(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(question_id): Path<String>,
    Json(request): Json<UpvoteToggleRequest>,
) -> ApiResult<UpvoteToggleResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let Some(voter) = viewer.voter.as_ref() else {
        return error(
            AppError::Validation(
                "An x-user-id or x-voter-token header is required to vote".to_string(),
            ),
            revision_id,
        );
    };

    let gateway = MutationGateway::new(state.repo.clone(), viewer.role);
    match gateway
        .toggle_upvote(&question_id, voter, request.currently_voted)
        .await
    {
        Ok(outcome) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(
                UpvoteToggleResponse {
                    outcome,
                    voted: outcome.voted(),
                },
                new_revision,
            )
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/questions/:id/answered/toggle - Flip the answered flag.
pub async fn toggle_answered(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(question_id): Path<String>,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<Question> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_admin(&viewer, "mark questions answered") {
        return error(e, revision_id);
    }

    let gateway = MutationGateway::new(state.repo.clone(), viewer.role);
    if let Err(e) = gateway
        .toggle_answered(&question_id, request.current_state)
        .await
    {
        return error(e, revision_id);
    }

    let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
    match state.repo.get_question(&question_id).await {
        Ok(Some(question)) => success(question, new_revision),
        Ok(None) => error(
            AppError::NotFound(format!("Question {} not found", question_id)),
            new_revision,
        ),
        Err(e) => error(e, new_revision),
    }
}

/// DELETE /api/questions/:id - Delete a question with its votes and replies.
pub async fn delete_question(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(question_id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_admin(&viewer, "delete questions") {
        return error(e, revision_id);
    }

    let gateway = MutationGateway::new(state.repo.clone(), viewer.role);
    match gateway.delete_question(&question_id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/questions/:id/replies - Reply to a question.
pub async fn post_reply(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(question_id): Path<String>,
    Json(request): Json<TextRequest>,
) -> ApiResult<Reply> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_admin(&viewer, "post replies") {
        return error(e, revision_id);
    }

    let gateway = MutationGateway::new(state.repo.clone(), viewer.role);
    match gateway.post_reply(&question_id, &request.text).await {
        Ok(reply) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(reply, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/replies/:id - Delete a reply.
pub async fn delete_reply(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(reply_id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_admin(&viewer, "delete replies") {
        return error(e, revision_id);
    }

    let gateway = MutationGateway::new(state.repo.clone(), viewer.role);
    match gateway.delete_reply(&reply_id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/classes/:id/questions/events - Server-sent invalidations.
///
/// Emits `change` for each question insert, update or delete in the class and
/// `resync` when changes were dropped. Either way the client should reload.
pub async fn question_events(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppErrorWithRevision> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    state
        .repo
        .require_class(&class_id)
        .await
        .map_err(|error| AppErrorWithRevision { error, revision_id })?;

    let channel = state.repo.changes().subscribe(class_id.as_str());
    tracing::debug!(class_id = %class_id, "Event stream opened");

    let events = stream::unfold(channel, |mut channel| async move {
        let event = match channel.next().await? {
            ChannelEvent::Changed(change) => Event::default().event("change").json_data(&change),
            ChannelEvent::Lagged(skipped) => {
                Ok(Event::default().event("resync").data(skipped.to_string()))
            }
        };
        Some((event, channel))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
