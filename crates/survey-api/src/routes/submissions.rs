//! Submission endpoints
//!
//! Nested under `/surveys/{survey_uuid}/submissions`.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use survey_core::application::{SubmissionView, SubmitAnswersCommand};
use uuid::Uuid;

use super::surveys::Deleted;
use crate::auth::{CurrentUser, MaybeUser};
use crate::error::ApiResult;
use crate::models::{Body, Empty, Reply};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_submissions).post(submit))
        .route("/archived", get(archived_submissions))
        .route(
            "/:submission_uuid",
            get(get_submission).patch(update_submission).delete(destroy_submission),
        )
        .route("/:submission_uuid/soft-delete", post(soft_delete_submission))
        .route("/:submission_uuid/restore", post(restore_submission))
}

/// Answer the active form; anonymous callers are accepted.
pub async fn submit(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(survey_uuid): Path<Uuid>,
    Body(command): Body<SubmitAnswersCommand>,
) -> ApiResult<Reply<SubmissionView>> {
    let submission = state.submissions.submit(user.as_ref(), survey_uuid, command).await?;
    Ok(Reply::created("answers submitted", submission))
}

pub async fn list_submissions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
) -> ApiResult<Reply<Vec<SubmissionView>>> {
    let submissions = state.submissions.list_submissions(&user, survey_uuid).await?;
    Ok(Reply::ok("submissions", submissions))
}

pub async fn get_submission(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, submission_uuid)): Path<(Uuid, Uuid)>,
) -> ApiResult<Reply<SubmissionView>> {
    let submission = state
        .submissions
        .get_submission(&user, survey_uuid, submission_uuid)
        .await?;
    Ok(Reply::ok("submission", submission))
}

/// Merge answers into an editable submission
pub async fn update_submission(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, submission_uuid)): Path<(Uuid, Uuid)>,
    Body(command): Body<SubmitAnswersCommand>,
) -> ApiResult<Reply<SubmissionView>> {
    let submission = state
        .submissions
        .update_submission(&user, survey_uuid, submission_uuid, command)
        .await?;
    Ok(Reply::ok("submission updated", submission))
}

pub async fn soft_delete_submission(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, submission_uuid)): Path<(Uuid, Uuid)>,
) -> ApiResult<Reply<Deleted>> {
    let deleted_at = state
        .submissions
        .soft_delete_submission(&user, survey_uuid, submission_uuid)
        .await?;
    Ok(Reply::ok("submission deleted", Deleted { deleted_at }))
}

pub async fn restore_submission(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, submission_uuid)): Path<(Uuid, Uuid)>,
) -> ApiResult<Reply<SubmissionView>> {
    let submission = state
        .submissions
        .restore_submission(&user, survey_uuid, submission_uuid)
        .await?;
    Ok(Reply::ok("submission restored", submission))
}

pub async fn archived_submissions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
) -> ApiResult<Reply<Vec<SubmissionView>>> {
    let submissions = state.submissions.archived_submissions(&user, survey_uuid).await?;
    Ok(Reply::ok("archived submissions", submissions))
}

pub async fn destroy_submission(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, submission_uuid)): Path<(Uuid, Uuid)>,
) -> ApiResult<Reply<Empty>> {
    state
        .submissions
        .destroy_submission(&user, survey_uuid, submission_uuid)
        .await?;
    Ok(Reply::ok("submission destroyed", Empty {}))
}
