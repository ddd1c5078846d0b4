//! Form version endpoints
//!
//! Nested under `/surveys/{survey_uuid}/forms`.

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::Router;
use survey_core::application::{AddFormCommand, AssignTargetCommand, FormSummary, FormView, UpdateSettingsCommand};
use survey_core::FormSettings;
use uuid::Uuid;

use super::surveys::Deleted;
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::models::{Body, Empty, Reply};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_forms).post(add_form))
        .route("/archived", get(archived_forms))
        .route("/:form_uuid", get(get_form).delete(destroy_form))
        .route("/:form_uuid/activate", post(activate_form))
        .route("/:form_uuid/soft-delete", post(soft_delete_form))
        .route("/:form_uuid/restore", post(restore_form))
        .route("/:form_uuid/settings", get(get_settings).patch(update_settings))
        .route("/:form_uuid/target", put(assign_target))
}

/// Add a new version; it becomes the active one.
pub async fn add_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
    Body(command): Body<AddFormCommand>,
) -> ApiResult<Reply<FormSummary>> {
    let form = state.surveys.add_form(&user, survey_uuid, command).await?;
    Ok(Reply::created("form created", form))
}

pub async fn list_forms(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
) -> ApiResult<Reply<Vec<FormSummary>>> {
    let forms = state.surveys.list_forms(&user, survey_uuid).await?;
    Ok(Reply::ok("forms", forms))
}

/// Form with settings and its question tree
pub async fn get_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, form_uuid)): Path<(Uuid, Uuid)>,
) -> ApiResult<Reply<FormView>> {
    let form = state.surveys.get_form(&user, survey_uuid, form_uuid).await?;
    Ok(Reply::ok("form", form))
}

pub async fn activate_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, form_uuid)): Path<(Uuid, Uuid)>,
) -> ApiResult<Reply<FormSummary>> {
    let form = state.surveys.activate_form(&user, survey_uuid, form_uuid).await?;
    Ok(Reply::ok("form activated", form))
}

pub async fn soft_delete_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, form_uuid)): Path<(Uuid, Uuid)>,
) -> ApiResult<Reply<Deleted>> {
    let deleted_at = state.surveys.soft_delete_form(&user, survey_uuid, form_uuid).await?;
    Ok(Reply::ok("form deleted", Deleted { deleted_at }))
}

pub async fn restore_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, form_uuid)): Path<(Uuid, Uuid)>,
) -> ApiResult<Reply<FormSummary>> {
    let form = state.surveys.restore_form(&user, survey_uuid, form_uuid).await?;
    Ok(Reply::ok("form restored", form))
}

pub async fn archived_forms(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
) -> ApiResult<Reply<Vec<FormSummary>>> {
    let forms = state.surveys.archived_forms(&user, survey_uuid).await?;
    Ok(Reply::ok("archived forms", forms))
}

pub async fn destroy_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, form_uuid)): Path<(Uuid, Uuid)>,
) -> ApiResult<Reply<Empty>> {
    state.surveys.destroy_form(&user, survey_uuid, form_uuid).await?;
    Ok(Reply::ok("form destroyed", Empty {}))
}

pub async fn get_settings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, form_uuid)): Path<(Uuid, Uuid)>,
) -> ApiResult<Reply<FormSettings>> {
    let settings = state.surveys.get_settings(&user, survey_uuid, form_uuid).await?;
    Ok(Reply::ok("settings", settings))
}

/// Partial settings update. `null` clears a date or the submission cap.
pub async fn update_settings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, form_uuid)): Path<(Uuid, Uuid)>,
    Body(command): Body<UpdateSettingsCommand>,
) -> ApiResult<Reply<FormSettings>> {
    let settings = state
        .surveys
        .update_settings(&user, survey_uuid, form_uuid, command)
        .await?;
    Ok(Reply::ok("settings updated", settings))
}

pub async fn assign_target(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_uuid, form_uuid)): Path<(Uuid, Uuid)>,
    Body(command): Body<AssignTargetCommand>,
) -> ApiResult<Reply<FormView>> {
    let form = state
        .surveys
        .assign_target(&user, survey_uuid, form_uuid, command)
        .await?;
    Ok(Reply::ok("target updated", form))
}
