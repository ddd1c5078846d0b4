//! Survey endpoints

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use survey_core::application::{CreateLinksCommand, CreateSurveyCommand, RenameSurveyCommand, SurveyCreated, SurveyView};
use survey_core::{ChartData, OneTimeLink, Survey};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::models::{Body, Empty, Reply};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_surveys).post(create_survey))
        .route("/archived", get(archived_surveys))
        .route(
            "/:survey_uuid",
            get(get_survey).patch(rename_survey).delete(destroy_survey),
        )
        .route("/:survey_uuid/soft-delete", post(soft_delete_survey))
        .route("/:survey_uuid/restore", post(restore_survey))
        .route("/:survey_uuid/charts", get(charts))
        .route("/:survey_uuid/links", get(list_links).post(create_links))
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted_at: DateTime<Utc>,
}

/// Create a survey with its first form version
pub async fn create_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Body(command): Body<CreateSurveyCommand>,
) -> ApiResult<Reply<SurveyCreated>> {
    let created = state.surveys.create_survey(&user, command).await?;
    Ok(Reply::created("survey created", created))
}

pub async fn list_surveys(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Reply<Vec<Survey>>> {
    let surveys = state.surveys.list_surveys(&user).await?;
    Ok(Reply::ok("surveys", surveys))
}

pub async fn get_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
) -> ApiResult<Reply<SurveyView>> {
    let survey = state.surveys.get_survey(&user, survey_uuid).await?;
    Ok(Reply::ok("survey", survey))
}

pub async fn rename_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
    Body(command): Body<RenameSurveyCommand>,
) -> ApiResult<Reply<Survey>> {
    let survey = state.surveys.rename_survey(&user, survey_uuid, command).await?;
    Ok(Reply::ok("survey updated", survey))
}

/// Archive a survey together with its forms and submissions
pub async fn soft_delete_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
) -> ApiResult<Reply<Deleted>> {
    let deleted_at = state.surveys.soft_delete_survey(&user, survey_uuid).await?;
    Ok(Reply::ok("survey deleted", Deleted { deleted_at }))
}

pub async fn restore_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
) -> ApiResult<Reply<Survey>> {
    let survey = state.surveys.restore_survey(&user, survey_uuid).await?;
    Ok(Reply::ok("survey restored", survey))
}

pub async fn archived_surveys(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Reply<Vec<Survey>>> {
    let surveys = state.surveys.archived_surveys(&user).await?;
    Ok(Reply::ok("archived surveys", surveys))
}

pub async fn destroy_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
) -> ApiResult<Reply<Empty>> {
    state.surveys.destroy_survey(&user, survey_uuid).await?;
    Ok(Reply::ok("survey destroyed", Empty {}))
}

/// Option counts of the active form
pub async fn charts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
) -> ApiResult<Reply<Vec<ChartData>>> {
    let charts = state.surveys.charts(&user, survey_uuid).await?;
    Ok(Reply::ok("charts", charts))
}

/// Mint a batch of one-time links
pub async fn create_links(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
    Body(command): Body<CreateLinksCommand>,
) -> ApiResult<Reply<Vec<OneTimeLink>>> {
    let links = state.surveys.create_links(&user, survey_uuid, command).await?;
    Ok(Reply::created("links created", links))
}

pub async fn list_links(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_uuid): Path<Uuid>,
) -> ApiResult<Reply<Vec<OneTimeLink>>> {
    let links = state.surveys.list_links(&user, survey_uuid).await?;
    Ok(Reply::ok("links", links))
}
