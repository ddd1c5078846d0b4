//! Target audience endpoints

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use survey_core::application::CreateAudienceCommand;
use survey_core::TargetAudience;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::models::{Body, Reply};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_audiences).post(create_audience))
}

pub async fn create_audience(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Body(command): Body<CreateAudienceCommand>,
) -> ApiResult<Reply<TargetAudience>> {
    let audience = state.surveys.create_audience(&user, command).await?;
    Ok(Reply::created("target audience created", audience))
}

pub async fn list_audiences(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Reply<Vec<TargetAudience>>> {
    let audiences = state.surveys.list_audiences(&user).await?;
    Ok(Reply::ok("target audiences", audiences))
}
