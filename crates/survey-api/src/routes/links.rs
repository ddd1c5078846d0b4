//! One-time link redemption

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use survey_core::application::LinkRedeemed;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::Reply;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:token", get(redeem_link))
}

/// Consume the link and point the caller at the active form. Open to
/// anonymous callers.
pub async fn redeem_link(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
) -> ApiResult<Reply<LinkRedeemed>> {
    let redeemed = state.surveys.redeem_link(token).await?;
    Ok(Reply::ok("link redeemed", redeemed))
}
