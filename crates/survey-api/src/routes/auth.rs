//! Login, token and account endpoints

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use survey_core::ports::outbound::{AccountUpdate, OtpDispatch, TokenPair};
use survey_core::{PhoneNumber, RowId, User};

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::models::{Body, Empty, Reply};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/otp", post(send_otp))
        .route("/verify", post(verify_otp))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub phone_number: PhoneNumber,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub phone_number: PhoneNumber,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: RowId,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Send a one-time password to the phone number
pub async fn send_otp(
    State(state): State<AppState>,
    Body(request): Body<OtpRequest>,
) -> ApiResult<Reply<OtpDispatch>> {
    let dispatch = state.auth.send_otp(&request.phone_number).await?;
    Ok(Reply::ok("otp sent", dispatch))
}

/// Exchange a one-time password for a token pair
pub async fn verify_otp(
    State(state): State<AppState>,
    Body(request): Body<VerifyRequest>,
) -> ApiResult<Reply<LoginResponse>> {
    let user = state.auth.verify_otp(&request.phone_number, &request.code).await?;
    let tokens = state.auth.issue_tokens(&user).await?;
    Ok(Reply::ok(
        "logged in",
        LoginResponse {
            user_id: user.id,
            tokens,
        },
    ))
}

pub async fn refresh(
    State(state): State<AppState>,
    Body(request): Body<RefreshRequest>,
) -> ApiResult<Reply<TokenPair>> {
    let tokens = state.auth.refresh_tokens(&request.refresh).await?;
    Ok(Reply::ok("token refreshed", tokens))
}

/// Revoke a refresh token
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Body(request): Body<RefreshRequest>,
) -> ApiResult<Reply<Empty>> {
    state.auth.revoke_token(&request.refresh).await?;
    Ok(Reply::ok("logged out", Empty {}))
}

pub async fn me(CurrentUser(user): CurrentUser) -> ApiResult<Reply<User>> {
    Ok(Reply::ok("current user", user))
}

/// Change role or flags of an account (admin only)
pub async fn update_account(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<RowId>,
    Body(update): Body<AccountUpdate>,
) -> ApiResult<Reply<User>> {
    let user = state.auth.update_account(&actor, user_id, update).await?;
    Ok(Reply::ok("account updated", user))
}
