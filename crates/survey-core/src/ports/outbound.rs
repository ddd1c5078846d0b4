//! Outbound ports
//!
//! Collaborators the core calls after a transaction commits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::aggregates::User;
use crate::domain::value_objects::{PhoneNumber, Role, RowId};
use crate::error::SurveyResult;

/// What a deferred job does to its settings row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobAction {
    Activate,
    Deactivate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledJob {
    pub settings_id: RowId,
    pub action: JobAction,
    pub run_at: DateTime<Utc>,
}

/// Deferred job queue
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Schedule `job`, replacing any pending job for the same settings and action.
    async fn schedule_at(&self, job: ScheduledJob) -> SurveyResult<()>;

    /// Drop the pending job for the settings and action, if any.
    async fn cancel(&self, settings_id: RowId, action: JobAction) -> SurveyResult<()>;
}

/// Push channel for live chart updates
#[async_trait]
pub trait LiveUpdateChannel: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value) -> SurveyResult<()>;
}

/// Topic name of a survey's live feed.
pub fn live_topic(survey_uuid: &uuid::Uuid) -> String {
    format!("live_{}", survey_uuid)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OtpDispatch {
    pub expires_at: DateTime<Utc>,
}

/// Admin edit of an account. Absent fields stay unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AccountUpdate {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_staff: Option<bool>,
}

/// Phone/OTP authentication and token lifecycle
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn send_otp(&self, phone: &PhoneNumber) -> SurveyResult<OtpDispatch>;

    /// Check the code; creates the account on first login.
    async fn verify_otp(&self, phone: &PhoneNumber, code: &str) -> SurveyResult<User>;

    async fn issue_tokens(&self, user: &User) -> SurveyResult<TokenPair>;

    async fn refresh_tokens(&self, refresh_token: &str) -> SurveyResult<TokenPair>;

    async fn revoke_token(&self, refresh_token: &str) -> SurveyResult<()>;

    /// Resolve an access token to its active user.
    async fn authenticate(&self, access_token: &str) -> SurveyResult<User>;

    /// Change role or flags of an account (admin only).
    async fn update_account(&self, actor: &User, user_id: RowId, update: AccountUpdate) -> SurveyResult<User>;
}
