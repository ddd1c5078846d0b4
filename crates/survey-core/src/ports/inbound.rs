//! Inbound ports (Use case traits)
//!
//! Every operation takes the acting user; the services enforce ownership and
//! role rules themselves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::dto::*;
use crate::domain::aggregates::{FormSettings, OneTimeLink, Survey, TargetAudience, User};
use crate::domain::services::{ChartData, JobOutcome};
use crate::error::SurveyResult;
use crate::ports::outbound::ScheduledJob;

/// Survey, form version, settings, audience and link use cases
#[async_trait]
pub trait SurveyUseCases: Send + Sync {
    /// Create a survey together with form version 1 and its question tree
    async fn create_survey(&self, actor: &User, command: CreateSurveyCommand) -> SurveyResult<SurveyCreated>;

    /// Live surveys owned by the actor (every survey for admins)
    async fn list_surveys(&self, actor: &User) -> SurveyResult<Vec<Survey>>;

    async fn get_survey(&self, actor: &User, survey: Uuid) -> SurveyResult<SurveyView>;

    async fn rename_survey(&self, actor: &User, survey: Uuid, command: RenameSurveyCommand) -> SurveyResult<Survey>;

    async fn soft_delete_survey(&self, actor: &User, survey: Uuid) -> SurveyResult<DateTime<Utc>>;

    async fn restore_survey(&self, actor: &User, survey: Uuid) -> SurveyResult<Survey>;

    async fn archived_surveys(&self, actor: &User) -> SurveyResult<Vec<Survey>>;

    /// Hard delete (admin only)
    async fn destroy_survey(&self, actor: &User, survey: Uuid) -> SurveyResult<()>;

    /// Add a new form version
    async fn add_form(&self, actor: &User, survey: Uuid, command: AddFormCommand) -> SurveyResult<FormSummary>;

    async fn list_forms(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<FormSummary>>;

    async fn get_form(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<FormView>;

    async fn activate_form(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<FormSummary>;

    async fn soft_delete_form(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<DateTime<Utc>>;

    async fn restore_form(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<FormSummary>;

    async fn archived_forms(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<FormSummary>>;

    async fn destroy_form(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<()>;

    async fn get_settings(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<FormSettings>;

    async fn update_settings(
        &self,
        actor: &User,
        survey: Uuid,
        form: Uuid,
        command: UpdateSettingsCommand,
    ) -> SurveyResult<FormSettings>;

    /// Restrict (or, with `None`, open) a form to a target audience
    async fn assign_target(
        &self,
        actor: &User,
        survey: Uuid,
        form: Uuid,
        command: AssignTargetCommand,
    ) -> SurveyResult<FormView>;

    async fn create_audience(&self, actor: &User, command: CreateAudienceCommand) -> SurveyResult<TargetAudience>;

    async fn list_audiences(&self, actor: &User) -> SurveyResult<Vec<TargetAudience>>;

    async fn create_links(&self, actor: &User, survey: Uuid, command: CreateLinksCommand) -> SurveyResult<Vec<OneTimeLink>>;

    async fn list_links(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<OneTimeLink>>;

    /// Consume a one-time link
    async fn redeem_link(&self, token: Uuid) -> SurveyResult<LinkRedeemed>;

    /// Option counts of the survey's active form
    async fn charts(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<ChartData>>;

    /// Live-flagged charts sent to a new live feed subscriber
    async fn live_snapshot(&self, survey: Uuid) -> SurveyResult<Vec<ChartData>>;

    /// Apply a deferred activation/deactivation that came due
    async fn run_scheduled_job(&self, job: ScheduledJob) -> SurveyResult<JobOutcome>;
}

/// Answer submission and submission management use cases
#[async_trait]
pub trait SubmissionUseCases: Send + Sync {
    /// Submit answers to the survey's active form
    async fn submit(
        &self,
        actor: Option<&User>,
        survey: Uuid,
        command: SubmitAnswersCommand,
    ) -> SurveyResult<SubmissionView>;

    /// Live submissions of the active form
    async fn list_submissions(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<SubmissionView>>;

    async fn get_submission(&self, actor: &User, survey: Uuid, submission: Uuid) -> SurveyResult<SubmissionView>;

    /// Merge new answers into an existing submission
    async fn update_submission(
        &self,
        actor: &User,
        survey: Uuid,
        submission: Uuid,
        command: SubmitAnswersCommand,
    ) -> SurveyResult<SubmissionView>;

    async fn soft_delete_submission(&self, actor: &User, survey: Uuid, submission: Uuid) -> SurveyResult<DateTime<Utc>>;

    async fn restore_submission(&self, actor: &User, survey: Uuid, submission: Uuid) -> SurveyResult<SubmissionView>;

    async fn archived_submissions(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<SubmissionView>>;

    /// Hard delete (admin only)
    async fn destroy_submission(&self, actor: &User, survey: Uuid, submission: Uuid) -> SurveyResult<()>;
}
