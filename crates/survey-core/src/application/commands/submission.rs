//! Answer submission and submission management.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::{any_survey, live_survey};
use crate::application::dispatcher::EventDispatcher;
use crate::application::dto::*;
use crate::domain::aggregates::{AnswerSet, Survey, User};
use crate::domain::events::{DomainEvent, SubmissionEvent};
use crate::domain::services::answer_engine::{self, WriteMode};
use crate::domain::services::{access, cascade};
use crate::domain::value_objects::RowId;
use crate::error::{SurveyError, SurveyResult};
use crate::infrastructure::persistence::{InMemoryStore, Tables};
use crate::ports::inbound::SubmissionUseCases;

/// Submission application service
pub struct SubmissionService {
    store: Arc<InMemoryStore>,
    dispatcher: EventDispatcher,
}

impl SubmissionService {
    pub fn new(store: Arc<InMemoryStore>, dispatcher: EventDispatcher) -> Self {
        Self { store, dispatcher }
    }
}

fn submission_view(tables: &Tables, answer_set_id: RowId) -> SurveyResult<SubmissionView> {
    let answer_set = tables
        .answer_set(answer_set_id)
        .cloned()
        .ok_or(SurveyError::AnswerSetDoesNotExist)?;
    let form_uuid = tables
        .form(answer_set.form_id)
        .map(|form| form.uuid)
        .ok_or(SurveyError::FormDoesNotExist)?;

    let answers = tables
        .answers_of(answer_set_id)?
        .iter()
        .filter_map(|answer| {
            tables
                .question(answer.question_id)
                .map(|question| AnswerView::new(answer, question))
        })
        .collect();

    Ok(SubmissionView {
        user_id: answer_set.user_id,
        answer_set,
        form_uuid,
        answers,
    })
}

/// Answer set of `survey` by public id, archived or not.
fn answer_set_of(tables: &Tables, survey: &Survey, uuid: Uuid) -> SurveyResult<AnswerSet> {
    tables
        .answer_set_by_uuid(uuid)
        .filter(|set| tables.form(set.form_id).is_some_and(|form| form.survey_id == survey.id))
        .cloned()
        .ok_or(SurveyError::AnswerSetDoesNotExist)
}

fn active_form_id(survey: &Survey) -> SurveyResult<RowId> {
    survey.active_version.ok_or(SurveyError::FormNotFound)
}

#[async_trait]
impl SubmissionUseCases for SubmissionService {
    async fn submit(
        &self,
        actor: Option<&User>,
        survey: Uuid,
        command: SubmitAnswersCommand,
    ) -> SurveyResult<SubmissionView> {
        if let Some(user) = actor {
            access::ensure_active_account(user)?;
        }
        let now = Utc::now();

        let (view, events) = self.store.transaction(|tx, outbox| {
            let survey = live_survey(tx, survey)?.clone();
            let form = tx
                .form(active_form_id(&survey)?)
                .cloned()
                .ok_or(SurveyError::FormNotFound)?;

            access::check_submission_allowed(tx, &form, actor, now)?;

            let answer_set = AnswerSet::new(form.id, actor.map(|user| user.id), command.metadata.clone(), now);
            let answer_set_id = tx.insert_answer_set(answer_set)?;
            let report = answer_engine::submit(tx, answer_set_id, &command.metadata, WriteMode::Create)?;

            info!(
                survey_id = survey.id,
                form_id = form.id,
                answer_set_id,
                written = report.written,
                skipped = report.skipped.len(),
                "Answers submitted"
            );
            outbox.record(DomainEvent::Submission(SubmissionEvent::Submitted {
                survey_id: survey.id,
                form_id: form.id,
                answer_set_id,
            }));
            submission_view(tx, answer_set_id)
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(view)
    }

    async fn list_submissions(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<SubmissionView>> {
        access::ensure_active_account(actor)?;

        self.store.read(|tables| {
            let survey = live_survey(tables, survey)?;
            access::ensure_survey_owner_or_admin(actor, survey)?;
            let form_id = active_form_id(survey)?;

            tables
                .answer_sets_of(form_id)
                .filter(|set| !set.is_deleted())
                .map(|set| submission_view(tables, set.id))
                .collect()
        })
    }

    async fn get_submission(&self, actor: &User, survey: Uuid, submission: Uuid) -> SurveyResult<SubmissionView> {
        access::ensure_active_account(actor)?;

        self.store.read(|tables| {
            let survey = live_survey(tables, survey)?;
            let answer_set = answer_set_of(tables, survey, submission)?;
            if answer_set.is_deleted() {
                return Err(SurveyError::AnswerSetDoesNotExist);
            }
            access::ensure_can_view_submission(actor, survey, &answer_set)?;
            submission_view(tables, answer_set.id)
        })
    }

    async fn update_submission(
        &self,
        actor: &User,
        survey: Uuid,
        submission: Uuid,
        command: SubmitAnswersCommand,
    ) -> SurveyResult<SubmissionView> {
        access::ensure_active_account(actor)?;
        let now = Utc::now();

        let (view, events) = self.store.transaction(|tx, outbox| {
            let survey = live_survey(tx, survey)?.clone();
            let answer_set = answer_set_of(tx, &survey, submission)?;
            if answer_set.is_deleted() {
                return Err(SurveyError::AnswerSetDoesNotExist);
            }

            let editable = tx
                .settings_of(answer_set.form_id)
                .is_some_and(|settings| settings.is_editable);
            if !editable {
                return Err(SurveyError::FormNotEditable);
            }
            access::ensure_submission_owner(actor, &answer_set)?;

            let row = tx.answer_set_mut(answer_set.id)?;
            row.merge_metadata(command.metadata, now);
            let merged = row.metadata.clone();
            let report = answer_engine::submit(tx, answer_set.id, &merged, WriteMode::Update)?;
            tx.answer_set_mut(answer_set.id)?.metadata.retain(|_, value| !value.is_null());

            info!(answer_set_id = answer_set.id, written = report.written, "Answers updated");
            outbox.record(DomainEvent::Submission(SubmissionEvent::Updated {
                survey_id: survey.id,
                form_id: answer_set.form_id,
                answer_set_id: answer_set.id,
            }));
            submission_view(tx, answer_set.id)
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(view)
    }

    async fn soft_delete_submission(&self, actor: &User, survey: Uuid, submission: Uuid) -> SurveyResult<DateTime<Utc>> {
        access::ensure_active_account(actor)?;

        let (deleted_at, events) = self.store.transaction(|tx, outbox| {
            let survey = live_survey(tx, survey)?.clone();
            let answer_set = answer_set_of(tx, &survey, submission)?;
            access::ensure_can_view_submission(actor, &survey, &answer_set)?;
            cascade::soft_delete_answer_set(tx, outbox, answer_set.id, Utc::now())
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(deleted_at)
    }

    async fn restore_submission(&self, actor: &User, survey: Uuid, submission: Uuid) -> SurveyResult<SubmissionView> {
        access::ensure_active_account(actor)?;

        let (view, events) = self.store.transaction(|tx, outbox| {
            let survey = live_survey(tx, survey)?.clone();
            let answer_set = answer_set_of(tx, &survey, submission)?;
            access::ensure_can_view_submission(actor, &survey, &answer_set)?;
            cascade::restore_answer_set(tx, outbox, answer_set.id)?;
            submission_view(tx, answer_set.id)
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(view)
    }

    async fn archived_submissions(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<SubmissionView>> {
        access::ensure_active_account(actor)?;

        let archived = self.store.read(|tables| {
            let survey = live_survey(tables, survey)?;
            access::ensure_survey_owner_or_admin(actor, survey)?;
            let form_id = active_form_id(survey)?;

            tables
                .answer_sets_of(form_id)
                .filter(|set| set.is_deleted())
                .map(|set| submission_view(tables, set.id))
                .collect::<SurveyResult<Vec<_>>>()
        })?;

        if archived.is_empty() {
            return Err(SurveyError::NoArchivedSubmissions);
        }
        Ok(archived)
    }

    async fn destroy_submission(&self, actor: &User, survey: Uuid, submission: Uuid) -> SurveyResult<()> {
        access::ensure_active_account(actor)?;
        access::ensure_admin(actor)?;

        let ((), events) = self.store.transaction(|tx, outbox| {
            let survey = any_survey(tx, survey)?.clone();
            let answer_set_id = answer_set_of(tx, &survey, submission)?.id;
            cascade::destroy_answer_set(tx, outbox, answer_set_id)
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(())
    }
}
