//! Survey, form version, settings, audience and link use cases.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::{any_form, any_survey, live_form, live_survey};
use crate::application::dispatcher::EventDispatcher;
use crate::application::dto::*;
use crate::domain::aggregates::{
    FormSettings, OneTimeLink, Survey, SurveyForm, TargetAudience, User,
};
use crate::domain::events::{DomainEvent, FormEvent, Outbox, SurveyEvent};
use crate::domain::services::compiler::definition_title;
use crate::domain::services::{access, cascade, charts, versioning};
use crate::domain::services::{ChartData, JobOutcome, QuestionCompiler, QuestionTree};
use crate::domain::value_objects::RowId;
use crate::error::{FieldErrors, SurveyError, SurveyResult};
use crate::infrastructure::persistence::{InMemoryStore, Tables};
use crate::ports::inbound::SurveyUseCases;
use crate::ports::outbound::ScheduledJob;

/// Upper bound on the links minted by one request.
pub const MAX_LINKS_PER_REQUEST: u32 = 1_000;

/// Survey application service
pub struct SurveyService {
    store: Arc<InMemoryStore>,
    compiler: QuestionCompiler,
    dispatcher: EventDispatcher,
}

impl SurveyService {
    pub fn new(store: Arc<InMemoryStore>, compiler: QuestionCompiler, dispatcher: EventDispatcher) -> Self {
        Self {
            store,
            compiler,
            dispatcher,
        }
    }
}

/// Insert a form with default settings and its compiled question tree, then
/// let the new settings take over activation.
fn install_form(
    tables: &mut Tables,
    outbox: &mut Outbox,
    compiler: &QuestionCompiler,
    tree: &QuestionTree,
    form: SurveyForm,
) -> SurveyResult<RowId> {
    let survey_id = form.survey_id;
    let version = form.version;

    let form_id = tables.insert_form(form)?;
    tables.insert_settings(FormSettings::for_new_form(form_id))?;
    let questions = compiler.persist(tree, tables, form_id)?.len();

    info!(survey_id, form_id, version, questions, "Form compiled");
    outbox.record(DomainEvent::Form(FormEvent::Compiled {
        survey_id,
        form_id,
        version,
        questions,
    }));

    versioning::apply_activation(tables, outbox, form_id)?;
    Ok(form_id)
}

fn summary(tables: &Tables, form_id: RowId) -> SurveyResult<FormSummary> {
    let form = tables.form(form_id).ok_or(SurveyError::FormDoesNotExist)?;
    Ok(FormSummary::new(form, tables.settings_of(form_id)))
}

fn form_view(tables: &Tables, form: SurveyForm) -> SurveyResult<FormView> {
    let settings = tables
        .settings_of(form.id)
        .cloned()
        .ok_or_else(|| SurveyError::Storage(format!("form {} has no settings", form.id)))?;

    let questions = tables
        .questions_of(form.id)
        .map(|question| {
            Ok(QuestionView {
                question: question.clone(),
                options: tables.options_of(question.id)?,
            })
        })
        .collect::<SurveyResult<Vec<_>>>()?;

    Ok(FormView {
        target_id: form.target_id,
        form,
        settings,
        questions,
    })
}

fn owned_survey(tables: &Tables, actor: &User, uuid: Uuid) -> SurveyResult<Survey> {
    let survey = live_survey(tables, uuid)?;
    access::ensure_survey_owner_or_admin(actor, survey)?;
    Ok(survey.clone())
}

#[async_trait]
impl SurveyUseCases for SurveyService {
    async fn create_survey(&self, actor: &User, command: CreateSurveyCommand) -> SurveyResult<SurveyCreated> {
        access::ensure_active_account(actor)?;
        access::ensure_can_author(actor)?;

        let tree = self.compiler.compile_definition(&command.data)?;
        let title = definition_title(&command.data).unwrap_or_default();
        let now = Utc::now();

        let (created, events) = self.store.transaction(|tx, outbox| {
            let survey = Survey::new(title, actor.id, now);
            let survey_uuid = survey.uuid;
            let survey_id = tx.insert_survey(survey)?;
            outbox.record(DomainEvent::Survey(SurveyEvent::Created {
                survey_id,
                survey_uuid,
                created_by: actor.id,
                created_at: now,
            }));

            let form = SurveyForm::new(survey_id, 1, None, command.data, now)?;
            let form_uuid = form.uuid;
            install_form(tx, outbox, &self.compiler, &tree, form)?;

            Ok(SurveyCreated { survey_uuid, form_uuid })
        })?;

        info!(survey = %created.survey_uuid, user_id = actor.id, "Survey created");
        self.dispatcher.dispatch(events).await;
        Ok(created)
    }

    async fn list_surveys(&self, actor: &User) -> SurveyResult<Vec<Survey>> {
        access::ensure_active_account(actor)?;

        Ok(self.store.read(|tables| {
            tables
                .surveys()
                .filter(|survey| !survey.is_deleted())
                .filter(|survey| actor.is_admin() || survey.created_by == actor.id)
                .cloned()
                .collect()
        }))
    }

    async fn get_survey(&self, actor: &User, survey: Uuid) -> SurveyResult<SurveyView> {
        access::ensure_active_account(actor)?;

        self.store.read(|tables| {
            let survey = owned_survey(tables, actor, survey)?;
            let forms = tables
                .forms_of(survey.id)
                .filter(|form| !form.is_deleted())
                .map(|form| FormSummary::new(form, tables.settings_of(form.id)))
                .collect();
            let active_form = survey
                .active_version
                .and_then(|form_id| tables.form(form_id))
                .map(|form| form.uuid);

            Ok(SurveyView {
                survey,
                active_form,
                forms,
            })
        })
    }

    async fn rename_survey(&self, actor: &User, survey: Uuid, command: RenameSurveyCommand) -> SurveyResult<Survey> {
        access::ensure_active_account(actor)?;
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(FieldErrors::single("title", "title cannot be blank").into());
        }

        let (renamed, events) = self.store.transaction(|tx, outbox| {
            let survey_id = owned_survey(tx, actor, survey)?.id;
            let row = tx.survey_mut(survey_id)?;
            row.rename(title.clone(), Utc::now());
            let renamed = row.clone();
            outbox.record(DomainEvent::Survey(SurveyEvent::Renamed { survey_id, title }));
            Ok(renamed)
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(renamed)
    }

    async fn soft_delete_survey(&self, actor: &User, survey: Uuid) -> SurveyResult<DateTime<Utc>> {
        access::ensure_active_account(actor)?;

        let (deleted_at, events) = self.store.transaction(|tx, outbox| {
            let target = any_survey(tx, survey)?;
            access::ensure_survey_owner_or_admin(actor, target)?;
            let survey_id = target.id;
            cascade::soft_delete_survey(tx, outbox, survey_id, Utc::now())
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(deleted_at)
    }

    async fn restore_survey(&self, actor: &User, survey: Uuid) -> SurveyResult<Survey> {
        access::ensure_active_account(actor)?;

        let (restored, events) = self.store.transaction(|tx, outbox| {
            let target = any_survey(tx, survey)?;
            access::ensure_survey_owner_or_admin(actor, target)?;
            let survey_id = target.id;
            cascade::restore_survey(tx, outbox, survey_id)?;
            tx.survey(survey_id).cloned().ok_or(SurveyError::SurveyDoesNotExist)
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(restored)
    }

    async fn archived_surveys(&self, actor: &User) -> SurveyResult<Vec<Survey>> {
        access::ensure_active_account(actor)?;

        let archived: Vec<Survey> = self.store.read(|tables| {
            tables
                .surveys()
                .filter(|survey| survey.is_deleted())
                .filter(|survey| actor.is_admin() || survey.created_by == actor.id)
                .cloned()
                .collect()
        });

        if archived.is_empty() {
            return Err(SurveyError::NoArchivedSurveys);
        }
        Ok(archived)
    }

    async fn destroy_survey(&self, actor: &User, survey: Uuid) -> SurveyResult<()> {
        access::ensure_active_account(actor)?;
        access::ensure_admin(actor)?;

        let ((), events) = self.store.transaction(|tx, outbox| {
            let survey_id = any_survey(tx, survey)?.id;
            cascade::destroy_survey(tx, outbox, survey_id)
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(())
    }

    async fn add_form(&self, actor: &User, survey: Uuid, command: AddFormCommand) -> SurveyResult<FormSummary> {
        access::ensure_active_account(actor)?;
        access::ensure_can_author(actor)?;

        let tree = self.compiler.compile_definition(&command.metadata)?;
        let now = Utc::now();

        let (summary, events) = self.store.transaction(|tx, outbox| {
            let survey_id = owned_survey(tx, actor, survey)?.id;

            if let Some(title) = definition_title(&command.metadata) {
                tx.survey_mut(survey_id)?.rename(title.clone(), now);
                outbox.record(DomainEvent::Survey(SurveyEvent::Renamed { survey_id, title }));
            }

            let form = SurveyForm::new(survey_id, command.version, command.description, command.metadata, now)?;
            let form_id = install_form(tx, outbox, &self.compiler, &tree, form)?;
            summary(tx, form_id)
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(summary)
    }

    async fn list_forms(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<FormSummary>> {
        access::ensure_active_account(actor)?;

        self.store.read(|tables| {
            let survey = live_survey(tables, survey)?;
            Ok(tables
                .forms_of(survey.id)
                .filter(|form| !form.is_deleted())
                .map(|form| FormSummary::new(form, tables.settings_of(form.id)))
                .collect())
        })
    }

    async fn get_form(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<FormView> {
        access::ensure_active_account(actor)?;

        self.store.read(|tables| {
            let survey = live_survey(tables, survey)?;
            let form = live_form(tables, survey, form)?;
            form_view(tables, form)
        })
    }

    async fn activate_form(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<FormSummary> {
        access::ensure_active_account(actor)?;

        let (summary, events) = self.store.transaction(|tx, outbox| {
            let survey = owned_survey(tx, actor, survey)?;
            let form_id = live_form(tx, &survey, form)?.id;
            versioning::activate(tx, outbox, form_id)?;
            summary(tx, form_id)
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(summary)
    }

    async fn soft_delete_form(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<DateTime<Utc>> {
        access::ensure_active_account(actor)?;

        let (deleted_at, events) = self.store.transaction(|tx, outbox| {
            let survey = owned_survey(tx, actor, survey)?;
            let form_id = any_form(tx, &survey, form)?.id;
            cascade::soft_delete_form(tx, outbox, form_id, Utc::now())
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(deleted_at)
    }

    async fn restore_form(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<FormSummary> {
        access::ensure_active_account(actor)?;

        let (summary, events) = self.store.transaction(|tx, outbox| {
            let survey = owned_survey(tx, actor, survey)?;
            let form_id = any_form(tx, &survey, form)?.id;
            cascade::restore_form(tx, outbox, form_id)?;
            summary(tx, form_id)
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(summary)
    }

    async fn archived_forms(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<FormSummary>> {
        access::ensure_active_account(actor)?;

        let archived: Vec<FormSummary> = self.store.read(|tables| {
            let survey = owned_survey(tables, actor, survey)?;
            SurveyResult::Ok(
                tables
                    .forms_of(survey.id)
                    .filter(|form| form.is_deleted())
                    .map(|form| FormSummary::new(form, tables.settings_of(form.id)))
                    .collect(),
            )
        })?;

        if archived.is_empty() {
            return Err(SurveyError::NoArchivedForms);
        }
        Ok(archived)
    }

    async fn destroy_form(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<()> {
        access::ensure_active_account(actor)?;
        access::ensure_admin(actor)?;

        let ((), events) = self.store.transaction(|tx, outbox| {
            let survey = any_survey(tx, survey)?.clone();
            let form_id = any_form(tx, &survey, form)?.id;
            cascade::destroy_form(tx, outbox, form_id)
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(())
    }

    async fn get_settings(&self, actor: &User, survey: Uuid, form: Uuid) -> SurveyResult<FormSettings> {
        access::ensure_active_account(actor)?;

        self.store.read(|tables| {
            let survey = owned_survey(tables, actor, survey)?;
            let form = live_form(tables, &survey, form)?;
            tables
                .settings_of(form.id)
                .cloned()
                .ok_or_else(|| SurveyError::Storage(format!("form {} has no settings", form.id)))
        })
    }

    async fn update_settings(
        &self,
        actor: &User,
        survey: Uuid,
        form: Uuid,
        command: UpdateSettingsCommand,
    ) -> SurveyResult<FormSettings> {
        access::ensure_active_account(actor)?;

        let (settings, events) = self.store.transaction(|tx, outbox| {
            let survey = owned_survey(tx, actor, survey)?;
            let form_id = live_form(tx, &survey, form)?.id;
            versioning::update_settings(tx, outbox, form_id, command.into(), Utc::now())
        })?;

        self.dispatcher.dispatch(events).await;
        Ok(settings)
    }

    async fn assign_target(
        &self,
        actor: &User,
        survey: Uuid,
        form: Uuid,
        command: AssignTargetCommand,
    ) -> SurveyResult<FormView> {
        access::ensure_active_account(actor)?;

        let (view, _) = self.store.transaction(|tx, _| {
            let survey = owned_survey(tx, actor, survey)?;
            let form_id = live_form(tx, &survey, form)?.id;
            if let Some(target_id) = command.target_id {
                tx.audience(target_id).ok_or(SurveyError::TargetAudienceDoesNotExist)?;
            }

            let row = tx.form_mut(form_id)?;
            row.target_id = command.target_id;
            let updated = row.clone();
            form_view(tx, updated)
        })?;

        Ok(view)
    }

    async fn create_audience(&self, actor: &User, command: CreateAudienceCommand) -> SurveyResult<TargetAudience> {
        access::ensure_active_account(actor)?;
        access::ensure_can_author(actor)?;

        let (audience, _) = self.store.transaction(|tx, _| {
            let mut errors = FieldErrors::new();
            for (field, phones) in [
                ("include_phone_numbers", &command.include_phone_numbers),
                ("exclude_phone_numbers", &command.exclude_phone_numbers),
            ] {
                for phone in phones {
                    if tx.user_by_phone(phone).is_none() {
                        errors.add(field, format!("no user with phone number {}", phone));
                    }
                }
            }
            errors.into_result()?;

            let audience = TargetAudience::new(
                command.name,
                command.description,
                command.roles.into_iter().collect(),
                command.include_phone_numbers.into_iter().collect(),
                command.exclude_phone_numbers.into_iter().collect(),
                Utc::now(),
            )?;
            let id = tx.insert_audience(audience)?;
            tx.audience(id).cloned().ok_or(SurveyError::TargetAudienceDoesNotExist)
        })?;

        info!(audience_id = audience.id, "Target audience created");
        Ok(audience)
    }

    async fn list_audiences(&self, actor: &User) -> SurveyResult<Vec<TargetAudience>> {
        access::ensure_active_account(actor)?;
        access::ensure_can_author(actor)?;

        Ok(self.store.read(|tables| tables.audiences().cloned().collect()))
    }

    async fn create_links(&self, actor: &User, survey: Uuid, command: CreateLinksCommand) -> SurveyResult<Vec<OneTimeLink>> {
        access::ensure_active_account(actor)?;
        if command.numbers == 0 {
            return Err(FieldErrors::single("numbers", "at least one link must be requested").into());
        }
        if command.numbers > MAX_LINKS_PER_REQUEST {
            return Err(FieldErrors::single(
                "numbers",
                format!("at most {} links can be requested at once", MAX_LINKS_PER_REQUEST),
            )
            .into());
        }

        let (links, _) = self.store.transaction(|tx, _| {
            let survey_id = owned_survey(tx, actor, survey)?.id;
            let now = Utc::now();

            let mut links = Vec::with_capacity(command.numbers as usize);
            for _ in 0..command.numbers {
                let mut link = OneTimeLink::new(survey_id, now);
                link.id = tx.insert_link(link.clone())?;
                links.push(link);
            }
            Ok(links)
        })?;

        info!(%survey, count = links.len(), "One-time links created");
        Ok(links)
    }

    async fn list_links(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<OneTimeLink>> {
        access::ensure_active_account(actor)?;

        self.store.read(|tables| {
            let survey_id = owned_survey(tables, actor, survey)?.id;
            Ok(tables.links_of(survey_id).cloned().collect())
        })
    }

    async fn redeem_link(&self, token: Uuid) -> SurveyResult<LinkRedeemed> {
        let (redeemed, _) = self.store.transaction(|tx, _| {
            let link = tx.link_by_token_mut(token).ok_or(SurveyError::LinkDoesNotExist)?;
            link.redeem()?;
            let survey_id = link.survey_id;

            let survey = tx
                .survey(survey_id)
                .filter(|survey| !survey.is_deleted())
                .ok_or(SurveyError::SurveyDoesNotExist)?;
            let form = survey
                .active_version
                .and_then(|form_id| tx.form(form_id))
                .ok_or(SurveyError::FormNotFound)?;

            Ok(LinkRedeemed {
                survey_uuid: survey.uuid,
                form_uuid: form.uuid,
            })
        })?;

        info!(%token, survey = %redeemed.survey_uuid, "One-time link redeemed");
        Ok(redeemed)
    }

    async fn charts(&self, actor: &User, survey: Uuid) -> SurveyResult<Vec<ChartData>> {
        access::ensure_active_account(actor)?;

        self.store.read(|tables| {
            let survey_id = owned_survey(tables, actor, survey)?.id;
            charts::charts_for_survey(tables, survey_id, false)
        })
    }

    async fn live_snapshot(&self, survey: Uuid) -> SurveyResult<Vec<ChartData>> {
        self.store.read(|tables| {
            let survey_id = live_survey(tables, survey)?.id;
            charts::charts_for_survey(tables, survey_id, true)
        })
    }

    async fn run_scheduled_job(&self, job: ScheduledJob) -> SurveyResult<JobOutcome> {
        let (outcome, events) = self
            .store
            .transaction(|tx, outbox| versioning::run_scheduled(tx, outbox, job.settings_id, job.action))?;

        self.dispatcher.dispatch(events).await;
        Ok(outcome)
    }
}
