//! Post-commit event dispatch
//!
//! Turns the events of a committed transaction into scheduler calls and live
//! chart pushes. Failures here are logged and never undo the commit.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::events::{DomainEvent, FormEvent};
use crate::domain::services::charts;
use crate::domain::value_objects::RowId;
use crate::error::SurveyResult;
use crate::infrastructure::persistence::InMemoryStore;
use crate::ports::outbound::{live_topic, JobAction, JobScheduler, LiveUpdateChannel, ScheduledJob};

#[derive(Clone)]
pub struct EventDispatcher {
    store: Arc<InMemoryStore>,
    scheduler: Arc<dyn JobScheduler>,
    live: Arc<dyn LiveUpdateChannel>,
}

impl EventDispatcher {
    pub fn new(
        store: Arc<InMemoryStore>,
        scheduler: Arc<dyn JobScheduler>,
        live: Arc<dyn LiveUpdateChannel>,
    ) -> Self {
        Self { store, scheduler, live }
    }

    pub async fn dispatch(&self, events: Vec<DomainEvent>) {
        let mut chart_surveys = BTreeSet::new();

        for event in &events {
            debug!(?event, "Dispatching event");
            if let Some(survey_id) = event.affects_charts_of() {
                chart_surveys.insert(survey_id);
            }

            let result = match event {
                DomainEvent::Form(FormEvent::ScheduleChanged {
                    settings_id,
                    action,
                    run_at,
                    ..
                }) => self.reschedule(*settings_id, *action, *run_at).await,
                DomainEvent::Form(FormEvent::Destroyed { settings_id, .. }) => {
                    self.cancel_jobs(*settings_id).await
                }
                _ => Ok(()),
            };
            if let Err(error) = result {
                warn!(%error, ?event, "Scheduling side effect failed");
            }
        }

        for survey_id in chart_surveys {
            if let Err(error) = self.push_charts(survey_id).await {
                warn!(%error, survey_id, "Live chart push failed");
            }
        }
    }

    /// A missing or elapsed `run_at` cancels the pending job.
    async fn reschedule(
        &self,
        settings_id: RowId,
        action: JobAction,
        run_at: Option<DateTime<Utc>>,
    ) -> SurveyResult<()> {
        match run_at.filter(|at| *at > Utc::now()) {
            Some(run_at) => {
                self.scheduler
                    .schedule_at(ScheduledJob { settings_id, action, run_at })
                    .await
            }
            None => self.scheduler.cancel(settings_id, action).await,
        }
    }

    async fn cancel_jobs(&self, settings_id: RowId) -> SurveyResult<()> {
        self.scheduler.cancel(settings_id, JobAction::Activate).await?;
        self.scheduler.cancel(settings_id, JobAction::Deactivate).await
    }

    async fn push_charts(&self, survey_id: RowId) -> SurveyResult<()> {
        let snapshot = self.store.read(|tables| {
            let Some(survey) = tables.survey(survey_id) else {
                return Ok(None);
            };
            if survey.active_version.is_none() {
                return Ok(None);
            }
            charts::charts_for_survey(tables, survey_id, true).map(|charts| Some((survey.uuid, charts)))
        })?;

        let Some((survey_uuid, charts)) = snapshot else {
            debug!(survey_id, "No active form, live push skipped");
            return Ok(());
        };

        self.live
            .publish(&live_topic(&survey_uuid), json!({ "type": "update", "data": charts }))
            .await
    }
}
