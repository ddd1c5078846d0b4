//! Command handlers
//!
//! Application services that orchestrate use cases.

mod submission;
mod survey;

pub use submission::SubmissionService;
pub use survey::SurveyService;

use uuid::Uuid;

use crate::domain::aggregates::{Survey, SurveyForm};
use crate::error::{SurveyError, SurveyResult};
use crate::infrastructure::persistence::Tables;

/// Live survey by public id.
fn live_survey(tables: &Tables, uuid: Uuid) -> SurveyResult<&Survey> {
    tables
        .survey_by_uuid(uuid)
        .filter(|survey| !survey.is_deleted())
        .ok_or(SurveyError::SurveyDoesNotExist)
}

/// Survey by public id, archived or not.
fn any_survey(tables: &Tables, uuid: Uuid) -> SurveyResult<&Survey> {
    tables.survey_by_uuid(uuid).ok_or(SurveyError::SurveyDoesNotExist)
}

fn live_form(tables: &Tables, survey: &Survey, uuid: Uuid) -> SurveyResult<SurveyForm> {
    tables
        .form_by_uuid(survey.id, uuid)
        .filter(|form| !form.is_deleted())
        .cloned()
        .ok_or(SurveyError::FormDoesNotExist)
}

fn any_form(tables: &Tables, survey: &Survey, uuid: Uuid) -> SurveyResult<SurveyForm> {
    tables
        .form_by_uuid(survey.id, uuid)
        .cloned()
        .ok_or(SurveyError::FormDoesNotExist)
}

/// Shared fixtures for the service tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::Utc;
    use parking_lot::Mutex;
    use serde_json::Value;

    use crate::application::EventDispatcher;
    use crate::domain::aggregates::User;
    use crate::domain::services::QuestionCompiler;
    use crate::domain::value_objects::{PhoneNumber, Role};
    use crate::error::SurveyResult;
    use crate::infrastructure::persistence::InMemoryStore;
    use crate::ports::outbound::{JobAction, JobScheduler, LiveUpdateChannel, ScheduledJob};
    use crate::domain::value_objects::RowId;
    use async_trait::async_trait;

    #[derive(Default)]
    pub struct RecordingScheduler {
        pub scheduled: Mutex<Vec<ScheduledJob>>,
        pub cancelled: Mutex<Vec<(RowId, JobAction)>>,
    }

    #[async_trait]
    impl JobScheduler for RecordingScheduler {
        async fn schedule_at(&self, job: ScheduledJob) -> SurveyResult<()> {
            self.scheduled.lock().push(job);
            Ok(())
        }

        async fn cancel(&self, settings_id: RowId, action: JobAction) -> SurveyResult<()> {
            self.cancelled.lock().push((settings_id, action));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RecordingChannel {
        pub published: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl LiveUpdateChannel for RecordingChannel {
        async fn publish(&self, topic: &str, payload: Value) -> SurveyResult<()> {
            self.published.lock().push((topic.to_string(), payload));
            Ok(())
        }
    }

    pub struct Harness {
        pub store: Arc<InMemoryStore>,
        pub scheduler: Arc<RecordingScheduler>,
        pub channel: Arc<RecordingChannel>,
        pub dispatcher: EventDispatcher,
        pub compiler: QuestionCompiler,
    }

    impl Harness {
        pub fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            let scheduler = Arc::new(RecordingScheduler::default());
            let channel = Arc::new(RecordingChannel::default());
            let dispatcher = EventDispatcher::new(store.clone(), scheduler.clone(), channel.clone());
            Self {
                store,
                scheduler,
                channel,
                dispatcher,
                compiler: QuestionCompiler::default(),
            }
        }

        pub fn user(&self, phone: &str, role: Role) -> User {
            let phone = PhoneNumber::parse(phone).unwrap();
            let (user, _) = self
                .store
                .transaction(|tx, _| {
                    let id = tx.insert_user(User::new(phone, role, Utc::now()))?;
                    Ok(tx.user(id).cloned().unwrap())
                })
                .unwrap();
            user
        }

        pub fn admin(&self, phone: &str) -> User {
            let mut user = self.user(phone, Role::Employee);
            user.is_staff = true;
            let stored = user.clone();
            self.store
                .transaction(|tx, _| {
                    if let Some(row) = tx.user_mut(stored.id) {
                        *row = stored;
                    }
                    Ok(())
                })
                .unwrap();
            user
        }
    }
}
