//! Domain Events
//!
//! Events recorded inside a write transaction and handed to the dispatcher
//! once the transaction has committed.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::value_objects::RowId;
use crate::ports::outbound::JobAction;

/// All domain events of the survey context
#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Survey(SurveyEvent),
    Form(FormEvent),
    Submission(SubmissionEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum SurveyEvent {
    Created {
        survey_id: RowId,
        survey_uuid: Uuid,
        created_by: RowId,
        created_at: DateTime<Utc>,
    },

    Renamed {
        survey_id: RowId,
        title: String,
    },

    SoftDeleted {
        survey_id: RowId,
        deleted_at: DateTime<Utc>,
    },

    Restored {
        survey_id: RowId,
        deleted_at: DateTime<Utc>,
    },

    Destroyed {
        survey_uuid: Uuid,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum FormEvent {
    Compiled {
        survey_id: RowId,
        form_id: RowId,
        version: i32,
        questions: usize,
    },

    Activated {
        survey_id: RowId,
        form_id: RowId,
    },

    Deactivated {
        survey_id: RowId,
        form_id: RowId,
    },

    /// One date of a settings row was written. `run_at` is `None` when the
    /// date was cleared or already lies in the past.
    ScheduleChanged {
        settings_id: RowId,
        form_id: RowId,
        action: JobAction,
        run_at: Option<DateTime<Utc>>,
    },

    SoftDeleted {
        form_id: RowId,
        deleted_at: DateTime<Utc>,
    },

    Restored {
        form_id: RowId,
        deleted_at: DateTime<Utc>,
    },

    Destroyed {
        form_uuid: Uuid,
        settings_id: RowId,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionEvent {
    Submitted {
        survey_id: RowId,
        form_id: RowId,
        answer_set_id: RowId,
    },

    Updated {
        survey_id: RowId,
        form_id: RowId,
        answer_set_id: RowId,
    },

    SoftDeleted {
        survey_id: RowId,
        answer_set_id: RowId,
        deleted_at: DateTime<Utc>,
    },

    Restored {
        survey_id: RowId,
        answer_set_id: RowId,
    },

    Destroyed {
        survey_id: RowId,
        answer_set_id: RowId,
    },
}

impl DomainEvent {
    /// Survey whose live charts may have changed.
    pub fn affects_charts_of(&self) -> Option<RowId> {
        match self {
            Self::Submission(SubmissionEvent::Submitted { survey_id, .. })
            | Self::Submission(SubmissionEvent::Updated { survey_id, .. })
            | Self::Submission(SubmissionEvent::SoftDeleted { survey_id, .. })
            | Self::Submission(SubmissionEvent::Restored { survey_id, .. })
            | Self::Submission(SubmissionEvent::Destroyed { survey_id, .. })
            | Self::Form(FormEvent::Activated { survey_id, .. }) => Some(*survey_id),
            _ => None,
        }
    }
}

/// Events collected by one write transaction.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<DomainEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<DomainEvent> {
        self.events
    }
}
