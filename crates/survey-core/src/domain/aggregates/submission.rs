//! Answer sets and their typed answers

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::value_objects::{AnswerValue, QuestionType, RowId};

/// One respondent's submission against one form version.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnswerSet {
    #[serde(skip)]
    pub id: RowId,
    pub uuid: Uuid,
    #[serde(skip)]
    pub user_id: Option<RowId>,
    #[serde(skip)]
    pub form_id: RowId,
    /// Raw submitted `{question_name: value}` map.
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AnswerSet {
    pub fn new(
        form_id: RowId,
        user_id: Option<RowId>,
        metadata: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            uuid: Uuid::new_v4(),
            user_id,
            form_id,
            metadata,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Overlay new entries onto the stored map.
    pub fn merge_metadata(&mut self, update: Map<String, Value>, now: DateTime<Utc>) {
        for (name, value) in update {
            self.metadata.insert(name, value);
        }
        self.updated_at = now;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Answer {
    #[serde(skip)]
    pub id: RowId,
    #[serde(skip)]
    pub answer_set_id: RowId,
    pub question_id: RowId,
    /// Copy of the question's type at write time.
    pub question_type: QuestionType,
    pub value: AnswerValue,
    pub deleted_at: Option<DateTime<Utc>>,
}
