//! Compiled question tree rows

use serde::Serialize;

use crate::domain::value_objects::{OptionValue, QuestionType, RowId};

/// One node of a form's question tree. Children point at their container
/// through `parent_id`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Question {
    pub id: RowId,
    #[serde(skip)]
    pub form_id: RowId,
    /// External answer key, unique within the form.
    pub name: String,
    pub title: Option<String>,
    pub question_type: QuestionType,
    pub parent_id: Option<RowId>,
    pub is_live: bool,
}

/// Selectable option of a question.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuestionOption {
    #[serde(skip)]
    pub id: RowId,
    #[serde(skip)]
    pub question_id: RowId,
    /// Canonical key used for answer matching, unique within the question.
    pub value: String,
    pub label: Option<String>,
    pub payload: OptionValue,
}

impl QuestionOption {
    /// Display text used by charts.
    pub fn display(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.value)
    }
}
