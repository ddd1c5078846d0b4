//! Data Transfer Objects (DTOs)
//!
//! Commands accepted by the use cases and the read models they return.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::aggregates::{
    Answer, AnswerSet, FormSettings, Question, QuestionOption, Survey, SurveyForm,
};
use crate::domain::services::SettingsUpdate;
use crate::domain::value_objects::{AnswerValue, PhoneNumber, QuestionType, Role, RowId};

// =============================================================================
// Survey Commands
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSurveyCommand {
    /// Survey definition: `title` plus `pages`.
    pub data: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenameSurveyCommand {
    pub title: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddFormCommand {
    pub version: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

/// Settings patch. An explicit `null` clears a nullable field, an absent
/// key leaves it untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpdateSettingsCommand {
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_submissions_per_user: Option<Option<u16>>,
    #[serde(default)]
    pub is_editable: Option<bool>,
}

impl From<UpdateSettingsCommand> for SettingsUpdate {
    fn from(command: UpdateSettingsCommand) -> Self {
        Self {
            is_active: command.is_active,
            start_date: command.start_date,
            end_date: command.end_date,
            max_submissions_per_user: command.max_submissions_per_user,
            is_editable: command.is_editable,
        }
    }
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssignTargetCommand {
    pub target_id: Option<RowId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateAudienceCommand {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub include_phone_numbers: Vec<PhoneNumber>,
    #[serde(default)]
    pub exclude_phone_numbers: Vec<PhoneNumber>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateLinksCommand {
    pub numbers: u32,
}

// =============================================================================
// Submission Commands
// =============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubmitAnswersCommand {
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

// =============================================================================
// Views (Read Models)
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurveyCreated {
    pub survey_uuid: Uuid,
    pub form_uuid: Uuid,
}

#[derive(Clone, Debug, Serialize)]
pub struct FormSummary {
    pub uuid: Uuid,
    pub version: i32,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FormSummary {
    pub fn new(form: &SurveyForm, settings: Option<&FormSettings>) -> Self {
        Self {
            uuid: form.uuid,
            version: form.version,
            description: form.description.clone(),
            is_active: settings.is_some_and(|settings| settings.is_active),
            created_at: form.created_at,
            deleted_at: form.deleted_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SurveyView {
    #[serde(flatten)]
    pub survey: Survey,
    pub active_form: Option<Uuid>,
    pub forms: Vec<FormSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuestionView {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<QuestionOption>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FormView {
    #[serde(flatten)]
    pub form: SurveyForm,
    pub target_id: Option<RowId>,
    pub settings: FormSettings,
    pub questions: Vec<QuestionView>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkRedeemed {
    pub survey_uuid: Uuid,
    pub form_uuid: Uuid,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnswerView {
    pub question: String,
    pub question_type: QuestionType,
    #[serde(flatten)]
    pub value: AnswerValue,
}

impl AnswerView {
    pub fn new(answer: &Answer, question: &Question) -> Self {
        Self {
            question: question.name.clone(),
            question_type: answer.question_type,
            value: answer.value.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SubmissionView {
    #[serde(flatten)]
    pub answer_set: AnswerSet,
    pub form_uuid: Uuid,
    pub user_id: Option<RowId>,
    pub answers: Vec<AnswerView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_patch_distinguishes_null_from_absent() {
        let command: UpdateSettingsCommand =
            serde_json::from_value(json!({ "start_date": null, "is_editable": true })).unwrap();

        assert_eq!(command.start_date, Some(None));
        assert_eq!(command.end_date, None);
        assert_eq!(command.is_editable, Some(true));

        let update = SettingsUpdate::from(command);
        assert_eq!(update.max_submissions_per_user, None);
    }

    #[test]
    fn settings_patch_reads_dates_and_caps() {
        let command: UpdateSettingsCommand = serde_json::from_value(json!({
            "end_date": "2030-01-01T00:00:00Z",
            "max_submissions_per_user": 3
        }))
        .unwrap();

        assert!(matches!(command.end_date, Some(Some(_))));
        assert_eq!(command.max_submissions_per_user, Some(Some(3)));
    }
}
