//! SurveyForm Aggregate
//!
//! A form is one version of a survey's schema. Each form carries exactly one
//! `FormSettings` row which holds the activation flag and submission window.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::value_objects::RowId;
use crate::error::{FieldErrors, SurveyError, SurveyResult};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurveyForm {
    #[serde(skip)]
    pub id: RowId,
    pub uuid: Uuid,
    pub version: i32,
    pub description: Option<String>,
    /// Raw submitted schema, kept for audit and re-derivation.
    pub metadata: Value,
    #[serde(skip)]
    pub survey_id: RowId,
    #[serde(skip)]
    pub target_id: Option<RowId>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SurveyForm {
    pub fn new(
        survey_id: RowId,
        version: i32,
        description: Option<String>,
        metadata: Value,
        now: DateTime<Utc>,
    ) -> SurveyResult<Self> {
        if version < 1 {
            return Err(FieldErrors::single("version", "version must be a positive integer").into());
        }

        Ok(Self {
            id: 0,
            uuid: Uuid::new_v4(),
            version,
            description,
            metadata,
            survey_id,
            target_id: None,
            created_at: now,
            deleted_at: None,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Activation flag, submission window and per-user cap of one form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormSettings {
    #[serde(skip)]
    pub id: RowId,
    #[serde(skip)]
    pub form_id: RowId,
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_submissions_per_user: Option<u16>,
    pub is_editable: bool,
}

impl FormSettings {
    /// Settings created alongside a new form.
    pub fn for_new_form(form_id: RowId) -> Self {
        Self {
            id: 0,
            form_id,
            is_active: true,
            start_date: None,
            end_date: None,
            max_submissions_per_user: None,
            is_editable: false,
        }
    }

    /// Window rules checked when dates are written. Only freshly supplied
    /// dates are checked against `now`.
    pub fn validate_window(
        &self,
        now: DateTime<Utc>,
        start_changed: bool,
        end_changed: bool,
    ) -> SurveyResult<()> {
        let mut errors = FieldErrors::new();

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start >= end {
                errors.add("end_date", "end date must be after the start date");
            }
        }
        if start_changed {
            if let Some(start) = self.start_date {
                if start < now {
                    errors.add("start_date", "start date cannot be in the past");
                }
            }
        }
        if end_changed {
            if let Some(end) = self.end_date {
                if end <= now {
                    errors.add("end_date", "end date must be in the future");
                }
            }
        }
        if self.max_submissions_per_user == Some(0) {
            errors.add("max_submissions_per_user", "must be a positive integer");
        }

        errors.into_result()
    }

    /// Whether the form accepts new answer sets at `now`.
    pub fn check_accepting(&self, now: DateTime<Utc>) -> SurveyResult<()> {
        if !self.is_active {
            return Err(SurveyError::FormNotActive);
        }
        if self.start_date.is_some_and(|start| start > now) {
            return Err(SurveyError::FormNotStarted);
        }
        if self.end_date.is_some_and(|end| end < now) {
            return Err(SurveyError::FormExpired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn version_must_be_positive() {
        let err = SurveyForm::new(1, 0, None, Value::Null, Utc::now()).unwrap_err();
        assert!(err.field_errors().unwrap().contains("version"));
    }

    #[test]
    fn window_rejects_inverted_dates() {
        let now = Utc::now();
        let mut settings = FormSettings::for_new_form(1);
        settings.start_date = Some(now + Duration::days(2));
        settings.end_date = Some(now + Duration::days(1));

        let err = settings.validate_window(now, true, true).unwrap_err();
        assert!(err.field_errors().unwrap().contains("end_date"));
    }

    #[test]
    fn window_rejects_past_start_only_when_changed() {
        let now = Utc::now();
        let mut settings = FormSettings::for_new_form(1);
        settings.start_date = Some(now - Duration::hours(1));

        assert!(settings.validate_window(now, true, false).is_err());
        assert!(settings.validate_window(now, false, false).is_ok());
    }

    #[test]
    fn accepting_maps_each_bound_to_its_code() {
        let now = Utc::now();
        let mut settings = FormSettings::for_new_form(1);
        assert!(settings.check_accepting(now).is_ok());

        settings.start_date = Some(now + Duration::hours(1));
        assert!(matches!(settings.check_accepting(now), Err(SurveyError::FormNotStarted)));

        settings.start_date = None;
        settings.end_date = Some(now - Duration::hours(1));
        assert!(matches!(settings.check_accepting(now), Err(SurveyError::FormExpired)));

        settings.is_active = false;
        assert!(matches!(settings.check_accepting(now), Err(SurveyError::FormNotActive)));
    }
}
