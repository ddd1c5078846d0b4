//! Ownership, role and submission-gate checks.

use chrono::{DateTime, Utc};

use crate::domain::aggregates::{AnswerSet, Survey, SurveyForm, User};
use crate::error::{SurveyError, SurveyResult};
use crate::infrastructure::persistence::Tables;

pub fn ensure_active_account(user: &User) -> SurveyResult<()> {
    if user.is_active {
        Ok(())
    } else {
        Err(SurveyError::AccountNotActive)
    }
}

/// Management, professors and admins may author surveys.
pub fn ensure_can_author(user: &User) -> SurveyResult<()> {
    if user.can_author_surveys() {
        Ok(())
    } else {
        Err(SurveyError::PermissionDenied)
    }
}

pub fn ensure_admin(user: &User) -> SurveyResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(SurveyError::PermissionDenied)
    }
}

pub fn ensure_survey_owner_or_admin(user: &User, survey: &Survey) -> SurveyResult<()> {
    if user.is_admin() || survey.created_by == user.id {
        Ok(())
    } else {
        Err(SurveyError::PermissionDenied)
    }
}

pub fn ensure_submission_owner(user: &User, answer_set: &AnswerSet) -> SurveyResult<()> {
    if answer_set.user_id == Some(user.id) {
        Ok(())
    } else {
        Err(SurveyError::NotOwner)
    }
}

/// Submission owner, survey owner or admin may read a submission.
pub fn ensure_can_view_submission(user: &User, survey: &Survey, answer_set: &AnswerSet) -> SurveyResult<()> {
    if ensure_submission_owner(user, answer_set).is_ok() {
        return Ok(());
    }
    ensure_survey_owner_or_admin(user, survey)
}

/// Gate for a new answer set: activation and window, per-user cap, then
/// target audience.
pub fn check_submission_allowed(
    tables: &Tables,
    form: &SurveyForm,
    user: Option<&User>,
    now: DateTime<Utc>,
) -> SurveyResult<()> {
    let settings = tables
        .settings_of(form.id)
        .ok_or_else(|| SurveyError::Storage(format!("form {} has no settings", form.id)))?;

    settings.check_accepting(now)?;

    if let Some(limit) = settings.max_submissions_per_user {
        let user = user.ok_or(SurveyError::UserNotAuthenticated)?;
        if tables.submission_count(form.id, user.id) >= usize::from(limit) {
            return Err(SurveyError::TooManySubmissions { limit });
        }
    }

    if let Some(target_id) = form.target_id {
        let user = user.ok_or(SurveyError::UserNotAuthenticated)?;
        let audience = tables
            .audience(target_id)
            .ok_or(SurveyError::TargetAudienceDoesNotExist)?;
        if !audience.admits(user) {
            return Err(SurveyError::UserNotInTarget);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{FormSettings, TargetAudience};
    use crate::domain::value_objects::{PhoneNumber, Role, RowId};
    use serde_json::{Map, Value};
    use std::collections::BTreeSet;

    fn user(tables: &mut Tables, phone: &str, role: Role) -> User {
        let id = tables
            .insert_user(User::new(PhoneNumber::parse(phone).unwrap(), role, Utc::now()))
            .unwrap();
        tables.user(id).unwrap().clone()
    }

    fn form(tables: &mut Tables, cap: Option<u16>) -> RowId {
        let now = Utc::now();
        let survey_id = tables.insert_survey(Survey::new("s", 1, now)).unwrap();
        let form_id = tables
            .insert_form(SurveyForm::new(survey_id, 1, None, Value::Null, now).unwrap())
            .unwrap();
        let mut settings = FormSettings::for_new_form(form_id);
        settings.max_submissions_per_user = cap;
        tables.insert_settings(settings).unwrap();
        form_id
    }

    #[test]
    fn nth_submission_passes_and_the_next_is_rejected() {
        let mut tables = Tables::default();
        let form_id = form(&mut tables, Some(2));
        let respondent = user(&mut tables, "09120000001", Role::Student);

        for _ in 0..2 {
            let form = tables.form(form_id).unwrap().clone();
            check_submission_allowed(&tables, &form, Some(&respondent), Utc::now()).unwrap();
            tables
                .insert_answer_set(AnswerSet::new(form_id, Some(respondent.id), Map::new(), Utc::now()))
                .unwrap();
        }

        let form = tables.form(form_id).unwrap().clone();
        let err = check_submission_allowed(&tables, &form, Some(&respondent), Utc::now()).unwrap_err();
        assert!(matches!(err, SurveyError::TooManySubmissions { limit: 2 }));
    }

    #[test]
    fn capped_forms_reject_anonymous_submitters() {
        let mut tables = Tables::default();
        let form_id = form(&mut tables, Some(1));
        let form = tables.form(form_id).unwrap().clone();

        let err = check_submission_allowed(&tables, &form, None, Utc::now()).unwrap_err();
        assert!(matches!(err, SurveyError::UserNotAuthenticated));
    }

    #[test]
    fn uncapped_forms_accept_anonymous_submitters() {
        let mut tables = Tables::default();
        let form_id = form(&mut tables, None);
        let form = tables.form(form_id).unwrap().clone();

        assert!(check_submission_allowed(&tables, &form, None, Utc::now()).is_ok());
    }

    #[test]
    fn targeted_forms_check_the_audience() {
        let mut tables = Tables::default();
        let form_id = form(&mut tables, None);
        let professor = user(&mut tables, "09120000001", Role::Professor);
        let student = user(&mut tables, "09120000002", Role::Student);

        let audience = TargetAudience::new(
            None,
            None,
            [Role::Professor].into_iter().collect(),
            BTreeSet::new(),
            BTreeSet::new(),
            Utc::now(),
        )
        .unwrap();
        let target_id = tables.insert_audience(audience).unwrap();
        tables.form_mut(form_id).unwrap().target_id = Some(target_id);
        let form = tables.form(form_id).unwrap().clone();

        assert!(check_submission_allowed(&tables, &form, Some(&professor), Utc::now()).is_ok());
        assert!(matches!(
            check_submission_allowed(&tables, &form, Some(&student), Utc::now()),
            Err(SurveyError::UserNotInTarget)
        ));
        assert!(matches!(
            check_submission_allowed(&tables, &form, None, Utc::now()),
            Err(SurveyError::UserNotAuthenticated)
        ));
    }
}
