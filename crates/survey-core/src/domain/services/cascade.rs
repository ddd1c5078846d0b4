//! SoftDeleteCascade
//!
//! Soft delete stamps one timestamp on the root and on every live descendant
//! (Survey -> SurveyForm -> AnswerSet -> Answer). Restore reads the root's own
//! stamp inside the same transaction and clears exactly the descendants that
//! carry that stamp, so rows removed by an earlier, independent delete stay
//! deleted. Hard delete drops the whole subtree.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::events::{DomainEvent, FormEvent, Outbox, SubmissionEvent, SurveyEvent};
use crate::domain::services::versioning;
use crate::domain::value_objects::RowId;
use crate::error::{SurveyError, SurveyResult};
use crate::infrastructure::persistence::Tables;

// =============================================================================
// Soft delete
// =============================================================================

pub fn soft_delete_survey(
    tables: &mut Tables,
    outbox: &mut Outbox,
    survey_id: RowId,
    now: DateTime<Utc>,
) -> SurveyResult<DateTime<Utc>> {
    let survey = tables.survey_mut(survey_id)?;
    if survey.is_deleted() {
        return Err(SurveyError::SurveyAlreadyDeleted);
    }
    survey.deleted_at = Some(now);

    let live_forms: Vec<RowId> = tables
        .forms_of(survey_id)
        .filter(|form| !form.is_deleted())
        .map(|form| form.id)
        .collect();
    for form_id in &live_forms {
        stamp_form(tables, outbox, *form_id, now)?;
    }

    info!(survey_id, forms = live_forms.len(), %now, "Survey soft-deleted");
    outbox.record(DomainEvent::Survey(SurveyEvent::SoftDeleted { survey_id, deleted_at: now }));
    Ok(now)
}

pub fn soft_delete_form(
    tables: &mut Tables,
    outbox: &mut Outbox,
    form_id: RowId,
    now: DateTime<Utc>,
) -> SurveyResult<DateTime<Utc>> {
    let form = tables.form(form_id).ok_or(SurveyError::FormDoesNotExist)?;
    if form.is_deleted() {
        return Err(SurveyError::FormAlreadyDeleted);
    }

    stamp_form(tables, outbox, form_id, now)?;
    info!(form_id, %now, "Form soft-deleted");
    Ok(now)
}

pub fn soft_delete_answer_set(
    tables: &mut Tables,
    outbox: &mut Outbox,
    answer_set_id: RowId,
    now: DateTime<Utc>,
) -> SurveyResult<DateTime<Utc>> {
    let answer_set = tables.answer_set(answer_set_id).ok_or(SurveyError::AnswerSetDoesNotExist)?;
    if answer_set.is_deleted() {
        return Err(SurveyError::AnswerSetAlreadyDeleted);
    }
    let survey_id = survey_of_form(tables, answer_set.form_id)?;

    stamp_answer_set(tables, answer_set_id, now)?;
    info!(answer_set_id, %now, "Answer set soft-deleted");
    outbox.record(DomainEvent::Submission(SubmissionEvent::SoftDeleted {
        survey_id,
        answer_set_id,
        deleted_at: now,
    }));
    Ok(now)
}

/// Stamp a live form and its live subtree. An active form is deactivated in
/// the same step so `active_version` never points at a deleted form.
fn stamp_form(
    tables: &mut Tables,
    outbox: &mut Outbox,
    form_id: RowId,
    now: DateTime<Utc>,
) -> SurveyResult<()> {
    tables.form_mut(form_id)?.deleted_at = Some(now);

    if tables.settings_of(form_id).is_some_and(|settings| settings.is_active) {
        versioning::deactivate(tables, outbox, form_id)?;
    }

    let live_sets: Vec<RowId> = tables
        .answer_sets_of(form_id)
        .filter(|set| !set.is_deleted())
        .map(|set| set.id)
        .collect();
    for answer_set_id in live_sets {
        stamp_answer_set(tables, answer_set_id, now)?;
    }

    outbox.record(DomainEvent::Form(FormEvent::SoftDeleted { form_id, deleted_at: now }));
    Ok(())
}

fn stamp_answer_set(tables: &mut Tables, answer_set_id: RowId, now: DateTime<Utc>) -> SurveyResult<()> {
    tables.answer_set_mut(answer_set_id)?.deleted_at = Some(now);
    for answer in tables.answer_rows_of_mut(answer_set_id) {
        if answer.deleted_at.is_none() {
            answer.deleted_at = Some(now);
        }
    }
    Ok(())
}

// =============================================================================
// Restore
// =============================================================================

pub fn restore_survey(tables: &mut Tables, outbox: &mut Outbox, survey_id: RowId) -> SurveyResult<()> {
    let survey = tables.survey_mut(survey_id)?;
    let recorded = survey.deleted_at.ok_or(SurveyError::SurveyNotDeleted)?;
    survey.deleted_at = None;

    let stamped_forms: Vec<RowId> = tables
        .forms_of(survey_id)
        .filter(|form| form.deleted_at == Some(recorded))
        .map(|form| form.id)
        .collect();
    for form_id in &stamped_forms {
        unstamp_form(tables, outbox, *form_id, recorded)?;
    }

    info!(survey_id, forms = stamped_forms.len(), %recorded, "Survey restored");
    outbox.record(DomainEvent::Survey(SurveyEvent::Restored { survey_id, deleted_at: recorded }));
    Ok(())
}

/// Restoring a form never re-activates it.
pub fn restore_form(tables: &mut Tables, outbox: &mut Outbox, form_id: RowId) -> SurveyResult<()> {
    let form = tables.form(form_id).ok_or(SurveyError::FormDoesNotExist)?;
    let recorded = form.deleted_at.ok_or(SurveyError::FormNotDeleted)?;

    unstamp_form(tables, outbox, form_id, recorded)?;
    info!(form_id, %recorded, "Form restored");
    Ok(())
}

pub fn restore_answer_set(
    tables: &mut Tables,
    outbox: &mut Outbox,
    answer_set_id: RowId,
) -> SurveyResult<()> {
    let answer_set = tables.answer_set(answer_set_id).ok_or(SurveyError::AnswerSetDoesNotExist)?;
    let recorded = answer_set.deleted_at.ok_or(SurveyError::AnswerSetNotDeleted)?;
    let survey_id = survey_of_form(tables, answer_set.form_id)?;

    unstamp_answer_set(tables, answer_set_id, recorded)?;
    info!(answer_set_id, %recorded, "Answer set restored");
    outbox.record(DomainEvent::Submission(SubmissionEvent::Restored { survey_id, answer_set_id }));
    Ok(())
}

fn unstamp_form(
    tables: &mut Tables,
    outbox: &mut Outbox,
    form_id: RowId,
    recorded: DateTime<Utc>,
) -> SurveyResult<()> {
    tables.form_mut(form_id)?.deleted_at = None;

    let stamped_sets: Vec<RowId> = tables
        .answer_sets_of(form_id)
        .filter(|set| set.deleted_at == Some(recorded))
        .map(|set| set.id)
        .collect();
    for answer_set_id in stamped_sets {
        unstamp_answer_set(tables, answer_set_id, recorded)?;
    }

    outbox.record(DomainEvent::Form(FormEvent::Restored { form_id, deleted_at: recorded }));
    Ok(())
}

fn unstamp_answer_set(tables: &mut Tables, answer_set_id: RowId, recorded: DateTime<Utc>) -> SurveyResult<()> {
    tables.answer_set_mut(answer_set_id)?.deleted_at = None;
    for answer in tables.answer_rows_of_mut(answer_set_id) {
        if answer.deleted_at == Some(recorded) {
            answer.deleted_at = None;
        }
    }
    Ok(())
}

// =============================================================================
// Hard delete
// =============================================================================

pub fn destroy_survey(tables: &mut Tables, outbox: &mut Outbox, survey_id: RowId) -> SurveyResult<()> {
    let survey_uuid = tables.survey(survey_id).ok_or(SurveyError::SurveyDoesNotExist)?.uuid;

    let form_ids: Vec<RowId> = tables.forms_of(survey_id).map(|form| form.id).collect();
    for form_id in form_ids {
        destroy_form(tables, outbox, form_id)?;
    }
    tables.remove_survey(survey_id);

    info!(%survey_uuid, "Survey destroyed");
    outbox.record(DomainEvent::Survey(SurveyEvent::Destroyed { survey_uuid }));
    Ok(())
}

pub fn destroy_form(tables: &mut Tables, outbox: &mut Outbox, form_id: RowId) -> SurveyResult<()> {
    let (form, settings) = tables.remove_form(form_id).ok_or(SurveyError::FormDoesNotExist)?;

    info!(form_uuid = %form.uuid, "Form destroyed");
    outbox.record(DomainEvent::Form(FormEvent::Destroyed {
        form_uuid: form.uuid,
        settings_id: settings.map(|settings| settings.id).unwrap_or_default(),
    }));
    Ok(())
}

pub fn destroy_answer_set(tables: &mut Tables, outbox: &mut Outbox, answer_set_id: RowId) -> SurveyResult<()> {
    let form_id = tables
        .answer_set(answer_set_id)
        .ok_or(SurveyError::AnswerSetDoesNotExist)?
        .form_id;
    let survey_id = survey_of_form(tables, form_id)?;

    tables.remove_answer_set(answer_set_id);
    outbox.record(DomainEvent::Submission(SubmissionEvent::Destroyed {
        survey_id,
        answer_set_id,
    }));
    Ok(())
}

fn survey_of_form(tables: &Tables, form_id: RowId) -> SurveyResult<RowId> {
    tables
        .form(form_id)
        .map(|form| form.survey_id)
        .ok_or(SurveyError::FormDoesNotExist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{AnswerSet, FormSettings, Survey, SurveyForm};
    use crate::domain::services::answer_engine::{self, WriteMode};
    use crate::domain::services::compiler::QuestionCompiler;
    use chrono::Duration;
    use proptest::prelude::*;
    use serde_json::{json, Map, Value};

    struct Fixture {
        tables: Tables,
        survey_id: RowId,
        forms: Vec<RowId>,
        sets: Vec<RowId>,
    }

    /// Survey with 2 forms x 3 answer sets x 2 answers.
    fn fixture() -> Fixture {
        let mut tables = Tables::default();
        let mut outbox = Outbox::new();
        let now = Utc::now();
        let compiler = QuestionCompiler::default();
        let definition = json!({ "pages": [{ "elements": [
            { "type": "text", "name": "a" },
            { "type": "boolean", "name": "b" }
        ] }] });
        let answers = match json!({ "a": "hello", "b": false }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let survey_id = tables.insert_survey(Survey::new("s", 1, now)).unwrap();
        let mut forms = Vec::new();
        let mut sets = Vec::new();
        for version in 1..=2 {
            let form_id = tables
                .insert_form(SurveyForm::new(survey_id, version, None, definition.clone(), now).unwrap())
                .unwrap();
            tables.insert_settings(FormSettings::for_new_form(form_id)).unwrap();
            versioning::apply_activation(&mut tables, &mut outbox, form_id).unwrap();
            let tree = compiler.compile_definition(&definition).unwrap();
            compiler.persist(&tree, &mut tables, form_id).unwrap();

            for _ in 0..3 {
                let set_id = tables
                    .insert_answer_set(AnswerSet::new(form_id, None, Map::new(), now))
                    .unwrap();
                answer_engine::submit(&mut tables, set_id, &answers, WriteMode::Create).unwrap();
                sets.push(set_id);
            }
            forms.push(form_id);
        }

        Fixture { tables, survey_id, forms, sets }
    }

    /// Every `deleted_at` of the subtree, root first.
    fn stamps(fixture: &Fixture) -> Vec<Option<DateTime<Utc>>> {
        let tables = &fixture.tables;
        let mut all = vec![tables.survey(fixture.survey_id).unwrap().deleted_at];
        all.extend(fixture.forms.iter().map(|id| tables.form(*id).unwrap().deleted_at));
        for set_id in &fixture.sets {
            all.push(tables.answer_set(*set_id).unwrap().deleted_at);
            all.extend(tables.answer_rows_of(*set_id).map(|row| row.deleted_at));
        }
        all
    }

    #[test]
    fn survey_cascade_stamps_and_restores_all_rows() {
        let mut fx = fixture();
        let mut outbox = Outbox::new();
        let now = Utc::now();

        soft_delete_survey(&mut fx.tables, &mut outbox, fx.survey_id, now).unwrap();

        let after_delete = stamps(&fx);
        assert_eq!(after_delete.len(), 21);
        assert!(after_delete.iter().all(|stamp| *stamp == Some(now)));
        assert_eq!(fx.tables.survey(fx.survey_id).unwrap().active_version, None);
        assert!(versioning::active_forms(&fx.tables, fx.survey_id).is_empty());

        restore_survey(&mut fx.tables, &mut outbox, fx.survey_id).unwrap();
        assert!(stamps(&fx).iter().all(Option::is_none));
        // restore does not re-activate
        assert_eq!(fx.tables.survey(fx.survey_id).unwrap().active_version, None);
    }

    #[test]
    fn earlier_independent_delete_survives_restore() {
        let mut fx = fixture();
        let mut outbox = Outbox::new();
        let earlier = Utc::now() - Duration::minutes(5);
        let later = Utc::now();

        soft_delete_answer_set(&mut fx.tables, &mut outbox, fx.sets[0], earlier).unwrap();
        soft_delete_survey(&mut fx.tables, &mut outbox, fx.survey_id, later).unwrap();
        restore_survey(&mut fx.tables, &mut outbox, fx.survey_id).unwrap();

        assert_eq!(fx.tables.answer_set(fx.sets[0]).unwrap().deleted_at, Some(earlier));
        assert!(fx.tables.answer_rows_of(fx.sets[0]).all(|row| row.deleted_at == Some(earlier)));
        assert_eq!(fx.tables.answer_set(fx.sets[1]).unwrap().deleted_at, None);
    }

    #[test]
    fn state_errors_are_reported() {
        let mut fx = fixture();
        let mut outbox = Outbox::new();
        let now = Utc::now();

        assert!(matches!(
            restore_survey(&mut fx.tables, &mut outbox, fx.survey_id),
            Err(SurveyError::SurveyNotDeleted)
        ));
        soft_delete_form(&mut fx.tables, &mut outbox, fx.forms[0], now).unwrap();
        assert!(matches!(
            soft_delete_form(&mut fx.tables, &mut outbox, fx.forms[0], now),
            Err(SurveyError::FormAlreadyDeleted)
        ));
        assert!(matches!(
            restore_answer_set(&mut fx.tables, &mut outbox, 9999),
            Err(SurveyError::AnswerSetDoesNotExist)
        ));
    }

    #[test]
    fn deleting_the_active_form_clears_active_version() {
        let mut fx = fixture();
        let mut outbox = Outbox::new();
        let active = fx.forms[1];
        assert_eq!(fx.tables.survey(fx.survey_id).unwrap().active_version, Some(active));

        soft_delete_form(&mut fx.tables, &mut outbox, active, Utc::now()).unwrap();

        assert_eq!(fx.tables.survey(fx.survey_id).unwrap().active_version, None);
        assert!(!fx.tables.settings_of(active).unwrap().is_active);
    }

    #[test]
    fn hard_delete_removes_the_subtree() {
        let mut fx = fixture();
        let mut outbox = Outbox::new();

        destroy_survey(&mut fx.tables, &mut outbox, fx.survey_id).unwrap();

        assert!(fx.tables.survey(fx.survey_id).is_none());
        assert!(fx.forms.iter().all(|id| fx.tables.form(*id).is_none()));
        assert!(fx.sets.iter().all(|id| fx.tables.answer_set(*id).is_none()));
        assert_eq!(fx.tables.answer_rows().count(), 0);
        assert_eq!(fx.tables.option_rows().count(), 0);
    }

    proptest! {
        #[test]
        fn restore_undoes_exactly_its_own_batch(
            early_sets in proptest::collection::vec(any::<bool>(), 6),
            early_forms in proptest::collection::vec(any::<bool>(), 2),
        ) {
            let mut fx = fixture();
            let mut outbox = Outbox::new();
            let base = Utc::now() - Duration::hours(1);

            for (i, delete) in early_sets.iter().enumerate() {
                if *delete {
                    let at = base + Duration::seconds(i as i64);
                    soft_delete_answer_set(&mut fx.tables, &mut outbox, fx.sets[i], at).unwrap();
                }
            }
            for (i, delete) in early_forms.iter().enumerate() {
                if *delete {
                    let at = base + Duration::minutes(10 + i as i64);
                    soft_delete_form(&mut fx.tables, &mut outbox, fx.forms[i], at).unwrap();
                }
            }

            let before = stamps(&fx);
            soft_delete_survey(&mut fx.tables, &mut outbox, fx.survey_id, Utc::now()).unwrap();
            restore_survey(&mut fx.tables, &mut outbox, fx.survey_id).unwrap();

            prop_assert_eq!(stamps(&fx), before);
        }
    }
}
