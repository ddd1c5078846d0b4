//! VersionStateMachine
//!
//! At most one form of a survey is active, and `survey.active_version` always
//! points at it (or is empty). Every settings write goes through
//! [`apply_activation`], which runs the exclusivity sweep inside the caller's
//! transaction.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::aggregates::FormSettings;
use crate::domain::events::{DomainEvent, FormEvent, Outbox};
use crate::domain::value_objects::RowId;
use crate::error::{SurveyError, SurveyResult};
use crate::infrastructure::persistence::Tables;
use crate::ports::outbound::JobAction;

/// Partial settings write. `Some(None)` clears a nullable field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SettingsUpdate {
    pub is_active: Option<bool>,
    pub start_date: Option<Option<DateTime<Utc>>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub max_submissions_per_user: Option<Option<u16>>,
    pub is_editable: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Applied,
    /// Settings were already in the requested state.
    Unchanged,
    /// Target row is gone or its form is soft-deleted.
    Skipped,
}

/// Propagate the stored `is_active` flag of `form_id` to its survey.
pub fn apply_activation(tables: &mut Tables, outbox: &mut Outbox, form_id: RowId) -> SurveyResult<()> {
    let survey_id = tables.form(form_id).ok_or(SurveyError::FormDoesNotExist)?.survey_id;
    let is_active = tables.settings_of_mut(form_id)?.is_active;

    if is_active {
        let mut swept = Vec::new();
        for settings in tables.settings_of_survey_mut(survey_id) {
            if settings.form_id != form_id && settings.is_active {
                settings.is_active = false;
                swept.push(settings.form_id);
            }
        }
        for other in swept {
            info!(survey_id, form_id = other, "Form deactivated by exclusivity sweep");
            outbox.record(DomainEvent::Form(FormEvent::Deactivated {
                survey_id,
                form_id: other,
            }));
        }

        let survey = tables.survey_mut(survey_id)?;
        if survey.active_version != Some(form_id) {
            survey.active_version = Some(form_id);
            info!(survey_id, form_id, "Form activated");
            outbox.record(DomainEvent::Form(FormEvent::Activated { survey_id, form_id }));
        }
    } else {
        let survey = tables.survey_mut(survey_id)?;
        if survey.active_version == Some(form_id) {
            survey.active_version = None;
            info!(survey_id, form_id, "Active form deactivated");
            outbox.record(DomainEvent::Form(FormEvent::Deactivated { survey_id, form_id }));
        }
    }

    Ok(())
}

/// Explicit activation; rejected when the form is already active.
pub fn activate(tables: &mut Tables, outbox: &mut Outbox, form_id: RowId) -> SurveyResult<()> {
    live_form(tables, form_id)?;

    let settings = tables.settings_of_mut(form_id)?;
    if settings.is_active {
        return Err(SurveyError::FormAlreadyActivated);
    }
    settings.is_active = true;

    apply_activation(tables, outbox, form_id)
}

pub fn deactivate(tables: &mut Tables, outbox: &mut Outbox, form_id: RowId) -> SurveyResult<()> {
    tables.settings_of_mut(form_id)?.is_active = false;
    apply_activation(tables, outbox, form_id)
}

/// Write a settings patch, validate the window and run the sweep.
pub fn update_settings(
    tables: &mut Tables,
    outbox: &mut Outbox,
    form_id: RowId,
    update: SettingsUpdate,
    now: DateTime<Utc>,
) -> SurveyResult<FormSettings> {
    live_form(tables, form_id)?;

    let mut settings = tables.settings_of_mut(form_id)?.clone();
    let start_changed = update.start_date.is_some_and(|date| date != settings.start_date);
    let end_changed = update.end_date.is_some_and(|date| date != settings.end_date);

    if let Some(is_active) = update.is_active {
        settings.is_active = is_active;
    }
    if let Some(start_date) = update.start_date {
        settings.start_date = start_date;
    }
    if let Some(end_date) = update.end_date {
        settings.end_date = end_date;
    }
    if let Some(cap) = update.max_submissions_per_user {
        settings.max_submissions_per_user = cap;
    }
    if let Some(is_editable) = update.is_editable {
        settings.is_editable = is_editable;
    }

    settings.validate_window(now, start_changed, end_changed)?;

    *tables.settings_of_mut(form_id)? = settings.clone();
    apply_activation(tables, outbox, form_id)?;

    let dates = [
        (JobAction::Activate, start_changed, settings.start_date),
        (JobAction::Deactivate, end_changed, settings.end_date),
    ];
    for (action, changed, date) in dates {
        if changed {
            outbox.record(DomainEvent::Form(FormEvent::ScheduleChanged {
                settings_id: settings.id,
                form_id,
                action,
                run_at: date.filter(|at| *at > now),
            }));
        }
    }

    tables
        .settings_of(form_id)
        .cloned()
        .ok_or_else(|| SurveyError::Storage(format!("form {} has no settings", form_id)))
}

/// Body of a deferred activation/deactivation job.
pub fn run_scheduled(
    tables: &mut Tables,
    outbox: &mut Outbox,
    settings_id: RowId,
    action: JobAction,
) -> SurveyResult<JobOutcome> {
    let Some(settings) = tables.settings(settings_id) else {
        info!(settings_id, ?action, "Scheduled job skipped, settings no longer exist");
        return Ok(JobOutcome::Skipped);
    };
    let form_id = settings.form_id;
    let currently_active = settings.is_active;

    if tables.form(form_id).map_or(true, |form| form.is_deleted()) {
        info!(settings_id, form_id, ?action, "Scheduled job skipped, form is deleted");
        return Ok(JobOutcome::Skipped);
    }

    let target = action == JobAction::Activate;
    if currently_active == target {
        return Ok(JobOutcome::Unchanged);
    }

    tables.settings_of_mut(form_id)?.is_active = target;
    apply_activation(tables, outbox, form_id)?;
    info!(settings_id, form_id, ?action, "Scheduled job applied");
    Ok(JobOutcome::Applied)
}

/// Forms of the survey whose settings are active.
pub fn active_forms(tables: &Tables, survey_id: RowId) -> Vec<RowId> {
    tables
        .forms_of(survey_id)
        .filter(|form| tables.settings_of(form.id).is_some_and(|settings| settings.is_active))
        .map(|form| form.id)
        .collect()
}

fn live_form(tables: &Tables, form_id: RowId) -> SurveyResult<()> {
    match tables.form(form_id) {
        Some(form) if !form.is_deleted() => Ok(()),
        _ => Err(SurveyError::FormDoesNotExist),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Survey, SurveyForm};
    use crate::infrastructure::persistence::InMemoryStore;
    use chrono::Duration;
    use proptest::prelude::*;
    use serde_json::Value;

    /// Survey with `n` forms, each with settings. Returns (survey, forms).
    fn survey_with_forms(store: &InMemoryStore, n: usize) -> (RowId, Vec<RowId>) {
        let now = Utc::now();
        store
            .transaction(|tx, outbox| {
                let survey_id = tx.insert_survey(Survey::new("s", 1, now))?;
                let mut forms = Vec::new();
                for version in 1..=n {
                    let form_id = tx.insert_form(SurveyForm::new(
                        survey_id,
                        version as i32,
                        None,
                        Value::Null,
                        now,
                    )?)?;
                    tx.insert_settings(FormSettings::for_new_form(form_id))?;
                    apply_activation(tx, outbox, form_id)?;
                    forms.push(form_id);
                }
                Ok((survey_id, forms))
            })
            .unwrap()
            .0
    }

    fn assert_exclusive(tables: &Tables, survey_id: RowId) {
        let active = active_forms(tables, survey_id);
        assert!(active.len() <= 1, "more than one active form: {:?}", active);
        assert_eq!(tables.survey(survey_id).unwrap().active_version, active.first().copied());
    }

    #[test]
    fn newest_form_wins_on_creation() {
        let store = InMemoryStore::new();
        let (survey_id, forms) = survey_with_forms(&store, 3);

        store.read(|tables| {
            assert_eq!(active_forms(tables, survey_id), vec![forms[2]]);
            assert_exclusive(tables, survey_id);
        });
    }

    #[test]
    fn activating_b_deactivates_a() {
        let store = InMemoryStore::new();
        let (survey_id, forms) = survey_with_forms(&store, 2);
        let (a, b) = (forms[0], forms[1]);

        store.transaction(|tx, outbox| activate(tx, outbox, a)).unwrap();
        let (_, events) = store.transaction(|tx, outbox| activate(tx, outbox, b)).unwrap();

        store.read(|tables| {
            assert!(!tables.settings_of(a).unwrap().is_active);
            assert!(tables.settings_of(b).unwrap().is_active);
            assert_eq!(tables.survey(survey_id).unwrap().active_version, Some(b));
        });
        assert!(events.contains(&DomainEvent::Form(FormEvent::Deactivated { survey_id, form_id: a })));
        assert!(events.contains(&DomainEvent::Form(FormEvent::Activated { survey_id, form_id: b })));
    }

    #[test]
    fn activating_an_active_form_is_rejected() {
        let store = InMemoryStore::new();
        let (_, forms) = survey_with_forms(&store, 1);

        let err = store.transaction(|tx, outbox| activate(tx, outbox, forms[0])).unwrap_err();
        assert!(matches!(err, SurveyError::FormAlreadyActivated));
    }

    #[test]
    fn saving_inactive_clears_the_active_version() {
        let store = InMemoryStore::new();
        let (survey_id, forms) = survey_with_forms(&store, 1);

        let update = SettingsUpdate { is_active: Some(false), ..Default::default() };
        store
            .transaction(|tx, outbox| update_settings(tx, outbox, forms[0], update, Utc::now()))
            .unwrap();

        store.read(|tables| assert_eq!(tables.survey(survey_id).unwrap().active_version, None));
    }

    #[test]
    fn date_changes_emit_a_schedule_event() {
        let store = InMemoryStore::new();
        let (_, forms) = survey_with_forms(&store, 1);
        let now = Utc::now();
        let start = now + Duration::hours(1);
        let end = now + Duration::days(1);

        let update = SettingsUpdate {
            start_date: Some(Some(start)),
            end_date: Some(Some(end)),
            ..Default::default()
        };
        let (settings, events) = store
            .transaction(|tx, outbox| update_settings(tx, outbox, forms[0], update, now))
            .unwrap();

        assert_eq!(settings.start_date, Some(start));
        let schedules: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                DomainEvent::Form(FormEvent::ScheduleChanged { action, run_at, .. }) => {
                    Some((*action, *run_at))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            schedules,
            vec![(JobAction::Activate, Some(start)), (JobAction::Deactivate, Some(end))]
        );
    }

    #[test]
    fn end_only_patch_leaves_a_past_start_alone() {
        let store = InMemoryStore::new();
        let (_, forms) = survey_with_forms(&store, 1);
        let now = Utc::now();
        store
            .transaction(|tx, _| {
                let settings = tx.settings_of_mut(forms[0])?;
                settings.start_date = Some(now - Duration::hours(1));
                settings.is_active = false;
                Ok(())
            })
            .unwrap();

        let end = now + Duration::days(1);
        let update = SettingsUpdate { end_date: Some(Some(end)), ..Default::default() };
        let (settings, events) = store
            .transaction(|tx, outbox| update_settings(tx, outbox, forms[0], update, now))
            .unwrap();

        assert!(!settings.is_active);
        let schedules: Vec<_> = events
            .iter()
            .filter(|event| matches!(event, DomainEvent::Form(FormEvent::ScheduleChanged { .. })))
            .collect();
        assert_eq!(schedules.len(), 1);
        assert!(matches!(
            schedules[0],
            DomainEvent::Form(FormEvent::ScheduleChanged { action: JobAction::Deactivate, run_at: Some(at), .. })
                if *at == end
        ));
    }

    #[test]
    fn start_at_now_is_not_scheduled() {
        let store = InMemoryStore::new();
        let (_, forms) = survey_with_forms(&store, 1);
        let now = Utc::now();

        let update = SettingsUpdate { start_date: Some(Some(now)), ..Default::default() };
        let (_, events) = store
            .transaction(|tx, outbox| update_settings(tx, outbox, forms[0], update, now))
            .unwrap();

        assert!(events.contains(&DomainEvent::Form(FormEvent::ScheduleChanged {
            settings_id: store.read(|tables| tables.settings_of(forms[0]).unwrap().id),
            form_id: forms[0],
            action: JobAction::Activate,
            run_at: None,
        })));
    }

    #[test]
    fn invalid_window_is_rejected_without_writing() {
        let store = InMemoryStore::new();
        let (_, forms) = survey_with_forms(&store, 1);
        let now = Utc::now();

        let update = SettingsUpdate {
            start_date: Some(Some(now + Duration::days(2))),
            end_date: Some(Some(now + Duration::days(1))),
            ..Default::default()
        };
        let err = store
            .transaction(|tx, outbox| update_settings(tx, outbox, forms[0], update, now))
            .unwrap_err();

        assert!(err.field_errors().unwrap().contains("end_date"));
        store.read(|tables| assert!(tables.settings_of(forms[0]).unwrap().start_date.is_none()));
    }

    #[test]
    fn scheduled_jobs_are_idempotent_and_skip_deleted_forms() {
        let store = InMemoryStore::new();
        let (survey_id, forms) = survey_with_forms(&store, 2);
        let first_settings = store.read(|tables| tables.settings_of(forms[0]).unwrap().id);

        let (outcome, _) = store
            .transaction(|tx, outbox| run_scheduled(tx, outbox, first_settings, JobAction::Activate))
            .unwrap();
        assert_eq!(outcome, JobOutcome::Applied);
        store.read(|tables| assert_eq!(tables.survey(survey_id).unwrap().active_version, Some(forms[0])));

        let (outcome, _) = store
            .transaction(|tx, outbox| run_scheduled(tx, outbox, first_settings, JobAction::Activate))
            .unwrap();
        assert_eq!(outcome, JobOutcome::Unchanged);

        store
            .transaction(|tx, _| {
                tx.form_mut(forms[0])?.deleted_at = Some(Utc::now());
                Ok(())
            })
            .unwrap();
        let (outcome, _) = store
            .transaction(|tx, outbox| run_scheduled(tx, outbox, first_settings, JobAction::Deactivate))
            .unwrap();
        assert_eq!(outcome, JobOutcome::Skipped);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Activate(usize),
        Deactivate(usize),
        Save(usize, bool),
        Job(usize, bool),
    }

    fn op_strategy(forms: usize) -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..forms).prop_map(Op::Activate),
            (0..forms).prop_map(Op::Deactivate),
            (0..forms, any::<bool>()).prop_map(|(i, flag)| Op::Save(i, flag)),
            (0..forms, any::<bool>()).prop_map(|(i, flag)| Op::Job(i, flag)),
        ]
    }

    proptest! {
        #[test]
        fn at_most_one_active_form(ops in proptest::collection::vec(op_strategy(4), 0..40)) {
            let store = InMemoryStore::new();
            let (survey_id, forms) = survey_with_forms(&store, 4);

            for op in ops {
                // Rejected operations are part of the law too.
                let _ = store.transaction(|tx, outbox| match op {
                    Op::Activate(i) => activate(tx, outbox, forms[i]),
                    Op::Deactivate(i) => deactivate(tx, outbox, forms[i]),
                    Op::Save(i, flag) => {
                        let update = SettingsUpdate { is_active: Some(flag), ..Default::default() };
                        update_settings(tx, outbox, forms[i], update, Utc::now()).map(|_| ())
                    }
                    Op::Job(i, flag) => {
                        let settings_id = tx.settings_of(forms[i]).map(|s| s.id).unwrap_or_default();
                        let action = if flag { JobAction::Activate } else { JobAction::Deactivate };
                        run_scheduled(tx, outbox, settings_id, action).map(|_| ())
                    }
                });

                store.read(|tables| assert_exclusive(tables, survey_id));
            }
        }
    }
}
