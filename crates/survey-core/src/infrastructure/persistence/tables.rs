//! Table set with unique constraints and the queries the services need.
//!
//! Lookups by identity (phone, uuid, token, `(form, name)` and so on) and by
//! owning row go through the per-table indexes of [`Table`].

use uuid::Uuid;

use super::rows::{AnswerRow, OptionRow};
use super::table::{Indexed, Table};
use crate::domain::aggregates::{
    Answer, AnswerSet, FormSettings, OneTimeLink, Question, QuestionOption, Survey, SurveyForm,
    TargetAudience, User,
};
use crate::domain::value_objects::{PhoneNumber, RowId};
use crate::error::{FieldErrors, SurveyError, SurveyResult};

impl Indexed for User {
    type Key = PhoneNumber;

    fn key(&self) -> Option<PhoneNumber> {
        Some(self.phone_number.clone())
    }

    fn parent(&self) -> Option<RowId> {
        None
    }
}

impl Indexed for Survey {
    type Key = Uuid;

    fn key(&self) -> Option<Uuid> {
        Some(self.uuid)
    }

    fn parent(&self) -> Option<RowId> {
        None
    }
}

impl Indexed for SurveyForm {
    type Key = (RowId, i32);

    fn key(&self) -> Option<(RowId, i32)> {
        Some((self.survey_id, self.version))
    }

    fn parent(&self) -> Option<RowId> {
        Some(self.survey_id)
    }
}

impl Indexed for FormSettings {
    type Key = RowId;

    fn key(&self) -> Option<RowId> {
        Some(self.form_id)
    }

    fn parent(&self) -> Option<RowId> {
        None
    }
}

impl Indexed for TargetAudience {
    type Key = RowId;

    fn key(&self) -> Option<RowId> {
        None
    }

    fn parent(&self) -> Option<RowId> {
        None
    }
}

impl Indexed for OneTimeLink {
    type Key = Uuid;

    fn key(&self) -> Option<Uuid> {
        Some(self.token)
    }

    fn parent(&self) -> Option<RowId> {
        Some(self.survey_id)
    }
}

impl Indexed for Question {
    type Key = (RowId, String);

    fn key(&self) -> Option<(RowId, String)> {
        Some((self.form_id, self.name.clone()))
    }

    fn parent(&self) -> Option<RowId> {
        Some(self.form_id)
    }
}

impl Indexed for OptionRow {
    type Key = (RowId, String);

    fn key(&self) -> Option<(RowId, String)> {
        Some((self.question_id, self.value.clone()))
    }

    fn parent(&self) -> Option<RowId> {
        Some(self.question_id)
    }
}

impl Indexed for AnswerSet {
    type Key = Uuid;

    fn key(&self) -> Option<Uuid> {
        Some(self.uuid)
    }

    fn parent(&self) -> Option<RowId> {
        Some(self.form_id)
    }
}

impl Indexed for AnswerRow {
    type Key = (RowId, RowId);

    fn key(&self) -> Option<(RowId, RowId)> {
        Some((self.answer_set_id, self.question_id))
    }

    fn parent(&self) -> Option<RowId> {
        Some(self.answer_set_id)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Tables {
    next_id: RowId,
    /// `next_id` when the open transaction began.
    saved_next_id: Option<RowId>,
    users: Table<User>,
    surveys: Table<Survey>,
    forms: Table<SurveyForm>,
    settings: Table<FormSettings>,
    audiences: Table<TargetAudience>,
    links: Table<OneTimeLink>,
    questions: Table<Question>,
    options: Table<OptionRow>,
    answer_sets: Table<AnswerSet>,
    answers: Table<AnswerRow>,
}

impl Tables {
    fn allocate_id(&mut self) -> RowId {
        self.next_id += 1;
        self.next_id
    }

    pub(super) fn begin(&mut self) {
        self.saved_next_id = Some(self.next_id);
        self.users.begin();
        self.surveys.begin();
        self.forms.begin();
        self.settings.begin();
        self.audiences.begin();
        self.links.begin();
        self.questions.begin();
        self.options.begin();
        self.answer_sets.begin();
        self.answers.begin();
    }

    pub(super) fn commit(&mut self) {
        self.saved_next_id = None;
        self.users.commit();
        self.surveys.commit();
        self.forms.commit();
        self.settings.commit();
        self.audiences.commit();
        self.links.commit();
        self.questions.commit();
        self.options.commit();
        self.answer_sets.commit();
        self.answers.commit();
    }

    pub(super) fn rollback(&mut self) {
        if let Some(next_id) = self.saved_next_id.take() {
            self.next_id = next_id;
        }
        self.users.rollback();
        self.surveys.rollback();
        self.forms.rollback();
        self.settings.rollback();
        self.audiences.rollback();
        self.links.rollback();
        self.questions.rollback();
        self.options.rollback();
        self.answer_sets.rollback();
        self.answers.rollback();
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn insert_user(&mut self, mut user: User) -> SurveyResult<RowId> {
        if self.users.contains_key(&user.phone_number) {
            return Err(FieldErrors::single("phone_number", "a user with this phone number already exists").into());
        }
        user.id = self.allocate_id();
        let id = user.id;
        self.users.insert(id, user);
        Ok(id)
    }

    pub fn user(&self, id: RowId) -> Option<&User> {
        self.users.get(id)
    }

    pub fn user_mut(&mut self, id: RowId) -> Option<&mut User> {
        self.users.get_mut(id)
    }

    pub fn user_by_phone(&self, phone: &PhoneNumber) -> Option<&User> {
        self.users.by_key(phone)
    }

    // =========================================================================
    // Surveys
    // =========================================================================

    pub fn insert_survey(&mut self, mut survey: Survey) -> SurveyResult<RowId> {
        survey.id = self.allocate_id();
        let id = survey.id;
        self.surveys.insert(id, survey);
        Ok(id)
    }

    pub fn survey(&self, id: RowId) -> Option<&Survey> {
        self.surveys.get(id)
    }

    pub fn survey_mut(&mut self, id: RowId) -> SurveyResult<&mut Survey> {
        self.surveys.get_mut(id).ok_or(SurveyError::SurveyDoesNotExist)
    }

    pub fn survey_by_uuid(&self, uuid: Uuid) -> Option<&Survey> {
        self.surveys.by_key(&uuid)
    }

    pub fn surveys(&self) -> impl Iterator<Item = &Survey> {
        self.surveys.values()
    }

    /// Drop a survey row and its links; callers remove the forms first.
    pub fn remove_survey(&mut self, id: RowId) -> Option<Survey> {
        let link_ids: Vec<RowId> = self.links.child_ids(id).collect();
        for link_id in link_ids {
            self.links.remove(link_id);
        }
        self.surveys.remove(id)
    }

    // =========================================================================
    // Forms and settings
    // =========================================================================

    /// Enforces `(survey, version)` uniqueness.
    pub fn insert_form(&mut self, mut form: SurveyForm) -> SurveyResult<RowId> {
        if self.forms.contains_key(&(form.survey_id, form.version)) {
            return Err(SurveyError::FormVersionExists(form.version));
        }
        form.id = self.allocate_id();
        let id = form.id;
        self.forms.insert(id, form);
        Ok(id)
    }

    pub fn form(&self, id: RowId) -> Option<&SurveyForm> {
        self.forms.get(id)
    }

    pub fn form_mut(&mut self, id: RowId) -> SurveyResult<&mut SurveyForm> {
        self.forms.get_mut(id).ok_or(SurveyError::FormDoesNotExist)
    }

    /// Form by public id, scoped to its survey.
    pub fn form_by_uuid(&self, survey_id: RowId, uuid: Uuid) -> Option<&SurveyForm> {
        self.forms_of(survey_id).find(|form| form.uuid == uuid)
    }

    pub fn forms_of(&self, survey_id: RowId) -> impl Iterator<Item = &SurveyForm> {
        self.forms.children_of(survey_id)
    }

    pub fn latest_version(&self, survey_id: RowId) -> Option<i32> {
        self.forms_of(survey_id).map(|form| form.version).max()
    }

    /// Remove a form together with its settings, questions and answer sets.
    pub fn remove_form(&mut self, id: RowId) -> Option<(SurveyForm, Option<FormSettings>)> {
        let form = self.forms.remove(id)?;

        let settings = self
            .settings
            .id_by_key(&id)
            .and_then(|settings_id| self.settings.remove(settings_id));

        let answer_set_ids: Vec<RowId> = self.answer_sets.child_ids(id).collect();
        for answer_set_id in answer_set_ids {
            self.remove_answer_set(answer_set_id);
        }

        let question_ids: Vec<RowId> = self.questions.child_ids(id).collect();
        for question_id in question_ids {
            let option_ids: Vec<RowId> = self.options.child_ids(question_id).collect();
            for option_id in option_ids {
                self.options.remove(option_id);
            }
            self.questions.remove(question_id);
        }

        let was_active = self
            .surveys
            .get(form.survey_id)
            .is_some_and(|survey| survey.active_version == Some(id));
        if was_active {
            if let Some(survey) = self.surveys.get_mut(form.survey_id) {
                survey.active_version = None;
            }
        }

        Some((form, settings))
    }

    /// Enforces the 1:1 form/settings relation.
    pub fn insert_settings(&mut self, mut settings: FormSettings) -> SurveyResult<RowId> {
        if self.settings.contains_key(&settings.form_id) {
            return Err(SurveyError::Storage(format!(
                "settings already exist for form {}",
                settings.form_id
            )));
        }
        settings.id = self.allocate_id();
        let id = settings.id;
        self.settings.insert(id, settings);
        Ok(id)
    }

    pub fn settings(&self, id: RowId) -> Option<&FormSettings> {
        self.settings.get(id)
    }

    pub fn settings_of(&self, form_id: RowId) -> Option<&FormSettings> {
        self.settings.by_key(&form_id)
    }

    pub fn settings_of_mut(&mut self, form_id: RowId) -> SurveyResult<&mut FormSettings> {
        self.settings
            .id_by_key(&form_id)
            .and_then(|id| self.settings.get_mut(id))
            .ok_or_else(|| SurveyError::Storage(format!("form {} has no settings", form_id)))
    }

    /// Settings of every form belonging to `survey_id`.
    pub fn settings_of_survey_mut(
        &mut self,
        survey_id: RowId,
    ) -> impl Iterator<Item = &mut FormSettings> {
        let settings_ids: Vec<RowId> = self
            .forms
            .child_ids(survey_id)
            .filter_map(|form_id| self.settings.id_by_key(&form_id))
            .collect();
        self.settings.rows_mut(settings_ids)
    }

    // =========================================================================
    // Target audiences and links
    // =========================================================================

    pub fn insert_audience(&mut self, mut audience: TargetAudience) -> SurveyResult<RowId> {
        audience.id = self.allocate_id();
        let id = audience.id;
        self.audiences.insert(id, audience);
        Ok(id)
    }

    pub fn audience(&self, id: RowId) -> Option<&TargetAudience> {
        self.audiences.get(id)
    }

    pub fn audiences(&self) -> impl Iterator<Item = &TargetAudience> {
        self.audiences.values()
    }

    pub fn insert_link(&mut self, mut link: OneTimeLink) -> SurveyResult<RowId> {
        if self.links.contains_key(&link.token) {
            return Err(SurveyError::Storage("duplicate link token".into()));
        }
        link.id = self.allocate_id();
        let id = link.id;
        self.links.insert(id, link);
        Ok(id)
    }

    pub fn link_by_token_mut(&mut self, token: Uuid) -> Option<&mut OneTimeLink> {
        let id = self.links.id_by_key(&token)?;
        self.links.get_mut(id)
    }

    pub fn links_of(&self, survey_id: RowId) -> impl Iterator<Item = &OneTimeLink> {
        self.links.children_of(survey_id)
    }

    // =========================================================================
    // Questions and options
    // =========================================================================

    /// Enforces `(form, name)` uniqueness.
    pub fn insert_question(&mut self, mut question: Question) -> SurveyResult<RowId> {
        if self.questions.contains_key(&(question.form_id, question.name.clone())) {
            return Err(FieldErrors::single(
                "name",
                format!("question name '{}' is used more than once in this form", question.name),
            )
            .into());
        }
        question.id = self.allocate_id();
        let id = question.id;
        self.questions.insert(id, question);
        Ok(id)
    }

    pub fn question(&self, id: RowId) -> Option<&Question> {
        self.questions.get(id)
    }

    pub fn question_by_name(&self, form_id: RowId, name: &str) -> Option<&Question> {
        self.questions.by_key(&(form_id, name.to_string()))
    }

    pub fn questions_of(&self, form_id: RowId) -> impl Iterator<Item = &Question> {
        self.questions.children_of(form_id)
    }

    pub fn children_of(&self, question_id: RowId) -> impl Iterator<Item = &Question> {
        let form_id = self.questions.get(question_id).map(|question| question.form_id);
        form_id
            .into_iter()
            .flat_map(move |form_id| self.questions_of(form_id))
            .filter(move |question| question.parent_id == Some(question_id))
    }

    /// Validates the payload and enforces `(question, value)` uniqueness.
    pub fn insert_option(&mut self, option: QuestionOption) -> SurveyResult<RowId> {
        let mut row = OptionRow::from_domain(&option)?;
        if self.options.contains_key(&(row.question_id, row.value.clone())) {
            return Err(FieldErrors::single(
                "value",
                format!("option '{}' is listed more than once", row.value),
            )
            .into());
        }
        row.id = self.allocate_id();
        let id = row.id;
        self.options.insert(id, row);
        Ok(id)
    }

    pub fn option_rows_of(&self, question_id: RowId) -> impl Iterator<Item = &OptionRow> {
        self.options.children_of(question_id)
    }

    pub fn options_of(&self, question_id: RowId) -> SurveyResult<Vec<QuestionOption>> {
        self.option_rows_of(question_id).map(OptionRow::to_domain).collect()
    }

    // =========================================================================
    // Answer sets and answers
    // =========================================================================

    pub fn insert_answer_set(&mut self, mut answer_set: AnswerSet) -> SurveyResult<RowId> {
        if self.answer_sets.contains_key(&answer_set.uuid) {
            return Err(SurveyError::Storage("duplicate answer set id".into()));
        }
        answer_set.id = self.allocate_id();
        let id = answer_set.id;
        self.answer_sets.insert(id, answer_set);
        Ok(id)
    }

    pub fn answer_set(&self, id: RowId) -> Option<&AnswerSet> {
        self.answer_sets.get(id)
    }

    pub fn answer_set_mut(&mut self, id: RowId) -> SurveyResult<&mut AnswerSet> {
        self.answer_sets
            .get_mut(id)
            .ok_or(SurveyError::AnswerSetDoesNotExist)
    }

    pub fn answer_set_by_uuid(&self, uuid: Uuid) -> Option<&AnswerSet> {
        self.answer_sets.by_key(&uuid)
    }

    pub fn answer_sets_of(&self, form_id: RowId) -> impl Iterator<Item = &AnswerSet> {
        self.answer_sets.children_of(form_id)
    }

    /// Every set the user ever submitted to the form, deleted ones included.
    pub fn submission_count(&self, form_id: RowId, user_id: RowId) -> usize {
        self.answer_sets_of(form_id)
            .filter(|set| set.user_id == Some(user_id))
            .count()
    }

    pub fn remove_answer_set(&mut self, id: RowId) -> Option<AnswerSet> {
        let answer_ids: Vec<RowId> = self.answers.child_ids(id).collect();
        for answer_id in answer_ids {
            self.answers.remove(answer_id);
        }
        self.answer_sets.remove(id)
    }

    /// Validates the payload and enforces `(question, answer_set)` uniqueness.
    pub fn insert_answer(&mut self, answer: Answer) -> SurveyResult<RowId> {
        let mut row = AnswerRow::from_domain(&answer)?;
        if self.answers.contains_key(&(row.answer_set_id, row.question_id)) {
            return Err(FieldErrors::single(
                "question",
                format!("question {} is already answered in this set", row.question_id),
            )
            .into());
        }
        row.id = self.allocate_id();
        let id = row.id;
        self.answers.insert(id, row);
        Ok(id)
    }

    pub fn remove_answer(&mut self, answer_set_id: RowId, question_id: RowId) -> Option<AnswerRow> {
        let id = self.answers.id_by_key(&(answer_set_id, question_id))?;
        self.answers.remove(id)
    }

    pub fn answer_row(&self, answer_set_id: RowId, question_id: RowId) -> Option<&AnswerRow> {
        self.answers.by_key(&(answer_set_id, question_id))
    }

    pub fn answer_row_mut(&mut self, answer_set_id: RowId, question_id: RowId) -> Option<&mut AnswerRow> {
        let id = self.answers.id_by_key(&(answer_set_id, question_id))?;
        self.answers.get_mut(id)
    }

    pub fn answer_rows_of(&self, answer_set_id: RowId) -> impl Iterator<Item = &AnswerRow> {
        self.answers.children_of(answer_set_id)
    }

    pub fn answer_rows_of_mut(&mut self, answer_set_id: RowId) -> impl Iterator<Item = &mut AnswerRow> {
        let ids: Vec<RowId> = self.answers.child_ids(answer_set_id).collect();
        self.answers.rows_mut(ids)
    }

    pub fn answers_of(&self, answer_set_id: RowId) -> SurveyResult<Vec<Answer>> {
        self.answer_rows_of(answer_set_id).map(AnswerRow::to_domain).collect()
    }

    pub fn answer_rows(&self) -> impl Iterator<Item = &AnswerRow> {
        self.answers.values()
    }

    pub fn option_rows(&self) -> impl Iterator<Item = &OptionRow> {
        self.options.values()
    }
}
