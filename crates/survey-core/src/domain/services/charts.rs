//! Per-question option counts over the live answer sets of a form.

use serde::Serialize;
use serde_json::Value;

use crate::domain::aggregates::{Question, QuestionOption};
use crate::domain::value_objects::{AnswerValue, OptionValue, QuestionType, RowId};
use crate::error::{SurveyError, SurveyResult};
use crate::infrastructure::persistence::Tables;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionCount {
    pub value: String,
    pub label: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChartData {
    pub question_name: String,
    pub question_title: Option<String>,
    pub question_type: QuestionType,
    pub total_submissions: usize,
    pub options: Vec<OptionCount>,
}

/// Charts of the survey's active form.
pub fn charts_for_survey(tables: &Tables, survey_id: RowId, live_only: bool) -> SurveyResult<Vec<ChartData>> {
    let survey = tables.survey(survey_id).ok_or(SurveyError::SurveyDoesNotExist)?;
    let form_id = survey.active_version.ok_or(SurveyError::FormNotFound)?;
    charts_for_form(tables, form_id, live_only)
}

/// Charts of every chartable question of `form_id`; `live_only` keeps the
/// questions flagged for the live feed.
pub fn charts_for_form(tables: &Tables, form_id: RowId, live_only: bool) -> SurveyResult<Vec<ChartData>> {
    let live_sets: Vec<RowId> = tables
        .answer_sets_of(form_id)
        .filter(|set| !set.is_deleted())
        .map(|set| set.id)
        .collect();

    let questions: Vec<&Question> = tables
        .questions_of(form_id)
        .filter(|question| question.question_type.is_chartable())
        .filter(|question| !live_only || question.is_live)
        .collect();

    let mut charts = Vec::with_capacity(questions.len());
    for question in questions {
        let options = tables.options_of(question.id)?;

        let mut answers = Vec::new();
        for set_id in &live_sets {
            if let Some(row) = tables.answer_row(*set_id, question.id) {
                if row.deleted_at.is_none() {
                    answers.push(row.to_domain()?.value);
                }
            }
        }

        charts.push(build_chart(question, &options, &answers));
    }

    Ok(charts)
}

fn build_chart(question: &Question, options: &[QuestionOption], answers: &[AnswerValue]) -> ChartData {
    let selections: Vec<Vec<String>> = answers.iter().map(selected_keys).collect();

    let options: Vec<OptionCount> = options
        .iter()
        .map(|option| {
            let key = option_key(option);
            OptionCount {
                value: option.value.clone(),
                label: option.display().to_string(),
                count: selections.iter().filter(|keys| keys.contains(&key)).count(),
            }
        })
        .collect();

    let total_submissions = match question.question_type {
        QuestionType::Checkbox | QuestionType::Tagbox => answers.len(),
        _ => options.iter().map(|option| option.count).sum(),
    };

    ChartData {
        question_name: question.name.clone(),
        question_title: question.title.clone(),
        question_type: question.question_type,
        total_submissions,
        options,
    }
}

fn option_key(option: &QuestionOption) -> String {
    match &option.payload {
        OptionValue::Boolean(flag) => flag.to_string(),
        _ => option.value.clone(),
    }
}

/// Option keys an answer selects. Multi-select answers are JSON lists,
/// possibly stored in serialized form.
fn selected_keys(answer: &AnswerValue) -> Vec<String> {
    match answer {
        AnswerValue::Text(text) => vec![text.clone()],
        AnswerValue::Boolean(flag) => vec![flag.to_string()],
        AnswerValue::Numeric(number) => vec![number.to_string()],
        AnswerValue::File(_) => Vec::new(),
        AnswerValue::Json(Value::String(serialized)) => match serde_json::from_str::<Value>(serialized) {
            Ok(Value::Array(items)) => items.iter().map(scalar_key).collect(),
            _ => vec![serialized.clone()],
        },
        AnswerValue::Json(Value::Array(items)) => items.iter().map(scalar_key).collect(),
        AnswerValue::Json(_) => Vec::new(),
    }
}

fn scalar_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{AnswerSet, Survey, SurveyForm};
    use crate::domain::services::answer_engine::{self, WriteMode};
    use crate::domain::services::compiler::QuestionCompiler;
    use chrono::Utc;
    use serde_json::{json, Map};

    fn submit_all(tables: &mut Tables, form_id: RowId, submissions: &[Value]) -> Vec<RowId> {
        submissions
            .iter()
            .map(|submission| {
                let metadata: Map<String, Value> = submission.as_object().cloned().unwrap_or_default();
                let set_id = tables
                    .insert_answer_set(AnswerSet::new(form_id, None, metadata.clone(), Utc::now()))
                    .unwrap();
                answer_engine::submit(tables, set_id, &metadata, WriteMode::Create).unwrap();
                set_id
            })
            .collect()
    }

    fn fixture() -> (Tables, RowId, RowId) {
        let mut tables = Tables::default();
        let now = Utc::now();
        let survey_id = tables.insert_survey(Survey::new("s", 1, now)).unwrap();
        let form_id = tables
            .insert_form(SurveyForm::new(survey_id, 1, None, Value::Null, now).unwrap())
            .unwrap();
        tables.survey_mut(survey_id).unwrap().active_version = Some(form_id);

        let compiler = QuestionCompiler::default();
        let tree = compiler
            .compile_definition(&json!({ "pages": [{ "elements": [
                { "type": "radiogroup", "name": "color", "choices": ["red", "blue"], "isLive": true },
                { "type": "checkbox", "name": "pets", "choices": ["cat", "dog", "fish"] },
                { "type": "boolean", "name": "agree", "isLive": true },
                { "type": "imagepicker", "name": "pic", "choices": [
                    { "value": "lion", "imageLink": "l.png" },
                    { "value": "tiger", "imageLink": "t.png" }
                ] },
                { "type": "text", "name": "comment" }
            ] }] }))
            .unwrap();
        compiler.persist(&tree, &mut tables, form_id).unwrap();
        (tables, survey_id, form_id)
    }

    fn counts(chart: &ChartData) -> Vec<(&str, usize)> {
        chart.options.iter().map(|o| (o.label.as_str(), o.count)).collect()
    }

    #[test]
    fn counts_each_chartable_kind() {
        let (mut tables, survey_id, form_id) = fixture();
        submit_all(
            &mut tables,
            form_id,
            &[
                json!({ "color": "red", "pets": ["cat", "dog"], "agree": true, "pic": "lion" }),
                json!({ "color": "red", "pets": ["dog"], "agree": false }),
                json!({ "color": "blue", "agree": true, "comment": "hi" }),
            ],
        );

        let charts = charts_for_survey(&tables, survey_id, false).unwrap();
        assert_eq!(charts.len(), 4);

        let color = &charts.iter().find(|c| c.question_name == "color").unwrap();
        assert_eq!(counts(color), vec![("red", 2), ("blue", 1)]);
        assert_eq!(color.total_submissions, 3);

        let pets = &charts.iter().find(|c| c.question_name == "pets").unwrap();
        assert_eq!(counts(pets), vec![("cat", 1), ("dog", 2), ("fish", 0)]);
        assert_eq!(pets.total_submissions, 2);

        let agree = &charts.iter().find(|c| c.question_name == "agree").unwrap();
        assert_eq!(counts(agree), vec![("Yes", 2), ("No", 1)]);

        let pic = &charts.iter().find(|c| c.question_name == "pic").unwrap();
        assert_eq!(counts(pic), vec![("lion", 1), ("tiger", 0)]);
    }

    #[test]
    fn deleted_sets_and_non_live_questions_are_excluded() {
        let (mut tables, survey_id, form_id) = fixture();
        let sets = submit_all(
            &mut tables,
            form_id,
            &[json!({ "color": "red" }), json!({ "color": "blue" })],
        );
        tables.answer_set_mut(sets[0]).unwrap().deleted_at = Some(Utc::now());

        let charts = charts_for_survey(&tables, survey_id, true).unwrap();
        let names: Vec<_> = charts.iter().map(|c| c.question_name.as_str()).collect();
        assert_eq!(names, vec!["color", "agree"]);
        assert_eq!(counts(&charts[0]), vec![("red", 0), ("blue", 1)]);
    }

    #[test]
    fn survey_without_active_form_has_no_charts() {
        let (mut tables, survey_id, _) = fixture();
        tables.survey_mut(survey_id).unwrap().active_version = None;
        assert!(matches!(
            charts_for_survey(&tables, survey_id, false),
            Err(SurveyError::FormNotFound)
        ));
    }
}
