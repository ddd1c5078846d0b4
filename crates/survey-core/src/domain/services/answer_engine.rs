//! AnswerEngine
//!
//! Resolves each `{question_name: value}` entry of a submission against the
//! form's compiled questions and writes one typed answer per question. The
//! answer variant follows the runtime shape of the submitted value; the
//! question type only matters for signature pads, file uploads and multi-text
//! containers.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::aggregates::{Answer, Question};
use crate::domain::value_objects::{AnswerValue, QuestionType, RowId, TypedValue};
use crate::error::{FieldErrors, SurveyError, SurveyResult};
use crate::infrastructure::persistence::Tables;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Fresh answer set: one insert per entry.
    Create,
    /// Get-or-create per question, overwriting every payload slot.
    Update,
}

/// Outcome of one submission pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub written: usize,
    pub skipped: Vec<String>,
}

/// Map a submitted value onto an answer variant. `None` means unanswered.
pub fn infer_value(question_type: QuestionType, value: &Value) -> SurveyResult<Option<AnswerValue>> {
    let inferred = match value {
        Value::Null => None,
        Value::String(text) if question_type == QuestionType::Signaturepad => {
            Some(AnswerValue::File(text.clone()))
        }
        Value::String(text) => Some(AnswerValue::Text(text.clone())),
        Value::Bool(flag) => Some(AnswerValue::Boolean(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Some(AnswerValue::Numeric(integer)),
            None => Some(AnswerValue::Json(value.clone())),
        },
        Value::Array(entries) if question_type == QuestionType::File => match entries.first() {
            None => None,
            Some(first) => {
                let content = first
                    .get("content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        SurveyError::from(FieldErrors::single(
                            "file_value",
                            "uploaded file entry has no content",
                        ))
                    })?;
                Some(AnswerValue::File(content.to_string()))
            }
        },
        Value::Array(_) => {
            let serialized = serde_json::to_string(value)
                .map_err(|e| SurveyError::Storage(e.to_string()))?;
            Some(AnswerValue::Json(Value::String(serialized)))
        }
        Value::Object(_) => Some(AnswerValue::Json(value.clone())),
    };

    Ok(inferred)
}

/// Write the answers of `metadata` into an existing answer set.
pub fn submit(
    tables: &mut Tables,
    answer_set_id: RowId,
    metadata: &Map<String, Value>,
    mode: WriteMode,
) -> SurveyResult<SubmitReport> {
    let form_id = tables
        .answer_set(answer_set_id)
        .ok_or(SurveyError::AnswerSetDoesNotExist)?
        .form_id;

    let mut report = SubmitReport::default();

    for (name, value) in metadata {
        let Some(question) = tables.question_by_name(form_id, name).cloned() else {
            warn!(question = %name, answer_set_id, "Skipping answer for unknown question");
            report.skipped.push(name.clone());
            continue;
        };

        if write_answer(tables, answer_set_id, &question, value, mode)? {
            report.written += 1;
        }

        if question.question_type == QuestionType::Multipletext {
            if value.is_null() && mode == WriteMode::Update {
                let children: Vec<RowId> = tables.children_of(question.id).map(|child| child.id).collect();
                for child_id in children {
                    tables.remove_answer(answer_set_id, child_id);
                }
            }
            if let Value::Object(items) = value {
                for (child_name, child_value) in items {
                    let child = tables
                        .children_of(question.id)
                        .find(|child| &child.name == child_name)
                        .cloned();

                    match child {
                        Some(child) => {
                            if write_answer(tables, answer_set_id, &child, child_value, mode)? {
                                report.written += 1;
                            }
                        }
                        None => {
                            warn!(
                                question = %name,
                                item = %child_name,
                                "Skipping unknown multi-text item"
                            );
                            report.skipped.push(format!("{}.{}", name, child_name));
                        }
                    }
                }
            }
        }
    }

    Ok(report)
}

fn write_answer(
    tables: &mut Tables,
    answer_set_id: RowId,
    question: &Question,
    value: &Value,
    mode: WriteMode,
) -> SurveyResult<bool> {
    let Some(answer) = infer_value(question.question_type, value)? else {
        if mode == WriteMode::Update && tables.remove_answer(answer_set_id, question.id).is_some() {
            debug!(question = %question.name, "Cleared answer");
        } else {
            debug!(question = %question.name, "Null answer treated as unanswered");
        }
        return Ok(false);
    };

    debug!(
        question = %question.name,
        answer_type = %answer.kind(),
        ?mode,
        "Writing answer"
    );

    if mode == WriteMode::Update {
        if let Some(row) = tables.answer_row_mut(answer_set_id, question.id) {
            row.overwrite(question.question_type, &answer)?;
            return Ok(true);
        }
    }

    tables.insert_answer(Answer {
        id: 0,
        answer_set_id,
        question_id: question.id,
        question_type: question.question_type,
        value: answer,
        deleted_at: None,
    })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{AnswerSet, Survey, SurveyForm};
    use crate::domain::services::compiler::QuestionCompiler;
    use crate::domain::value_objects::AnswerKind;
    use crate::infrastructure::persistence::InMemoryStore;
    use chrono::Utc;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    /// Form with a compiled schema and one empty answer set.
    fn fixture(elements: Value) -> (Tables, RowId, RowId) {
        let mut tables = Tables::default();
        let now = Utc::now();
        let survey_id = tables.insert_survey(Survey::new("s", 1, now)).unwrap();
        let form_id = tables
            .insert_form(SurveyForm::new(survey_id, 1, None, Value::Null, now).unwrap())
            .unwrap();
        let compiler = QuestionCompiler::default();
        let tree = compiler
            .compile_definition(&json!({ "pages": [{ "elements": elements }] }))
            .unwrap();
        compiler.persist(&tree, &mut tables, form_id).unwrap();
        let set_id = tables
            .insert_answer_set(AnswerSet::new(form_id, None, Map::new(), now))
            .unwrap();
        (tables, form_id, set_id)
    }

    fn answer_of(tables: &Tables, form_id: RowId, set_id: RowId, name: &str) -> Answer {
        let question = tables.question_by_name(form_id, name).unwrap();
        tables.answer_row(set_id, question.id).unwrap().to_domain().unwrap()
    }

    fn assert_single_slot_everywhere(tables: &Tables) {
        for row in tables.answer_rows() {
            let slot = AnswerValue::slot_of(row.answer_type);
            assert!(row.columns.validate(slot, &AnswerValue::SLOT_NAMES, "check").is_ok());
        }
    }

    #[test]
    fn boolean_answer_fills_only_the_boolean_slot() {
        let (mut tables, form_id, set_id) = fixture(json!([{ "type": "boolean", "name": "q1" }]));

        submit(&mut tables, set_id, &as_map(json!({ "q1": true })), WriteMode::Create).unwrap();

        let question = tables.question_by_name(form_id, "q1").unwrap();
        let row = tables.answer_row(set_id, question.id).unwrap();
        assert_eq!(row.answer_type, AnswerKind::Boolean);
        assert_eq!(row.columns.boolean_value, Some(true));
        assert!(row.columns.text_value.is_none());
        assert!(row.columns.numeric_value.is_none());
        assert!(row.columns.reference_value.is_none());
        assert!(row.columns.json_value.is_none());
    }

    #[test]
    fn runtime_shape_drives_the_variant() {
        assert_eq!(infer_value(QuestionType::Text, &json!("hi")).unwrap(), Some(AnswerValue::Text("hi".into())));
        assert_eq!(infer_value(QuestionType::Text, &json!(3)).unwrap(), Some(AnswerValue::Numeric(3)));
        assert_eq!(infer_value(QuestionType::Rating, &json!(2.5)).unwrap(), Some(AnswerValue::Json(json!(2.5))));
        assert_eq!(
            infer_value(QuestionType::Checkbox, &json!(["a", "b"])).unwrap(),
            Some(AnswerValue::Json(Value::String("[\"a\",\"b\"]".into())))
        );
        assert_eq!(
            infer_value(QuestionType::Matrix, &json!({ "r1": "c1" })).unwrap(),
            Some(AnswerValue::Json(json!({ "r1": "c1" })))
        );
        assert_eq!(infer_value(QuestionType::Text, &Value::Null).unwrap(), None);
    }

    #[test]
    fn signature_and_file_uploads_become_file_references() {
        assert_eq!(
            infer_value(QuestionType::Signaturepad, &json!("data:image/png;base64,AAA")).unwrap(),
            Some(AnswerValue::File("data:image/png;base64,AAA".into()))
        );
        assert_eq!(
            infer_value(
                QuestionType::File,
                &json!([{ "name": "cv.pdf", "content": "files/cv.pdf" }, { "content": "ignored" }])
            )
            .unwrap(),
            Some(AnswerValue::File("files/cv.pdf".into()))
        );
        assert!(infer_value(QuestionType::File, &json!([{ "name": "x" }])).is_err());
    }

    #[test]
    fn multipletext_writes_container_and_children() {
        let (mut tables, form_id, set_id) = fixture(json!([{
            "type": "multipletext",
            "name": "person",
            "items": [{ "name": "first" }, { "name": "age" }]
        }]));

        let report = submit(
            &mut tables,
            set_id,
            &as_map(json!({ "person": { "first": "Ada", "age": 36, "nickname": "x" } })),
            WriteMode::Create,
        )
        .unwrap();

        assert_eq!(report.written, 3);
        assert_eq!(report.skipped, vec!["person.nickname".to_string()]);

        let first = answer_of(&tables, form_id, set_id, "first");
        assert_eq!(first.value, AnswerValue::Text("Ada".into()));
        assert_eq!(first.question_type, QuestionType::Text);
        assert_eq!(answer_of(&tables, form_id, set_id, "age").value, AnswerValue::Numeric(36));
        assert!(matches!(answer_of(&tables, form_id, set_id, "person").value, AnswerValue::Json(_)));
        assert_single_slot_everywhere(&tables);
    }

    #[test]
    fn unknown_names_are_skipped() {
        let (mut tables, _, set_id) = fixture(json!([{ "type": "text", "name": "known" }]));

        let report = submit(
            &mut tables,
            set_id,
            &as_map(json!({ "known": "a", "stray": "b" })),
            WriteMode::Create,
        )
        .unwrap();

        assert_eq!(report.written, 1);
        assert_eq!(report.skipped, vec!["stray".to_string()]);
    }

    #[test]
    fn update_replaces_cross_type_residue() {
        let (mut tables, form_id, set_id) = fixture(json!([{ "type": "text", "name": "q" }]));

        submit(&mut tables, set_id, &as_map(json!({ "q": "seven" })), WriteMode::Create).unwrap();
        submit(&mut tables, set_id, &as_map(json!({ "q": 7 })), WriteMode::Update).unwrap();

        let question = tables.question_by_name(form_id, "q").unwrap();
        let row = tables.answer_row(set_id, question.id).unwrap();
        assert_eq!(row.answer_type, AnswerKind::Numeric);
        assert_eq!(row.columns.numeric_value, Some(7));
        assert!(row.columns.text_value.is_none());
        assert_eq!(tables.answer_rows_of(set_id).count(), 1);
        assert_single_slot_everywhere(&tables);
    }

    #[test]
    fn null_update_clears_the_stored_answer() {
        let (mut tables, form_id, set_id) = fixture(json!([
            { "type": "comment", "name": "comment" },
            { "type": "multipletext", "name": "person", "items": [{ "name": "first" }] }
        ]));

        submit(
            &mut tables,
            set_id,
            &as_map(json!({ "comment": "hello", "person": { "first": "Ada" } })),
            WriteMode::Create,
        )
        .unwrap();
        assert_eq!(tables.answer_rows_of(set_id).count(), 3);

        let report = submit(
            &mut tables,
            set_id,
            &as_map(json!({ "comment": null, "person": null })),
            WriteMode::Update,
        )
        .unwrap();

        assert_eq!(report.written, 0);
        let comment = tables.question_by_name(form_id, "comment").unwrap().id;
        assert!(tables.answer_row(set_id, comment).is_none());
        assert_eq!(tables.answer_rows_of(set_id).count(), 0);
    }

    #[test]
    fn null_on_create_writes_nothing() {
        let (mut tables, _, set_id) = fixture(json!([{ "type": "text", "name": "q" }]));

        let report = submit(&mut tables, set_id, &as_map(json!({ "q": null })), WriteMode::Create).unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(tables.answer_rows_of(set_id).count(), 0);
    }

    #[test]
    fn second_create_for_the_same_question_conflicts() {
        let (mut tables, _, set_id) = fixture(json!([{ "type": "text", "name": "q" }]));

        submit(&mut tables, set_id, &as_map(json!({ "q": "a" })), WriteMode::Create).unwrap();
        let err = submit(&mut tables, set_id, &as_map(json!({ "q": "b" })), WriteMode::Create).unwrap_err();
        assert!(err.field_errors().unwrap().contains("question"));
    }

    #[test]
    fn invariant_violation_aborts_the_whole_submission() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let compiler = QuestionCompiler::default();

        let (set_id, _) = store
            .transaction(|tx, _| {
                let survey_id = tx.insert_survey(Survey::new("s", 1, now))?;
                let form_id = tx.insert_form(SurveyForm::new(survey_id, 1, None, Value::Null, now)?)?;
                let tree = compiler.compile_definition(&json!({ "pages": [{ "elements": [
                    { "type": "text", "name": "a" },
                    { "type": "text", "name": "b" }
                ] }] }))?;
                compiler.persist(&tree, tx, form_id)?;
                tx.insert_answer_set(AnswerSet::new(form_id, None, Map::new(), now))
            })
            .unwrap();

        let result = store.transaction(|tx, _| {
            submit(tx, set_id, &as_map(json!({ "a": "fine", "b": "" })), WriteMode::Create)
        });

        let err = result.unwrap_err();
        assert!(err.field_errors().unwrap().contains("text_value"));
        assert_eq!(store.read(|tables| tables.answer_rows().count()), 0);
    }
}
