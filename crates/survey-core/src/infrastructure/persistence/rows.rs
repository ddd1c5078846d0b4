//! Storage-boundary rows with the five flattened payload columns.

use chrono::{DateTime, Utc};

use crate::domain::aggregates::{Answer, QuestionOption};
use crate::domain::value_objects::{
    AnswerKind, AnswerValue, OptionKind, OptionValue, QuestionType, RowId, TypedValue,
    ValueColumns,
};
use crate::error::SurveyResult;

#[derive(Clone, Debug, PartialEq)]
pub struct OptionRow {
    pub id: RowId,
    pub question_id: RowId,
    pub value: String,
    pub label: Option<String>,
    pub option_type: OptionKind,
    pub columns: ValueColumns,
}

impl OptionRow {
    pub fn from_domain(option: &QuestionOption) -> SurveyResult<Self> {
        Ok(Self {
            id: option.id,
            question_id: option.question_id,
            value: option.value.clone(),
            label: option.label.clone(),
            option_type: option.payload.kind(),
            columns: option.payload.to_validated_columns()?,
        })
    }

    pub fn to_domain(&self) -> SurveyResult<QuestionOption> {
        Ok(QuestionOption {
            id: self.id,
            question_id: self.question_id,
            value: self.value.clone(),
            label: self.label.clone(),
            payload: OptionValue::from_columns(self.option_type, &self.columns)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnswerRow {
    pub id: RowId,
    pub answer_set_id: RowId,
    pub question_id: RowId,
    pub question_type: QuestionType,
    pub answer_type: AnswerKind,
    pub columns: ValueColumns,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AnswerRow {
    pub fn from_domain(answer: &Answer) -> SurveyResult<Self> {
        Ok(Self {
            id: answer.id,
            answer_set_id: answer.answer_set_id,
            question_id: answer.question_id,
            question_type: answer.question_type,
            answer_type: answer.value.kind(),
            columns: answer.value.to_validated_columns()?,
            deleted_at: answer.deleted_at,
        })
    }

    pub fn to_domain(&self) -> SurveyResult<Answer> {
        Ok(Answer {
            id: self.id,
            answer_set_id: self.answer_set_id,
            question_id: self.question_id,
            question_type: self.question_type,
            value: AnswerValue::from_columns(self.answer_type, &self.columns)?,
            deleted_at: self.deleted_at,
        })
    }

    /// Clear all five slots, then write the one matching `value`.
    pub fn overwrite(&mut self, question_type: QuestionType, value: &AnswerValue) -> SurveyResult<()> {
        self.columns = ValueColumns::default();
        self.columns = value.to_validated_columns()?;
        self.answer_type = value.kind();
        self.question_type = question_type;
        Ok(())
    }
}
