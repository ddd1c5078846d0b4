//! TypedValue - discriminated payloads shared by options and answers
//!
//! In memory a value is a proper sum type carrying exactly one payload.
//! At the storage boundary it is flattened into five nullable columns plus a
//! tag, and [`ValueColumns::validate`] re-checks the exactly-one invariant on
//! every persist.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{FieldErrors, SurveyResult};

/// Physical payload slot of the five-column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Text,
    Boolean,
    Numeric,
    /// `image_value` for options, `file_value` for answers.
    Reference,
    Json,
}

impl Slot {
    pub const ALL: [Slot; 5] = [Slot::Text, Slot::Boolean, Slot::Numeric, Slot::Reference, Slot::Json];

    fn index(self) -> usize {
        match self {
            Slot::Text => 0,
            Slot::Boolean => 1,
            Slot::Numeric => 2,
            Slot::Reference => 3,
            Slot::Json => 4,
        }
    }
}

/// Column names of a concrete table layout.
pub type SlotNames = [&'static str; 5];

pub const OPTION_SLOT_NAMES: SlotNames =
    ["text_value", "boolean_value", "numeric_value", "image_value", "json_value"];

pub const ANSWER_SLOT_NAMES: SlotNames =
    ["text_value", "boolean_value", "numeric_value", "file_value", "json_value"];

/// Five nullable payload columns as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueColumns {
    pub text_value: Option<String>,
    pub boolean_value: Option<bool>,
    pub numeric_value: Option<i64>,
    pub reference_value: Option<String>,
    pub json_value: Option<Value>,
}

impl ValueColumns {
    /// Required slot must be non-null/non-empty.
    fn is_present(&self, slot: Slot) -> bool {
        match slot {
            Slot::Text => self.text_value.as_deref().is_some_and(|s| !s.is_empty()),
            Slot::Boolean => self.boolean_value.is_some(),
            Slot::Numeric => self.numeric_value.is_some(),
            Slot::Reference => self.reference_value.as_deref().is_some_and(|s| !s.is_empty()),
            Slot::Json => self.json_value.as_ref().is_some_and(|v| !v.is_null()),
        }
    }

    /// Foreign slots may hold null, an empty string or `false`.
    fn is_filled(&self, slot: Slot) -> bool {
        match slot {
            Slot::Boolean => self.boolean_value == Some(true),
            other => self.is_present(other),
        }
    }

    /// Check the exactly-one-slot invariant for the slot required by the tag.
    pub fn validate(&self, required: Slot, names: &SlotNames, tag: &str) -> SurveyResult<()> {
        let mut errors = FieldErrors::new();

        if !self.is_present(required) {
            errors.add(
                names[required.index()],
                format!("a value is required for type '{}'", tag),
            );
        }

        for slot in Slot::ALL {
            if slot != required && self.is_filled(slot) {
                errors.add(
                    names[slot.index()],
                    format!("must be empty for type '{}'", tag),
                );
            }
        }

        errors.into_result()
    }
}

/// Shared contract of the two discriminated unions.
pub trait TypedValue: Sized {
    type Kind: Copy + Eq + fmt::Display;

    const SLOT_NAMES: SlotNames;

    fn kind(&self) -> Self::Kind;

    fn slot_of(kind: Self::Kind) -> Slot;

    fn to_columns(&self) -> ValueColumns;

    /// Rebuild from stored columns, validating first.
    fn from_columns(kind: Self::Kind, columns: &ValueColumns) -> SurveyResult<Self>;

    /// Columns for persisting, validated against the tag.
    fn to_validated_columns(&self) -> SurveyResult<ValueColumns> {
        let columns = self.to_columns();
        let kind = self.kind();
        columns.validate(Self::slot_of(kind), &Self::SLOT_NAMES, &kind.to_string())?;
        Ok(columns)
    }
}

// =============================================================================
// Question option values
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Text,
    Boolean,
    Numeric,
    Image,
    Json,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Numeric => "numeric",
            Self::Image => "image",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

/// Payload of a question option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum OptionValue {
    Text(String),
    Boolean(bool),
    Numeric(i64),
    /// Link to the option image.
    Image(String),
    Json(Value),
}

impl TypedValue for OptionValue {
    type Kind = OptionKind;

    const SLOT_NAMES: SlotNames = OPTION_SLOT_NAMES;

    fn kind(&self) -> OptionKind {
        match self {
            Self::Text(_) => OptionKind::Text,
            Self::Boolean(_) => OptionKind::Boolean,
            Self::Numeric(_) => OptionKind::Numeric,
            Self::Image(_) => OptionKind::Image,
            Self::Json(_) => OptionKind::Json,
        }
    }

    fn slot_of(kind: OptionKind) -> Slot {
        match kind {
            OptionKind::Text => Slot::Text,
            OptionKind::Boolean => Slot::Boolean,
            OptionKind::Numeric => Slot::Numeric,
            OptionKind::Image => Slot::Reference,
            OptionKind::Json => Slot::Json,
        }
    }

    fn to_columns(&self) -> ValueColumns {
        let mut columns = ValueColumns::default();
        match self {
            Self::Text(text) => columns.text_value = Some(text.clone()),
            Self::Boolean(flag) => columns.boolean_value = Some(*flag),
            Self::Numeric(number) => columns.numeric_value = Some(*number),
            Self::Image(link) => columns.reference_value = Some(link.clone()),
            Self::Json(value) => columns.json_value = Some(value.clone()),
        }
        columns
    }

    fn from_columns(kind: OptionKind, columns: &ValueColumns) -> SurveyResult<Self> {
        columns.validate(Self::slot_of(kind), &Self::SLOT_NAMES, &kind.to_string())?;
        // validate() guarantees the required slot is populated
        Ok(match kind {
            OptionKind::Text => Self::Text(columns.text_value.clone().unwrap_or_default()),
            OptionKind::Boolean => Self::Boolean(columns.boolean_value.unwrap_or_default()),
            OptionKind::Numeric => Self::Numeric(columns.numeric_value.unwrap_or_default()),
            OptionKind::Image => Self::Image(columns.reference_value.clone().unwrap_or_default()),
            OptionKind::Json => Self::Json(columns.json_value.clone().unwrap_or(Value::Null)),
        })
    }
}

// =============================================================================
// Answer values
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKind {
    Text,
    Boolean,
    Numeric,
    File,
    Json,
}

impl fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Numeric => "numeric",
            Self::File => "file",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

/// Payload of a submitted answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AnswerValue {
    Text(String),
    Boolean(bool),
    Numeric(i64),
    /// Content reference (data URL or storage key), never raw bytes.
    File(String),
    Json(Value),
}

impl TypedValue for AnswerValue {
    type Kind = AnswerKind;

    const SLOT_NAMES: SlotNames = ANSWER_SLOT_NAMES;

    fn kind(&self) -> AnswerKind {
        match self {
            Self::Text(_) => AnswerKind::Text,
            Self::Boolean(_) => AnswerKind::Boolean,
            Self::Numeric(_) => AnswerKind::Numeric,
            Self::File(_) => AnswerKind::File,
            Self::Json(_) => AnswerKind::Json,
        }
    }

    fn slot_of(kind: AnswerKind) -> Slot {
        match kind {
            AnswerKind::Text => Slot::Text,
            AnswerKind::Boolean => Slot::Boolean,
            AnswerKind::Numeric => Slot::Numeric,
            AnswerKind::File => Slot::Reference,
            AnswerKind::Json => Slot::Json,
        }
    }

    fn to_columns(&self) -> ValueColumns {
        let mut columns = ValueColumns::default();
        match self {
            Self::Text(text) => columns.text_value = Some(text.clone()),
            Self::Boolean(flag) => columns.boolean_value = Some(*flag),
            Self::Numeric(number) => columns.numeric_value = Some(*number),
            Self::File(reference) => columns.reference_value = Some(reference.clone()),
            Self::Json(value) => columns.json_value = Some(value.clone()),
        }
        columns
    }

    fn from_columns(kind: AnswerKind, columns: &ValueColumns) -> SurveyResult<Self> {
        columns.validate(Self::slot_of(kind), &Self::SLOT_NAMES, &kind.to_string())?;
        Ok(match kind {
            AnswerKind::Text => Self::Text(columns.text_value.clone().unwrap_or_default()),
            AnswerKind::Boolean => Self::Boolean(columns.boolean_value.unwrap_or_default()),
            AnswerKind::Numeric => Self::Numeric(columns.numeric_value.unwrap_or_default()),
            AnswerKind::File => Self::File(columns.reference_value.clone().unwrap_or_default()),
            AnswerKind::Json => Self::Json(columns.json_value.clone().unwrap_or(Value::Null)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SurveyError;
    use serde_json::json;

    fn field_names(err: SurveyError) -> Vec<String> {
        match err {
            SurveyError::Validation(errors) => errors.fields().map(String::from).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn answer_columns_hold_exactly_one_slot() {
        let columns = AnswerValue::Boolean(true).to_validated_columns().unwrap();
        assert_eq!(columns.boolean_value, Some(true));
        assert!(columns.text_value.is_none());
        assert!(columns.numeric_value.is_none());
        assert!(columns.reference_value.is_none());
        assert!(columns.json_value.is_none());
    }

    #[test]
    fn boolean_false_is_a_present_payload() {
        let columns = OptionValue::Boolean(false).to_validated_columns().unwrap();
        assert_eq!(columns.boolean_value, Some(false));
    }

    #[test]
    fn empty_required_slot_is_rejected() {
        let err = OptionValue::Text(String::new()).to_validated_columns().unwrap_err();
        assert_eq!(field_names(err), vec!["text_value"]);

        let err = AnswerValue::File(String::new()).to_validated_columns().unwrap_err();
        assert_eq!(field_names(err), vec!["file_value"]);
    }

    #[test]
    fn foreign_slots_are_named_in_the_error() {
        let columns = ValueColumns {
            text_value: Some("hello".into()),
            numeric_value: Some(3),
            json_value: Some(json!({"a": 1})),
            ..ValueColumns::default()
        };

        let err = AnswerValue::from_columns(AnswerKind::Text, &columns).unwrap_err();
        assert_eq!(field_names(err), vec!["json_value", "numeric_value"]);

        let err = OptionValue::from_columns(OptionKind::Image, &columns).unwrap_err();
        assert_eq!(
            field_names(err),
            vec!["image_value", "json_value", "numeric_value", "text_value"]
        );
    }

    #[test]
    fn false_and_empty_foreign_slots_are_tolerated() {
        let columns = ValueColumns {
            numeric_value: Some(4),
            boolean_value: Some(false),
            text_value: Some(String::new()),
            ..ValueColumns::default()
        };
        let value = OptionValue::from_columns(OptionKind::Numeric, &columns).unwrap();
        assert_eq!(value, OptionValue::Numeric(4));
    }

    #[test]
    fn json_null_counts_as_absent() {
        let err = AnswerValue::Json(Value::Null).to_validated_columns().unwrap_err();
        assert_eq!(field_names(err), vec!["json_value"]);
    }
}
