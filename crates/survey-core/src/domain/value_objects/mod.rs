//! Value Objects module
//!
//! Immutable, validated domain primitives.

pub mod typed_value;

pub use typed_value::{
    AnswerKind, AnswerValue, OptionKind, OptionValue, Slot, TypedValue, ValueColumns,
    ANSWER_SLOT_NAMES, OPTION_SLOT_NAMES,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage-level row identifier (never exposed as a public id).
pub type RowId = u64;

/// The question kinds a form element may compile to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Radiogroup,
    Rating,
    Slider,
    Checkbox,
    Dropdown,
    Tagbox,
    Boolean,
    File,
    Imagepicker,
    Ranking,
    Text,
    Comment,
    Multipletext,
    Panel,
    Paneldynamic,
    Matrix,
    Matrixdropdown,
    Matrixdynamic,
    Html,
    Expression,
    Image,
    Signaturepad,
}

impl QuestionType {
    pub const ALL: [QuestionType; 22] = [
        Self::Radiogroup,
        Self::Rating,
        Self::Slider,
        Self::Checkbox,
        Self::Dropdown,
        Self::Tagbox,
        Self::Boolean,
        Self::File,
        Self::Imagepicker,
        Self::Ranking,
        Self::Text,
        Self::Comment,
        Self::Multipletext,
        Self::Panel,
        Self::Paneldynamic,
        Self::Matrix,
        Self::Matrixdropdown,
        Self::Matrixdynamic,
        Self::Html,
        Self::Expression,
        Self::Image,
        Self::Signaturepad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Radiogroup => "radiogroup",
            Self::Rating => "rating",
            Self::Slider => "slider",
            Self::Checkbox => "checkbox",
            Self::Dropdown => "dropdown",
            Self::Tagbox => "tagbox",
            Self::Boolean => "boolean",
            Self::File => "file",
            Self::Imagepicker => "imagepicker",
            Self::Ranking => "ranking",
            Self::Text => "text",
            Self::Comment => "comment",
            Self::Multipletext => "multipletext",
            Self::Panel => "panel",
            Self::Paneldynamic => "paneldynamic",
            Self::Matrix => "matrix",
            Self::Matrixdropdown => "matrixdropdown",
            Self::Matrixdynamic => "matrixdynamic",
            Self::Html => "html",
            Self::Expression => "expression",
            Self::Image => "image",
            Self::Signaturepad => "signaturepad",
        }
    }

    /// Kinds that own child questions.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Multipletext | Self::Panel | Self::Paneldynamic)
    }

    /// Kinds with a per-option aggregate chart.
    pub fn is_chartable(&self) -> bool {
        matches!(
            self,
            Self::Radiogroup
                | Self::Dropdown
                | Self::Checkbox
                | Self::Tagbox
                | Self::Boolean
                | Self::Imagepicker
        )
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown question type: {}", s))
    }
}

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Employee,
    Professor,
    Personal,
    Management,
}

impl Role {
    /// Roles allowed to author surveys.
    pub fn can_author(&self) -> bool {
        matches!(self, Self::Professor | Self::Management)
    }
}

/// Mobile phone number in the `09XXXXXXXXX` national format.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(value: &str) -> Result<Self, PhoneError> {
        let value = value.trim();

        if value.len() != 11 {
            return Err(PhoneError::InvalidLength);
        }
        if !value.starts_with("09") {
            return Err(PhoneError::InvalidPrefix);
        }
        if !value.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneError::InvalidCharacters);
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("phone number must have 11 digits")]
    InvalidLength,
    #[error("phone number must start with 09")]
    InvalidPrefix,
    #[error("phone number may only contain digits")]
    InvalidCharacters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_round_trips_through_its_name() {
        for kind in QuestionType::ALL {
            assert_eq!(kind.as_str().parse::<QuestionType>().unwrap(), kind);
        }
        assert!("matrixrubric".parse::<QuestionType>().is_err());
    }

    #[test]
    fn phone_validation() {
        assert!(PhoneNumber::parse("09121234567").is_ok());
        assert_eq!(PhoneNumber::parse("0912123456"), Err(PhoneError::InvalidLength));
        assert_eq!(PhoneNumber::parse("08121234567"), Err(PhoneError::InvalidPrefix));
        assert_eq!(PhoneNumber::parse("0912123456a"), Err(PhoneError::InvalidCharacters));
    }
}
