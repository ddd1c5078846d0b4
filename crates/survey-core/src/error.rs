//! Error types for the survey platform
//!
//! Every failure carries a stable machine `code()` so clients can branch on it
//! without parsing the human-readable message.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field shorthand.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> SurveyResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(SurveyError::Validation(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Coarse classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Internal,
}

/// Survey platform error type
#[derive(Error, Debug, Clone)]
pub enum SurveyError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("invalid form schema: {0}")]
    InvalidSchema(String),

    #[error("question tree nested deeper than {limit} levels")]
    QuestionTreeTooDeep { limit: usize },

    #[error("survey does not exist")]
    SurveyDoesNotExist,

    #[error("survey form does not exist")]
    FormDoesNotExist,

    #[error("no active form found for this survey")]
    FormNotFound,

    #[error("answer set does not exist")]
    AnswerSetDoesNotExist,

    #[error("target audience does not exist")]
    TargetAudienceDoesNotExist,

    #[error("one-time link does not exist")]
    LinkDoesNotExist,

    #[error("user does not exist")]
    UserDoesNotExist,

    #[error("no archived surveys")]
    NoArchivedSurveys,

    #[error("no archived forms for this survey")]
    NoArchivedForms,

    #[error("no archived submissions for this form")]
    NoArchivedSubmissions,

    #[error("form version {0} already exists for this survey")]
    FormVersionExists(i32),

    #[error("form is already activated")]
    FormAlreadyActivated,

    #[error("survey is already deleted")]
    SurveyAlreadyDeleted,

    #[error("survey is not deleted")]
    SurveyNotDeleted,

    #[error("form is already deleted")]
    FormAlreadyDeleted,

    #[error("form is not deleted")]
    FormNotDeleted,

    #[error("answer set is already deleted")]
    AnswerSetAlreadyDeleted,

    #[error("answer set is not deleted")]
    AnswerSetNotDeleted,

    #[error("one-time link was already used")]
    LinkAlreadyUsed,

    #[error("form is not active and does not accept answers")]
    FormNotActive,

    #[error("form has not started yet")]
    FormNotStarted,

    #[error("form submission window has expired")]
    FormExpired,

    #[error("form answers are not editable")]
    FormNotEditable,

    #[error("you cannot submit more than {limit} answers")]
    TooManySubmissions { limit: u16 },

    #[error("you are not part of this form's target audience")]
    UserNotInTarget,

    #[error("authentication is required")]
    UserNotAuthenticated,

    #[error("token is invalid or expired")]
    InvalidToken,

    #[error("one-time password is invalid or expired")]
    InvalidOtp,

    #[error("a one-time password was already sent, wait before requesting another")]
    OtpAlreadySent,

    #[error("account is not active")]
    AccountNotActive,

    #[error("only the owner may perform this action")]
    NotOwner,

    #[error("permission denied")]
    PermissionDenied,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SurveyError {
    /// Stable code exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidSchema(_) => "INVALID_SCHEMA",
            Self::QuestionTreeTooDeep { .. } => "QUESTION_TREE_TOO_DEEP",
            Self::SurveyDoesNotExist => "SURVEY_DOES_NOT_EXIST",
            Self::FormDoesNotExist => "FORM_DOES_NOT_EXIST",
            Self::FormNotFound => "FORM_NOT_FOUND",
            Self::AnswerSetDoesNotExist => "ANSWER_SET_DOES_NOT_EXIST",
            Self::TargetAudienceDoesNotExist => "TARGET_AUDIENCE_DOES_NOT_EXIST",
            Self::LinkDoesNotExist => "LINK_DOES_NOT_EXIST",
            Self::UserDoesNotExist => "USER_DOES_NOT_EXIST",
            Self::NoArchivedSurveys => "NO_ARCHIVED_SURVEYS",
            Self::NoArchivedForms => "NO_ARCHIVED_FORMS",
            Self::NoArchivedSubmissions => "NO_ARCHIVED_SUBMISSIONS",
            Self::FormVersionExists(_) => "FORM_VERSION_EXISTS",
            Self::FormAlreadyActivated => "FORM_ALREADY_ACTIVATED",
            Self::SurveyAlreadyDeleted => "SURVEY_ALREADY_DELETED",
            Self::SurveyNotDeleted => "SURVEY_NOT_DELETED",
            Self::FormAlreadyDeleted => "FORM_ALREADY_DELETED",
            Self::FormNotDeleted => "FORM_NOT_DELETED",
            Self::AnswerSetAlreadyDeleted => "ANSWER_SET_ALREADY_DELETED",
            Self::AnswerSetNotDeleted => "ANSWER_SET_NOT_DELETED",
            Self::LinkAlreadyUsed => "LINK_ALREADY_USED",
            Self::FormNotActive => "FORM_NOT_ACTIVE",
            Self::FormNotStarted => "FORM_NOT_STARTED",
            Self::FormExpired => "FORM_EXPIRED",
            Self::FormNotEditable => "FORM_NOT_EDITABLE",
            Self::TooManySubmissions { .. } => "TOO_MANY_SUBMISSIONS",
            Self::UserNotInTarget => "USER_NOT_IN_TARGET",
            Self::UserNotAuthenticated => "USER_NOT_AUTHENTICATED",
            Self::InvalidToken => "TOKEN_NOT_VALID",
            Self::InvalidOtp => "OTP_NOT_VALID",
            Self::OtpAlreadySent => "OTP_ALREADY_SENT",
            Self::AccountNotActive => "ACCOUNT_NOT_ACTIVE",
            Self::NotOwner => "NOT_OWNER",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::InvalidSchema(_)
            | Self::QuestionTreeTooDeep { .. }
            | Self::FormVersionExists(_)
            | Self::FormAlreadyActivated
            | Self::SurveyAlreadyDeleted
            | Self::SurveyNotDeleted
            | Self::FormAlreadyDeleted
            | Self::FormNotDeleted
            | Self::AnswerSetAlreadyDeleted
            | Self::AnswerSetNotDeleted
            | Self::LinkAlreadyUsed
            | Self::InvalidOtp
            | Self::OtpAlreadySent => ErrorKind::BadRequest,

            Self::SurveyDoesNotExist
            | Self::FormDoesNotExist
            | Self::FormNotFound
            | Self::AnswerSetDoesNotExist
            | Self::TargetAudienceDoesNotExist
            | Self::LinkDoesNotExist
            | Self::UserDoesNotExist
            | Self::NoArchivedSurveys
            | Self::NoArchivedForms
            | Self::NoArchivedSubmissions => ErrorKind::NotFound,

            Self::FormNotActive
            | Self::FormNotStarted
            | Self::FormExpired
            | Self::FormNotEditable
            | Self::TooManySubmissions { .. }
            | Self::UserNotInTarget
            | Self::AccountNotActive
            | Self::NotOwner
            | Self::PermissionDenied => ErrorKind::Forbidden,

            Self::UserNotAuthenticated | Self::InvalidToken => ErrorKind::Unauthorized,

            Self::Storage(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Field-level detail, when the error has any.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<FieldErrors> for SurveyError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Result type for survey operations
pub type SurveyResult<T> = Result<T, SurveyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_collect_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("text_value", "required");
        errors.add("text_value", "too long");
        errors.add("json_value", "must be empty");

        assert!(errors.contains("text_value"));
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["json_value", "text_value"]);
        assert!(matches!(errors.into_result(), Err(SurveyError::Validation(_))));
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(SurveyError::FormVersionExists(2).code(), "FORM_VERSION_EXISTS");
        assert_eq!(SurveyError::TooManySubmissions { limit: 1 }.kind(), ErrorKind::Forbidden);
        assert_eq!(SurveyError::FormNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(SurveyError::UserNotAuthenticated.kind(), ErrorKind::Unauthorized);
    }
}
