//! HTTP mapping of domain errors

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use survey_core::{ErrorKind, FieldErrors, SurveyError};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] SurveyError),

    #[error("malformed request body: {0}")]
    Body(#[from] JsonRejection),
}

/// Error envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub errors: FieldErrors,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Domain(error) => match error.kind() {
                ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Body(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Domain(error) => ErrorBody {
                code: error.code().into(),
                message: error.to_string(),
                errors: error.field_errors().cloned().unwrap_or_default(),
            },
            Self::Body(rejection) => ErrorBody {
                code: "INVALID_REQUEST".into(),
                message: rejection.body_text(),
                errors: FieldErrors::new(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_their_status() {
        let cases = [
            (SurveyError::FormVersionExists(2), StatusCode::BAD_REQUEST),
            (SurveyError::FormNotFound, StatusCode::NOT_FOUND),
            (SurveyError::TooManySubmissions { limit: 1 }, StatusCode::FORBIDDEN),
            (SurveyError::UserNotAuthenticated, StatusCode::UNAUTHORIZED),
            (SurveyError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn validation_errors_keep_field_detail() {
        let body = ApiError::from(SurveyError::from(FieldErrors::single("version", "bad"))).body();
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert!(body.errors.contains("version"));
    }
}
