//! API Models

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

pub const SUCCESS: &str = "SUCCESS";

/// Standard success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: String,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            code: SUCCESS.into(),
            message: message.into(),
            data,
        }
    }
}

/// Envelope paired with the status it is sent with.
pub struct Reply<T> {
    status: StatusCode,
    body: ApiResponse<T>,
}

impl<T> Reply<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            body: ApiResponse::success(message, data),
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            body: ApiResponse::success(message, data),
        }
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Empty `data` object.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Empty {}

/// JSON body whose rejection uses the error envelope.
#[derive(axum::extract::FromRequest)]
#[from_request(via(axum::Json), rejection(crate::error::ApiError))]
pub struct Body<T>(pub T);
