//! API error types and response handling
//!
//! Maps registry and validation failures onto HTTP status codes with a
//! stable machine-readable `code`.

use std::collections::HashMap;
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::RegistryError;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always false for errors
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Field-level validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<HashMap<String, String>>,
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    WorldFull,
    AlreadyRegistered,
    ValidationError(HashMap<String, String>),
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::WorldFull => write!(f, "{}", RegistryError::CapacityExceeded),
            ApiError::AlreadyRegistered => write!(f, "Player is already registered"),
            ApiError::ValidationError(_) => write!(f, "Validation failed"),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::WorldFull => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::AlreadyRegistered => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::WorldFull => "WORLD_FULL",
            ApiError::AlreadyRegistered => "ALREADY_REGISTERED",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let errors = match &self {
            ApiError::ValidationError(errs) => Some(errs.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
            code: Some(self.error_code().to_string()),
            errors,
        };

        (status, Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::CapacityExceeded => ApiError::WorldFull,
            RegistryError::AlreadyRegistered => ApiError::AlreadyRegistered,
            other => {
                tracing::error!(error = %other, "Unexpected registry error during login");
                ApiError::InternalError(other.to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors = HashMap::new();

        for (field, field_errors) in err.field_errors() {
            if let Some(first_error) = field_errors.first() {
                let message = first_error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                errors.insert(field.to_string(), message);
            }
        }

        ApiError::ValidationError(errors)
    }
}
