use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{repository::RepoError, storage::StorageError};

pub type AppResult<T, E = AppError> = Result<T, E>;

/// AuthFailure
///
/// The distinguishable reasons a credential can be rejected. Each maps to 401 and carries a
/// stable machine code so frontends can decide whether to attempt a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    InvalidToken,
    ExpiredToken,
    UserNotFound,
    InvalidCredentials,
}

impl AuthFailure {
    pub fn code(self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "TOKEN_MISSING",
            AuthFailure::InvalidToken => "TOKEN_INVALID",
            AuthFailure::ExpiredToken => "TOKEN_EXPIRED",
            AuthFailure::UserNotFound => "USER_NOT_FOUND",
            AuthFailure::InvalidCredentials => "INVALID_CREDENTIALS",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "Unauthorized request: no access token provided",
            AuthFailure::InvalidToken => "Invalid access token",
            AuthFailure::ExpiredToken => "Access token expired",
            AuthFailure::UserNotFound => "Invalid access token: user no longer exists",
            // Same text for unknown email and wrong password.
            AuthFailure::InvalidCredentials => "Invalid email or password",
        }
    }
}

/// AppError
///
/// The one error type every handler, extractor and middleware returns. The `IntoResponse`
/// impl below is the process-wide responder that turns it into the uniform error envelope.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, errors: Vec<String> },
    #[error("{message}")]
    Conflict { message: String, fields: Vec<String> },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{}", .0.message())]
    Authentication(AuthFailure),
    #[error("{0}")]
    Forbidden(String),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("database failure: {0}")]
    Database(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation { message: message.into(), errors: Vec::new() }
    }

    /// Validation failure naming every missing field.
    pub fn missing_fields(fields: Vec<String>) -> Self {
        AppError::Validation {
            message: format!("Missing required fields: {}", fields.join(", ")),
            errors: fields,
        }
    }

    /// Conflict naming every duplicate field.
    pub fn duplicate_fields(fields: Vec<String>) -> Self {
        AppError::Conflict {
            message: format!("Already in use: {}", fields.join(", ")),
            fields,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::Conflict { .. } | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Storage(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn details(&self) -> Vec<String> {
        match self {
            AppError::Validation { errors, .. } => errors.clone(),
            AppError::Conflict { fields, .. } => fields.clone(),
            AppError::Authentication(kind) => vec![kind.code().to_string()],
            _ => Vec::new(),
        }
    }
}

/// ErrorBody
///
/// Wire shape of every failed response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub data: Option<()>,
    pub errors: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the logs; the client gets a generic message.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
            self.to_string()
        };

        let body = ErrorBody {
            success: false,
            status_code: status.as_u16(),
            message,
            data: None,
            errors: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict(fields) => AppError::duplicate_fields(fields),
            RepoError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            RepoError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::validation(format!("Malformed multipart body: {}", e.body_text()))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("password hashing failed: {e}"))
    }
}
