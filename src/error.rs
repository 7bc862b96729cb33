use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::store::{DuplicateField, StoreError};

pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable error codes carried in every error body.
pub mod codes {
    pub const MISSING_CREDENTIALS: &str = "MISSING_CREDENTIALS";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const MISSING_FIELDS: &str = "MISSING_FIELDS";
    pub const MISSING_TOKEN: &str = "MISSING_TOKEN";
    pub const INVALID_INPUT: &str = "INVALID_INPUT";
    pub const INVALID_FORMAT: &str = "INVALID_FORMAT";
    pub const NO_TOKEN: &str = "NO_TOKEN";
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
    pub const NOT_AUTHORIZED: &str = "NOT_AUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const EMAIL_NOT_FOUND: &str = "EMAIL_NOT_FOUND";
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const USERNAME_TAKEN: &str = "USERNAME_TAKEN";
    pub const EMAIL_TAKEN: &str = "EMAIL_TAKEN";
    pub const PERSONAL_NUMBER_TAKEN: &str = "PERSONAL_NUMBER_TAKEN";
    pub const APPLICATION_EXISTS: &str = "APPLICATION_EXISTS";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const SECURITY_ERROR: &str = "SECURITY_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {1}")]
    BadRequest(&'static str, String),

    #[error("Unauthorized: {1}")]
    Unauthorized(&'static str, String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {1}")]
    NotFound(&'static str, String),

    #[error("Conflict: {1}")]
    Conflict(&'static str, String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Security error: {0}")]
    Security(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest(codes::INVALID_INPUT, message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(..) | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(..) => StatusCode::NOT_FOUND,
            Error::Conflict(..) | Error::Store(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
            Error::Store(StoreError::ForeignKey(_)) => StatusCode::BAD_REQUEST,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::BadRequest(code, _)
            | Error::Unauthorized(code, _)
            | Error::NotFound(code, _)
            | Error::Conflict(code, _) => *code,
            Error::Validation(_) => codes::INVALID_INPUT,
            Error::Forbidden(_) => codes::NOT_AUTHORIZED,
            Error::RateLimited => codes::RATE_LIMITED,
            Error::Security(_) => codes::SECURITY_ERROR,
            Error::Store(StoreError::Duplicate(field)) => match field {
                DuplicateField::Username => codes::USERNAME_TAKEN,
                DuplicateField::Email => codes::EMAIL_TAKEN,
                DuplicateField::PersonalNumber => codes::PERSONAL_NUMBER_TAKEN,
            },
            Error::Store(StoreError::ForeignKey(_)) => codes::INVALID_INPUT,
            _ => codes::INTERNAL_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let code = self.code();
        let message = match &self {
            Error::BadRequest(_, msg)
            | Error::Unauthorized(_, msg)
            | Error::NotFound(_, msg)
            | Error::Conflict(_, msg)
            | Error::Forbidden(msg) => msg.clone(),
            Error::Validation(err) => err.to_string(),
            Error::RateLimited => "Too many requests, slow down".to_string(),
            Error::Store(StoreError::Duplicate(field)) => format!("{} is already taken", field),
            Error::Store(StoreError::ForeignKey(msg)) => msg.clone(),
            Error::Security(detail) => {
                tracing::error!(%detail, "Security error");
                "A security error occurred. Please contact support.".to_string()
            }
            other => {
                tracing::error!(error = %other, "Internal error");
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({ "success": false, "code": code, "message": message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                Error::NotFound(codes::NOT_FOUND, "Resource not found".to_string())
            }
            other => Error::Database(other),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest(codes::INVALID_INPUT, rejection.body_text())
    }
}
