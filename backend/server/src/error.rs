use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingToken,
    InvalidToken,
    ExpiredToken,
    BadCredentials,
    RoleMismatch,
    NotOwner,
}

impl DenyReason {
    fn status(self) -> StatusCode {
        match self {
            DenyReason::MissingToken
            | DenyReason::InvalidToken
            | DenyReason::ExpiredToken
            | DenyReason::BadCredentials => StatusCode::UNAUTHORIZED,
            DenyReason::RoleMismatch | DenyReason::NotOwner => StatusCode::FORBIDDEN,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            DenyReason::MissingToken => "no access token provided",
            DenyReason::InvalidToken => "access token is invalid",
            DenyReason::ExpiredToken => "access token has expired",
            DenyReason::BadCredentials => "unknown username or wrong password",
            DenyReason::RoleMismatch => "role not permitted for this resource",
            DenyReason::NotOwner => "only the owner may modify this resource",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Access denied: {}", .0.describe())]
    Denied(DenyReason),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Denied(reason) => reason.status(),
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Persistence(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::ExpiredSignature => AppError::Denied(DenyReason::ExpiredToken),
            _ => AppError::Denied(DenyReason::InvalidToken),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
