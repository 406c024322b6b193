use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::jwt::TokenError;
use crate::auth::session::AuthError;
use crate::booking::BookingError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum AppError {
    InvalidCredentials,
    Unauthorized,
    BadRequest(String),
    NotFound(String),
    /// Server-side failure with a public message; the cause is logged where it happened.
    Failed(&'static str),
    Internal(String),
    Store(StoreError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "Invalid username or password"),
            Self::Unauthorized => write!(f, "Authentication required"),
            Self::BadRequest(msg) => write!(f, "{msg}"),
            Self::NotFound(msg) => write!(f, "{msg}"),
            Self::Failed(msg) => write!(f, "{msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
            Self::Store(e) => write!(f, "Store error: {e}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Failed(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            Self::Internal(_) | Self::Store(_) => {
                tracing::error!("{self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), "{message}");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            // same answer whether or not the account exists
            AuthError::UserNotFound | AuthError::Unauthorized => Self::InvalidCredentials,
            AuthError::SessionNotFound
            | AuthError::MalformedSession(_)
            | AuthError::TokenSuperseded
            | AuthError::Token(TokenError::Expired | TokenError::Invalid | TokenError::ClaimsInvalid) => {
                tracing::debug!(error = %e, "authentication rejected");
                Self::Unauthorized
            }
            AuthError::Token(e @ TokenError::Signing(_)) => Self::Internal(e.to_string()),
            AuthError::Password(e) => Self::Internal(e.to_string()),
            AuthError::Store(e) => Self::Store(e),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::UserNotFound => Self::NotFound("User not found".into()),
            BookingError::TransactionAborted(cause) => {
                tracing::error!(error = %cause, "appointment creation rolled back");
                Self::Failed("Failed to create appointment")
            }
            BookingError::Store(e) => Self::Store(e),
        }
    }
}
