//! Error taxonomy and its mapping to HTTP status codes.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use parley_types::api::ErrorBody;

/// Every failure a request can end in. All variants except `Generation` and
/// `Internal` are caller-correctable and never retried.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("an account with this email already exists")]
    DuplicateEmail,

    #[error("account not found")]
    AccountNotFound,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token expired")]
    TokenExpired,

    #[error("token invalid")]
    TokenInvalid,

    #[error("authentication required")]
    Unauthenticated,

    #[error("you do not own this {0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("identity provider error: {0}")]
    IdentityProvider(String),

    #[error("{0}")]
    Validation(String),

    #[error("reply generation failed")]
    Generation(#[source] anyhow::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateEmail => StatusCode::CONFLICT,
            Self::AccountNotFound | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidCredentials
            | Self::TokenExpired
            | Self::TokenInvalid
            | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::IdentityProvider(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Generation(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateEmail => "DUPLICATE_EMAIL",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::IdentityProvider(_) => "IDENTITY_PROVIDER_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Generation(_) => "GENERATION_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Unreadable or incomplete JSON bodies are the caller's mistake.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Upstream and storage details stay in the server log.
        let message = match &self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                "internal server error".to_string()
            }
            Self::Generation(e) => {
                error!("Reply generator failed: {:#}", e);
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.code().to_string(),
            message,
        };

        (self.status(), Json(body)).into_response()
    }
}
