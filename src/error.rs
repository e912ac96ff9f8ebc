use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{auth::roles::Role, config::Environment};

/// Which half of a credential pair failed. Kept for logs; only surfaced to
/// clients outside production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    UnknownUser,
    WrongPassword,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username already exists")]
    UsernameTaken,
    #[error("{0}")]
    InvalidInput(String),
    #[error("invalid username or password")]
    InvalidCredentials(CredentialFailure),
    #[error("account locked, retry in {remaining_secs} seconds")]
    LockedOut { remaining_secs: u64 },
    #[error("user not found")]
    UserNotFound,
    #[error("access denied, {required} role required")]
    Forbidden { required: Role },
    #[error("service unavailable")]
    Unavailable(#[from] anyhow::Error),
}

impl AuthError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::UsernameTaken => StatusCode::CONFLICT,
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            AuthError::LockedOut { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AuthError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Render for a client. Outside production a credential failure says
    /// which part was wrong.
    pub fn into_api(self, env: Environment) -> ApiError {
        let status = self.status();
        let message = match &self {
            AuthError::InvalidCredentials(CredentialFailure::UnknownUser)
                if !env.is_production() =>
            {
                "username not found".to_string()
            }
            AuthError::InvalidCredentials(CredentialFailure::WrongPassword)
                if !env.is_production() =>
            {
                "invalid password".to_string()
            }
            AuthError::Unavailable(e) => {
                error!(error = %format!("{e:#}"), "storage or hashing failure");
                self.to_string()
            }
            _ => self.to_string(),
        };
        let retry_after = match self {
            AuthError::LockedOut { remaining_secs } => Some(remaining_secs),
            _ => None,
        };
        ApiError {
            status,
            message,
            retry_after,
        }
    }
}

/// Error body returned by every handler: a status plus a plain-text message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        e.into_api(Environment::Production)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut res = (self.status, self.message).into_response();
        if let Some(secs) = self.retry_after {
            res.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        res
    }
}
