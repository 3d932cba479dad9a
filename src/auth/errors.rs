use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::{jwt::TokenError, repo::StoreError};

/// Failure taxonomy for the account operations and the authorization gate.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing required fields")]
    MissingFields,
    #[error("username or email already exists")]
    DuplicateAccount,
    #[error("user not found")]
    NotFound,
    #[error("password mismatch")]
    BadCredentials,
    #[error("old password mismatch")]
    BadOldPassword,
    #[error("no bearer token presented")]
    Unauthenticated,
    #[error("token rejected: {0}")]
    InvalidToken(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Collapse the two login failure cases so the response does not say
    /// whether the email or the password was wrong.
    pub fn conceal_login_detail(self) -> Self {
        match self {
            AuthError::NotFound | AuthError::BadCredentials => AuthError::BadCredentials,
            other => other,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::MissingFields => (StatusCode::BAD_REQUEST, "Missing fields"),
            AuthError::DuplicateAccount => {
                (StatusCode::BAD_REQUEST, "Username or email already exists")
            }
            AuthError::NotFound => (StatusCode::NOT_FOUND, "User not found"),
            AuthError::BadCredentials => (StatusCode::BAD_REQUEST, "Invalid email or password"),
            AuthError::BadOldPassword => (StatusCode::BAD_REQUEST, "Old password is incorrect"),
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Access denied: no token"),
            AuthError::InvalidToken(_) => (StatusCode::FORBIDDEN, "Invalid or expired token"),
            AuthError::Store(e) => {
                error!(error = %e, "store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AuthError::Internal(e) => {
                error!(error = %e, "unexpected failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
