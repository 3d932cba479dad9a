use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::{
    errors::AuthError,
    jwt::{Identity, JwtKeys},
};

/// Extracts and validates the bearer token, yielding the caller's identity.
/// No header (or a non-Bearer scheme) is a 401; a token that fails
/// verification is a 403.
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::Unauthenticated)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::Unauthenticated)?;

        let identity = keys.verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            AuthError::InvalidToken(e)
        })?;

        Ok(AuthUser(identity))
    }
}
