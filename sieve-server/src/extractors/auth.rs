use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use sieve_statsd::metric;

use crate::constants::{READ_SCOPES, WRITE_SCOPES};
use crate::service::ServiceState;
use crate::statsd::ServerCounters;
use crate::utils::ApiErrorResponse;

/// Rejection of requests without sufficient credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer token in the `Authorization` header.
    #[error("authentication credentials were not provided")]
    Missing,
    /// The bearer token is not known.
    #[error("invalid token")]
    Unknown,
    /// The token lacks all of the required scopes.
    #[error("you do not have permission to perform this action")]
    Forbidden,
}

impl AuthError {
    fn reason(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Unknown => "unknown",
            Self::Forbidden => "forbidden",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        metric!(
            counter(ServerCounters::AuthRejected) += 1,
            reason = self.reason()
        );

        let status = match self {
            Self::Missing | Self::Unknown => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        };

        (status, ApiErrorResponse::from_error(&self)).into_response()
    }
}

/// The authenticated caller and its scopes.
#[derive(Clone, Debug)]
pub struct Principal {
    scopes: Vec<String>,
}

impl Principal {
    /// Returns `true` if the caller was granted at least one of the scopes.
    pub fn has_any_scope(&self, scopes: &[&str]) -> bool {
        self.scopes.iter().any(|s| scopes.contains(&s.as_str()))
    }

    fn require(self, scopes: &[&str]) -> Result<Self, AuthError> {
        if self.has_any_scope(scopes) {
            Ok(self)
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

impl FromRequestParts<ServiceState> for Principal {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Missing)?;

        let scopes = state.token_scopes(token).ok_or(AuthError::Unknown)?;

        Ok(Self {
            scopes: scopes.to_vec(),
        })
    }
}

/// A caller allowed to read metrics of an organization.
///
/// Extract this before any other parameter, so that callers without access never learn whether
/// their request was valid.
#[derive(Clone, Debug)]
pub struct ReadAccess(pub Principal);

impl FromRequestParts<ServiceState> for ReadAccess {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        principal.require(READ_SCOPES).map(Self)
    }
}

/// A caller allowed to write metric observations.
#[derive(Clone, Debug)]
pub struct WriteAccess(pub Principal);

impl FromRequestParts<ServiceState> for WriteAccess {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        principal.require(WRITE_SCOPES).map(Self)
    }
}
