use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Authenticated user id, inserted into request extensions by whatever sits in
/// front of the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

/// Extracts the caller's [`Identity`] if one was attached. Never rejects.
#[derive(Debug, Clone, Default)]
pub struct CallerIdentity(pub Option<String>);

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<Identity>()
                .map(|identity| identity.0.clone()),
        ))
    }
}
