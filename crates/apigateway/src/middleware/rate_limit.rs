use crate::{
    domain::{Identity, PolicyName},
    service::RateLimitGuard,
};
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::utils::now_millis;
use std::sync::Arc;
use tracing::warn;

/// State for one `from_fn_with_state` rate limit layer.
#[derive(Clone)]
pub struct PolicyGuard {
    pub guard: Arc<RateLimitGuard>,
    pub policy: PolicyName,
}

impl PolicyGuard {
    pub fn new(guard: Arc<RateLimitGuard>, policy: PolicyName) -> Self {
        Self { guard, policy }
    }
}

pub async fn rate_limit_middleware(
    State(layer): State<PolicyGuard>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let identity = req
        .extensions()
        .get::<Identity>()
        .map(|identity| identity.0.clone());
    let headers = req.headers().clone();
    let now_ms = now_millis();

    let rate_limit_headers = match layer
        .guard
        .check_at(layer.policy, &headers, identity.as_deref(), now_ms)
        .await
    {
        Ok(rate_limit_headers) => rate_limit_headers,
        Err(err) => {
            warn!(
                "Rate limit exceeded on '{}' for {} (retry after {}s)",
                layer.policy,
                identity.as_deref().unwrap_or("anonymous"),
                err.retry_after_secs
            );
            return err.into_response();
        }
    };

    let mut response = next.run(req).await;

    layer
        .guard
        .settle_at(
            layer.policy,
            &headers,
            identity.as_deref(),
            now_ms,
            response.status(),
        )
        .await;

    // handler-set values win, e.g. a nested limiter's own 429
    for (name, value) in rate_limit_headers.iter() {
        if !response.headers().contains_key(name) {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }

    response
}
