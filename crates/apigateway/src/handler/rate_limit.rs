use crate::{
    domain::{
        CallerIdentity, PolicyName,
        response::{ApiResponse, RateLimitStatusResponse},
    },
    middleware::{PolicyGuard, rate_limit_middleware},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{delete, get},
};
use shared::errors::HttpError;
use std::sync::Arc;
use utoipa_axum::router::OpenApiRouter;

fn parse_policy(policy: &str) -> Result<PolicyName, HttpError> {
    policy
        .parse::<PolicyName>()
        .map_err(|_| HttpError::NotFound(format!("Unknown rate limit policy: {policy}")))
}

#[utoipa::path(
    get,
    path = "/api/rate-limit/{policy}",
    params(
        ("policy" = String, Path, description = "Policy name, e.g. upload or aiAnalysis")
    ),
    responses(
        (status = 200, description = "Caller's current window", body = ApiResponse<RateLimitStatusResponse>),
        (status = 404, description = "Unknown policy"),
        (status = 429, description = "Too many requests")
    ),
    tag = "RateLimit"
)]
pub async fn get_rate_limit_status(
    State(state): State<Arc<AppState>>,
    Path(policy): Path<String>,
    CallerIdentity(identity): CallerIdentity,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let policy = parse_policy(&policy)?;

    let result = state
        .limiters
        .limiter(policy)
        .status(&headers, identity.as_deref())
        .await;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(
            "Rate limit status retrieved",
            RateLimitStatusResponse::new(policy.as_str(), result),
        )),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/rate-limit/{policy}",
    params(
        ("policy" = String, Path, description = "Policy name, e.g. upload or aiAnalysis")
    ),
    responses(
        (status = 200, description = "Caller's counter cleared", body = ApiResponse<bool>),
        (status = 403, description = "The auth quota cannot be reset by its caller"),
        (status = 404, description = "Unknown policy"),
        (status = 429, description = "Too many requests"),
        (status = 503, description = "Counter store unavailable")
    ),
    tag = "RateLimit"
)]
pub async fn reset_rate_limit(
    State(state): State<Arc<AppState>>,
    Path(policy): Path<String>,
    CallerIdentity(identity): CallerIdentity,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let policy = parse_policy(&policy)?;

    // the auth counter guards this route
    if policy == PolicyName::Auth {
        return Err(HttpError::Forbidden(
            "The auth rate limit cannot be reset".to_string(),
        ));
    }

    let cleared = state
        .limiters
        .limiter(policy)
        .reset(&headers, identity.as_deref())
        .await;

    if !cleared {
        return Err(HttpError::ServiceUnavailable(
            "Rate limit store unavailable".to_string(),
        ));
    }

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success("Rate limit reset", true)),
    ))
}

pub fn rate_limit_routes(app_state: Arc<AppState>) -> OpenApiRouter {
    let api_layer = middleware::from_fn_with_state(
        PolicyGuard::new(app_state.guard.clone(), PolicyName::Api),
        rate_limit_middleware,
    );
    let auth_layer = middleware::from_fn_with_state(
        PolicyGuard::new(app_state.guard.clone(), PolicyName::Auth),
        rate_limit_middleware,
    );

    OpenApiRouter::new()
        .route(
            "/api/rate-limit/{policy}",
            get(get_rate_limit_status)
                .route_layer(api_layer)
                .merge(delete(reset_rate_limit).route_layer(auth_layer)),
        )
        .with_state(app_state)
}
