use crate::{
    domain::{PolicyName, response::ApiResponse},
    middleware::{PolicyGuard, rate_limit_middleware},
    state::AppState,
};
use axum::{
    Json, extract::State, http::StatusCode, middleware, response::IntoResponse, routing::post,
};
use shared::errors::HttpError;
use std::sync::Arc;
use utoipa_axum::router::OpenApiRouter;

#[utoipa::path(
    post,
    path = "/api/ai/acquire",
    responses(
        (status = 200, description = "Outbound AI call may proceed", body = ApiResponse<bool>),
        (status = 429, description = "Caller or service-wide AI quota exhausted")
    ),
    tag = "AI"
)]
pub async fn acquire_ai_slot(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    state.ai_limiter.acquire().await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success("AI service slot acquired", true)),
    ))
}

pub fn ai_routes(app_state: Arc<AppState>) -> OpenApiRouter {
    OpenApiRouter::new()
        .route("/api/ai/acquire", post(acquire_ai_slot))
        .route_layer(middleware::from_fn_with_state(
            PolicyGuard::new(app_state.guard.clone(), PolicyName::AiAnalysis),
            rate_limit_middleware,
        ))
        .with_state(app_state)
}
