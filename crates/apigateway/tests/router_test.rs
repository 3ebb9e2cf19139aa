use std::sync::Arc;

use apigateway::{domain::FailurePolicy, handler::AppRouter, state::AppState};
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::RETRY_AFTER},
    response::Response,
};
use serde_json::Value;
use shared::cache::InMemoryCounterStore;
use tower::ServiceExt;

fn state() -> AppState {
    AppState::with_store(
        Arc::new(InMemoryCounterStore::new()),
        FailurePolicy::FailOpen,
    )
    .unwrap()
}

fn app() -> Router {
    AppRouter::build(state())
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .body(Body::empty())
        .unwrap()
}

async fn json_body(resp: Response) -> Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_healthchecker() {
    let resp = app()
        .oneshot(request(Method::GET, "/api/healthchecker"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_status_is_guarded_by_api_policy() {
    let mut req = request(Method::GET, "/api/rate-limit/upload");
    req.headers_mut().insert("x-user-id", "u1".parse().unwrap());

    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-ratelimit-limit"], "100");
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "99");
    assert!(resp.headers().contains_key("x-ratelimit-reset"));

    let json = json_body(resp).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["policy"], "upload");
    assert_eq!(json["data"]["limit"], 10);
    assert_eq!(json["data"]["remaining"], 10);
}

#[tokio::test]
async fn test_unknown_policy_is_not_found() {
    let resp = app()
        .oneshot(request(Method::GET, "/api/rate-limit/downloads"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_is_limited_by_auth_policy() {
    let app = app();

    for _ in 0..5 {
        let resp = app
            .clone()
            .oneshot(request(Method::DELETE, "/api/rate-limit/upload"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app
        .clone()
        .oneshot(request(Method::DELETE, "/api/rate-limit/upload"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers()["x-ratelimit-limit"], "5");
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "0");
    assert!(resp.headers().contains_key(RETRY_AFTER));

    let json = json_body(resp).await;
    assert_eq!(json["status"], "fail");
    assert_eq!(json["message"], "Too many requests, please try again later");
}

#[tokio::test]
async fn test_auth_quota_is_per_ip_not_per_user() {
    let app = app();

    for user in ["u1", "u2", "u3", "u4", "u5", "u6"] {
        let mut req = request(Method::DELETE, "/api/rate-limit/api");
        req.headers_mut().insert("x-user-id", user.parse().unwrap());
        let resp = app.clone().oneshot(req).await.unwrap();

        if user == "u6" {
            assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        } else {
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }
}

#[tokio::test]
async fn test_auth_counter_cannot_be_reset_through_its_own_route() {
    let app = app();

    for _ in 0..5 {
        let resp = app
            .clone()
            .oneshot(request(Method::DELETE, "/api/rate-limit/auth"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    for uri in ["/api/rate-limit/auth", "/api/rate-limit/upload"] {
        let resp = app
            .clone()
            .oneshot(request(Method::DELETE, uri))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

async fn acquire_as(app: &Router, user: &str) -> StatusCode {
    let mut req = request(Method::POST, "/api/ai/acquire");
    req.headers_mut().insert("x-user-id", user.parse().unwrap());
    app.clone().oneshot(req).await.unwrap().status()
}

#[tokio::test]
async fn test_user_id_header_is_ignored_unless_trusted() {
    let app = app();

    for i in 0..20 {
        assert_eq!(acquire_as(&app, &format!("user-{i}")).await, StatusCode::OK);
    }

    // same IP, so a fresh header buys nothing
    assert_eq!(
        acquire_as(&app, "user-20").await,
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_trusted_user_id_header_keys_by_user() {
    let app = AppRouter::build(state().with_trusted_user_id_header(true));

    for _ in 0..20 {
        assert_eq!(acquire_as(&app, "writer").await, StatusCode::OK);
    }

    assert_eq!(
        acquire_as(&app, "writer").await,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(acquire_as(&app, "editor").await, StatusCode::OK);
}

#[tokio::test]
async fn test_ai_acquire() {
    let mut req = request(Method::POST, "/api/ai/acquire");
    req.headers_mut().insert("x-user-id", "writer".parse().unwrap());

    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-ratelimit-limit"], "20");
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "19");

    let json = json_body(resp).await;
    assert_eq!(json["data"], true);
}

#[tokio::test]
async fn test_metrics_expose_decisions() {
    let app = app();

    app.clone()
        .oneshot(request(Method::GET, "/api/rate-limit/api"))
        .await
        .unwrap();

    let resp = app
        .oneshot(request(Method::GET, "/metrics"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains(r#"rate_limit_decisions_total{policy="api",outcome="Allowed"} 1"#));
}
