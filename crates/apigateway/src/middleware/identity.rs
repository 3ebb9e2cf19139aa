use crate::domain::Identity;
use axum::{body::Body, http::Request, middleware::Next, response::Response};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Stand-in for the upstream session layer: lifts `x-user-id` into an [`Identity`].
///
/// Clients can set the header to anything, so it is only mounted when
/// `TRUST_USER_ID_HEADER` is on, i.e. behind a proxy that strips and re-sets
/// it. Otherwise a session layer must insert [`Identity`] itself.
pub async fn identity_middleware(mut req: Request<Body>, next: Next) -> Response {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    if let Some(user_id) = user_id {
        req.extensions_mut().insert(Identity(user_id));
    }

    next.run(req).await
}
