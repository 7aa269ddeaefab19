//! Bearer-token guard for admin routes.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ServerError;
use crate::state::AppState;

/// Reject the request unless it carries `Authorization: Bearer <token>`
/// matching `GALLERIA_ADMIN_TOKEN`. Without a configured token every
/// request passes.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(expected) = state.config.admin_token.as_deref() {
        let provided = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);
        if provided != Some(expected) {
            return ServerError::Unauthorized.into_response();
        }
    }
    next.run(req).await
}
