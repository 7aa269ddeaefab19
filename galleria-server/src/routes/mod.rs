//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional OpenAPI document (disable with `GALLERIA_ENABLE_DOCS=false`)
//! - Public gallery and AI routes
//! - Mutating catalog/config routes behind the admin bearer token

pub mod ai;
pub mod banners;
pub mod catalog;
pub mod doc;
pub mod health;
pub mod images;
pub mod interactions;
pub mod system_configs;
pub mod users;

use axum::{
    middleware::{self},
    routing::get,
    Json, Router,
};
use crate::middleware::{auth, cors, trace};
use crate::state::AppState;
use std::sync::Arc;
use tower::ServiceBuilder;

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Routes guarded by [`auth::require_admin`].
fn admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(catalog::admin_router())
        .merge(banners::admin_router())
        .merge(system_configs::admin_router())
        .merge(ai::admin_router())
        .route_layer(middleware::from_fn_with_state(state, auth::require_admin))
}

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(health::router())
        .merge(images::router())
        .merge(catalog::router())
        .merge(banners::router())
        .merge(users::router())
        .merge(interactions::router())
        .merge(system_configs::router())
        .merge(ai::router())
        .merge(admin_router(state.clone()));

    let mut app = Router::new().merge(api_router);

    if state.config.enable_docs {
        let api_doc = doc::get_docs();
        app = app.route(
            OPENAPI_PATH,
            get(move || {
                let doc = api_doc.clone();
                async move { Json(doc) }
            }),
        );
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state)))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}
