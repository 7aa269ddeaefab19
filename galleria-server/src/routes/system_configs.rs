//! System configuration endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::entities::ConfigStore;
use crate::error::ServerError;
use crate::schemas::config::{ConfigResponse, PatchConfigRequest, UpsertConfigRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_configs, get_config, upsert_config, patch_config, delete_config),
    components(schemas(ConfigResponse, UpsertConfigRequest, PatchConfigRequest))
)]
pub struct SystemConfigsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/system-configs", get(list_configs))
        .route("/system-configs/{key}", get(get_config))
}

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/system-configs", post(upsert_config))
        .route(
            "/system-configs/{key}",
            patch(patch_config).delete(delete_config),
        )
}

fn not_found(key: &str) -> ServerError {
    ServerError::NotFound(format!("config key '{key}' not found"))
}

#[utoipa::path(
    get,
    path = "/system-configs",
    tag = "system-configs",
    responses((status = 200, description = "All entries, secrets masked", body = [ConfigResponse]))
)]
pub async fn list_configs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ConfigResponse>>, ServerError> {
    let entries = state.store.list_config_entries().await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/system-configs/{key}",
    tag = "system-configs",
    params(("key" = String, Path, description = "Config key")),
    responses(
        (status = 200, description = "Entry, secret masked", body = ConfigResponse),
        (status = 404, description = "Key not found"),
    )
)]
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ConfigResponse>, ServerError> {
    let entry = state
        .store
        .get_config_entry(&key)
        .await?
        .ok_or_else(|| not_found(&key))?;
    Ok(Json(entry.into()))
}

/// Insert or overwrite an entry by key.
#[utoipa::path(
    post,
    path = "/system-configs",
    tag = "system-configs",
    request_body = UpsertConfigRequest,
    responses((status = 200, description = "Stored entry", body = ConfigResponse))
)]
pub async fn upsert_config(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpsertConfigRequest>,
) -> Result<Json<ConfigResponse>, ServerError> {
    req.validate()?;
    let key = req.key.trim();
    let entry = state
        .store
        .upsert_config_entry(key, &req.value, req.description.as_deref())
        .await?;
    info!(key = %entry.key, "system config stored");
    Ok(Json(entry.into()))
}

#[utoipa::path(
    patch,
    path = "/system-configs/{key}",
    tag = "system-configs",
    params(("key" = String, Path, description = "Config key")),
    request_body = PatchConfigRequest,
    responses(
        (status = 200, description = "Updated entry", body = ConfigResponse),
        (status = 404, description = "Key not found"),
    )
)]
pub async fn patch_config(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(req): Json<PatchConfigRequest>,
) -> Result<Json<ConfigResponse>, ServerError> {
    req.validate()?;
    let entry = state
        .store
        .update_config_entry(&key, req.value.as_deref(), req.description.as_deref())
        .await?
        .ok_or_else(|| not_found(&key))?;
    info!(key = %entry.key, "system config updated");
    Ok(Json(entry.into()))
}

#[utoipa::path(
    delete,
    path = "/system-configs/{key}",
    tag = "system-configs",
    params(("key" = String, Path, description = "Config key")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "Key not found"),
    )
)]
pub async fn delete_config(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<StatusCode, ServerError> {
    if !state.store.delete_config_entry(&key).await? {
        return Err(not_found(&key));
    }
    Ok(StatusCode::NO_CONTENT)
}
