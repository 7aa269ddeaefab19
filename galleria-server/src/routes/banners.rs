//! Home-page banners.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use utoipa::OpenApi;
use validator::Validate;

use crate::entities::BannerStore;
use crate::error::ServerError;
use crate::schemas::catalog::{
    BannerQuery, BannerResponse, CreateBannerRequest, UpdateBannerRequest,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_banners, create_banner, update_banner, delete_banner),
    components(schemas(BannerResponse, CreateBannerRequest, UpdateBannerRequest))
)]
pub struct BannersApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/banners", get(list_banners))
}

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/banners", post(create_banner))
        .route("/banners/{id}", patch(update_banner).delete(delete_banner))
}

#[utoipa::path(
    get,
    path = "/banners",
    tag = "banners",
    params(BannerQuery),
    responses((status = 200, description = "Banners by sort order", body = [BannerResponse]))
)]
pub async fn list_banners(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BannerQuery>,
) -> Result<Json<Vec<BannerResponse>>, ServerError> {
    let rows = state.store.list_banners(q.all.unwrap_or(false)).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/banners",
    tag = "banners",
    request_body = CreateBannerRequest,
    responses((status = 201, description = "Banner created", body = BannerResponse))
)]
pub async fn create_banner(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBannerRequest>,
) -> Result<(StatusCode, Json<BannerResponse>), ServerError> {
    req.validate()?;
    let banner = state
        .store
        .create_banner(
            &req.title,
            &req.image_url,
            req.link_url.as_deref(),
            req.sort_order,
            req.is_active,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(banner.into())))
}

#[utoipa::path(
    patch,
    path = "/banners/{id}",
    tag = "banners",
    params(("id" = i64, Path, description = "Banner id")),
    request_body = UpdateBannerRequest,
    responses(
        (status = 200, description = "Banner updated", body = BannerResponse),
        (status = 404, description = "Banner not found"),
    )
)]
pub async fn update_banner(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateBannerRequest>,
) -> Result<Json<BannerResponse>, ServerError> {
    req.validate()?;
    let banner = state
        .store
        .update_banner(
            id,
            req.title.as_deref(),
            req.image_url.as_deref(),
            req.link_url.as_deref(),
            req.sort_order,
            req.is_active,
        )
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("banner {id} not found")))?;
    Ok(Json(banner.into()))
}

#[utoipa::path(
    delete,
    path = "/banners/{id}",
    tag = "banners",
    params(("id" = i64, Path, description = "Banner id")),
    responses(
        (status = 204, description = "Banner deleted"),
        (status = 404, description = "Banner not found"),
    )
)]
pub async fn delete_banner(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    if !state.store.delete_banner(id).await? {
        return Err(ServerError::NotFound(format!("banner {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
