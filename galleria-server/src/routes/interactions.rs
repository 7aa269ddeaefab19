//! Favorites and view history.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::InteractionStore;
use crate::error::ServerError;
use crate::schemas::image::ImageResponse;
use crate::schemas::interaction::{
    ClearedResponse, FavoriteStatusResponse, FavoriteToggleResponse, HistoryQuery,
    HistoryResponse, UserImageRequest, UserQuery,
};
use crate::state::AppState;

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 200;

#[derive(OpenApi)]
#[openapi(
    paths(
        toggle_favorite,
        favorite_status,
        list_favorites,
        record_history,
        list_history,
        clear_history
    ),
    components(schemas(
        UserImageRequest,
        FavoriteToggleResponse,
        FavoriteStatusResponse,
        HistoryResponse,
        ClearedResponse
    ))
)]
pub struct InteractionsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/interactions/favorite", post(toggle_favorite))
        .route("/interactions/favorite/status", post(favorite_status))
        .route("/interactions/favorites", get(list_favorites))
        .route(
            "/interactions/history",
            post(record_history).get(list_history).delete(clear_history),
        )
}

/// Flip the favorite and return the image with its new like count.
#[utoipa::path(
    post,
    path = "/interactions/favorite",
    tag = "interactions",
    request_body = UserImageRequest,
    responses(
        (status = 200, description = "Image after the toggle", body = FavoriteToggleResponse),
        (status = 404, description = "Image or user not found"),
    )
)]
pub async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserImageRequest>,
) -> Result<Json<FavoriteToggleResponse>, ServerError> {
    let toggle = state
        .store
        .toggle_favorite(req.user_id, req.image_id)
        .await
        .map_err(|e| ServerError::from_write(e, "favorite already recorded", "user not found"))?
        .ok_or_else(|| ServerError::NotFound(format!("image {} not found", req.image_id)))?;
    Ok(Json(FavoriteToggleResponse {
        image: toggle.image.into(),
        favorited: toggle.favorited,
    }))
}

#[utoipa::path(
    post,
    path = "/interactions/favorite/status",
    tag = "interactions",
    request_body = UserImageRequest,
    responses((status = 200, description = "Whether the pair is favorited", body = FavoriteStatusResponse))
)]
pub async fn favorite_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserImageRequest>,
) -> Result<Json<FavoriteStatusResponse>, ServerError> {
    let favorited = state.store.is_favorited(req.user_id, req.image_id).await?;
    Ok(Json(FavoriteStatusResponse { favorited }))
}

#[utoipa::path(
    get,
    path = "/interactions/favorites",
    tag = "interactions",
    params(UserQuery),
    responses((status = 200, description = "Favorited images, newest first", body = [ImageResponse]))
)]
pub async fn list_favorites(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> Result<Json<Vec<ImageResponse>>, ServerError> {
    let rows = state.store.list_favorites(q.user_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/interactions/history",
    tag = "interactions",
    request_body = UserImageRequest,
    responses(
        (status = 204, description = "View recorded"),
        (status = 404, description = "Image or user not found"),
    )
)]
pub async fn record_history(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserImageRequest>,
) -> Result<StatusCode, ServerError> {
    state
        .store
        .record_history(req.user_id, req.image_id)
        .await
        .map_err(|e| ServerError::from_write(e, "view already recorded", "user or image not found"))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/interactions/history",
    tag = "interactions",
    params(HistoryQuery),
    responses((status = 200, description = "Most recent views first", body = [HistoryResponse]))
)]
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryResponse>>, ServerError> {
    let limit = q
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let rows = state.store.list_history(q.user_id, limit).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    delete,
    path = "/interactions/history",
    tag = "interactions",
    params(UserQuery),
    responses((status = 200, description = "Number of entries removed", body = ClearedResponse))
)]
pub async fn clear_history(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> Result<Json<ClearedResponse>, ServerError> {
    let deleted = state.store.clear_history(q.user_id).await?;
    Ok(Json(ClearedResponse { deleted }))
}
