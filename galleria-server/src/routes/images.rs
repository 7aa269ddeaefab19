//! Image catalog endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use utoipa::OpenApi;
use validator::Validate;

use crate::entities::ImageStore;
use crate::error::ServerError;
use crate::schemas::image::{
    CreateImageRequest, ImageListQuery, ImagePage, ImageResponse, UpdateImageRequest,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_images, get_image, create_image, update_image, delete_image, download_image),
    components(schemas(ImageResponse, ImagePage, CreateImageRequest, UpdateImageRequest))
)]
pub struct ImagesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/images", get(list_images).post(create_image))
        .route(
            "/images/{id}",
            get(get_image).patch(update_image).delete(delete_image),
        )
        .route("/images/{id}/download", post(download_image))
}

fn not_found(id: i64) -> ServerError {
    ServerError::NotFound(format!("image {id} not found"))
}

#[utoipa::path(
    get,
    path = "/images",
    tag = "images",
    params(ImageListQuery),
    responses(
        (status = 200, description = "One page of images", body = ImagePage),
        (status = 400, description = "Unknown sort"),
    )
)]
pub async fn list_images(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ImageListQuery>,
) -> Result<Json<ImagePage>, ServerError> {
    let query = q.to_query().map_err(ServerError::BadRequest)?;
    let (page, page_size) = (query.page, query.page_size);
    let (items, total) = state.store.list_images(query).await?;
    Ok(Json(ImagePage {
        items: items.into_iter().map(Into::into).collect(),
        total,
        page,
        page_size,
    }))
}

/// Fetch one image; counts as a view.
#[utoipa::path(
    get,
    path = "/images/{id}",
    tag = "images",
    params(("id" = i64, Path, description = "Image id")),
    responses(
        (status = 200, description = "Image", body = ImageResponse),
        (status = 404, description = "Image not found"),
    )
)]
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ImageResponse>, ServerError> {
    let image = state
        .store
        .record_image_view(id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(image.into()))
}

#[utoipa::path(
    post,
    path = "/images",
    tag = "images",
    request_body = CreateImageRequest,
    responses(
        (status = 201, description = "Image created", body = ImageResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unknown category or user"),
    )
)]
pub async fn create_image(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateImageRequest>,
) -> Result<(StatusCode, Json<ImageResponse>), ServerError> {
    req.validate()?;
    let image = state
        .store
        .create_image(req.into())
        .await
        .map_err(|e| ServerError::from_write(e, "image already exists", "unknown categoryId or userId"))?;
    Ok((StatusCode::CREATED, Json(image.into())))
}

#[utoipa::path(
    patch,
    path = "/images/{id}",
    tag = "images",
    params(("id" = i64, Path, description = "Image id")),
    request_body = UpdateImageRequest,
    responses(
        (status = 200, description = "Image updated", body = ImageResponse),
        (status = 404, description = "Image or category not found"),
    )
)]
pub async fn update_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateImageRequest>,
) -> Result<Json<ImageResponse>, ServerError> {
    req.validate()?;
    let image = state
        .store
        .update_image(id, req.into())
        .await
        .map_err(|e| ServerError::from_write(e, "image conflicts with an existing one", "unknown categoryId"))?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(image.into()))
}

#[utoipa::path(
    delete,
    path = "/images/{id}",
    tag = "images",
    params(("id" = i64, Path, description = "Image id")),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 404, description = "Image not found"),
    )
)]
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    if !state.store.delete_image(id).await? {
        return Err(not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Count a download and return the updated image.
#[utoipa::path(
    post,
    path = "/images/{id}/download",
    tag = "images",
    params(("id" = i64, Path, description = "Image id")),
    responses(
        (status = 200, description = "Image with updated download count", body = ImageResponse),
        (status = 404, description = "Image not found"),
    )
)]
pub async fn download_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ImageResponse>, ServerError> {
    let image = state
        .store
        .record_image_download(id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(image.into()))
}
