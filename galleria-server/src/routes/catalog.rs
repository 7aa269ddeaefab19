//! Categories, tags and topics. Reads are public; writes go through the
//! admin guard.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::entities::CatalogStore;
use crate::error::ServerError;
use crate::schemas::catalog::{
    CategoryResponse, CreateCategoryRequest, CreateTagRequest, CreateTopicRequest, TagResponse,
    TopicDetailResponse, TopicImagesRequest, TopicResponse, UpdateCategoryRequest,
    UpdateTopicRequest,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_categories,
        create_category,
        update_category,
        delete_category,
        list_tags,
        create_tag,
        delete_tag,
        list_topics,
        get_topic,
        create_topic,
        update_topic,
        delete_topic,
        set_topic_images
    ),
    components(schemas(
        CategoryResponse,
        CreateCategoryRequest,
        UpdateCategoryRequest,
        TagResponse,
        CreateTagRequest,
        TopicResponse,
        TopicDetailResponse,
        CreateTopicRequest,
        UpdateTopicRequest,
        TopicImagesRequest
    ))
)]
pub struct CatalogApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/tags", get(list_tags))
        .route("/topics", get(list_topics))
        .route("/topics/{id}", get(get_topic))
}

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories", post(create_category))
        .route(
            "/categories/{id}",
            patch(update_category).delete(delete_category),
        )
        .route("/tags", post(create_tag))
        .route("/tags/{id}", delete(delete_tag))
        .route("/topics", post(create_topic))
        .route("/topics/{id}", patch(update_topic).delete(delete_topic))
        .route("/topics/{id}/images", put(set_topic_images))
}

// ── categories ────────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/categories",
    tag = "catalog",
    responses((status = 200, description = "Categories by sort order", body = [CategoryResponse]))
)]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryResponse>>, ServerError> {
    let rows = state.store.list_categories().await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/categories",
    tag = "catalog",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 409, description = "Name already taken"),
    )
)]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ServerError> {
    req.validate()?;
    let category = state
        .store
        .create_category(
            req.name.trim(),
            req.description.as_deref(),
            req.cover_url.as_deref(),
            req.sort_order,
        )
        .await
        .map_err(|e| ServerError::from_write(e, "category name already exists", "category not found"))?;
    info!(category_id = category.id, name = %category.name, "category created");
    Ok((StatusCode::CREATED, Json(category.into())))
}

#[utoipa::path(
    patch,
    path = "/categories/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Category id")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Name already taken"),
    )
)]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<CategoryResponse>, ServerError> {
    req.validate()?;
    let category = state
        .store
        .update_category(
            id,
            req.name.as_deref().map(str::trim),
            req.description.as_deref(),
            req.cover_url.as_deref(),
            req.sort_order,
        )
        .await
        .map_err(|e| ServerError::from_write(e, "category name already exists", "category not found"))?
        .ok_or_else(|| ServerError::NotFound(format!("category {id} not found")))?;
    Ok(Json(category.into()))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted; its images become uncategorized"),
        (status = 404, description = "Category not found"),
    )
)]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    if !state.store.delete_category(id).await? {
        return Err(ServerError::NotFound(format!("category {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── tags ──────────────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/tags",
    tag = "catalog",
    responses((status = 200, description = "Tags, newest first", body = [TagResponse]))
)]
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TagResponse>>, ServerError> {
    let rows = state.store.list_tags().await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/tags",
    tag = "catalog",
    request_body = CreateTagRequest,
    responses(
        (status = 201, description = "Tag created", body = TagResponse),
        (status = 409, description = "Tag already exists"),
    )
)]
pub async fn create_tag(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<TagResponse>), ServerError> {
    req.validate()?;
    let tag = state
        .store
        .create_tag(req.name.trim())
        .await
        .map_err(|e| ServerError::from_write(e, "tag already exists", "tag not found"))?;
    Ok((StatusCode::CREATED, Json(tag.into())))
}

#[utoipa::path(
    delete,
    path = "/tags/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Tag id")),
    responses(
        (status = 204, description = "Tag deleted and unlinked from images"),
        (status = 404, description = "Tag not found"),
    )
)]
pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    if !state.store.delete_tag(id).await? {
        return Err(ServerError::NotFound(format!("tag {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── topics ────────────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/topics",
    tag = "catalog",
    responses((status = 200, description = "Topics, newest first", body = [TopicResponse]))
)]
pub async fn list_topics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TopicResponse>>, ServerError> {
    let rows = state.store.list_topics().await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/topics/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Topic id")),
    responses(
        (status = 200, description = "Topic with its images", body = TopicDetailResponse),
        (status = 404, description = "Topic not found"),
    )
)]
pub async fn get_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TopicDetailResponse>, ServerError> {
    let topic = state
        .store
        .get_topic(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("topic {id} not found")))?;
    let images = state.store.topic_images(id).await?;
    Ok(Json(TopicDetailResponse {
        topic: topic.into(),
        images: images.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/topics",
    tag = "catalog",
    request_body = CreateTopicRequest,
    responses((status = 201, description = "Topic created", body = TopicResponse))
)]
pub async fn create_topic(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTopicRequest>,
) -> Result<(StatusCode, Json<TopicResponse>), ServerError> {
    req.validate()?;
    let topic = state
        .store
        .create_topic(&req.title, req.description.as_deref(), req.cover_url.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(topic.into())))
}

#[utoipa::path(
    patch,
    path = "/topics/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Topic id")),
    request_body = UpdateTopicRequest,
    responses(
        (status = 200, description = "Topic updated", body = TopicResponse),
        (status = 404, description = "Topic not found"),
    )
)]
pub async fn update_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTopicRequest>,
) -> Result<Json<TopicResponse>, ServerError> {
    req.validate()?;
    let topic = state
        .store
        .update_topic(
            id,
            req.title.as_deref(),
            req.description.as_deref(),
            req.cover_url.as_deref(),
        )
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("topic {id} not found")))?;
    Ok(Json(topic.into()))
}

#[utoipa::path(
    delete,
    path = "/topics/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Topic id")),
    responses(
        (status = 204, description = "Topic deleted"),
        (status = 404, description = "Topic not found"),
    )
)]
pub async fn delete_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    if !state.store.delete_topic(id).await? {
        return Err(ServerError::NotFound(format!("topic {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the topic's images, keeping the given order.
#[utoipa::path(
    put,
    path = "/topics/{id}/images",
    tag = "catalog",
    params(("id" = i64, Path, description = "Topic id")),
    request_body = TopicImagesRequest,
    responses(
        (status = 200, description = "Topic with its new images", body = TopicDetailResponse),
        (status = 404, description = "Topic or image not found"),
    )
)]
pub async fn set_topic_images(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<TopicImagesRequest>,
) -> Result<Json<TopicDetailResponse>, ServerError> {
    req.validate()?;
    let found = state
        .store
        .set_topic_images(id, &req.image_ids)
        .await
        .map_err(|e| ServerError::from_write(e, "duplicate image in topic", "unknown image id"))?;
    if !found {
        return Err(ServerError::NotFound(format!("topic {id} not found")));
    }
    get_topic(State(state), Path(id)).await
}
