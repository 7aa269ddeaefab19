//! AI generation endpoints.
//!
//! `POST /ai/generate` returns a task id at once; clients poll
//! `POST /ai/task-status` until the task is `COMPLETED` or `FAILED`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::ai::client::ChatRequest as UpstreamChat;
use crate::entities::{ChatMessage, ChatStore, TaskStore};
use crate::error::ServerError;
use crate::schemas::ai::{
    ChatMessageBody, ChatRecordKey, ChatRecordListRequest, ChatRecordResponse, ChatRequest,
    ChatResponse, DEFAULT_TASK_LIMIT, GenerateRequest, GenerateResponse, ModelsResponse,
    SaveChatRecordRequest, TaskListRequest, TaskResponse, TaskStatusRequest,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        generate,
        task_status,
        list_tasks,
        delete_task,
        chat,
        list_models,
        save_chat_record,
        get_chat_record,
        list_chat_records
    ),
    components(schemas(
        GenerateRequest,
        GenerateResponse,
        TaskStatusRequest,
        TaskListRequest,
        TaskResponse,
        ChatRequest,
        ChatResponse,
        ModelsResponse,
        ChatMessageBody,
        SaveChatRecordRequest,
        ChatRecordKey,
        ChatRecordListRequest,
        ChatRecordResponse
    ))
)]
pub struct AiApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ai/generate", post(generate))
        .route("/ai/task-status", post(task_status))
        .route("/ai/tasks", post(list_tasks))
        .route("/ai/chat", post(chat))
        .route("/ai/models", get(list_models))
        .route("/ai/chat-records/save", post(save_chat_record))
        .route("/ai/chat-records/get", post(get_chat_record))
        .route("/ai/chat-records/list", post(list_chat_records))
}

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new().route("/ai/tasks/{id}", delete(delete_task))
}

#[utoipa::path(
    post,
    path = "/ai/generate",
    tag = "ai",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Task accepted; poll task-status for the result", body = GenerateResponse),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Generation queue full"),
    )
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ServerError> {
    req.validate()?;
    let task_id = state.orchestrator.submit(req.into()).await?;
    Ok(Json(GenerateResponse { task_id }))
}

#[utoipa::path(
    post,
    path = "/ai/task-status",
    tag = "ai",
    request_body = TaskStatusRequest,
    responses(
        (status = 200, description = "Current task record", body = TaskResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskStatusRequest>,
) -> Result<Json<TaskResponse>, ServerError> {
    let task = state
        .store
        .get_task(req.id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("task {} not found", req.id)))?;
    Ok(Json(task.into()))
}

#[utoipa::path(
    post,
    path = "/ai/tasks",
    tag = "ai",
    request_body = TaskListRequest,
    responses(
        (status = 200, description = "Tasks, newest first", body = [TaskResponse]),
        (status = 400, description = "Invalid limit"),
    )
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskListRequest>,
) -> Result<Json<Vec<TaskResponse>>, ServerError> {
    req.validate()?;
    let tasks = state
        .store
        .list_tasks(req.user_id, req.limit.unwrap_or(DEFAULT_TASK_LIMIT))
        .await?;
    Ok(Json(tasks.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    delete,
    path = "/ai/tasks/{id}",
    tag = "ai",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 401, description = "Admin token required"),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    if !state.store.delete_task(id).await? {
        return Err(ServerError::NotFound(format!("task {id} not found")));
    }
    info!(task_id = id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/ai/chat",
    tag = "ai",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 502, description = "Upstream error"),
        (status = 503, description = "No API key configured"),
        (status = 504, description = "Upstream timed out"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    req.validate()?;
    let settings = state.settings.chat(req.model.as_deref()).await;
    let content = state
        .client
        .generate_chat(UpstreamChat {
            endpoint: &settings.endpoint,
            api_key: settings.api_key.as_deref(),
            model: &settings.model,
            prompt: &req.prompt,
        })
        .await?;
    Ok(Json(ChatResponse {
        content,
        model: settings.model,
    }))
}

#[utoipa::path(
    get,
    path = "/ai/models",
    tag = "ai",
    responses((status = 200, description = "Configured models", body = ModelsResponse))
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    Json(state.settings.models().await.into())
}

#[utoipa::path(
    post,
    path = "/ai/chat-records/save",
    tag = "ai",
    request_body = SaveChatRecordRequest,
    responses(
        (status = 200, description = "Stored record", body = ChatRecordResponse),
        (status = 400, description = "Invalid request"),
    )
)]
pub async fn save_chat_record(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveChatRecordRequest>,
) -> Result<Json<ChatRecordResponse>, ServerError> {
    req.validate()?;
    let messages: Vec<ChatMessage> = req.messages.into_iter().map(Into::into).collect();
    let record = state
        .store
        .save_chat_record(req.user_id, &req.model, &messages)
        .await?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    post,
    path = "/ai/chat-records/get",
    tag = "ai",
    request_body = ChatRecordKey,
    responses(
        (status = 200, description = "Stored record", body = ChatRecordResponse),
        (status = 404, description = "No record for this user and model"),
    )
)]
pub async fn get_chat_record(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRecordKey>,
) -> Result<Json<ChatRecordResponse>, ServerError> {
    let record = state
        .store
        .get_chat_record(req.user_id, &req.model)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("no chat record for model {}", req.model)))?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    post,
    path = "/ai/chat-records/list",
    tag = "ai",
    request_body = ChatRecordListRequest,
    responses((status = 200, description = "Records, most recent first", body = [ChatRecordResponse]))
)]
pub async fn list_chat_records(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRecordListRequest>,
) -> Result<Json<Vec<ChatRecordResponse>>, ServerError> {
    let records = state.store.list_chat_records(req.user_id).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}
