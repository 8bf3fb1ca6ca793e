//! 待办事项处理器

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use validator::Validate;

use super::model::{CreateTodoRequest, Todo, TodoDraft, UpdateTodoRequest};
use crate::app::AppState;
use crate::infrastructure::database::Connector;
use crate::web::{error::ApiError, response::MessageResponse};

fn not_found() -> ApiError {
    ApiError::NotFound("Todo not found".to_string())
}

/// 非整数 id 不可能匹配任何记录
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim().parse().map_err(|_| not_found())
}

/// GET /api/todos
pub async fn list_todos<C: Connector>(
    State(state): State<AppState<C>>,
) -> Result<Json<Vec<Todo>>, ApiError> {
    let todos = state.todos.list().await?;
    Ok(Json(todos))
}

/// GET /api/todos/:id
pub async fn get_todo<C: Connector>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Json<Todo>, ApiError> {
    let id = parse_id(&id)?;
    let todo = state.todos.find(id).await?.ok_or_else(not_found)?;
    Ok(Json(todo))
}

/// POST /api/todos
pub async fn create_todo<C: Connector>(
    State(state): State<AppState<C>>,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let todo = state.todos.create(&TodoDraft::from(payload)).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

/// PUT /api/todos/:id
pub async fn update_todo<C: Connector>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Result<Json<Todo>, ApiError> {
    let Json(payload) = payload?;
    payload.validate()?;
    let id = parse_id(&id)?;

    let todo = state
        .todos
        .update(id, &TodoDraft::from(payload))
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(todo))
}

/// PATCH /api/todos/:id/toggle
pub async fn toggle_todo<C: Connector>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Json<Todo>, ApiError> {
    let id = parse_id(&id)?;
    let todo = state.todos.toggle(id).await?.ok_or_else(not_found)?;
    Ok(Json(todo))
}

/// DELETE /api/todos/:id
pub async fn delete_todo<C: Connector>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    if !state.todos.delete(id).await? {
        return Err(not_found());
    }
    Ok(Json(MessageResponse::new("Todo deleted successfully")))
}
