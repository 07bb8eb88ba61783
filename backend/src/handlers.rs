use axum::extract::{FromRequest, FromRequestParts, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{
    CategorizeResponse, CreateTaskRequest, NaturalLanguageInput, ParsedTask, StatusFilter,
    SuggestionsResponse, SummaryResponse, TaskCompleteResponse, TaskListItem, TaskResponse,
    UpdateTaskRequest,
};

use crate::ai::AiAssistService;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::tasks::TaskService;

/// JSON body extractor whose rejections render as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Todo API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

pub async fn list_tasks(
    State(tasks): State<TaskService>,
    AuthUser(user_id): AuthUser,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<Vec<TaskListItem>>, ApiError> {
    let filter = StatusFilter::from_query(query.status.as_deref());
    let records = tasks.list(&user_id, filter).await?;
    Ok(Json(records.into_iter().map(TaskListItem::from).collect()))
}

pub async fn create_task(
    State(tasks): State<TaskService>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let record = tasks.create(&user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

pub async fn get_task(
    State(tasks): State<TaskService>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<TaskResponse>, ApiError> {
    let record = tasks.get(&user_id, id).await?;
    Ok(Json(record.into()))
}

pub async fn update_task(
    State(tasks): State<TaskService>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let record = tasks.update(&user_id, id, payload).await?;
    Ok(Json(record.into()))
}

pub async fn delete_task(
    State(tasks): State<TaskService>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    tasks.delete(&user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_complete(
    State(tasks): State<TaskService>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<TaskCompleteResponse>, ApiError> {
    Ok(Json(tasks.toggle_complete(&user_id, id).await?))
}

pub async fn parse_task(
    State(ai): State<AiAssistService>,
    AuthUser(user_id): AuthUser,
    AppJson(input): AppJson<NaturalLanguageInput>,
) -> Result<Json<ParsedTask>, ApiError> {
    input.validate()?;
    tracing::debug!(%user_id, "parsing natural-language task");

    let today = Local::now().date_naive();
    ai.parse_natural_language(&input.text, today)
        .await
        .map(Json)
        .map_err(|error| ApiError::ai_service("AI parsing failed", &error))
}

pub async fn suggestions(
    State(tasks): State<TaskService>,
    State(ai): State<AiAssistService>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    let records = tasks.list(&user_id, StatusFilter::All).await?;
    let suggestions = ai
        .suggestions(&records)
        .await
        .map_err(|error| ApiError::ai_service("AI suggestions failed", &error))?;
    Ok(Json(SuggestionsResponse { suggestions }))
}

pub async fn categorize_task(
    State(tasks): State<TaskService>,
    State(ai): State<AiAssistService>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<CategorizeResponse>, ApiError> {
    let task = tasks.get(&user_id, id).await?;
    let categories = ai
        .categorize(&task.title, task.description.as_deref())
        .await
        .map_err(|error| ApiError::ai_service("AI categorization failed", &error))?;
    Ok(Json(CategorizeResponse { categories }))
}

pub async fn summary(
    State(tasks): State<TaskService>,
    State(ai): State<AiAssistService>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SummaryResponse>, ApiError> {
    let records = tasks.list(&user_id, StatusFilter::All).await?;
    let (summary, stats) = ai
        .summary(&records, Utc::now())
        .await
        .map_err(|error| ApiError::ai_service("AI summary failed", &error))?;
    Ok(Json(SummaryResponse { summary, stats }))
}
