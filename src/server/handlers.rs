use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use super::sse::chat_sse;
use crate::error::HistoryError;
use crate::models::ChatMessage;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "status": "error", "message": message.into() })),
    )
}

fn history_error(error: HistoryError) -> (StatusCode, Json<Value>) {
    let status = match &error {
        HistoryError::NotFound(_) => StatusCode::NOT_FOUND,
        HistoryError::InvalidName(_) => StatusCode::BAD_REQUEST,
        _ => {
            tracing::error!("[history] {error}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, error.to_string())
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

pub async fn chat(State(state): State<AppState>, Json(body): Json<ChatBody>) -> Response {
    let message = body.message.unwrap_or_default();
    if message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "response": "No message." })),
        )
            .into_response();
    }

    let persona = state.settings().persona_instructions;
    let events = state.responder.respond(persona, body.history, message);
    chat_sse(events).into_response()
}

pub async fn history_list(State(state): State<AppState>) -> ApiResult {
    let files = state.history.list().map_err(history_error)?;
    Ok(Json(json!({ "status": "success", "files": files })))
}

#[derive(Debug, Deserialize)]
pub struct SaveBody {
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

pub async fn history_save(State(state): State<AppState>, Json(body): Json<SaveBody>) -> ApiResult {
    match state.history.save(body.history).await.map_err(history_error)? {
        None => Ok(Json(json!({ "status": "ignored" }))),
        Some(report) => Ok(Json(json!({
            "status": "success",
            "filename": report.file,
            "ingest": report.outcome,
        }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoadBody {
    #[serde(default)]
    pub filename: Option<String>,
}

pub async fn history_load(State(state): State<AppState>, Json(body): Json<LoadBody>) -> ApiResult {
    let Some(filename) = body.filename.filter(|f| !f.trim().is_empty()) else {
        return Err(error_response(StatusCode::BAD_REQUEST, "filename is required"));
    };
    let history = state.history.load(&filename).map_err(history_error)?;
    Ok(Json(json!({ "status": "success", "history": history })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    pub filename: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

pub async fn history_update(
    State(state): State<AppState>,
    Json(body): Json<UpdateBody>,
) -> ApiResult {
    let report = state
        .history
        .update(&body.filename, body.history)
        .await
        .map_err(history_error)?;
    Ok(Json(json!({
        "status": "success",
        "filename": report.file,
        "ingest": report.outcome,
    })))
}

pub async fn history_delete_all(State(state): State<AppState>) -> ApiResult {
    state.history.reset().await.map_err(history_error)?;
    Ok(Json(json!({ "status": "success" })))
}

pub async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    let settings = state.settings();
    Json(json!({
        "status": "success",
        "userName": settings.user_name.unwrap_or_default(),
        "persona": settings.persona_instructions,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBody {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
}

pub async fn post_settings(
    State(state): State<AppState>,
    Json(body): Json<SettingsBody>,
) -> ApiResult {
    state
        .update_settings(body.user_name, body.persona)
        .await
        .map_err(|e| {
            tracing::error!("[settings] {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(Json(json!({ "status": "success" })))
}
