use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::requests::load_participation;
use crate::db::models::ChatMessage;
use crate::db::now_timestamp;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::views::{chat_message_view, ChatMessageView};

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessage {
    #[validate(length(min = 1, max = 1000, message = "Message must be 1 to 1000 characters"))]
    pub message: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/chat/{request_id}/messages",
        get(list_messages).post(send_message),
    )
}

async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<i64>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let (request, _ride) = load_participation(&conn, request_id, &user)?;

    let messages = {
        let mut stmt = conn.prepare(
            "SELECT * FROM chat_messages WHERE ride_request_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![request_id], ChatMessage::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    let messages = messages
        .iter()
        .map(|m| chat_message_view(&conn, m))
        .collect::<rusqlite::Result<Vec<ChatMessageView>>>()?;

    Ok(Json(json!({
        "messages": messages,
        "chat_enabled": request.status.chat_enabled(),
    })))
}

async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<i64>,
    Json(body): Json<SendMessage>,
) -> AppResult<Json<Value>> {
    body.validate()?;
    let text = body.message.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("Message cannot be empty"));
    }

    let conn = state.db.get()?;
    let (request, _ride) = load_participation(&conn, request_id, &user)?;
    if !request.status.chat_enabled() {
        return Err(AppError::bad_request(
            "Chat is only available after request is accepted",
        ));
    }

    conn.execute(
        "INSERT INTO chat_messages (ride_request_id, sender_id, message, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![request_id, user.id, text, now_timestamp()],
    )?;
    let message_id = conn.last_insert_rowid();
    let message = conn.query_row(
        "SELECT * FROM chat_messages WHERE id = ?1",
        params![message_id],
        ChatMessage::from_row,
    )?;

    tracing::debug!(request_id, sender_id = user.id, "Chat message sent");

    Ok(Json(json!({
        "message": "Message sent",
        "chat_message": chat_message_view(&conn, &message)?,
    })))
}
