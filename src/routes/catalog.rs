use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::catalog::{ACADEMIC_YEARS, BRANCHES, PICKUP_POINTS};
use crate::db::models::EventTag;
use crate::db::{now_timestamp, queries};
use crate::domain::RecurrencePattern;
use crate::error::AppResult;
use crate::extractors::AdminUser;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventTag {
    #[validate(length(min = 1, max = 50, message = "Name must be 1 to 50 characters"))]
    pub name: String,
    #[validate(length(max = 200, message = "Description must be 200 characters or less"))]
    pub description: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pickup-points", get(pickup_points))
        .route("/recurrence-patterns", get(recurrence_patterns))
        .route("/branches", get(branches))
        .route("/academic-years", get(academic_years))
        .route("/event-tags", get(list_event_tags).post(create_event_tag))
}

async fn pickup_points() -> Json<Value> {
    Json(json!({ "pickup_points": PICKUP_POINTS }))
}

async fn recurrence_patterns() -> Json<Value> {
    Json(json!({ "patterns": RecurrencePattern::ALL }))
}

async fn branches() -> Json<Value> {
    Json(json!({ "branches": BRANCHES }))
}

async fn academic_years() -> Json<Value> {
    Json(json!({ "years": ACADEMIC_YEARS }))
}

async fn list_event_tags(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let tags = {
        let mut stmt =
            conn.prepare("SELECT * FROM event_tags WHERE is_active = 1 ORDER BY name ASC")?;
        let rows = stmt.query_map([], EventTag::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    Ok(Json(json!({ "tags": tags })))
}

async fn create_event_tag(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<CreateEventTag>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    let conn = state.db.get()?;
    let name = body.name.trim();
    conn.execute(
        "INSERT INTO event_tags (name, description, is_active, created_by, created_at)
         VALUES (?1, ?2, 1, ?3, ?4)",
        params![name, body.description, admin.id, now_timestamp()],
    )?;
    let tag_id = conn.last_insert_rowid();

    queries::log_admin_action(
        &conn,
        &admin,
        "event_tag_create",
        "event_tag",
        tag_id,
        &json!({ "name": name }),
    )?;

    let tag = EventTag {
        id: tag_id,
        name: name.to_string(),
        description: body.description,
    };
    Ok(Json(json!({ "message": "Event tag created", "tag": tag })))
}
