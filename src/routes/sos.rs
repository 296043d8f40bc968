use axum::extract::{Path, State};
use axum::routing::{post, put};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::deserialize_id;
use super::requests::load_participation;
use crate::db::models::SosEvent;
use crate::db::{now_timestamp, queries};
use crate::domain::SosStatus;
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminUser, CurrentUser};
use crate::state::AppState;
use crate::views::{sos_view, SosView};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSos {
    #[serde(deserialize_with = "deserialize_id")]
    pub ride_request_id: i64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(length(max = 500))]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SosDecision {
    Review,
    Resolve,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SosAction {
    pub action: SosDecision,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sos", post(create_sos).get(list_sos))
        .route("/sos/{id}/action", put(handle_sos))
}

fn load_sos(conn: &rusqlite::Connection, id: i64) -> AppResult<SosEvent> {
    queries::find_sos(conn, id)?.ok_or_else(|| AppError::not_found("SOS event not found"))
}

async fn create_sos(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateSos>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    let conn = state.db.get()?;
    let (request, ride) = match load_participation(&conn, body.ride_request_id, &user) {
        Err(AppError::NotFound(_)) => {
            return Err(AppError::not_found("Ride request not found"));
        }
        other => other?,
    };

    conn.execute(
        "INSERT INTO sos_events (ride_request_id, triggered_by, latitude, longitude, message, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            request.id,
            user.id,
            body.latitude,
            body.longitude,
            body.message,
            SosStatus::Active,
            now_timestamp()
        ],
    )?;
    let sos_id = conn.last_insert_rowid();

    tracing::warn!(
        sos_id,
        request_id = request.id,
        ride_id = ride.id,
        triggered_by = user.id,
        "SOS alert raised"
    );

    let sos = load_sos(&conn, sos_id)?;
    Ok(Json(json!({
        "message": "SOS alert created",
        "sos": sos_view(&conn, &sos)?,
    })))
}

async fn list_sos(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let events = {
        let mut stmt = conn.prepare("SELECT * FROM sos_events ORDER BY created_at DESC, id DESC")?;
        let rows = stmt.query_map([], SosEvent::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    let events = events
        .iter()
        .map(|e| sos_view(&conn, e))
        .collect::<rusqlite::Result<Vec<SosView>>>()?;

    Ok(Json(json!({ "sos_events": events })))
}

async fn handle_sos(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(body): Json<SosAction>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;
    let sos = load_sos(&tx, id)?;
    if sos.status == SosStatus::Resolved {
        return Err(AppError::bad_request("SOS event is already resolved"));
    }

    let now = now_timestamp();
    let (action_type, message) = match body.action {
        SosDecision::Review => {
            tx.execute(
                "UPDATE sos_events SET status = ?1, admin_notes = ?2, reviewed_at = ?3 WHERE id = ?4",
                params![SosStatus::Reviewing, body.notes, now, id],
            )?;
            ("sos_review", "SOS reviewed")
        }
        SosDecision::Resolve => {
            tx.execute(
                "UPDATE sos_events SET status = ?1, admin_notes = ?2, resolved_at = ?3, resolved_by = ?4 WHERE id = ?5",
                params![SosStatus::Resolved, body.notes, now, admin.id, id],
            )?;
            ("sos_resolve", "SOS resolved")
        }
    };

    queries::log_admin_action(
        &tx,
        &admin,
        action_type,
        "sos",
        id,
        &json!({ "notes": body.notes }),
    )?;
    tx.commit()?;

    let sos = load_sos(&conn, id)?;
    Ok(Json(json!({
        "message": message,
        "sos": sos_view(&conn, &sos)?,
    })))
}
