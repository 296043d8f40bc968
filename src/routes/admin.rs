use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::db::models::{AuditLog, User};
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::extractors::AdminUser;
use crate::state::AppState;
use crate::views::{user_view, UserView};

/// Entries returned by the audit log endpoint, newest first.
const AUDIT_LOG_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct UserStatusUpdate {
    pub is_active: bool,
    /// Lifts or imposes a suspension alongside the active flag.
    pub is_suspended: Option<bool>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/stats", get(stats))
        .route("/admin/audit-logs", get(audit_logs))
        .route("/admin/users/{id}/status", put(update_user_status))
}

fn count(conn: &Connection, sql: &str) -> rusqlite::Result<i64> {
    conn.query_row(sql, [], |row| row.get(0))
}

async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let users = {
        let mut stmt = conn.prepare("SELECT * FROM users ORDER BY created_at DESC, id DESC")?;
        let rows = stmt.query_map([], User::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    let users = users
        .iter()
        .map(|u| user_view(&conn, u, &state.config.trust))
        .collect::<rusqlite::Result<Vec<UserView>>>()?;

    Ok(Json(json!({ "users": users })))
}

async fn stats(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    Ok(Json(json!({
        "total_users": count(&conn, "SELECT COUNT(*) FROM users")?,
        "total_rides": count(&conn, "SELECT COUNT(*) FROM rides")?,
        "active_rides": count(&conn, "SELECT COUNT(*) FROM rides WHERE status = 'active'")?,
        "completed_rides": count(&conn, "SELECT COUNT(*) FROM rides WHERE status = 'completed'")?,
        "active_sos": count(&conn, "SELECT COUNT(*) FROM sos_events WHERE status = 'active'")?,
        "pending_verifications": count(
            &conn,
            "SELECT COUNT(*) FROM users WHERE verification_status = 'pending'"
        )?,
        "pending_reports": count(&conn, "SELECT COUNT(*) FROM reports WHERE status = 'pending'")?,
    })))
}

async fn audit_logs(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let logs = {
        let mut stmt =
            conn.prepare("SELECT * FROM audit_logs ORDER BY timestamp DESC, id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![AUDIT_LOG_LIMIT], AuditLog::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    Ok(Json(json!({ "logs": logs })))
}

async fn update_user_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(body): Json<UserStatusUpdate>,
) -> AppResult<Json<Value>> {
    body.validate()?;
    if id == admin.id && !body.is_active {
        return Err(AppError::bad_request("You cannot disable your own account"));
    }

    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;
    if queries::find_user(&tx, id)?.is_none() {
        return Err(AppError::not_found("User not found"));
    }

    tx.execute(
        "UPDATE users SET is_active = ?1, is_suspended = COALESCE(?2, is_suspended) WHERE id = ?3",
        params![body.is_active, body.is_suspended, id],
    )?;

    let action = if body.is_active { "enabled" } else { "disabled" };
    queries::log_admin_action(
        &tx,
        &admin,
        &format!("user_{}", action),
        "user",
        id,
        &json!({ "reason": body.reason, "is_suspended": body.is_suspended }),
    )?;
    tx.commit()?;

    let user = queries::find_user(&conn, id)?.ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(json!({
        "message": format!("User {}", action),
        "user": user_view(&conn, &user, &state.config.trust)?,
    })))
}
