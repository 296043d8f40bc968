use axum::extract::{Path, State};
use axum::routing::{post, put};
use axum::{Json, Router};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::deserialize_opt_id;
use crate::db::models::Report;
use crate::db::{now_timestamp, queries};
use crate::domain::{ReportAction, ReportCategory, ReportStatus};
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminUser, CurrentUser};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReport {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub reported_user_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub ride_id: Option<i64>,
    pub category: ReportCategory,
    #[validate(length(min = 10, max = 1000, message = "Description must be 10 to 1000 characters"))]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct HandleReport {
    pub action: ReportAction,
    #[validate(length(max = 500))]
    pub admin_notes: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports", post(create_report).get(list_reports))
        .route("/reports/{id}/action", put(handle_report))
}

fn find_report(conn: &Connection, id: i64) -> AppResult<Report> {
    conn.query_row(
        "SELECT * FROM reports WHERE id = ?1",
        params![id],
        Report::from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Report not found"))
}

async fn create_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateReport>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    let conn = state.db.get()?;
    if let Some(reported) = body.reported_user_id {
        if reported == user.id {
            return Err(AppError::bad_request("You cannot report yourself"));
        }
        if queries::find_user(&conn, reported)?.is_none() {
            return Err(AppError::not_found("User not found"));
        }
    }
    if let Some(ride_id) = body.ride_id {
        if queries::find_ride(&conn, ride_id)?.is_none() {
            return Err(AppError::not_found("Ride not found"));
        }
    }

    conn.execute(
        "INSERT INTO reports (reporter_id, reported_user_id, ride_id, category, description, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id,
            body.reported_user_id,
            body.ride_id,
            body.category,
            body.description.trim(),
            ReportStatus::Pending,
            now_timestamp()
        ],
    )?;
    let report_id = conn.last_insert_rowid();

    tracing::info!(
        report_id,
        reporter_id = user.id,
        category = %body.category,
        "Report filed"
    );

    Ok(Json(json!({
        "message": "Report submitted",
        "report_id": report_id.to_string(),
    })))
}

async fn list_reports(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let reports = {
        let mut stmt = conn.prepare("SELECT * FROM reports ORDER BY created_at DESC, id DESC")?;
        let rows = stmt.query_map([], Report::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    Ok(Json(json!({ "reports": reports })))
}

async fn handle_report(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(body): Json<HandleReport>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;

    let report = find_report(&tx, id)?;
    if report.status != ReportStatus::Pending {
        return Err(AppError::bad_request("This report has already been handled"));
    }

    let action = body.action;
    let penalty = match action {
        ReportAction::Warn => Some("UPDATE users SET warning_count = warning_count + 1 WHERE id = ?1"),
        ReportAction::Suspend => Some("UPDATE users SET is_suspended = 1 WHERE id = ?1"),
        ReportAction::Disable => Some("UPDATE users SET is_active = 0 WHERE id = ?1"),
        ReportAction::Dismiss => None,
    };
    if let Some(sql) = penalty {
        let target = report
            .reported_user_id
            .ok_or_else(|| AppError::bad_request("This report does not name a user"))?;
        tx.execute(sql, params![target])?;
    }

    tx.execute(
        "UPDATE reports SET status = ?1, admin_action = ?2, admin_notes = ?3, handled_at = ?4, handled_by = ?5
         WHERE id = ?6",
        params![
            action.resulting_status(),
            action,
            body.admin_notes,
            now_timestamp(),
            admin.id,
            id
        ],
    )?;

    queries::log_admin_action(
        &tx,
        &admin,
        &format!("report_{}", action),
        "report",
        id,
        &json!({
            "reported_user_id": report.reported_user_id.map(|u| u.to_string()),
            "notes": body.admin_notes,
        }),
    )?;
    tx.commit()?;

    let report = find_report(&conn, id)?;
    Ok(Json(json!({
        "message": "Report handled",
        "report": report,
    })))
}
