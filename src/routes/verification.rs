use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::db::models::User;
use crate::db::{now_timestamp, queries};
use crate::domain::VerificationStatus;
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminUser, CurrentUser};
use crate::state::AppState;
use crate::views::{user_view, UserView};

#[derive(Debug, Deserialize, Validate)]
pub struct VerificationUpload {
    /// Image reference or data URL of the student id card.
    #[validate(length(min = 1, message = "Student ID image is required"))]
    pub student_id_image: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationDecision {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerificationAction {
    pub action: VerificationDecision,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verification/upload", post(upload))
        .route("/verification/pending", get(pending))
        .route("/verification/{user_id}/action", put(decide))
}

async fn upload(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<VerificationUpload>,
) -> AppResult<Json<Value>> {
    body.validate()?;
    if user.verification_status == VerificationStatus::Verified {
        return Err(AppError::bad_request("Already verified"));
    }

    let conn = state.db.get()?;
    conn.execute(
        "UPDATE users SET student_id_image = ?1, verification_status = ?2 WHERE id = ?3",
        params![body.student_id_image, VerificationStatus::Pending, user.id],
    )?;

    tracing::info!(user_id = user.id, "Verification submitted");

    Ok(Json(json!({ "message": "Verification submitted" })))
}

async fn pending(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let users = {
        let mut stmt = conn
            .prepare("SELECT * FROM users WHERE verification_status = ?1 ORDER BY created_at ASC")?;
        let rows = stmt.query_map(params![VerificationStatus::Pending], User::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    let users = users
        .iter()
        .map(|u| user_view(&conn, u, &state.config.trust))
        .collect::<rusqlite::Result<Vec<UserView>>>()?;

    Ok(Json(json!({ "users": users })))
}

async fn decide(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    Json(body): Json<VerificationAction>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;
    if queries::find_user(&tx, user_id)?.is_none() {
        return Err(AppError::not_found("User not found"));
    }

    let (action_type, message) = match body.action {
        VerificationDecision::Approve => {
            tx.execute(
                "UPDATE users SET verification_status = ?1, verified_at = ?2, rejection_reason = NULL
                 WHERE id = ?3",
                params![VerificationStatus::Verified, now_timestamp(), user_id],
            )?;
            ("verification_approve", "User approved")
        }
        VerificationDecision::Reject => {
            tx.execute(
                "UPDATE users SET verification_status = ?1, rejection_reason = ?2 WHERE id = ?3",
                params![VerificationStatus::Rejected, body.reason, user_id],
            )?;
            ("verification_reject", "User rejected")
        }
    };

    queries::log_admin_action(
        &tx,
        &admin,
        action_type,
        "user",
        user_id,
        &json!({ "reason": body.reason }),
    )?;
    tx.commit()?;

    let user = queries::find_user(&conn, user_id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(json!({
        "message": message,
        "user": user_view(&conn, &user, &state.config.trust)?,
    })))
}
