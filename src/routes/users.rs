use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};

use super::campus_now;
use crate::catalog;
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::views::{badges_for, profile_view, stats_view, user_view};

#[derive(Debug, Deserialize)]
pub struct CommunityProfileUpdate {
    pub branch: Option<String>,
    pub academic_year: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{id}/profile", get(public_profile))
        .route("/users/profile/community", put(update_community_profile))
        .route("/users/stats", get(stats))
}

async fn public_profile(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let user = queries::find_user(&conn, id)?.ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(json!({
        "profile": profile_view(&conn, &viewer, &user, &state.config.trust)?,
    })))
}

async fn update_community_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CommunityProfileUpdate>,
) -> AppResult<Json<Value>> {
    let branch = body.branch.as_deref().filter(|b| !b.is_empty());
    let year = body.academic_year.as_deref().filter(|y| !y.is_empty());

    if branch.is_some_and(|b| catalog::branch_name(b).is_none()) {
        return Err(AppError::bad_request("Invalid branch"));
    }
    if year.is_some_and(|y| catalog::academic_year_name(y).is_none()) {
        return Err(AppError::bad_request("Invalid academic year"));
    }

    let conn = state.db.get()?;
    let message = if branch.is_some() || year.is_some() {
        conn.execute(
            "UPDATE users SET branch = COALESCE(?1, branch), academic_year = COALESCE(?2, academic_year)
             WHERE id = ?3",
            params![branch, year, user.id],
        )?;
        "Profile updated"
    } else {
        "No changes made"
    };

    let updated = queries::find_user(&conn, user.id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(json!({
        "message": message,
        "user": user_view(&conn, &updated, &state.config.trust)?,
    })))
}

async fn stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Value>> {
    let today = campus_now(&state.config).date_naive();
    let conn = state.db.get()?;
    let stats = stats_view(&conn, &user, today)?;
    let ride_count = queries::completed_ride_count(&conn, &user)?;

    Ok(Json(json!({
        "stats": stats,
        "badges": badges_for(ride_count),
    })))
}
