use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::deserialize_id;
use super::requests::load_request;
use crate::db::models::{Ride, RideRequest, User};
use crate::db::{now_timestamp, queries};
use crate::domain::{RequestStatus, Role};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRating {
    #[serde(deserialize_with = "deserialize_id")]
    pub ride_request_id: i64,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i64,
    #[validate(length(max = 500, message = "Feedback must be 500 characters or less"))]
    pub feedback: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ratings", post(create_rating))
        .route("/ratings/can-rate/{request_id}", get(can_rate))
}

/// Who the caller rates on this trip: riders rate the driver and the driver
/// rates the rider. `None` if the caller was not on the trip.
fn counterpart(user: &User, request: &RideRequest, ride: &Ride) -> Option<(i64, Role)> {
    if request.rider_id == user.id {
        Some((ride.driver_id, Role::Driver))
    } else if ride.driver_id == user.id {
        Some((request.rider_id, Role::Rider))
    } else {
        None
    }
}

fn load_rated_request(conn: &rusqlite::Connection, id: i64) -> AppResult<(RideRequest, Ride)> {
    match load_request(conn, id) {
        Err(AppError::NotFound(_)) => Err(AppError::not_found("Ride request not found")),
        other => other,
    }
}

async fn create_rating(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateRating>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    let conn = state.db.get()?;
    let (request, ride) = load_rated_request(&conn, body.ride_request_id)?;
    if request.status != RequestStatus::Completed {
        return Err(AppError::bad_request("Can only rate completed rides"));
    }
    let (rated_user_id, _) = counterpart(&user, &request, &ride)
        .ok_or_else(|| AppError::forbidden("You were not part of this ride"))?;
    if queries::has_rated(&conn, request.id, user.id)? {
        return Err(AppError::bad_request("You have already rated this ride"));
    }

    conn.execute(
        "INSERT INTO ratings (ride_request_id, rater_id, rated_user_id, rating, feedback, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            request.id,
            user.id,
            rated_user_id,
            body.rating,
            body.feedback.as_deref().map(str::trim).filter(|f| !f.is_empty()),
            now_timestamp()
        ],
    )?;

    tracing::info!(
        request_id = request.id,
        rater_id = user.id,
        rated_user_id,
        rating = body.rating,
        "Rating submitted"
    );

    Ok(Json(json!({ "message": "Rating submitted successfully" })))
}

async fn can_rate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<i64>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let (request, ride) = load_rated_request(&conn, request_id)?;

    if request.status != RequestStatus::Completed {
        return Ok(Json(json!({ "can_rate": false, "reason": "Ride not completed" })));
    }
    if queries::has_rated(&conn, request.id, user.id)? {
        return Ok(Json(json!({ "can_rate": false, "reason": "Already rated" })));
    }
    let Some((rated_user_id, rated_role)) = counterpart(&user, &request, &ride) else {
        return Ok(Json(json!({ "can_rate": false, "reason": "Not part of ride" })));
    };

    let rated_user_name = queries::find_user(&conn, rated_user_id)?
        .map_or_else(|| "Unknown".to_string(), |u| u.name);

    Ok(Json(json!({
        "can_rate": true,
        "rated_user_name": rated_user_name,
        "rated_role": rated_role,
    })))
}
