use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use rusqlite::{params, Connection, TransactionBehavior};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::{campus_now, deserialize_id, departure_time};
use crate::db::models::{Ride, RideRequest, User};
use crate::db::{now_timestamp, queries};
use crate::domain::{generate_ride_pin, RequestStatus, RideStatus};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::scoring::is_urgent_eligible;
use crate::state::AppState;
use crate::views::{request_view, RequestView};

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    #[serde(deserialize_with = "deserialize_id")]
    pub ride_id: i64,
    #[serde(default)]
    pub is_urgent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct RequestAction {
    pub action: Decision,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartRide {
    #[validate(length(equal = 4, message = "PIN must be 4 digits"))]
    pub pin: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ride-requests", post(create_request).get(my_requests))
        .route("/ride-requests/driver", get(driver_requests))
        .route("/ride-requests/{id}/action", put(handle_request))
        .route("/ride-requests/{id}/start", post(start_ride))
        .route("/ride-requests/{id}/reached-safely", post(reached_safely))
        .route("/ride-requests/{id}/live", get(live_ride))
}

pub(crate) fn load_request(conn: &Connection, id: i64) -> AppResult<(RideRequest, Ride)> {
    let request =
        queries::find_request(conn, id)?.ok_or_else(|| AppError::not_found("Request not found"))?;
    let ride = queries::find_ride(conn, request.ride_id)?
        .ok_or_else(|| AppError::not_found("Ride not found"))?;
    Ok((request, ride))
}

pub(crate) fn is_participant(user: &User, request: &RideRequest, ride: &Ride) -> bool {
    request.rider_id == user.id || ride.driver_id == user.id
}

/// Load a request the caller takes part in, as rider or driver.
pub(crate) fn load_participation(
    conn: &Connection,
    id: i64,
    user: &User,
) -> AppResult<(RideRequest, Ride)> {
    let (request, ride) = load_request(conn, id)?;
    if !is_participant(user, &request, &ride) {
        return Err(AppError::forbidden("Access denied"));
    }
    Ok((request, ride))
}

fn reload(conn: &Connection, id: i64, viewer: &User) -> AppResult<RequestView> {
    let request =
        queries::find_request(conn, id)?.ok_or_else(|| AppError::not_found("Request not found"))?;
    Ok(request_view(conn, &request, viewer)?)
}

fn render_all(
    conn: &Connection,
    requests: &[RideRequest],
    viewer: &User,
) -> AppResult<Vec<RequestView>> {
    requests
        .iter()
        .map(|r| request_view(conn, r, viewer).map_err(AppError::from))
        .collect()
}

fn illegal(e: impl std::fmt::Display) -> AppError {
    AppError::bad_request(e.to_string())
}

async fn create_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateRequest>,
) -> AppResult<Json<Value>> {
    if !user.is_rider() {
        return Err(AppError::forbidden("Only riders can request rides"));
    }
    if user.is_suspended {
        return Err(AppError::forbidden(
            "Your account is suspended. Please contact support.",
        ));
    }

    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let ride = queries::find_ride(&tx, body.ride_id)?
        .ok_or_else(|| AppError::not_found("Ride not found"))?;
    if ride.status != RideStatus::Active {
        return Err(AppError::bad_request("This ride is no longer active"));
    }
    if ride.driver_id == user.id {
        return Err(AppError::bad_request("You cannot request your own ride"));
    }

    let already_requested: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM ride_requests WHERE ride_id = ?1 AND rider_id = ?2",
        params![ride.id, user.id],
        |row| row.get(0),
    )?;
    if already_requested {
        return Err(AppError::bad_request("You have already requested this ride"));
    }
    if queries::occupied_seats(&tx, ride.id)? >= ride.available_seats {
        return Err(AppError::bad_request("No seats available"));
    }

    if body.is_urgent {
        let rules = &state.config.rules;
        let now = campus_now(&state.config);
        let eligible = departure_time(&ride.date, &ride.time, now.offset())
            .is_some_and(|departure| {
                is_urgent_eligible(&departure, &now, rules.urgent_window_minutes)
            });
        if !eligible {
            return Err(AppError::bad_request(format!(
                "Urgent requests are only allowed within {} minutes of departure",
                rules.urgent_window_minutes
            )));
        }
    }

    tx.execute(
        "INSERT INTO ride_requests (ride_id, rider_id, status, is_urgent, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            ride.id,
            user.id,
            RequestStatus::Pending,
            body.is_urgent,
            now_timestamp()
        ],
    )?;
    let request_id = tx.last_insert_rowid();
    tx.commit()?;

    tracing::info!(
        request_id,
        ride_id = ride.id,
        rider_id = user.id,
        urgent = body.is_urgent,
        "Ride requested"
    );

    Ok(Json(json!({
        "message": "Ride request created",
        "request": reload(&conn, request_id, &user)?,
    })))
}

async fn my_requests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let requests = {
        let mut stmt = conn.prepare(
            "SELECT * FROM ride_requests WHERE rider_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![user.id], RideRequest::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    Ok(Json(json!({ "requests": render_all(&conn, &requests, &user)? })))
}

async fn driver_requests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Value>> {
    if !user.is_driver() {
        return Err(AppError::forbidden("Only drivers can access this endpoint"));
    }

    let conn = state.db.get()?;
    let requests = {
        let mut stmt = conn.prepare(
            "SELECT rr.* FROM ride_requests rr
             JOIN rides r ON rr.ride_id = r.id
             WHERE r.driver_id = ?1
             ORDER BY rr.created_at DESC, rr.id DESC",
        )?;
        let rows = stmt.query_map(params![user.id], RideRequest::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    Ok(Json(json!({ "requests": render_all(&conn, &requests, &user)? })))
}

async fn handle_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<RequestAction>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let (request, ride) = load_request(&tx, id)?;
    if ride.driver_id != user.id {
        return Err(AppError::forbidden(
            "Only the ride driver can handle requests",
        ));
    }
    if request.status != RequestStatus::Pending {
        return Err(AppError::bad_request(
            "This request has already been handled",
        ));
    }

    let message = match body.action {
        Decision::Accept => {
            let next = request
                .status
                .transition(RequestStatus::Accepted)
                .map_err(illegal)?;
            if queries::occupied_seats(&tx, ride.id)? >= ride.available_seats {
                return Err(AppError::bad_request("No seats available"));
            }
            tx.execute(
                "UPDATE ride_requests SET status = ?1, ride_pin = ?2 WHERE id = ?3",
                params![next, generate_ride_pin(), id],
            )?;
            "Request accepted"
        }
        Decision::Reject => {
            let next = request
                .status
                .transition(RequestStatus::Rejected)
                .map_err(illegal)?;
            tx.execute(
                "UPDATE ride_requests SET status = ?1 WHERE id = ?2",
                params![next, id],
            )?;
            "Request rejected"
        }
    };
    tx.commit()?;

    tracing::info!(request_id = id, ride_id = ride.id, action = ?body.action, "Request handled");

    Ok(Json(json!({
        "message": message,
        "request": reload(&conn, id, &user)?,
    })))
}

async fn start_ride(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<StartRide>,
) -> AppResult<Json<Value>> {
    body.validate()?;

    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let (request, ride) = load_request(&tx, id)?;
    if ride.driver_id != user.id {
        return Err(AppError::forbidden("Only the driver can start the ride"));
    }
    if !matches!(ride.status, RideStatus::Active | RideStatus::InProgress) {
        return Err(AppError::bad_request("This ride is no longer active"));
    }
    if request.status != RequestStatus::Accepted {
        return Err(AppError::bad_request(
            "This request must be accepted first",
        ));
    }
    if request.ride_pin.as_deref() != Some(body.pin.trim()) {
        return Err(AppError::bad_request("Invalid PIN"));
    }

    let next = request
        .status
        .transition(RequestStatus::Ongoing)
        .map_err(illegal)?;
    tx.execute(
        "UPDATE ride_requests SET status = ?1, ride_started_at = ?2 WHERE id = ?3",
        params![next, now_timestamp(), id],
    )?;
    // The first rider picked up puts the whole ride in progress.
    if ride.status.can_transition_to(RideStatus::InProgress) {
        tx.execute(
            "UPDATE rides SET status = ?1 WHERE id = ?2",
            params![RideStatus::InProgress, ride.id],
        )?;
    }
    tx.commit()?;

    tracing::info!(request_id = id, ride_id = ride.id, "Ride started");

    Ok(Json(json!({
        "message": "Ride started",
        "request": reload(&conn, id, &user)?,
    })))
}

async fn reached_safely(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let (request, ride) = load_request(&tx, id)?;
    if request.rider_id != user.id {
        return Err(AppError::forbidden(
            "Only the rider can mark as reached safely",
        ));
    }
    if request.status != RequestStatus::Ongoing {
        return Err(AppError::bad_request("Ride must be ongoing"));
    }

    let next = request
        .status
        .transition(RequestStatus::Completed)
        .map_err(illegal)?;
    let now = now_timestamp();
    tx.execute(
        "UPDATE ride_requests SET status = ?1, reached_safely_at = ?2, completed_at = ?2 WHERE id = ?3",
        params![next, now, id],
    )?;

    // Accepted passengers not yet picked up keep the ride open.
    let ride_completed = queries::occupied_seats(&tx, ride.id)? == 0
        && ride.status.can_transition_to(RideStatus::Completed);
    if ride_completed {
        tx.execute(
            "UPDATE rides SET status = ?1 WHERE id = ?2",
            params![RideStatus::Completed, ride.id],
        )?;
    }
    tx.commit()?;

    tracing::info!(request_id = id, ride_id = ride.id, ride_completed, "Rider reached safely");

    Ok(Json(json!({
        "message": "Ride completed safely",
        "request": reload(&conn, id, &user)?,
    })))
}

async fn live_ride(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let (request, _ride) = load_participation(&conn, id, &user)?;

    let mut view = request_view(&conn, &request, &user)?;
    view.has_active_sos = Some(queries::has_active_sos(&conn, id)?);

    Ok(Json(json!({ "ride": view })))
}
