use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, TransactionBehavior};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::{deserialize_opt_id, validate_date, validate_time, DATE_FORMAT};
use crate::catalog;
use crate::db::models::{Ride, User};
use crate::db::{now_timestamp, queries};
use crate::domain::{expand_recurrence, RecurrencePattern, RequestStatus, RideStatus, VerificationStatus};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::scoring::TrustThresholds;
use crate::state::AppState;
use crate::views::{ride_view, RideView};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRide {
    #[validate(length(min = 1, max = 200, message = "Source is required"))]
    pub source: String,
    #[validate(length(min = 1, max = 200, message = "Destination is required"))]
    pub destination: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub source_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub source_lng: Option<f64>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub destination_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub destination_lng: Option<f64>,
    #[validate(custom = "validate_date")]
    pub date: String,
    #[validate(custom = "validate_time")]
    pub time: String,
    #[validate(range(min = 1, max = 10, message = "Seats must be between 1 and 10"))]
    pub available_seats: i64,
    #[validate(range(min = 0.0, message = "Cost cannot be negative"))]
    pub estimated_cost: f64,
    pub pickup_point: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
    #[validate(range(min = 1, max = 30, message = "Recurrence must be 1 to 30 days ahead"))]
    pub recurrence_days_ahead: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub event_tag: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRide {
    #[validate(length(min = 1, max = 200))]
    pub source: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub destination: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub source_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub source_lng: Option<f64>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub destination_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub destination_lng: Option<f64>,
    #[validate(custom = "validate_date")]
    pub date: Option<String>,
    #[validate(custom = "validate_time")]
    pub time: Option<String>,
    #[validate(range(min = 1, max = 10, message = "Seats must be between 1 and 10"))]
    pub available_seats: Option<i64>,
    #[validate(range(min = 0.0, message = "Cost cannot be negative"))]
    pub estimated_cost: Option<f64>,
    pub pickup_point: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub event_tag: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RideFilters {
    pub destination: Option<String>,
    pub source: Option<String>,
    pub date: Option<String>,
    pub pickup_point: Option<String>,
    pub event_tag: Option<String>,
    pub branch: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rides", post(create_ride).get(list_rides))
        .route("/rides/my-rides", get(my_rides))
        .route(
            "/rides/{id}",
            get(get_ride).put(update_ride).delete(cancel_ride),
        )
}

fn ensure_can_post(user: &User) -> AppResult<()> {
    if !user.is_driver() {
        return Err(AppError::forbidden("Only drivers can post rides"));
    }
    if user.verification_status != VerificationStatus::Verified {
        return Err(AppError::forbidden(
            "Only verified users can post rides. Please complete ID verification first.",
        ));
    }
    if user.is_suspended {
        return Err(AppError::forbidden(
            "Your account is suspended. Please contact support.",
        ));
    }
    Ok(())
}

fn ensure_pickup_point(pickup_point: Option<&str>) -> AppResult<()> {
    match pickup_point {
        Some(id) if catalog::pickup_point_name(id).is_none() => {
            Err(AppError::bad_request("Invalid pickup point"))
        }
        _ => Ok(()),
    }
}

fn ensure_event_tag(conn: &Connection, tag: Option<i64>) -> AppResult<()> {
    match tag {
        Some(tag) if !queries::event_tag_exists(conn, tag)? => {
            Err(AppError::bad_request("Invalid event tag"))
        }
        _ => Ok(()),
    }
}

/// Case-insensitive substring pattern for `LIKE ... ESCAPE '\'`, with the
/// wildcard characters in `needle` matched literally.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn load_ride(conn: &Connection, id: i64) -> AppResult<Ride> {
    queries::find_ride(conn, id)?.ok_or_else(|| AppError::not_found("Ride not found"))
}

fn render_all(
    conn: &Connection,
    rides: &[Ride],
    thresholds: &TrustThresholds,
) -> AppResult<Vec<RideView>> {
    rides
        .iter()
        .map(|ride| ride_view(conn, ride, thresholds).map_err(AppError::from))
        .collect()
}

/// The recurrence pattern for a recurring ride, or `None` for a one-off.
fn recurrence_of(body: &CreateRide) -> AppResult<Option<(RecurrencePattern, u32)>> {
    if !body.is_recurring {
        return Ok(None);
    }
    let pattern = body.recurrence_pattern.as_deref().ok_or_else(|| {
        AppError::bad_request("Recurrence pattern is required for recurring rides")
    })?;
    let days_ahead = body.recurrence_days_ahead.ok_or_else(|| {
        AppError::bad_request("Number of days ahead is required for recurring rides")
    })?;
    let pattern: RecurrencePattern = pattern
        .parse()
        .map_err(|_| AppError::bad_request("Invalid recurrence pattern"))?;
    Ok(Some((pattern, days_ahead)))
}

async fn create_ride(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateRide>,
) -> AppResult<Json<Value>> {
    body.validate()?;
    ensure_can_post(&user)?;
    ensure_pickup_point(body.pickup_point.as_deref())?;
    let recurrence = recurrence_of(&body)?;

    let mut conn = state.db.get()?;
    ensure_event_tag(&conn, body.event_tag)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let insert_ride = |date: &str, is_recurring: bool, pattern: Option<&str>, parent: Option<i64>| {
        tx.execute(
            "INSERT INTO rides (driver_id, source, destination, source_lat, source_lng,
                                destination_lat, destination_lng, date, time, available_seats,
                                estimated_cost, status, pickup_point, is_recurring,
                                recurrence_pattern, parent_ride_id, event_tag, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                user.id,
                body.source.trim(),
                body.destination.trim(),
                body.source_lat,
                body.source_lng,
                body.destination_lat,
                body.destination_lng,
                date,
                body.time,
                body.available_seats,
                body.estimated_cost,
                RideStatus::Active,
                body.pickup_point,
                is_recurring,
                pattern,
                parent,
                body.event_tag,
                now_timestamp()
            ],
        )
        .map(|_| tx.last_insert_rowid())
    };

    let ride_id = insert_ride(
        &body.date,
        recurrence.is_some(),
        recurrence.map(|(p, _)| p.id()),
        None,
    )?;

    let mut instances = Vec::new();
    if let Some((pattern, days_ahead)) = recurrence {
        let base = NaiveDate::parse_from_str(&body.date, DATE_FORMAT)
            .map_err(|_| AppError::bad_request("Invalid date"))?;
        for date in expand_recurrence(base, pattern, days_ahead) {
            let date = date.format(DATE_FORMAT).to_string();
            let duplicate: bool = tx.query_row(
                "SELECT COUNT(*) > 0 FROM rides
                 WHERE driver_id = ?1 AND source = ?2 AND destination = ?3 AND date = ?4 AND time = ?5",
                params![user.id, body.source.trim(), body.destination.trim(), date, body.time],
                |row| row.get(0),
            )?;
            if !duplicate {
                instances.push(insert_ride(&date, false, None, Some(ride_id))?);
            }
        }
    }
    tx.commit()?;

    tracing::info!(
        ride_id,
        driver_id = user.id,
        recurring_instances = instances.len(),
        "Ride created"
    );

    let ride = load_ride(&conn, ride_id)?;
    let message = if instances.is_empty() {
        "Ride created successfully".to_string()
    } else {
        format!(
            "Ride created successfully with {} recurring instances",
            instances.len()
        )
    };

    Ok(Json(json!({
        "message": message,
        "ride": ride_view(&conn, &ride, &state.config.trust)?,
        "recurring_rides_created": instances.len(),
    })))
}

async fn list_rides(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(filters): Query<RideFilters>,
) -> AppResult<Json<Value>> {
    let mut sql = String::from(
        "SELECT r.* FROM rides r JOIN users u ON u.id = r.driver_id WHERE r.status = ?",
    );
    let mut args: Vec<SqlValue> = vec![SqlValue::Text(RideStatus::Active.as_str().into())];

    let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);

    if let Some(destination) = non_empty(&filters.destination) {
        sql.push_str(" AND LOWER(r.destination) LIKE ? ESCAPE '\\'");
        args.push(SqlValue::Text(contains_pattern(&destination)));
    }
    if let Some(source) = non_empty(&filters.source) {
        sql.push_str(" AND LOWER(r.source) LIKE ? ESCAPE '\\'");
        args.push(SqlValue::Text(contains_pattern(&source)));
    }
    if let Some(date) = non_empty(&filters.date) {
        sql.push_str(" AND r.date = ?");
        args.push(SqlValue::Text(date));
    }
    if let Some(pickup_point) = non_empty(&filters.pickup_point) {
        sql.push_str(" AND r.pickup_point = ?");
        args.push(SqlValue::Text(pickup_point));
    }
    if let Some(event_tag) = non_empty(&filters.event_tag) {
        let tag: i64 = event_tag
            .parse()
            .map_err(|_| AppError::bad_request("Invalid event tag"))?;
        sql.push_str(" AND r.event_tag = ?");
        args.push(SqlValue::Integer(tag));
    }
    if let Some(branch) = non_empty(&filters.branch) {
        sql.push_str(" AND u.branch = ?");
        args.push(SqlValue::Text(branch));
    }
    sql.push_str(" ORDER BY r.date ASC, r.time ASC");

    let conn = state.db.get()?;
    let rides = {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), Ride::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    Ok(Json(json!({
        "rides": render_all(&conn, &rides, &state.config.trust)?,
    })))
}

async fn my_rides(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let rides = {
        let mut stmt = conn
            .prepare("SELECT * FROM rides WHERE driver_id = ?1 ORDER BY date DESC, time DESC")?;
        let rows = stmt.query_map(params![user.id], Ride::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    Ok(Json(json!({
        "rides": render_all(&conn, &rides, &state.config.trust)?,
    })))
}

async fn get_ride(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let ride = load_ride(&conn, id)?;
    Ok(Json(json!({
        "ride": ride_view(&conn, &ride, &state.config.trust)?,
    })))
}

async fn update_ride(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateRide>,
) -> AppResult<Json<Value>> {
    body.validate()?;
    ensure_pickup_point(body.pickup_point.as_deref())?;

    let mut conn = state.db.get()?;
    ensure_event_tag(&conn, body.event_tag)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let ride = load_ride(&tx, id)?;
    if ride.driver_id != user.id {
        return Err(AppError::forbidden("You can only edit your own rides"));
    }
    if ride.status != RideStatus::Active {
        return Err(AppError::bad_request("Only active rides can be edited"));
    }
    if let Some(seats) = body.available_seats {
        if seats < queries::occupied_seats(&tx, ride.id)? {
            return Err(AppError::bad_request(
                "Seats cannot be fewer than the riders already accepted",
            ));
        }
    }

    let mut sets: Vec<&str> = Vec::new();
    let mut args: Vec<SqlValue> = Vec::new();
    let mut set = |column: &'static str, value: SqlValue| {
        sets.push(column);
        args.push(value);
    };
    if let Some(v) = &body.source {
        set("source = ?", SqlValue::Text(v.trim().to_string()));
    }
    if let Some(v) = &body.destination {
        set("destination = ?", SqlValue::Text(v.trim().to_string()));
    }
    if let Some(v) = body.source_lat {
        set("source_lat = ?", SqlValue::Real(v));
    }
    if let Some(v) = body.source_lng {
        set("source_lng = ?", SqlValue::Real(v));
    }
    if let Some(v) = body.destination_lat {
        set("destination_lat = ?", SqlValue::Real(v));
    }
    if let Some(v) = body.destination_lng {
        set("destination_lng = ?", SqlValue::Real(v));
    }
    if let Some(v) = &body.date {
        set("date = ?", SqlValue::Text(v.clone()));
    }
    if let Some(v) = &body.time {
        set("time = ?", SqlValue::Text(v.clone()));
    }
    if let Some(v) = body.available_seats {
        set("available_seats = ?", SqlValue::Integer(v));
    }
    if let Some(v) = body.estimated_cost {
        set("estimated_cost = ?", SqlValue::Real(v));
    }
    if let Some(v) = &body.pickup_point {
        set("pickup_point = ?", SqlValue::Text(v.clone()));
    }
    if let Some(v) = body.event_tag {
        set("event_tag = ?", SqlValue::Integer(v));
    }

    if !sets.is_empty() {
        let sql = format!("UPDATE rides SET {} WHERE id = ?", sets.join(", "));
        args.push(SqlValue::Integer(id));
        tx.execute(&sql, params_from_iter(args))?;
    }
    tx.commit()?;

    let ride = load_ride(&conn, id)?;
    Ok(Json(json!({
        "message": "Ride updated",
        "ride": ride_view(&conn, &ride, &state.config.trust)?,
    })))
}

async fn cancel_ride(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let ride = load_ride(&tx, id)?;
    if ride.driver_id != user.id && !user.is_admin {
        return Err(AppError::forbidden("You can only delete your own rides"));
    }
    let next = ride
        .status
        .transition(RideStatus::Cancelled)
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    tx.execute(
        "UPDATE rides SET status = ?1 WHERE id = ?2",
        params![next, id],
    )?;
    let cascaded = tx.execute(
        "UPDATE ride_requests SET status = ?1 WHERE ride_id = ?2 AND status IN (?3, ?4)",
        params![
            RequestStatus::Cancelled,
            id,
            RequestStatus::Pending,
            RequestStatus::Accepted
        ],
    )?;
    tx.commit()?;

    tracing::info!(ride_id = id, cancelled_requests = cascaded, "Ride cancelled");

    Ok(Json(json!({ "message": "Ride cancelled successfully" })))
}
