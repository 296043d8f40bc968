pub mod admin;
pub mod auth;
pub mod catalog;
pub mod chat;
pub mod ratings;
pub mod reports;
pub mod requests;
pub mod rides;
pub mod sos;
pub mod users;
pub mod verification;

use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::AppState;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// The full HTTP surface, mounted under `/api`.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(rides::router())
        .merge(requests::router())
        .merge(chat::router())
        .merge(sos::router())
        .merge(ratings::router())
        .merge(verification::router())
        .merge(users::router())
        .merge(catalog::router())
        .merge(reports::router())
        .merge(admin::router());

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "CampusPool API",
        "database": "SQLite",
    }))
}

/// Current time on the campus clock. Ride dates and times are stored in
/// campus local time.
pub fn campus_now(config: &Config) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&campus_offset(config))
}

pub fn campus_offset(config: &Config) -> FixedOffset {
    FixedOffset::east_opt(config.rules.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
}

/// Departure instant of a ride from its stored local date and time.
pub fn departure_time(
    date: &str,
    time: &str,
    offset: &FixedOffset,
) -> Option<DateTime<FixedOffset>> {
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    let time = NaiveTime::parse_from_str(time, TIME_FORMAT).ok()?;
    offset
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl RawId {
    fn into_id<E: serde::de::Error>(self) -> Result<Option<i64>, E> {
        match self {
            RawId::Int(id) => Ok(Some(id)),
            RawId::Text(text) if text.trim().is_empty() => Ok(None),
            RawId::Text(text) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| E::custom(format!("invalid id: {}", text))),
        }
    }
}

/// Clients send ids back the way they received them, as strings; plain
/// integers are accepted too.
pub fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    RawId::deserialize(deserializer)?
        .into_id()?
        .ok_or_else(|| D::Error::custom("id must not be empty"))
}

/// Like [`deserialize_id`], treating `null` and `""` as absent.
pub fn deserialize_opt_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    match Option::<RawId>::deserialize(deserializer)? {
        Some(raw) => raw.into_id(),
        None => Ok(None),
    }
}

pub fn validate_date(value: &str) -> Result<(), validator::ValidationError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(|_| ())
        .map_err(|_| validator::ValidationError::new("date must be YYYY-MM-DD"))
}

pub fn validate_time(value: &str) -> Result<(), validator::ValidationError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map(|_| ())
        .map_err(|_| validator::ValidationError::new("time must be HH:MM"))
}
