use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Ride, RideRequest, SosEvent, User};
use super::now_timestamp;
use crate::domain::{RequestStatus, RideStatus};

pub fn find_user(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], User::from_row)
        .optional()
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT * FROM users WHERE email = ?1",
        params![email],
        User::from_row,
    )
    .optional()
}

pub fn find_ride(conn: &Connection, id: i64) -> rusqlite::Result<Option<Ride>> {
    conn.query_row("SELECT * FROM rides WHERE id = ?1", params![id], Ride::from_row)
        .optional()
}

pub fn find_request(conn: &Connection, id: i64) -> rusqlite::Result<Option<RideRequest>> {
    conn.query_row(
        "SELECT * FROM ride_requests WHERE id = ?1",
        params![id],
        RideRequest::from_row,
    )
    .optional()
}

pub fn find_sos(conn: &Connection, id: i64) -> rusqlite::Result<Option<SosEvent>> {
    conn.query_row(
        "SELECT * FROM sos_events WHERE id = ?1",
        params![id],
        SosEvent::from_row,
    )
    .optional()
}

/// Requests currently holding a seat on the ride (accepted or ongoing).
pub fn occupied_seats(conn: &Connection, ride_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM ride_requests WHERE ride_id = ?1 AND status IN (?2, ?3)",
        params![ride_id, RequestStatus::Accepted, RequestStatus::Ongoing],
        |row| row.get(0),
    )
}

/// Seats shown as taken on a ride card. Once a ride is completed its
/// finished passengers still count.
pub fn seats_taken(conn: &Connection, ride: &Ride) -> rusqlite::Result<i64> {
    if ride.status != RideStatus::Completed {
        return occupied_seats(conn, ride.id);
    }
    conn.query_row(
        "SELECT COUNT(*) FROM ride_requests WHERE ride_id = ?1 AND status IN (?2, ?3, ?4)",
        params![
            ride.id,
            RequestStatus::Accepted,
            RequestStatus::Ongoing,
            RequestStatus::Completed
        ],
        |row| row.get(0),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingStats {
    /// Rounded to two places for display.
    pub average_rating: Option<f64>,
    /// Unrounded mean, for threshold checks.
    pub mean_rating: Option<f64>,
    pub total_ratings: i64,
    /// Count of ratings per star value, 1 through 5.
    pub distribution: BTreeMap<u8, i64>,
}

pub fn rating_stats(conn: &Connection, user_id: i64) -> rusqlite::Result<RatingStats> {
    let mut distribution: BTreeMap<u8, i64> = (1..=5).map(|star| (star, 0)).collect();

    let mut stmt = conn.prepare(
        "SELECT rating, COUNT(*) FROM ratings WHERE rated_user_id = ?1 GROUP BY rating",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut total = 0;
    let mut sum = 0;
    for row in rows {
        let (star, count) = row?;
        if let Ok(star) = u8::try_from(star) {
            distribution.insert(star, count);
        }
        total += count;
        sum += star * count;
    }

    let mean_rating = (total > 0).then(|| sum as f64 / total as f64);

    Ok(RatingStats {
        average_rating: mean_rating.map(|mean| round_to(mean, 2)),
        mean_rating,
        total_ratings: total,
        distribution,
    })
}

pub fn completed_rides_as_driver(conn: &Connection, user_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM rides WHERE driver_id = ?1 AND status = ?2",
        params![user_id, RideStatus::Completed],
        |row| row.get(0),
    )
}

pub fn completed_rides_as_rider(conn: &Connection, user_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM ride_requests WHERE rider_id = ?1 AND status = ?2",
        params![user_id, RequestStatus::Completed],
        |row| row.get(0),
    )
}

/// Completed rides in the user's current role.
pub fn completed_ride_count(conn: &Connection, user: &User) -> rusqlite::Result<i64> {
    if user.is_driver() {
        completed_rides_as_driver(conn, user.id)
    } else {
        completed_rides_as_rider(conn, user.id)
    }
}

/// Dates of every ride the user completed, as driver or as rider.
pub fn completed_ride_dates(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT date FROM rides WHERE driver_id = ?1 AND status = ?2
         UNION ALL
         SELECT r.date FROM ride_requests rr JOIN rides r ON r.id = rr.ride_id
         WHERE rr.rider_id = ?1 AND rr.status = ?3",
    )?;
    let dates = stmt
        .query_map(
            params![user_id, RideStatus::Completed, RequestStatus::Completed],
            |row| row.get::<_, String>(0),
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(dates
        .iter()
        .filter_map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .collect())
}

pub fn has_active_sos(conn: &Connection, request_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sos_events WHERE ride_request_id = ?1 AND status = 'active'",
        params![request_id],
        |row| row.get(0),
    )
}

pub fn event_tag_name(conn: &Connection, tag_id: i64) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM event_tags WHERE id = ?1",
        params![tag_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn event_tag_exists(conn: &Connection, tag_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM event_tags WHERE id = ?1 AND is_active = 1",
        params![tag_id],
        |row| row.get(0),
    )
}

pub fn has_rated(conn: &Connection, request_id: i64, rater_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM ratings WHERE ride_request_id = ?1 AND rater_id = ?2",
        params![request_id, rater_id],
        |row| row.get(0),
    )
}

/// Record an admin action. `details` is stored as JSON text.
pub fn log_admin_action(
    conn: &Connection,
    admin: &User,
    action_type: &str,
    target_type: &str,
    target_id: i64,
    details: &serde_json::Value,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO audit_logs (admin_id, admin_name, action_type, target_type, target_id, details, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            admin.id,
            admin.name,
            action_type,
            target_type,
            target_id.to_string(),
            details.to_string(),
            now_timestamp()
        ],
    )?;
    tracing::info!(
        admin_id = admin.id,
        action_type,
        target_type,
        target_id,
        "Admin action recorded"
    );
    Ok(())
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
