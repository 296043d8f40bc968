//! JSON shapes returned by the API. Row ids are integers in SQLite but
//! travel as strings, and every view folds in the derived fields (trust,
//! seats, badges) that clients render.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate};
use rusqlite::Connection;
use serde::{Serialize, Serializer};

use crate::catalog;
use crate::db::models::{ChatMessage, Ride, RideRequest, SosEvent, User};
use crate::db::queries::{self, round_to};
use crate::domain::{
    estimate_ride_duration_minutes, RequestStatus, RideStatus, Role, SosStatus,
    VerificationStatus,
};
use crate::scoring::{
    classify_trust, compute_eco_impact, compute_streak, evaluate_badges, Badge, Streak,
    TrustLevel, TrustThresholds, AVG_RIDE_DISTANCE_KM,
};

const UNKNOWN: &str = "Unknown";

pub fn id_string<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(id)
}

pub fn opt_id_string<S: Serializer>(id: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
    match id {
        Some(id) => serializer.collect_str(id),
        None => serializer.serialize_none(),
    }
}

/// Badges for a completed-ride count, assuming the average trip length.
pub fn badges_for(completed_rides: i64) -> Vec<Badge> {
    let co2 = compute_eco_impact(completed_rides as f64 * AVG_RIDE_DISTANCE_KM).co2_saved_kg;
    evaluate_badges(completed_rides, co2)
}

// --- Users ---

#[derive(Debug, Serialize)]
pub struct VehicleView {
    pub vehicle_model: Option<String>,
    pub vehicle_number: Option<String>,
    pub vehicle_color: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(serialize_with = "id_string")]
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_admin: bool,
    pub verification_status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub verified_at: Option<String>,
    pub ride_count: i64,
    pub created_at: String,
    pub average_rating: Option<f64>,
    pub total_ratings: i64,
    pub rating_distribution: BTreeMap<u8, i64>,
    pub trust_level: TrustLevel,
    pub branch: Option<String>,
    pub academic_year: Option<String>,
    pub badges: Vec<Badge>,
    pub is_active: bool,
    pub is_suspended: bool,
    pub warning_count: i64,
    /// Present for drivers only.
    #[serde(flatten)]
    pub vehicle: Option<VehicleView>,
}

pub fn user_view(
    conn: &Connection,
    user: &User,
    thresholds: &TrustThresholds,
) -> rusqlite::Result<UserView> {
    let ride_count = queries::completed_ride_count(conn, user)?;
    let ratings = queries::rating_stats(conn, user.id)?;
    let trust = classify_trust(ride_count, ratings.mean_rating, thresholds);

    let vehicle = user.is_driver().then(|| VehicleView {
        vehicle_model: user.vehicle_model.clone(),
        vehicle_number: user.vehicle_number.clone(),
        vehicle_color: user.vehicle_color.clone(),
    });

    Ok(UserView {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        is_admin: user.is_admin,
        verification_status: user.verification_status,
        rejection_reason: user.rejection_reason.clone(),
        verified_at: user.verified_at.clone(),
        ride_count,
        created_at: user.created_at.clone(),
        average_rating: ratings.average_rating,
        total_ratings: ratings.total_ratings,
        rating_distribution: ratings.distribution,
        trust_level: trust.into(),
        branch: user.branch.clone(),
        academic_year: user.academic_year.clone(),
        badges: badges_for(ride_count),
        is_active: user.is_active,
        is_suspended: user.is_suspended,
        warning_count: user.warning_count,
        vehicle,
    })
}

#[derive(Debug, Serialize)]
pub struct MutualInfo {
    pub same_branch: bool,
    pub same_year: bool,
}

impl MutualInfo {
    pub fn between(viewer: &User, other: &User) -> Self {
        fn shared(a: &Option<String>, b: &Option<String>) -> bool {
            matches!((a, b), (Some(a), Some(b)) if a == b)
        }
        Self {
            same_branch: shared(&viewer.branch, &other.branch),
            same_year: shared(&viewer.academic_year, &other.academic_year),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: UserView,
    pub mutual_info: MutualInfo,
    pub branch_name: Option<&'static str>,
    pub academic_year_name: Option<&'static str>,
}

pub fn profile_view(
    conn: &Connection,
    viewer: &User,
    user: &User,
    thresholds: &TrustThresholds,
) -> rusqlite::Result<ProfileView> {
    Ok(ProfileView {
        user: user_view(conn, user, thresholds)?,
        mutual_info: MutualInfo::between(viewer, user),
        branch_name: user.branch.as_deref().and_then(catalog::branch_name),
        academic_year_name: user
            .academic_year
            .as_deref()
            .and_then(catalog::academic_year_name),
    })
}

#[derive(Debug, Serialize)]
pub struct StatsView {
    pub rides_offered: i64,
    pub rides_taken: i64,
    pub total_rides: i64,
    pub total_distance_km: f64,
    pub total_co2_saved_kg: f64,
    pub trees_equivalent: f64,
    pub money_saved: f64,
    pub streak: Streak,
}

pub fn stats_view(conn: &Connection, user: &User, today: NaiveDate) -> rusqlite::Result<StatsView> {
    let rides_offered = queries::completed_rides_as_driver(conn, user.id)?;
    let rides_taken = queries::completed_rides_as_rider(conn, user.id)?;
    let total_rides = rides_offered + rides_taken;
    let distance = total_rides as f64 * AVG_RIDE_DISTANCE_KM;
    let impact = compute_eco_impact(distance);
    let dates = queries::completed_ride_dates(conn, user.id)?;

    Ok(StatsView {
        rides_offered,
        rides_taken,
        total_rides,
        total_distance_km: round_to(distance, 1),
        total_co2_saved_kg: round_to(impact.co2_saved_kg, 2),
        trees_equivalent: round_to(impact.trees_equivalent, 2),
        money_saved: round_to(impact.money_saved, 0),
        streak: compute_streak(&dates, today),
    })
}

// --- Rides ---

#[derive(Debug, Serialize)]
pub struct RideView {
    #[serde(serialize_with = "id_string")]
    pub id: i64,
    #[serde(serialize_with = "id_string")]
    pub driver_id: i64,
    pub driver_name: String,
    pub driver_verification_status: VerificationStatus,
    pub driver_average_rating: Option<f64>,
    pub driver_total_ratings: i64,
    pub driver_trust_level: TrustLevel,
    pub driver_completed_rides: i64,
    pub source: String,
    pub destination: String,
    pub source_lat: Option<f64>,
    pub source_lng: Option<f64>,
    pub destination_lat: Option<f64>,
    pub destination_lng: Option<f64>,
    pub date: String,
    pub time: String,
    pub available_seats: i64,
    pub seats_available: i64,
    pub seats_taken: i64,
    pub estimated_cost: f64,
    pub cost_per_rider: f64,
    pub status: RideStatus,
    pub pickup_point: Option<String>,
    pub pickup_point_name: Option<&'static str>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
    #[serde(serialize_with = "opt_id_string")]
    pub parent_ride_id: Option<i64>,
    #[serde(serialize_with = "opt_id_string")]
    pub event_tag: Option<i64>,
    pub event_tag_name: Option<String>,
    pub driver_branch: Option<String>,
    pub driver_branch_name: Option<&'static str>,
    pub driver_academic_year: Option<String>,
    pub driver_academic_year_name: Option<&'static str>,
    pub created_at: String,
}

/// Each rider's share once passengers join; the driver counts as one share.
pub fn cost_per_rider(estimated_cost: f64, seats_taken: i64) -> f64 {
    if seats_taken > 0 {
        round_to(estimated_cost / (seats_taken + 1) as f64, 2)
    } else {
        round_to(estimated_cost, 2)
    }
}

pub fn ride_view(
    conn: &Connection,
    ride: &Ride,
    thresholds: &TrustThresholds,
) -> rusqlite::Result<RideView> {
    let driver = queries::find_user(conn, ride.driver_id)?;
    let driver_ratings = queries::rating_stats(conn, ride.driver_id)?;
    let driver_completed_rides = queries::completed_rides_as_driver(conn, ride.driver_id)?;
    let trust = classify_trust(
        driver_completed_rides,
        driver_ratings.mean_rating,
        thresholds,
    );
    let seats_taken = queries::seats_taken(conn, ride)?;
    let event_tag_name = match ride.event_tag {
        Some(tag) => queries::event_tag_name(conn, tag)?,
        None => None,
    };

    let driver_branch = driver.as_ref().and_then(|d| d.branch.clone());
    let driver_academic_year = driver.as_ref().and_then(|d| d.academic_year.clone());

    Ok(RideView {
        id: ride.id,
        driver_id: ride.driver_id,
        driver_name: driver
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |d| d.name.clone()),
        driver_verification_status: driver
            .as_ref()
            .map_or(VerificationStatus::Unverified, |d| d.verification_status),
        driver_average_rating: driver_ratings.average_rating,
        driver_total_ratings: driver_ratings.total_ratings,
        driver_trust_level: trust.into(),
        driver_completed_rides,
        source: ride.source.clone(),
        destination: ride.destination.clone(),
        source_lat: ride.source_lat,
        source_lng: ride.source_lng,
        destination_lat: ride.destination_lat,
        destination_lng: ride.destination_lng,
        date: ride.date.clone(),
        time: ride.time.clone(),
        available_seats: ride.available_seats,
        seats_available: ride.available_seats - seats_taken,
        seats_taken,
        estimated_cost: ride.estimated_cost,
        cost_per_rider: cost_per_rider(ride.estimated_cost, seats_taken),
        status: ride.status,
        pickup_point: ride.pickup_point.clone(),
        pickup_point_name: ride.pickup_point.as_deref().and_then(catalog::pickup_point_name),
        is_recurring: ride.is_recurring,
        recurrence_pattern: ride.recurrence_pattern.clone(),
        parent_ride_id: ride.parent_ride_id,
        event_tag: ride.event_tag,
        event_tag_name,
        driver_branch_name: driver_branch.as_deref().and_then(catalog::branch_name),
        driver_branch,
        driver_academic_year_name: driver_academic_year
            .as_deref()
            .and_then(catalog::academic_year_name),
        driver_academic_year,
        created_at: ride.created_at.clone(),
    })
}

// --- Ride requests ---

#[derive(Debug, Serialize)]
pub struct RequestView {
    #[serde(serialize_with = "id_string")]
    pub id: i64,
    #[serde(serialize_with = "id_string")]
    pub ride_id: i64,
    #[serde(serialize_with = "id_string")]
    pub rider_id: i64,
    pub rider_name: String,
    pub rider_email: String,
    pub rider_verification_status: VerificationStatus,
    pub ride_source: String,
    pub ride_destination: String,
    pub source_lat: Option<f64>,
    pub source_lng: Option<f64>,
    pub destination_lat: Option<f64>,
    pub destination_lng: Option<f64>,
    pub ride_date: String,
    pub ride_time: String,
    pub ride_estimated_cost: f64,
    pub status: RequestStatus,
    pub ride_pin: Option<String>,
    pub ride_started_at: Option<String>,
    #[serde(serialize_with = "opt_id_string")]
    pub driver_id: Option<i64>,
    pub driver_name: String,
    pub driver_verification_status: VerificationStatus,
    pub driver_vehicle_model: Option<String>,
    pub driver_vehicle_number: Option<String>,
    pub driver_vehicle_color: Option<String>,
    pub estimated_arrival: Option<String>,
    pub estimated_duration_minutes: Option<i64>,
    pub reached_safely_at: Option<String>,
    pub completed_at: Option<String>,
    pub is_urgent: bool,
    pub pickup_point: Option<String>,
    pub pickup_point_name: Option<&'static str>,
    pub created_at: String,
    /// Only filled in for the live tracking view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_active_sos: Option<bool>,
}

/// Start time plus the estimated duration, or `None` if the start time
/// cannot be parsed.
pub fn estimated_arrival(started_at: &str, duration_minutes: i64) -> Option<String> {
    let start = DateTime::parse_from_rfc3339(started_at).ok()?;
    Some((start + Duration::minutes(duration_minutes)).to_rfc3339())
}

/// The start PIN is only revealed to the rider; the driver has to ask for it
/// at pickup.
pub fn request_view(
    conn: &Connection,
    request: &RideRequest,
    viewer: &User,
) -> rusqlite::Result<RequestView> {
    let rider = queries::find_user(conn, request.rider_id)?;
    let ride = queries::find_ride(conn, request.ride_id)?;
    let driver = match &ride {
        Some(ride) => queries::find_user(conn, ride.driver_id)?,
        None => None,
    };

    let (estimated_duration_minutes, estimated_arrival) =
        match (&request.ride_started_at, &ride) {
            (Some(started), Some(ride)) => {
                let duration = estimate_ride_duration_minutes(&ride.source, &ride.destination);
                (Some(duration), estimated_arrival(started, duration))
            }
            _ => (None, None),
        };

    let pickup_point = ride.as_ref().and_then(|r| r.pickup_point.clone());

    Ok(RequestView {
        id: request.id,
        ride_id: request.ride_id,
        rider_id: request.rider_id,
        rider_name: rider
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |r| r.name.clone()),
        rider_email: rider
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |r| r.email.clone()),
        rider_verification_status: rider
            .as_ref()
            .map_or(VerificationStatus::Unverified, |r| r.verification_status),
        ride_source: ride
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |r| r.source.clone()),
        ride_destination: ride
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |r| r.destination.clone()),
        source_lat: ride.as_ref().and_then(|r| r.source_lat),
        source_lng: ride.as_ref().and_then(|r| r.source_lng),
        destination_lat: ride.as_ref().and_then(|r| r.destination_lat),
        destination_lng: ride.as_ref().and_then(|r| r.destination_lng),
        ride_date: ride
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |r| r.date.clone()),
        ride_time: ride
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |r| r.time.clone()),
        ride_estimated_cost: ride.as_ref().map_or(0.0, |r| r.estimated_cost),
        status: request.status,
        ride_pin: request
            .ride_pin
            .clone()
            .filter(|_| viewer.id == request.rider_id),
        ride_started_at: request.ride_started_at.clone(),
        driver_id: ride.as_ref().map(|r| r.driver_id),
        driver_name: driver
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |d| d.name.clone()),
        driver_verification_status: driver
            .as_ref()
            .map_or(VerificationStatus::Unverified, |d| d.verification_status),
        driver_vehicle_model: driver.as_ref().and_then(|d| d.vehicle_model.clone()),
        driver_vehicle_number: driver.as_ref().and_then(|d| d.vehicle_number.clone()),
        driver_vehicle_color: driver.as_ref().and_then(|d| d.vehicle_color.clone()),
        estimated_arrival,
        estimated_duration_minutes,
        reached_safely_at: request.reached_safely_at.clone(),
        completed_at: request.completed_at.clone(),
        is_urgent: request.is_urgent,
        pickup_point_name: pickup_point.as_deref().and_then(catalog::pickup_point_name),
        pickup_point,
        created_at: request.created_at.clone(),
        has_active_sos: None,
    })
}

// --- Chat ---

#[derive(Debug, Serialize)]
pub struct ChatMessageView {
    #[serde(serialize_with = "id_string")]
    pub id: i64,
    #[serde(serialize_with = "id_string")]
    pub ride_request_id: i64,
    #[serde(serialize_with = "id_string")]
    pub sender_id: i64,
    pub sender_name: String,
    pub sender_role: String,
    pub message: String,
    pub created_at: String,
}

pub fn chat_message_view(
    conn: &Connection,
    message: &ChatMessage,
) -> rusqlite::Result<ChatMessageView> {
    let sender = queries::find_user(conn, message.sender_id)?;
    Ok(ChatMessageView {
        id: message.id,
        ride_request_id: message.ride_request_id,
        sender_id: message.sender_id,
        sender_name: sender
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |s| s.name.clone()),
        sender_role: sender
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |s| s.role.to_string()),
        message: message.message.clone(),
        created_at: message.created_at.clone(),
    })
}

// --- SOS ---

#[derive(Debug, Serialize)]
pub struct SosView {
    #[serde(serialize_with = "id_string")]
    pub id: i64,
    #[serde(serialize_with = "id_string")]
    pub ride_request_id: i64,
    #[serde(serialize_with = "id_string")]
    pub triggered_by: i64,
    pub triggered_by_name: String,
    pub triggered_by_role: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub message: Option<String>,
    pub status: SosStatus,
    pub admin_notes: Option<String>,
    pub reviewed_at: Option<String>,
    pub resolved_at: Option<String>,
    #[serde(serialize_with = "opt_id_string")]
    pub resolved_by: Option<i64>,
    pub created_at: String,
    pub ride_source: String,
    pub ride_destination: String,
    pub ride_date: String,
    pub ride_time: String,
    pub rider_name: String,
    pub rider_email: String,
    pub driver_name: String,
    pub driver_email: String,
}

pub fn sos_view(conn: &Connection, sos: &SosEvent) -> rusqlite::Result<SosView> {
    let triggered_by = queries::find_user(conn, sos.triggered_by)?;
    let request = queries::find_request(conn, sos.ride_request_id)?;
    let (ride, rider) = match &request {
        Some(request) => (
            queries::find_ride(conn, request.ride_id)?,
            queries::find_user(conn, request.rider_id)?,
        ),
        None => (None, None),
    };
    let driver = match &ride {
        Some(ride) => queries::find_user(conn, ride.driver_id)?,
        None => None,
    };

    let text = |value: Option<&String>| value.cloned().unwrap_or_else(|| UNKNOWN.to_string());

    Ok(SosView {
        id: sos.id,
        ride_request_id: sos.ride_request_id,
        triggered_by: sos.triggered_by,
        triggered_by_name: text(triggered_by.as_ref().map(|u| &u.name)),
        triggered_by_role: triggered_by
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |u| u.role.to_string()),
        latitude: sos.latitude,
        longitude: sos.longitude,
        message: sos.message.clone(),
        status: sos.status,
        admin_notes: sos.admin_notes.clone(),
        reviewed_at: sos.reviewed_at.clone(),
        resolved_at: sos.resolved_at.clone(),
        resolved_by: sos.resolved_by,
        created_at: sos.created_at.clone(),
        ride_source: text(ride.as_ref().map(|r| &r.source)),
        ride_destination: text(ride.as_ref().map(|r| &r.destination)),
        ride_date: text(ride.as_ref().map(|r| &r.date)),
        ride_time: text(ride.as_ref().map(|r| &r.time)),
        rider_name: text(rider.as_ref().map(|u| &u.name)),
        rider_email: text(rider.as_ref().map(|u| &u.email)),
        driver_name: text(driver.as_ref().map(|u| &u.name)),
        driver_email: text(driver.as_ref().map(|u| &u.email)),
    })
}
