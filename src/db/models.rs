use rusqlite::Row;
use serde::Serialize;

use crate::domain::{
    ReportCategory, ReportStatus, RequestStatus, RideStatus, Role, SosStatus, VerificationStatus,
};
use crate::views::{id_string, opt_id_string};

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub is_admin: bool,
    pub verification_status: VerificationStatus,
    pub student_id_image: Option<String>,
    pub rejection_reason: Option<String>,
    pub verified_at: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_number: Option<String>,
    pub vehicle_color: Option<String>,
    pub branch: Option<String>,
    pub academic_year: Option<String>,
    pub is_active: bool,
    pub is_suspended: bool,
    pub warning_count: i64,
    pub created_at: String,
}

impl User {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            password_hash: row.get("password")?,
            name: row.get("name")?,
            role: row.get("role")?,
            is_admin: row.get("is_admin")?,
            verification_status: row.get("verification_status")?,
            student_id_image: row.get("student_id_image")?,
            rejection_reason: row.get("rejection_reason")?,
            verified_at: row.get("verified_at")?,
            vehicle_model: row.get("vehicle_model")?,
            vehicle_number: row.get("vehicle_number")?,
            vehicle_color: row.get("vehicle_color")?,
            branch: row.get("branch")?,
            academic_year: row.get("academic_year")?,
            is_active: row.get("is_active")?,
            is_suspended: row.get("is_suspended")?,
            warning_count: row.get("warning_count")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }

    pub fn is_rider(&self) -> bool {
        self.role == Role::Rider
    }
}

#[derive(Debug, Clone)]
pub struct Ride {
    pub id: i64,
    pub driver_id: i64,
    pub source: String,
    pub destination: String,
    pub source_lat: Option<f64>,
    pub source_lng: Option<f64>,
    pub destination_lat: Option<f64>,
    pub destination_lng: Option<f64>,
    pub date: String,
    pub time: String,
    pub available_seats: i64,
    pub estimated_cost: f64,
    pub status: RideStatus,
    pub pickup_point: Option<String>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
    pub parent_ride_id: Option<i64>,
    pub event_tag: Option<i64>,
    pub created_at: String,
}

impl Ride {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            driver_id: row.get("driver_id")?,
            source: row.get("source")?,
            destination: row.get("destination")?,
            source_lat: row.get("source_lat")?,
            source_lng: row.get("source_lng")?,
            destination_lat: row.get("destination_lat")?,
            destination_lng: row.get("destination_lng")?,
            date: row.get("date")?,
            time: row.get("time")?,
            available_seats: row.get("available_seats")?,
            estimated_cost: row.get("estimated_cost")?,
            status: row.get("status")?,
            pickup_point: row.get("pickup_point")?,
            is_recurring: row.get("is_recurring")?,
            recurrence_pattern: row.get("recurrence_pattern")?,
            parent_ride_id: row.get("parent_ride_id")?,
            event_tag: row.get("event_tag")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RideRequest {
    pub id: i64,
    pub ride_id: i64,
    pub rider_id: i64,
    pub status: RequestStatus,
    pub ride_pin: Option<String>,
    pub ride_started_at: Option<String>,
    pub reached_safely_at: Option<String>,
    pub completed_at: Option<String>,
    pub is_urgent: bool,
    pub created_at: String,
}

impl RideRequest {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            ride_id: row.get("ride_id")?,
            rider_id: row.get("rider_id")?,
            status: row.get("status")?,
            ride_pin: row.get("ride_pin")?,
            ride_started_at: row.get("ride_started_at")?,
            reached_safely_at: row.get("reached_safely_at")?,
            completed_at: row.get("completed_at")?,
            is_urgent: row.get("is_urgent")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: i64,
    pub ride_request_id: i64,
    pub sender_id: i64,
    pub message: String,
    pub created_at: String,
}

impl ChatMessage {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            ride_request_id: row.get("ride_request_id")?,
            sender_id: row.get("sender_id")?,
            message: row.get("message")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SosEvent {
    pub id: i64,
    pub ride_request_id: i64,
    pub triggered_by: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub message: Option<String>,
    pub status: SosStatus,
    pub admin_notes: Option<String>,
    pub reviewed_at: Option<String>,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<i64>,
    pub created_at: String,
}

impl SosEvent {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            ride_request_id: row.get("ride_request_id")?,
            triggered_by: row.get("triggered_by")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
            message: row.get("message")?,
            status: row.get("status")?,
            admin_notes: row.get("admin_notes")?,
            reviewed_at: row.get("reviewed_at")?,
            resolved_at: row.get("resolved_at")?,
            resolved_by: row.get("resolved_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    #[serde(serialize_with = "id_string")]
    pub id: i64,
    #[serde(serialize_with = "id_string")]
    pub reporter_id: i64,
    #[serde(serialize_with = "opt_id_string")]
    pub reported_user_id: Option<i64>,
    #[serde(serialize_with = "opt_id_string")]
    pub ride_id: Option<i64>,
    pub category: ReportCategory,
    pub description: String,
    pub status: ReportStatus,
    pub admin_action: Option<String>,
    pub admin_notes: Option<String>,
    pub handled_at: Option<String>,
    #[serde(serialize_with = "opt_id_string")]
    pub handled_by: Option<i64>,
    pub created_at: String,
}

impl Report {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            reporter_id: row.get("reporter_id")?,
            reported_user_id: row.get("reported_user_id")?,
            ride_id: row.get("ride_id")?,
            category: row.get("category")?,
            description: row.get("description")?,
            status: row.get("status")?,
            admin_action: row.get("admin_action")?,
            admin_notes: row.get("admin_notes")?,
            handled_at: row.get("handled_at")?,
            handled_by: row.get("handled_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventTag {
    #[serde(serialize_with = "id_string")]
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

impl EventTag {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    #[serde(serialize_with = "id_string")]
    pub id: i64,
    #[serde(serialize_with = "id_string")]
    pub admin_id: i64,
    pub admin_name: String,
    pub action_type: String,
    pub target_type: String,
    pub target_id: String,
    pub details: serde_json::Value,
    pub timestamp: String,
}

impl AuditLog {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let details: Option<String> = row.get("details")?;
        Ok(Self {
            id: row.get("id")?,
            admin_id: row.get("admin_id")?,
            admin_name: row.get("admin_name")?,
            action_type: row.get("action_type")?,
            target_type: row.get("target_type")?,
            target_id: row.get("target_id")?,
            details: details
                .and_then(|d| serde_json::from_str(&d).ok())
                .unwrap_or(serde_json::Value::Null),
            timestamp: row.get("timestamp")?,
        })
    }
}
