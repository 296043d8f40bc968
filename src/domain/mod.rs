// Domain types - pure, no side effects
pub mod recurrence;
pub mod types;

pub use recurrence::{expand_recurrence, RecurrencePattern};
pub use types::{
    ReportAction, ReportCategory, ReportStatus, RequestStatus, RideStatus, Role, SosStatus,
    TransitionError, VerificationStatus,
};

use rand::Rng;

/// Four-digit PIN the rider reads out so the driver can start the ride.
pub fn generate_ride_pin() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Rough trip duration for live tracking. No routing service is consulted,
/// so longer place names stand in for longer trips.
pub fn estimate_ride_duration_minutes(source: &str, destination: &str) -> i64 {
    let base = 20;
    let distance_factor = ((source.chars().count() + destination.chars().count()) / 10) as i64;
    base + distance_factor * 5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ride_pin_is_four_digits() {
        for _ in 0..50 {
            let pin = generate_ride_pin();
            assert_eq!(pin.len(), 4);
            assert!(pin.chars().all(|c| c.is_ascii_digit()));
            assert!(!pin.starts_with('0'));
        }
    }

    #[test]
    fn duration_grows_with_place_names() {
        assert_eq!(estimate_ride_duration_minutes("", ""), 20);
        assert_eq!(estimate_ride_duration_minutes("Main Gate", "Majestic"), 25);
        assert!(
            estimate_ride_duration_minutes("Kempegowda International Airport", "RVCE")
                > estimate_ride_duration_minutes("A", "B")
        );
    }
}
