//! Display-only derivations computed from ride and user records.
//!
//! Everything here is pure: no database, no clock reads. Callers pass `now`
//! or `today` explicitly so the rules stay deterministic under test.

pub mod badges;
pub mod eco;
pub mod streak;
pub mod trust;
pub mod urgency;

pub use badges::{evaluate_badges, Badge};
pub use eco::{compute_eco_impact, EcoImpact, AVG_RIDE_DISTANCE_KM};
pub use streak::{compute_streak, Streak};
pub use trust::{classify_trust, TrustLabel, TrustLevel, TrustThresholds};
pub use urgency::is_urgent_eligible;
