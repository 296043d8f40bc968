use chrono::{DateTime, TimeZone};

/// A request may be flagged urgent only while departure is still ahead and
/// no more than `window_minutes` away.
pub fn is_urgent_eligible<Tz: TimeZone>(
    departure: &DateTime<Tz>,
    now: &DateTime<Tz>,
    window_minutes: i64,
) -> bool {
    if window_minutes <= 0 {
        return false;
    }
    let until = departure.clone().signed_duration_since(now.clone());
    until.num_seconds() > 0 && until.num_seconds() <= window_minutes * 60
}
