use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
}

/// Consecutive-day ride streaks.
///
/// Duplicate dates count once. The current streak is alive if its last day
/// is `today` or yesterday; dates after `today` are ignored.
pub fn compute_streak(dates: &[NaiveDate], today: NaiveDate) -> Streak {
    let mut days: Vec<NaiveDate> = dates.iter().copied().filter(|d| *d <= today).collect();
    days.sort_unstable();
    days.dedup();

    let Some(&last) = days.last() else {
        return Streak::default();
    };

    let mut longest = 1u32;
    let mut run = 1u32;
    for pair in days.windows(2) {
        if pair[1].signed_duration_since(pair[0]).num_days() == 1 {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
    }

    let current = if today.signed_duration_since(last).num_days() <= 1 {
        run
    } else {
        0
    };

    Streak { current, longest }
}
