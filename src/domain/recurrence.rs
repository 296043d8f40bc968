use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Serialize, Serializer};
use std::str::FromStr;

pub const MAX_DAYS_AHEAD: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrencePattern {
    Weekdays,
    Weekends,
    Daily,
    MonWedFri,
    TueThu,
}

impl RecurrencePattern {
    pub const ALL: [RecurrencePattern; 5] = [
        Self::Weekdays,
        Self::Weekends,
        Self::Daily,
        Self::MonWedFri,
        Self::TueThu,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Weekdays => "weekdays",
            Self::Weekends => "weekends",
            Self::Daily => "daily",
            Self::MonWedFri => "mon_wed_fri",
            Self::TueThu => "tue_thu",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Weekdays => "Weekdays",
            Self::Weekends => "Weekends",
            Self::Daily => "Daily",
            Self::MonWedFri => "Mon/Wed/Fri",
            Self::TueThu => "Tue/Thu",
        }
    }

    pub fn weekdays(&self) -> &'static [Weekday] {
        use Weekday::*;
        match self {
            Self::Weekdays => &[Mon, Tue, Wed, Thu, Fri],
            Self::Weekends => &[Sat, Sun],
            Self::Daily => &[Mon, Tue, Wed, Thu, Fri, Sat, Sun],
            Self::MonWedFri => &[Mon, Wed, Fri],
            Self::TueThu => &[Tue, Thu],
        }
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        self.weekdays().contains(&date.weekday())
    }
}

impl FromStr for RecurrencePattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.id() == s)
            .ok_or_else(|| format!("unknown recurrence pattern: {}", s))
    }
}

/// Catalog form: `{"id", "name", "days"}` with Monday as day 0.
impl Serialize for RecurrencePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let days: Vec<u32> = self
            .weekdays()
            .iter()
            .map(|d| d.num_days_from_monday())
            .collect();
        let mut s = serializer.serialize_struct("RecurrencePattern", 3)?;
        s.serialize_field("id", self.id())?;
        s.serialize_field("name", self.name())?;
        s.serialize_field("days", &days)?;
        s.end()
    }
}

/// Dates after `base` (exclusive) and up to `days_ahead` days later whose
/// weekday belongs to `pattern`.
pub fn expand_recurrence(
    base: NaiveDate,
    pattern: RecurrencePattern,
    days_ahead: u32,
) -> Vec<NaiveDate> {
    (1..=days_ahead.min(MAX_DAYS_AHEAD))
        .filter_map(|offset| base.checked_add_signed(Duration::days(i64::from(offset))))
        .filter(|date| pattern.matches(*date))
        .collect()
}
