use serde::{Deserialize, Serialize};

/// Reliability classification shown next to a user's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLabel {
    NewUser,
    LowRating,
    Regular,
    Trusted,
}

impl TrustLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewUser => "new_user",
            Self::LowRating => "low_rating",
            Self::Regular => "regular",
            Self::Trusted => "trusted",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NewUser => "New User",
            Self::LowRating => "Needs Review",
            Self::Regular => "Regular",
            Self::Trusted => "Trusted",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::NewUser => "gray",
            Self::LowRating => "red",
            Self::Regular => "blue",
            Self::Trusted => "green",
        }
    }
}

/// Serialized form of a trust label as clients render it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrustLevel {
    pub level: TrustLabel,
    pub label: &'static str,
    pub color: &'static str,
}

impl From<TrustLabel> for TrustLevel {
    fn from(level: TrustLabel) -> Self {
        Self {
            level,
            label: level.display_name(),
            color: level.color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrustThresholds {
    /// Users with fewer completed rides than this are always `new_user`.
    pub new_user_max_rides: i64,
    /// Average ratings strictly below this are `low_rating`.
    pub low_rating_below: f64,
    pub trusted_min_rides: i64,
    pub trusted_min_rating: f64,
}

impl Default for TrustThresholds {
    fn default() -> Self {
        Self {
            new_user_max_rides: 3,
            low_rating_below: 3.0,
            trusted_min_rides: 10,
            trusted_min_rating: 4.5,
        }
    }
}

/// Classify a user from completed ride count and average rating.
///
/// A missing or non-finite average means "no ratings yet" and can never
/// produce `LowRating`. Negative ride counts are treated as zero.
pub fn classify_trust(
    ride_count: i64,
    avg_rating: Option<f64>,
    thresholds: &TrustThresholds,
) -> TrustLabel {
    let ride_count = ride_count.max(0);
    let avg_rating = avg_rating.filter(|r| r.is_finite());

    if ride_count < thresholds.new_user_max_rides {
        return TrustLabel::NewUser;
    }

    match avg_rating {
        Some(avg) if avg < thresholds.low_rating_below => TrustLabel::LowRating,
        Some(avg)
            if ride_count >= thresholds.trusted_min_rides
                && avg >= thresholds.trusted_min_rating =>
        {
            TrustLabel::Trusted
        }
        _ => TrustLabel::Regular,
    }
}
