use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: String,
    pub to: String,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot move from {} to {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

/// Declares a status enum stored as lowercase text, with rusqlite and
/// serde conversions.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_enum!(Role {
    Rider => "rider",
    Driver => "driver",
    Admin => "admin",
});

text_enum!(RideStatus {
    Active => "active",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

text_enum!(RequestStatus {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
    Ongoing => "ongoing",
    Completed => "completed",
    Cancelled => "cancelled",
});

text_enum!(VerificationStatus {
    Unverified => "unverified",
    Pending => "pending",
    Verified => "verified",
    Rejected => "rejected",
});

text_enum!(SosStatus {
    Active => "active",
    Reviewing => "reviewing",
    Resolved => "resolved",
});

text_enum!(ReportStatus {
    Pending => "pending",
    Reviewed => "reviewed",
    Dismissed => "dismissed",
});

text_enum!(ReportCategory {
    Safety => "safety",
    Behavior => "behavior",
    Misuse => "misuse",
    Other => "other",
});

text_enum!(ReportAction {
    Warn => "warn",
    Suspend => "suspend",
    Disable => "disable",
    Dismiss => "dismiss",
});

impl ReportAction {
    /// Dismissals close a report without touching the reported user.
    pub fn resulting_status(self) -> ReportStatus {
        match self {
            ReportAction::Dismiss => ReportStatus::Dismissed,
            _ => ReportStatus::Reviewed,
        }
    }
}

impl RideStatus {
    /// Rides only move forward: active -> in_progress -> completed, and
    /// anything not yet finished may be cancelled.
    pub fn can_transition_to(self, next: RideStatus) -> bool {
        use RideStatus::*;
        matches!(
            (self, next),
            (Active, InProgress)
                | (InProgress, Completed)
                | (Active, Cancelled)
                | (InProgress, Cancelled)
        )
    }

    pub fn transition(self, next: RideStatus) -> Result<RideStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl RequestStatus {
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Accepted, Ongoing)
                | (Accepted, Cancelled)
                | (Ongoing, Completed)
        )
    }

    pub fn transition(self, next: RequestStatus) -> Result<RequestStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Statuses that hold a seat on the ride.
    pub fn occupies_seat(self) -> bool {
        matches!(self, RequestStatus::Accepted | RequestStatus::Ongoing)
    }

    /// Rider and driver may chat only while the trip is arranged or underway.
    pub fn chat_enabled(self) -> bool {
        self.occupies_seat()
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Rejected | RequestStatus::Completed | RequestStatus::Cancelled
        )
    }
}
