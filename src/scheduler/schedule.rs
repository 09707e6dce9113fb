//! Job schedules

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// How often a cron job fires.
///
/// Stored as its textual form so records written with the plain cron
/// strings (`0 0 * * *`, `*/15 * * * *`, ...) load unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Schedule {
    Daily,
    Hourly,
    EveryMinutes(u32),
}

impl Schedule {
    /// Parse a schedule string. Anything unrecognized runs hourly.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value {
            "daily" | "0 0 * * *" => Schedule::Daily,
            "hourly" | "0 * * * *" => Schedule::Hourly,
            _ => value
                .strip_prefix("*/")
                .and_then(|rest| rest.strip_suffix(" * * * *"))
                .and_then(|minutes| minutes.parse::<u32>().ok())
                .filter(|minutes| *minutes > 0)
                .map(Schedule::EveryMinutes)
                .unwrap_or(Schedule::Hourly),
        }
    }

    pub fn period(&self) -> Duration {
        match self {
            Schedule::Daily => Duration::hours(24),
            Schedule::Hourly => Duration::hours(1),
            Schedule::EveryMinutes(minutes) => Duration::minutes(i64::from(*minutes)),
        }
    }

    /// A job that never ran is always due
    pub fn is_due(&self, last_run_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_run_at {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.period(),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Daily => write!(f, "daily"),
            Schedule::Hourly => write!(f, "hourly"),
            Schedule::EveryMinutes(minutes) => write!(f, "*/{} * * * *", minutes),
        }
    }
}

impl FromStr for Schedule {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Schedule::parse(s))
    }
}

impl From<String> for Schedule {
    fn from(value: String) -> Self {
        Schedule::parse(&value)
    }
}

impl From<Schedule> for String {
    fn from(value: Schedule) -> Self {
        value.to_string()
    }
}
