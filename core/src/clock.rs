//! Report clock. Owns the notion of "today" used for `enviados_hoy`.
//!
//! The database hands back plain `YYYY-MM-DD` date keys; this clock decides
//! which calendar day those keys are compared against. The day boundary is
//! configurable because the database and the application server may sit in
//! different timezones.

use crate::{
    error::{StatsError, StatsResult},
    types::{DateKey, DATE_KEY_FORMAT},
};
use chrono::{Local, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBoundary {
    /// The application server's local calendar day.
    #[default]
    Local,
    Utc,
    /// An IANA zone, e.g. `Europe/Madrid`.
    Zone(Tz),
}

impl FromStr for DayBoundary {
    type Err = StatsError;

    fn from_str(s: &str) -> StatsResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "local" => Ok(DayBoundary::Local),
            "utc" | "z" => Ok(DayBoundary::Utc),
            _ => s
                .trim()
                .parse::<Tz>()
                .map(DayBoundary::Zone)
                .map_err(|_| StatsError::Config(format!("unknown timezone '{s}'"))),
        }
    }
}

impl fmt::Display for DayBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayBoundary::Local    => f.write_str("local"),
            DayBoundary::Utc      => f.write_str("utc"),
            DayBoundary::Zone(tz) => f.write_str(tz.name()),
        }
    }
}

impl Serialize for DayBoundary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayBoundary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportClock {
    boundary: DayBoundary,
    pinned:   Option<NaiveDate>,
}

impl ReportClock {
    pub fn new(boundary: DayBoundary) -> Self {
        Self { boundary, pinned: None }
    }

    /// A clock that always reports `date` as today.
    pub fn fixed(date: NaiveDate) -> Self {
        Self {
            boundary: DayBoundary::Local,
            pinned:   Some(date),
        }
    }

    pub fn boundary(&self) -> DayBoundary {
        self.boundary
    }

    pub fn today(&self) -> NaiveDate {
        if let Some(date) = self.pinned {
            return date;
        }
        match self.boundary {
            DayBoundary::Local    => Local::now().date_naive(),
            DayBoundary::Utc      => Utc::now().date_naive(),
            DayBoundary::Zone(tz) => Utc::now().with_timezone(&tz).date_naive(),
        }
    }

    pub fn today_key(&self) -> DateKey {
        date_key(self.today())
    }
}

impl Default for ReportClock {
    fn default() -> Self {
        Self::new(DayBoundary::Local)
    }
}

/// Render a date the way the SQL layer renders DATE columns.
pub fn date_key(date: NaiveDate) -> DateKey {
    date.format(DATE_KEY_FORMAT).to_string()
}
