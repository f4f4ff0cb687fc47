//! Departure feed data models
//!
//! Canonical records shared by both upstream schemas: departures, stops and
//! lines, plus the raw per-item tuple the parsers hand to the normalizer.

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{UNKNOWN_WAIT, waiting_minutes};

/// Short line name from a line reference
///
/// Compound references such as `bordeaux:Line:A:LOC` yield their third
/// segment (`A`); anything with fewer than four segments is returned as-is.
#[must_use]
pub fn line_label(line_code: &str) -> String {
    let parts: Vec<&str> = line_code.split(':').collect();
    if parts.len() >= 4 {
        parts[2].to_string()
    } else {
        line_code.to_string()
    }
}

/// How a departure's waiting time was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitingBasis {
    /// Computed from absolute instants against the evaluation time
    Instant,
    /// Taken from a countdown string sent by the upstream
    Countdown,
}

/// Vehicle type announced by the legacy feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    /// Tramway
    Tram,
    /// Bus
    Bus,
    /// River shuttle (BAT3)
    Ferry,
    /// Any other announced type
    Other(String),
}

impl VehicleType {
    /// Map the upstream string, defaulting to tram when empty
    #[must_use]
    pub fn from_upstream(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "" | "tram" | "tramway" => Self::Tram,
            "bus" | "lianes" | "corol" => Self::Bus,
            "bateau" | "boat" | "ferry" | "batcub" => Self::Ferry,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tram => write!(f, "tram"),
            Self::Bus => write!(f, "bus"),
            Self::Ferry => write!(f, "ferry"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// One upcoming departure at the monitored stop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Departure {
    /// Line reference as sent upstream
    pub line_code: String,
    /// Short line name derived from `line_code`
    pub line_label: String,
    /// Destination display name
    pub destination: String,
    /// Direction display name
    pub direction_label: String,
    /// Name of the monitored stop as reported in the call
    pub origin_stop_label: String,
    /// Aimed arrival
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<FixedOffset>>,
    /// Expected arrival
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_time: Option<DateTime<FixedOffset>>,
    /// Minutes until arrival at build time; `999` when unknown
    pub waiting_minutes: u32,
    /// Whether the departure is backed by real-time data
    pub is_live: bool,
    /// Source of `waiting_minutes`
    pub waiting_basis: WaitingBasis,
    /// Line color (legacy feed only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_color: Option<String>,
    /// Vehicle type (legacy feed only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<VehicleType>,
    /// Arrival string as displayed upstream (legacy feed only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_display: Option<String>,
}

impl Departure {
    /// Waiting time re-evaluated at `now`
    ///
    /// Instant-based departures drift as time passes, so a snapshot rendered
    /// after it was fetched must call this instead of reading
    /// `waiting_minutes`. Countdown-based departures keep their upstream value.
    #[must_use]
    pub fn waiting_minutes_at(&self, now: DateTime<Utc>) -> u32 {
        match self.waiting_basis {
            WaitingBasis::Instant => waiting_minutes(self.predicted_time, self.scheduled_time, now),
            WaitingBasis::Countdown => self.waiting_minutes,
        }
    }

    /// Whether no usable time was available
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        self.waiting_minutes == UNKNOWN_WAIT
    }

    /// The best known arrival instant
    #[must_use]
    pub fn arrival(&self) -> Option<DateTime<FixedOffset>> {
        self.predicted_time.or(self.scheduled_time)
    }
}

/// A line serving a stop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StopLine {
    /// Line identifier usable as a departure filter
    pub id: String,
    /// Display name
    pub name: String,
}

impl StopLine {
    /// Build a line entry from a bare SIRI line reference
    #[must_use]
    pub fn from_ref(line_ref: &str) -> Self {
        Self {
            id: line_ref.to_string(),
            name: line_label(line_ref),
        }
    }
}

/// A stop from the discovery catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stop {
    /// Stop identifier (`MonitoringRef` for SIRI)
    pub id: String,
    /// Display name
    pub name: String,
    /// Municipality (legacy feed only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Lines serving the stop, in upstream order
    #[serde(default)]
    pub lines: Vec<StopLine>,
}

impl Stop {
    /// Create a stop without lines
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            city: None,
            lines: Vec::new(),
        }
    }

    /// Attach the serving lines
    #[must_use]
    pub fn with_lines(mut self, lines: Vec<StopLine>) -> Self {
        self.lines = lines;
        self
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.city {
            Some(city) if !city.is_empty() => write!(f, "{} ({city})", self.name),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// A line with its destinations, used during discovery only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Line {
    /// Line reference
    pub id: String,
    /// Display name
    pub name: String,
    /// Destination names in upstream order
    pub destinations: Vec<String>,
}

/// Fields of one upstream departure before normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDeparture {
    /// Line reference
    pub line_code: String,
    /// Destination display name
    pub destination: String,
    /// Direction display name
    pub direction: String,
    /// Stop name from the call
    pub stop_name: String,
    /// Aimed time
    pub scheduled: Option<DateTime<FixedOffset>>,
    /// Expected time
    pub predicted: Option<DateTime<FixedOffset>>,
    /// Countdown in minutes, when the upstream provides one
    pub countdown: Option<u32>,
    /// Real-time flag, when the upstream provides one
    pub realtime: Option<bool>,
    /// Line color
    pub line_color: Option<String>,
    /// Vehicle type
    pub vehicle_type: Option<VehicleType>,
    /// Arrival display string
    pub arrival_display: Option<String>,
}

impl RawDeparture {
    /// Turn the raw fields into a canonical departure evaluated at `now`
    #[must_use]
    pub fn into_departure(self, now: DateTime<Utc>) -> Departure {
        let (waiting, basis) = match self.countdown {
            Some(minutes) => (minutes, WaitingBasis::Countdown),
            None => (
                waiting_minutes(self.predicted, self.scheduled, now),
                WaitingBasis::Instant,
            ),
        };
        let is_live = self.realtime.unwrap_or(self.predicted.is_some());

        Departure {
            line_label: line_label(&self.line_code),
            line_code: self.line_code,
            destination: self.destination,
            direction_label: self.direction,
            origin_stop_label: self.stop_name,
            scheduled_time: self.scheduled,
            predicted_time: self.predicted,
            waiting_minutes: waiting,
            is_live,
            waiting_basis: basis,
            line_color: self.line_color,
            vehicle_type: self.vehicle_type,
            arrival_display: self.arrival_display,
        }
    }
}
