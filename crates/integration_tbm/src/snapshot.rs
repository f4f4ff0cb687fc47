//! Departure normalization and poll snapshots
//!
//! [`normalize`] is the single place where raw parser output becomes the
//! ordered, grouped view the host renders. Both backends go through it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::config::StopSelection;
use crate::models::{Departure, RawDeparture};

/// Key of a `(line_label, destination)` group
///
/// Displayed and serialized as `"{line_label}_{destination}"`. Groups are
/// keyed on both parts, so labels containing `_` never share a group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    /// Short line label
    pub line_label: String,
    /// Destination name
    pub destination: String,
}

impl GroupKey {
    /// Key of the group a departure belongs to
    #[must_use]
    pub fn of(dep: &Departure) -> Self {
        Self::new(&dep.line_label, &dep.destination)
    }

    #[must_use]
    pub fn new(line_label: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            line_label: line_label.into(),
            destination: destination.into(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.line_label, self.destination)
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Convert raw records to departures sorted by waiting time
///
/// The sort is stable: departures with equal waiting times keep their
/// upstream order.
#[must_use]
pub fn sort_departures(raw: Vec<RawDeparture>, now: DateTime<Utc>) -> Vec<Departure> {
    let mut departures: Vec<Departure> = raw.into_iter().map(|item| item.into_departure(now)).collect();
    departures.sort_by_key(|dep| dep.waiting_minutes);
    departures
}

/// Result of one successful poll; rebuilt from scratch every time
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Monitored stop id
    pub stop_id: String,
    /// Monitored stop display name
    pub stop_name: String,
    /// Line filter in effect, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_id: Option<String>,
    /// Evaluation time of every `waiting_minutes` in this snapshot
    pub fetched_at: DateTime<Utc>,
    /// All departures, ascending by waiting time
    pub departures: Vec<Departure>,
    /// Departures per `(line_label, destination)`, in the same relative order
    pub grouped: BTreeMap<GroupKey, Vec<Departure>>,
}

impl Snapshot {
    /// Build a snapshot from already sorted departures
    #[must_use]
    pub fn from_sorted(selection: &StopSelection, departures: Vec<Departure>, fetched_at: DateTime<Utc>) -> Self {
        let mut grouped: BTreeMap<GroupKey, Vec<Departure>> = BTreeMap::new();
        for dep in &departures {
            grouped.entry(GroupKey::of(dep)).or_default().push(dep.clone());
        }

        Self {
            stop_id: selection.stop_id.clone(),
            stop_name: selection.display_name().to_string(),
            line_id: selection.line_id.clone(),
            fetched_at,
            departures,
            grouped,
        }
    }

    /// The soonest departure
    #[must_use]
    pub fn next_departure(&self) -> Option<&Departure> {
        self.departures.first()
    }

    /// Departures of one line towards one destination
    #[must_use]
    pub fn group(&self, line_label: &str, destination: &str) -> &[Departure] {
        self.grouped
            .get(&GroupKey::new(line_label, destination))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Group keys in sorted order, in their `line_destination` form
    pub fn group_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.grouped.keys().map(ToString::to_string)
    }

    /// Whether the poll returned no departures
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.departures.is_empty()
    }
}

/// Turn raw parser output into a snapshot evaluated at `now`
#[must_use]
pub fn normalize(selection: &StopSelection, raw: Vec<RawDeparture>, now: DateTime<Utc>) -> Snapshot {
    Snapshot::from_sorted(selection, sort_departures(raw, now), now)
}
