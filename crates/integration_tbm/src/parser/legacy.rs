//! Legacy infotbm REST schema
//!
//! Departures come back grouped by destination name:
//! `{"destinations": {"<name>": [schedule, ...], ...}}`. Each schedule carries
//! a countdown string instead of absolute times. The stop catalog is a flat
//! array (or a single object) of stop descriptors and there is no line
//! catalog endpoint.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{FeedSchema, Parsed, SkipReason, endpoint, from_record, non_empty};
use crate::error::FeedError;
use crate::models::{Line, RawDeparture, Stop, StopLine, VehicleType};
use crate::time::{parse_countdown, parse_iso8601};
use crate::value::extract_value;

/// infotbm `get-realtime-pass` / `stoparea-informations` schema
#[derive(Debug, Clone)]
pub struct LegacySchema {
    base_url: String,
}

/// One schedule entry; ids and flags arrive as strings or numbers
#[derive(Debug, Deserialize)]
struct RawSchedule {
    #[serde(default)]
    line_id: Option<Value>,
    #[serde(default)]
    line: Option<Value>,
    #[serde(default)]
    destination_name: Option<Value>,
    #[serde(default)]
    destination: Option<Value>,
    #[serde(default)]
    direction: Option<Value>,
    #[serde(default)]
    stop_name: Option<Value>,
    #[serde(default)]
    arrival: Option<Value>,
    #[serde(default)]
    waittime: Option<Value>,
    #[serde(default)]
    realtime: Option<Value>,
    #[serde(default)]
    line_color: Option<Value>,
    #[serde(default)]
    vehicle_type: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawStopArea {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    city: Option<Value>,
    #[serde(default)]
    lines: Option<Value>,
}

impl LegacySchema {
    /// Create a schema rooted at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn parse_schedule(group: &str, item: &Value) -> Parsed<RawDeparture> {
        let record: RawSchedule = from_record("schedule", item)?;

        let line_code = first_text(&[record.line_id.as_ref(), record.line.as_ref()]).unwrap_or_default();
        let destination = first_text(&[record.destination_name.as_ref(), record.destination.as_ref()])
            .unwrap_or_else(|| group.to_string());
        let arrival_display = text(record.arrival.as_ref());
        let realtime = flag(record.realtime.as_ref());
        let countdown = parse_countdown(&extract_value(record.waittime.as_ref()));

        let arrival = arrival_display.as_deref().and_then(parse_iso8601);
        let (scheduled, predicted) = if realtime { (None, arrival) } else { (arrival, None) };

        Ok(RawDeparture {
            line_code,
            destination,
            direction: text(record.direction.as_ref()).unwrap_or_default(),
            stop_name: text(record.stop_name.as_ref()).unwrap_or_default(),
            scheduled,
            predicted,
            countdown: Some(countdown),
            realtime: Some(realtime),
            line_color: text(record.line_color.as_ref()),
            vehicle_type: Some(VehicleType::from_upstream(&extract_value(record.vehicle_type.as_ref()))),
            arrival_display,
        })
    }

    fn parse_stop(item: &Value) -> Parsed<Stop> {
        let record: RawStopArea = from_record("stop", item)?;

        let id = extract_value(record.id.as_ref());
        if id.is_empty() {
            return Err(SkipReason::MissingField { field: "id" });
        }

        let lines = match record.lines {
            None => Vec::new(),
            Some(Value::Array(lines)) => lines.iter().filter_map(stop_line).collect(),
            Some(_) => {
                return Err(SkipReason::WrongType {
                    field: "lines",
                    expected: "an array",
                });
            },
        };

        Ok(Stop {
            id,
            name: extract_value(record.name.as_ref()),
            city: text(record.city.as_ref()),
            lines,
        })
    }
}

/// A non-empty scalar
fn text(node: Option<&Value>) -> Option<String> {
    non_empty(extract_value(node))
}

/// First non-empty scalar among `nodes`
fn first_text(nodes: &[Option<&Value>]) -> Option<String> {
    nodes.iter().find_map(|node| text(*node))
}

/// Realtime flag; accepts booleans, `1`/`0` and their string forms
fn flag(node: Option<&Value>) -> bool {
    match node {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        _ => false,
    }
}

/// A line descriptor inside a stop: `{id, name}` or a bare id
fn stop_line(node: &Value) -> Option<StopLine> {
    match node {
        Value::Object(record) => {
            let id = non_empty(extract_value(record.get("id")))?;
            let name = text(record.get("name")).unwrap_or_else(|| id.clone());
            Some(StopLine { id, name })
        },
        Value::String(_) | Value::Number(_) => {
            let id = non_empty(extract_value(Some(node)))?;
            Some(StopLine::from_ref(&id))
        },
        _ => None,
    }
}

impl FeedSchema for LegacySchema {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn departures_url(&self, stop_id: &str, line_id: Option<&str>) -> Result<Url, FeedError> {
        let mut segments = vec!["get-realtime-pass", stop_id];
        if let Some(line) = line_id {
            segments.push(line);
        }
        endpoint(&self.base_url, &segments, &[])
    }

    fn stops_url(&self) -> Result<Url, FeedError> {
        endpoint(&self.base_url, &["network", "stoparea-informations"], &[])
    }

    fn stop_url(&self, stop_id: &str) -> Result<Option<Url>, FeedError> {
        endpoint(&self.base_url, &["network", "stoparea-informations", stop_id], &[]).map(Some)
    }

    fn lines_url(&self) -> Result<Option<Url>, FeedError> {
        Ok(None)
    }

    fn parse_departures(&self, body: &Value) -> Vec<Parsed<RawDeparture>> {
        let Some(groups) = body.get("destinations").and_then(Value::as_object) else {
            return Vec::new();
        };

        groups
            .iter()
            .flat_map(|(group, schedules)| match schedules {
                Value::Array(items) => items
                    .iter()
                    .map(|item| Self::parse_schedule(group, item))
                    .collect::<Vec<_>>(),
                _ => vec![Err(SkipReason::WrongType {
                    field: "destinations",
                    expected: "a map of arrays",
                })],
            })
            .collect()
    }

    fn parse_stops(&self, body: &Value) -> Vec<Parsed<Stop>> {
        match body {
            Value::Array(items) => items.iter().map(Self::parse_stop).collect(),
            Value::Object(_) => vec![Self::parse_stop(body)],
            _ => Vec::new(),
        }
    }

    fn parse_lines(&self, _body: &Value) -> Vec<Parsed<Line>> {
        Vec::new()
    }
}
