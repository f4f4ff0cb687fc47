//! SIRI-Lite schema (Mecatran)
//!
//! Endpoints live under `{base}/siri/2.0/{network}/` and every request carries
//! the `AccountKey` query parameter.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{FeedSchema, Parsed, SkipReason, array_at, endpoint, from_record};
use crate::error::FeedError;
use crate::models::{Line, RawDeparture, Stop, StopLine};
use crate::time::parse_timestamp;
use crate::value::{extract_first, extract_value};

/// SIRI StopMonitoring / discovery schema
#[derive(Debug, Clone)]
pub struct SiriSchema {
    base_url: String,
    network: String,
    account_key: String,
}

// Scalars stay `Value` nodes: SIRI sends them bare, wrapped in `{"value": ..}`
// or as sequences, and `extract_value`/`extract_first` flatten all three.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawVisit {
    monitored_vehicle_journey: RawJourney,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawJourney {
    #[serde(default)]
    line_ref: Option<Value>,
    #[serde(default)]
    destination_name: Option<Value>,
    #[serde(default)]
    direction_name: Option<Value>,
    monitored_call: RawCall,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCall {
    #[serde(default)]
    stop_point_name: Option<Value>,
    #[serde(default)]
    aimed_arrival_time: Option<Value>,
    #[serde(default)]
    expected_arrival_time: Option<Value>,
    #[serde(default)]
    aimed_departure_time: Option<Value>,
    #[serde(default)]
    expected_departure_time: Option<Value>,
}

impl RawCall {
    /// Aimed and expected times of the call
    ///
    /// Arrival times are preferred; a call with neither arrival time (first
    /// stop of a journey) falls back to its departure times.
    fn times(&self) -> (Option<DateTime<FixedOffset>>, Option<DateTime<FixedOffset>>) {
        let aimed = parse_timestamp(self.aimed_arrival_time.as_ref());
        let expected = parse_timestamp(self.expected_arrival_time.as_ref());
        if aimed.is_some() || expected.is_some() {
            return (aimed, expected);
        }
        (
            parse_timestamp(self.aimed_departure_time.as_ref()),
            parse_timestamp(self.expected_departure_time.as_ref()),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStopPoint {
    #[serde(default)]
    stop_point_ref: Option<Value>,
    #[serde(default)]
    stop_name: Option<Value>,
    /// Either `{ "LineRef": [...] }` or the sequence itself
    #[serde(default)]
    lines: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawLineRef {
    #[serde(default)]
    line_ref: Option<Value>,
    #[serde(default)]
    line_name: Option<Value>,
    /// Either `{ "Destination": [...] }` or the sequence itself
    #[serde(default)]
    destinations: Option<Value>,
}

/// The items of a node that is either a sequence or an object wrapping one
/// under `key`
fn sequence<'a>(node: Option<&'a Value>, key: &str) -> &'a [Value] {
    match node {
        Some(Value::Array(items)) => items.as_slice(),
        Some(wrapper) => array_at(wrapper, &[key]),
        None => &[],
    }
}

impl SiriSchema {
    /// Create a schema for one SIRI dataset
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        network: impl Into<String>,
        account_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            network: network.into(),
            account_key: account_key.into(),
        }
    }

    fn url(&self, resource: &str, extra: &[(&str, &str)]) -> Result<Url, FeedError> {
        let mut query = vec![("AccountKey", self.account_key.as_str())];
        query.extend_from_slice(extra);
        endpoint(
            &self.base_url,
            &["siri", "2.0", self.network.as_str(), resource],
            &query,
        )
    }

    fn parse_visit(item: &Value) -> Parsed<RawDeparture> {
        let visit: RawVisit = from_record("MonitoredStopVisit", item)?;
        let journey = visit.monitored_vehicle_journey;
        let call = &journey.monitored_call;
        let (scheduled, predicted) = call.times();

        Ok(RawDeparture {
            line_code: extract_value(journey.line_ref.as_ref()),
            destination: extract_first(journey.destination_name.as_ref()),
            direction: extract_first(journey.direction_name.as_ref()),
            stop_name: extract_first(call.stop_point_name.as_ref()),
            scheduled,
            predicted,
            ..RawDeparture::default()
        })
    }

    fn parse_stop_point(item: &Value) -> Parsed<Stop> {
        let record: RawStopPoint = from_record("AnnotatedStopPointRef", item)?;

        let id = extract_value(record.stop_point_ref.as_ref());
        if id.is_empty() {
            return Err(SkipReason::MissingField {
                field: "StopPointRef",
            });
        }

        let lines = sequence(record.lines.as_ref(), "LineRef")
            .iter()
            .map(|node| extract_value(Some(node)))
            .filter(|line_ref| !line_ref.is_empty())
            .map(|line_ref| StopLine::from_ref(&line_ref))
            .collect();

        Ok(Stop::new(id, extract_first(record.stop_name.as_ref())).with_lines(lines))
    }

    fn parse_line(item: &Value) -> Parsed<Line> {
        let record: RawLineRef = from_record("AnnotatedLineRef", item)?;

        let id = extract_value(record.line_ref.as_ref());
        if id.is_empty() {
            return Err(SkipReason::MissingField { field: "LineRef" });
        }

        let destinations = sequence(record.destinations.as_ref(), "Destination")
            .iter()
            .map(|dest| {
                let name = extract_first(dest.get("DestinationName"));
                if name.is_empty() {
                    extract_first(dest.get("PlaceName"))
                } else {
                    name
                }
            })
            .filter(|name| !name.is_empty())
            .collect();

        Ok(Line {
            id,
            name: extract_first(record.line_name.as_ref()),
            destinations,
        })
    }
}

impl FeedSchema for SiriSchema {
    fn name(&self) -> &'static str {
        "siri"
    }

    fn departures_url(&self, stop_id: &str, line_id: Option<&str>) -> Result<Url, FeedError> {
        let mut params = vec![("MonitoringRef", stop_id)];
        if let Some(line) = line_id {
            params.push(("LineRef", line));
        }
        self.url("stop-monitoring.json", &params)
    }

    fn stops_url(&self) -> Result<Url, FeedError> {
        self.url("stoppoints-discovery.json", &[])
    }

    fn stop_url(&self, _stop_id: &str) -> Result<Option<Url>, FeedError> {
        Ok(None)
    }

    fn lines_url(&self) -> Result<Option<Url>, FeedError> {
        self.url("lines-discovery.json", &[]).map(Some)
    }

    fn parse_departures(&self, body: &Value) -> Vec<Parsed<RawDeparture>> {
        array_at(body, &["Siri", "ServiceDelivery", "StopMonitoringDelivery"])
            .iter()
            .flat_map(|delivery| array_at(delivery, &["MonitoredStopVisit"]))
            .map(Self::parse_visit)
            .collect()
    }

    fn parse_stops(&self, body: &Value) -> Vec<Parsed<Stop>> {
        array_at(body, &["Siri", "StopPointsDelivery", "AnnotatedStopPointRef"])
            .iter()
            .map(Self::parse_stop_point)
            .collect()
    }

    fn parse_lines(&self, body: &Value) -> Vec<Parsed<Line>> {
        array_at(body, &["Siri", "LinesDelivery", "AnnotatedLineRef"])
            .iter()
            .map(Self::parse_line)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::parser::collect_parsed;
    use crate::time::parse_iso8601;

    fn schema() -> SiriSchema {
        SiriSchema::new("https://bdx.mecatran.com/utw/ws", "bordeaux", "KEY")
    }

    fn visit(line: &str, destination: &str, expected: Option<&str>) -> Value {
        let mut call = json!({
            "StopPointName": [{ "value": "Quinconces" }],
            "AimedArrivalTime": "2025-11-25T14:03:00Z"
        });
        if let Some(expected) = expected {
            call["ExpectedArrivalTime"] = json!(expected);
        }
        json!({
            "MonitoredVehicleJourney": {
                "LineRef": { "value": line },
                "DirectionName": [{ "value": "Aller" }],
                "DestinationName": [{ "value": destination }],
                "MonitoredCall": call
            }
        })
    }

    fn delivery(visits: Vec<Value>) -> Value {
        json!({
            "Siri": {
                "ServiceDelivery": {
                    "StopMonitoringDelivery": [{ "MonitoredStopVisit": visits }]
                }
            }
        })
    }

    #[test]
    fn test_departures_url() {
        let url = schema().departures_url("bordeaux:StopPoint:BP:3687:LOC", Some("bordeaux:Line:A:LOC")).unwrap();
        assert_eq!(url.path(), "/utw/ws/siri/2.0/bordeaux/stop-monitoring.json");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("AccountKey".to_string(), "KEY".to_string()),
                ("MonitoringRef".to_string(), "bordeaux:StopPoint:BP:3687:LOC".to_string()),
                ("LineRef".to_string(), "bordeaux:Line:A:LOC".to_string()),
            ]
        );
    }

    #[test]
    fn test_discovery_urls() {
        let schema = schema();
        assert!(schema.stops_url().unwrap().path().ends_with("/stoppoints-discovery.json"));
        assert!(schema.lines_url().unwrap().unwrap().path().ends_with("/lines-discovery.json"));
        assert!(schema.stop_url("x").unwrap().is_none());
    }

    #[test]
    fn test_parse_well_formed_visit() {
        let doc = delivery(vec![visit("bordeaux:Line:A:LOC", "La Gardette", Some("2025-11-25T14:04:30Z"))]);
        let parsed = collect_parsed("departure", schema().parse_departures(&doc));
        assert_eq!(parsed.len(), 1);

        let dep = &parsed[0];
        assert_eq!(dep.line_code, "bordeaux:Line:A:LOC");
        assert_eq!(dep.destination, "La Gardette");
        assert_eq!(dep.direction, "Aller");
        assert_eq!(dep.stop_name, "Quinconces");
        assert_eq!(dep.scheduled, parse_iso8601("2025-11-25T14:03:00Z"));
        assert_eq!(dep.predicted, parse_iso8601("2025-11-25T14:04:30Z"));
        assert!(dep.countdown.is_none());
    }

    #[test]
    fn test_visit_missing_journey_is_skipped() {
        let doc = delivery(vec![
            json!({ "RecordedAtTime": "2025-11-25T14:00:00Z" }),
            visit("bordeaux:Line:B:LOC", "Pessac Centre", None),
        ]);
        let results = schema().parse_departures(&doc);
        assert_eq!(results.len(), 2);
        assert!(matches!(
            &results[0],
            Err(SkipReason::Malformed { what: "MonitoredStopVisit", detail })
                if detail.contains("missing field `MonitoredVehicleJourney`")
        ));
        assert_eq!(collect_parsed("departure", results).len(), 1);
    }

    #[test]
    fn test_visit_with_wrong_types_is_skipped() {
        let doc = delivery(vec![
            json!("not a visit"),
            json!({ "MonitoredVehicleJourney": { "MonitoredCall": [] } }),
            json!({ "MonitoredVehicleJourney": { "LineRef": "X" } }),
        ]);
        let results = schema().parse_departures(&doc);
        assert!(results.iter().all(Result::is_err));
        assert_eq!(
            results[0],
            Err(SkipReason::NotAnObject {
                what: "MonitoredStopVisit"
            })
        );
        assert!(matches!(results[1], Err(SkipReason::Malformed { .. })));
        assert!(matches!(
            &results[2],
            Err(SkipReason::Malformed { detail, .. }) if detail.contains("MonitoredCall")
        ));
    }

    #[test]
    fn test_missing_names_default_to_empty() {
        let doc = delivery(vec![json!({
            "MonitoredVehicleJourney": {
                "LineRef": "A",
                "DestinationName": [],
                "MonitoredCall": {}
            }
        })]);
        let parsed = collect_parsed("departure", schema().parse_departures(&doc));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].destination, "");
        assert_eq!(parsed[0].direction, "");
        assert_eq!(parsed[0].stop_name, "");
        assert!(parsed[0].scheduled.is_none());
        assert!(parsed[0].predicted.is_none());
    }

    #[test]
    fn test_null_journey_is_skipped() {
        let doc = delivery(vec![
            json!({ "MonitoredVehicleJourney": null }),
            visit("bordeaux:Line:A:LOC", "La Gardette", None),
        ]);
        let results = schema().parse_departures(&doc);
        assert!(matches!(results[0], Err(SkipReason::Malformed { .. })));
        assert_eq!(collect_parsed("departure", results)[0].destination, "La Gardette");
    }

    #[test]
    fn test_departure_times_fallback() {
        let doc = delivery(vec![json!({
            "MonitoredVehicleJourney": {
                "LineRef": "A",
                "MonitoredCall": {
                    "AimedDepartureTime": "2025-11-25T14:10:00Z",
                    "ExpectedDepartureTime": "2025-11-25T14:11:00Z"
                }
            }
        })]);
        let parsed = collect_parsed("departure", schema().parse_departures(&doc));
        assert_eq!(parsed[0].scheduled, parse_iso8601("2025-11-25T14:10:00Z"));
        assert_eq!(parsed[0].predicted, parse_iso8601("2025-11-25T14:11:00Z"));
    }

    #[test]
    fn test_malformed_timestamp_is_absent() {
        let doc = delivery(vec![json!({
            "MonitoredVehicleJourney": {
                "LineRef": "A",
                "MonitoredCall": { "AimedArrivalTime": "soon", "ExpectedArrivalTime": 42 }
            }
        })]);
        let parsed = collect_parsed("departure", schema().parse_departures(&doc));
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].scheduled.is_none());
        assert!(parsed[0].predicted.is_none());
    }

    #[test]
    fn test_multiple_deliveries() {
        let doc = json!({
            "Siri": { "ServiceDelivery": { "StopMonitoringDelivery": [
                { "MonitoredStopVisit": [visit("A", "X", None)] },
                { "MonitoredStopVisit": [visit("B", "Y", None), visit("C", "Z", None)] },
                { "ResponseTimestamp": "2025-11-25T14:00:00Z" }
            ] } }
        });
        assert_eq!(schema().parse_departures(&doc).len(), 3);
    }

    #[test]
    fn test_empty_or_foreign_documents() {
        let schema = schema();
        assert!(schema.parse_departures(&json!({})).is_empty());
        assert!(schema.parse_departures(&json!({ "Siri": {} })).is_empty());
        assert!(schema.parse_departures(&Value::Null).is_empty());
        assert!(schema.parse_stops(&json!({ "Siri": { "StopPointsDelivery": {} } })).is_empty());
        assert!(schema.parse_lines(&json!({ "Siri": null })).is_empty());
    }

    #[test]
    fn test_parse_stop_points() {
        let doc = json!({
            "Siri": { "StopPointsDelivery": { "AnnotatedStopPointRef": [
                {
                    "StopPointRef": { "value": "bordeaux:StopPoint:BP:3687:LOC" },
                    "StopName": { "value": "Place des Quinconces" },
                    "Lines": { "LineRef": [
                        { "value": "bordeaux:Line:B:LOC" },
                        { "value": "" },
                        { "value": "bordeaux:Line:C:LOC" }
                    ] }
                },
                {
                    "StopPointRef": { "value": "bordeaux:StopPoint:BP:1234:LOC" },
                    "StopName": { "value": "Stalingrad" },
                    "Lines": [{ "value": "bordeaux:Line:A:LOC" }]
                },
                { "StopName": { "value": "No id" } },
                { "StopPointRef": "bordeaux:StopPoint:BP:9:LOC", "StopName": "Bare" }
            ] } }
        });
        let stops = collect_parsed("stop", schema().parse_stops(&doc));
        assert_eq!(stops.len(), 3);

        assert_eq!(stops[0].name, "Place des Quinconces");
        let labels: Vec<&str> = stops[0].lines.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(labels, vec!["B", "C"]);

        assert_eq!(stops[1].lines[0].id, "bordeaux:Line:A:LOC");
        assert!(stops[2].lines.is_empty());
        assert_eq!(stops[2].name, "Bare");
    }

    #[test]
    fn test_parse_lines() {
        let doc = json!({
            "Siri": { "LinesDelivery": { "AnnotatedLineRef": [
                {
                    "LineRef": { "value": "bordeaux:Line:A:LOC" },
                    "LineName": [{ "value": "Tram A" }],
                    "Destinations": [
                        { "PlaceName": [{ "value": "La Gardette" }] },
                        { "PlaceName": [{ "value": "Le Haillan" }] }
                    ]
                },
                {
                    "LineRef": { "value": "bordeaux:Line:B:LOC" },
                    "LineName": { "value": "Tram B" },
                    "Destinations": { "Destination": [
                        { "DestinationName": { "value": "Pessac Centre" } },
                        { "DestinationName": { "value": "" } }
                    ] }
                },
                { "LineName": { "value": "orphan" } }
            ] } }
        });
        let results = schema().parse_lines(&doc);
        assert_eq!(results.len(), 3);
        let lines = collect_parsed("line", results);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "Tram A");
        assert_eq!(lines[0].destinations, vec!["La Gardette", "Le Haillan"]);
        assert_eq!(lines[1].name, "Tram B");
        assert_eq!(lines[1].destinations, vec!["Pessac Centre"]);
    }
}
