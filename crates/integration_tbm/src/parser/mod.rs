//! Upstream schema strategies
//!
//! Each upstream API is described by a [`FeedSchema`]: where its endpoints
//! live and how to walk its JSON. Parsing is per item: every visit, schedule
//! or stop is deserialized into its own `Raw*` record and yields its own
//! [`Parsed`] result, so one malformed record is skipped with a reason while
//! the rest of the batch survives.

mod legacy;
mod siri;

use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use url::Url;

pub use legacy::LegacySchema;
pub use siri::SiriSchema;

use crate::error::FeedError;
use crate::models::{Line, RawDeparture, Stop};

/// Why a single upstream record was skipped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// The record itself is not a JSON object
    #[error("{what} is not an object")]
    NotAnObject {
        /// Kind of record
        what: &'static str,
    },

    /// A required sub-structure is missing
    #[error("missing field `{field}`")]
    MissingField {
        /// Field name
        field: &'static str,
    },

    /// A field has an unexpected JSON type
    #[error("field `{field}` is not {expected}")]
    WrongType {
        /// Field name
        field: &'static str,
        /// Expected JSON type
        expected: &'static str,
    },

    /// The record does not have the expected layout
    #[error("malformed {what}: {detail}")]
    Malformed {
        /// Kind of record
        what: &'static str,
        /// Deserializer message
        detail: String,
    },
}

/// Outcome of parsing one upstream record
pub type Parsed<T> = Result<T, SkipReason>;

/// Endpoints and JSON layout of one upstream API
pub trait FeedSchema: Send + Sync + fmt::Debug {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Real-time departures at a stop, optionally for one line
    fn departures_url(&self, stop_id: &str, line_id: Option<&str>) -> Result<Url, FeedError>;

    /// Full stop catalog
    fn stops_url(&self) -> Result<Url, FeedError>;

    /// A single stop, or `None` when the catalog must be filtered instead
    fn stop_url(&self, stop_id: &str) -> Result<Option<Url>, FeedError>;

    /// Line catalog, or `None` when lines must be derived from the stops
    fn lines_url(&self) -> Result<Option<Url>, FeedError>;

    /// Walk a departures document
    fn parse_departures(&self, body: &Value) -> Vec<Parsed<RawDeparture>>;

    /// Walk a stop catalog document
    fn parse_stops(&self, body: &Value) -> Vec<Parsed<Stop>>;

    /// Walk a line catalog document
    fn parse_lines(&self, body: &Value) -> Vec<Parsed<Line>>;
}

/// Keep parsed records, logging every skipped one
pub fn collect_parsed<T>(kind: &str, items: Vec<Parsed<T>>) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Ok(value) => Some(value),
            Err(reason) => {
                warn!(kind, index, %reason, "Skipping malformed record");
                None
            },
        })
        .collect()
}

/// Build an endpoint URL from a base, extra path segments and query pairs
pub(crate) fn endpoint(base: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, FeedError> {
    let mut url = Url::parse(base)
        .map_err(|e| FeedError::ConfigurationError(format!("invalid base URL '{base}': {e}")))?;

    url.path_segments_mut()
        .map_err(|()| FeedError::ConfigurationError(format!("base URL '{base}' cannot take a path")))?
        .pop_if_empty()
        .extend(segments);

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    Ok(url)
}

/// Follow a chain of object keys; `None` as soon as any step is missing
pub(crate) fn lookup<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(root, |node, key| node.get(*key))
}

/// The array at `keys`, or an empty slice when any step is missing
pub(crate) fn array_at<'a>(root: &'a Value, keys: &[&str]) -> &'a [Value] {
    lookup(root, keys)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Deserialize one upstream record of kind `what`
pub(crate) fn from_record<'a, T: Deserialize<'a>>(what: &'static str, item: &'a Value) -> Parsed<T> {
    if !item.is_object() {
        return Err(SkipReason::NotAnObject { what });
    }
    T::deserialize(item).map_err(|e| SkipReason::Malformed {
        what,
        detail: e.to_string(),
    })
}

/// Treat an empty string as absent
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_collect_parsed_keeps_successes() {
        let items: Vec<Parsed<u8>> = vec![
            Ok(1),
            Err(SkipReason::MissingField { field: "x" }),
            Ok(3),
        ];
        assert_eq!(collect_parsed("test", items), vec![1, 3]);
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let url = endpoint("https://bdx.mecatran.com/utw/ws", &["siri", "2.0"], &[("a", "b c")]).unwrap();
        assert_eq!(url.as_str(), "https://bdx.mecatran.com/utw/ws/siri/2.0?a=b+c");
    }

    #[test]
    fn test_endpoint_trailing_slash_and_bare_host() {
        let url = endpoint("https://ws.infotbm.com/ws/1.0/", &["x"], &[]).unwrap();
        assert_eq!(url.as_str(), "https://ws.infotbm.com/ws/1.0/x");

        let url = endpoint("http://127.0.0.1:8080", &["x"], &[]).unwrap();
        assert_eq!(url.path(), "/x");
    }

    #[test]
    fn test_endpoint_invalid_base() {
        let err = endpoint("not a url", &[], &[]).unwrap_err();
        assert!(matches!(err, FeedError::ConfigurationError(_)));
    }

    #[test]
    fn test_array_at_short_circuits() {
        let doc = json!({ "Siri": { "ServiceDelivery": {} } });
        assert!(array_at(&doc, &["Siri", "ServiceDelivery", "StopMonitoringDelivery"]).is_empty());
        assert!(array_at(&json!(null), &["Siri"]).is_empty());
        assert!(array_at(&json!({ "Siri": [] }), &["Siri", "X"]).is_empty());
    }

    #[derive(Debug, Deserialize)]
    struct Record {
        id: u32,
        #[serde(default)]
        name: Option<Value>,
    }

    #[test]
    fn test_from_record() {
        let record: Record = from_record("record", &json!({ "id": 7, "extra": true })).unwrap();
        assert_eq!(record.id, 7);
        assert!(record.name.is_none());

        assert_eq!(
            from_record::<Record>("record", &json!("text")).unwrap_err(),
            SkipReason::NotAnObject { what: "record" }
        );

        let err = from_record::<Record>("record", &json!({ "name": "x" })).unwrap_err();
        assert!(matches!(&err, SkipReason::Malformed { what: "record", detail } if detail.contains("missing field `id`")));
        assert!(err.to_string().starts_with("malformed record"));

        assert!(matches!(
            from_record::<Record>("record", &json!({ "id": "seven" })),
            Err(SkipReason::Malformed { .. })
        ));
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::MissingField {
            field: "MonitoredVehicleJourney",
        };
        assert!(reason.to_string().contains("MonitoredVehicleJourney"));
    }
}
