//! One-time stop and line discovery
//!
//! The setup steps a host runs before polling: turn free user input into a
//! stop, then offer the lines serving it.

use tracing::{debug, instrument};

use crate::client::DepartureFeed;
use crate::config::ALL_LINES;
use crate::error::FeedError;
use crate::models::Stop;

/// Label of the "every line" choice
pub const ALL_LINES_LABEL: &str = "All lines";

/// Resolve user input to a stop
///
/// The input is tried as a stop id first; when that yields nothing with a
/// name it is used as a name query and the first match wins.
///
/// # Errors
///
/// Returns an error if the upstream cannot be reached.
#[instrument(skip(feed))]
pub async fn resolve_stop(feed: &dyn DepartureFeed, input: &str) -> Result<Option<Stop>, FeedError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let by_id = feed.get_stop_by_id(input).await?;
    if let Some(stop) = by_id.filter(|stop| !stop.name.is_empty()) {
        debug!(stop_id = %stop.id, "Resolved stop by id");
        return Ok(Some(stop));
    }

    let found = feed.search_stops(input).await?.into_iter().next();
    if let Some(stop) = &found {
        debug!(stop_id = %stop.id, "Resolved stop by name");
    }
    Ok(found)
}

/// Line choices for a stop as `(value, label)` pairs, "all" first
#[must_use]
pub fn line_choices(stop: &Stop) -> Vec<(String, String)> {
    let mut choices = vec![(ALL_LINES.to_string(), ALL_LINES_LABEL.to_string())];
    choices.extend(
        stop.lines
            .iter()
            .filter(|line| !line.id.is_empty())
            .map(|line| {
                let label = if line.name.is_empty() { line.id.clone() } else { line.name.clone() };
                (line.id.clone(), label)
            }),
    );
    choices
}
