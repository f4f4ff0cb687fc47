//! Stop catalog search

use crate::models::{Line, Stop, StopLine};

/// Stops whose name contains `query`, ignoring case
///
/// An empty query matches every stop. Catalog order is preserved.
#[must_use]
pub fn search_stops(all_stops: &[Stop], query: &str) -> Vec<Stop> {
    let needle = query.to_lowercase();
    all_stops
        .iter()
        .filter(|stop| stop.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// The stop with exactly this id
#[must_use]
pub fn find_stop<'a>(all_stops: &'a [Stop], stop_id: &str) -> Option<&'a Stop> {
    all_stops.iter().find(|stop| stop.id == stop_id)
}

/// Distinct lines across a stop catalog, in first-seen order
///
/// Used where the upstream has no line catalog; destinations stay empty.
#[must_use]
pub fn lines_from_stops(all_stops: &[Stop]) -> Vec<Line> {
    let mut seen: Vec<&StopLine> = Vec::new();
    for line in all_stops.iter().flat_map(|stop| &stop.lines) {
        if !seen.iter().any(|known| known.id == line.id) {
            seen.push(line);
        }
    }

    seen.into_iter()
        .map(|line| Line {
            id: line.id.clone(),
            name: line.name.clone(),
            destinations: Vec::new(),
        })
        .collect()
}
