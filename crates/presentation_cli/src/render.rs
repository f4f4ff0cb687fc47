//! Terminal rendering of departures

use chrono::{DateTime, Utc};
use integration_tbm::{Departure, Line, Snapshot, Stop, UNKNOWN_WAIT};

/// Human form of a waiting time
pub fn format_wait(minutes: u32) -> String {
    match minutes {
        0 => "Imminent".to_string(),
        1 => "1 min".to_string(),
        UNKNOWN_WAIT => "Unknown".to_string(),
        n => format!("{n} min"),
    }
}

/// One departure as a table row, with its waiting time evaluated at `now`
pub fn departure_row(dep: &Departure, now: DateTime<Utc>) -> String {
    let live = if dep.is_live { "" } else { "  (scheduled)" };
    format!(
        "{:>4}  {:<30} {:>9}{live}",
        dep.line_label,
        dep.destination,
        format_wait(dep.waiting_minutes_at(now))
    )
}

/// The soonest departures of a snapshot followed by one line per group
///
/// Waiting times are recomputed at `now`, so a kept snapshot redrawn after
/// a failed poll does not show the minutes of its original fetch.
pub fn snapshot_lines(snapshot: &Snapshot, max_listed: usize, now: DateTime<Utc>) -> Vec<String> {
    let mut out = vec![format!(
        "🚋 {} (updated {})",
        snapshot.stop_name,
        snapshot.fetched_at.with_timezone(&chrono::Local).format("%H:%M:%S")
    )];

    if snapshot.is_empty() {
        out.push("   No departures".to_string());
        return out;
    }

    out.extend(snapshot.departures.iter().take(max_listed).map(|dep| departure_row(dep, now)));

    if snapshot.grouped.len() > 1 {
        out.push(String::new());
        for (key, group) in &snapshot.grouped {
            let waits: Vec<String> = group.iter().map(|d| format_wait(d.waiting_minutes_at(now))).collect();
            out.push(format!("   {key}: {}", waits.join(", ")));
        }
    }

    out
}

/// A stop with the lines serving it
pub fn stop_entry(stop: &Stop) -> String {
    let lines: Vec<&str> = stop.lines.iter().map(|l| l.name.as_str()).collect();
    if lines.is_empty() {
        format!("{}  {stop}", stop.id)
    } else {
        format!("{}  {stop}  [{}]", stop.id, lines.join(" "))
    }
}

/// A line with its destinations
pub fn line_entry(line: &Line) -> String {
    if line.destinations.is_empty() {
        format!("{}  {}", line.id, line.name)
    } else {
        format!("{}  {}  -> {}", line.id, line.name, line.destinations.join(" / "))
    }
}
