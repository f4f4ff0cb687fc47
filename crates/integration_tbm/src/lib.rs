//! Real-time departures for the Bordeaux TBM network
//!
//! Fetches upcoming departures at a stop from the TBM SIRI-Lite StopMonitoring
//! API (served by Mecatran), or from the older infotbm REST API, and
//! normalizes both into one model sorted by waiting time and grouped by
//! line and destination.
//!
//! # Architecture
//!
//! [`DepartureFeed`] defines the interface the host polls, implemented by
//! [`HttpDepartureFeed`]. URL building and JSON layout live behind
//! [`FeedSchema`], with one implementation per backend, so the normalization
//! in [`normalize`] is shared. Malformed upstream records are skipped with a
//! [`SkipReason`] instead of failing the whole poll.
//!
//! [`FeedCoordinator`] keeps the last good [`Snapshot`] between polls, and
//! [`resolve_stop`] / [`line_choices`] cover the one-time setup flow.
//!
//! # Example
//!
//! ```rust,ignore
//! use integration_tbm::{FeedConfig, HttpDepartureFeed, DepartureFeed, StopSelection};
//!
//! let feed = HttpDepartureFeed::new(&FeedConfig::default())?;
//! let selection = StopSelection::new("3687", "Quinconces");
//!
//! let snapshot = feed.fetch_snapshot(&selection).await?;
//! if let Some(next) = snapshot.next_departure() {
//!     println!("{} -> {} in {} min", next.line_label, next.destination, next.waiting_minutes);
//! }
//! ```

mod client;
mod config;
mod coordinator;
mod discovery;
mod error;
mod models;
mod parser;
mod search;
mod snapshot;
mod time;
mod value;

pub use client::{DepartureFeed, HttpDepartureFeed};
pub use config::{ALL_LINES, Backend, FeedConfig, StopSelection};
pub use coordinator::FeedCoordinator;
pub use discovery::{ALL_LINES_LABEL, line_choices, resolve_stop};
pub use error::FeedError;
pub use models::{Departure, Line, RawDeparture, Stop, StopLine, VehicleType, WaitingBasis, line_label};
pub use parser::{FeedSchema, LegacySchema, Parsed, SiriSchema, SkipReason};
pub use search::{find_stop, lines_from_stops, search_stops};
pub use snapshot::{GroupKey, Snapshot, normalize, sort_departures};
pub use time::{UNKNOWN_WAIT, parse_countdown, parse_iso8601, waiting_minutes};
pub use value::{extract_first, extract_value};
