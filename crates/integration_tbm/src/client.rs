//! HTTP departure feed
//!
//! [`DepartureFeed`] is the boundary the integration host talks to.
//! [`HttpDepartureFeed`] implements it for either upstream API by delegating
//! URLs and JSON layout to the configured [`FeedSchema`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{FeedConfig, StopSelection};
use crate::error::FeedError;
use crate::models::{Departure, Line, RawDeparture, Stop};
use crate::parser::{FeedSchema, collect_parsed};
use crate::search::{find_stop, lines_from_stops, search_stops};
use crate::snapshot::{Snapshot, normalize, sort_departures};

/// Trait for real-time departure feeds
#[async_trait]
pub trait DepartureFeed: Send + Sync {
    /// Full stop catalog
    async fn get_all_stops(&self) -> Result<Vec<Stop>, FeedError>;

    /// A single stop by id, `None` if the upstream does not know it
    async fn get_stop_by_id(&self, stop_id: &str) -> Result<Option<Stop>, FeedError>;

    /// Lines with their destinations, for discovery
    async fn get_lines(&self) -> Result<Vec<Line>, FeedError>;

    /// Upcoming departures at a stop, ascending by waiting time
    async fn get_departures(
        &self,
        stop_id: &str,
        line_id: Option<&str>,
    ) -> Result<Vec<Departure>, FeedError>;

    /// Check if the upstream answers at all
    async fn check_reachable(&self) -> bool;

    /// Stops whose name contains `query`, ignoring case
    async fn search_stops(&self, query: &str) -> Result<Vec<Stop>, FeedError> {
        let all = self.get_all_stops().await?;
        Ok(search_stops(&all, query))
    }

    /// Poll the configured stop into a fresh snapshot
    async fn fetch_snapshot(&self, selection: &StopSelection) -> Result<Snapshot, FeedError> {
        let departures = self
            .get_departures(&selection.stop_id, selection.line_id.as_deref())
            .await?;
        Ok(Snapshot::from_sorted(selection, departures, Utc::now()))
    }
}

/// Departure feed over HTTP for the SIRI or legacy backend
#[derive(Debug)]
pub struct HttpDepartureFeed {
    client: Client,
    config: FeedConfig,
    schema: Box<dyn FeedSchema>,
}

impl HttpDepartureFeed {
    /// Create a new feed client
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be initialized.
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        config.validate().map_err(FeedError::ConfigurationError)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
            schema: config.schema(),
        })
    }

    /// The configuration this feed was built from
    #[must_use]
    pub const fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// GET a JSON document
    ///
    /// Transport failures and non-success statuses are errors. A body that is
    /// not JSON is logged and read as `null`, which every parser maps to an
    /// empty result.
    async fn fetch_json(&self, url: Url) -> Result<Value, FeedError> {
        debug!(backend = self.schema.name(), path = url.path(), "Fetching");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::from_transport(&e, self.config.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::RequestFailed {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown status").to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::from_transport(&e, self.config.timeout_secs))?;

        Ok(Self::parse_body(&body))
    }

    fn parse_body(body: &str) -> Value {
        serde_json::from_str(body).unwrap_or_else(|e| {
            warn!(error = %e, "Response body is not valid JSON, treating as empty");
            Value::Null
        })
    }

    async fn fetch_raw_departures(
        &self,
        stop_id: &str,
        line_id: Option<&str>,
    ) -> Result<Vec<RawDeparture>, FeedError> {
        if stop_id.trim().is_empty() {
            return Err(FeedError::InvalidRequest("stop_id must not be empty".to_string()));
        }

        let url = self.schema.departures_url(stop_id, line_id)?;
        let body = self.fetch_json(url).await?;
        Ok(collect_parsed("departure", self.schema.parse_departures(&body)))
    }
}

#[async_trait]
impl DepartureFeed for HttpDepartureFeed {
    #[instrument(skip(self))]
    async fn get_all_stops(&self) -> Result<Vec<Stop>, FeedError> {
        let body = self.fetch_json(self.schema.stops_url()?).await?;
        let stops = collect_parsed("stop", self.schema.parse_stops(&body));
        debug!(count = stops.len(), "Stops loaded");
        Ok(stops)
    }

    #[instrument(skip(self))]
    async fn get_stop_by_id(&self, stop_id: &str) -> Result<Option<Stop>, FeedError> {
        if stop_id.trim().is_empty() {
            return Err(FeedError::InvalidRequest("stop_id must not be empty".to_string()));
        }

        let Some(url) = self.schema.stop_url(stop_id)? else {
            let all = self.get_all_stops().await?;
            return Ok(find_stop(&all, stop_id).cloned());
        };

        let body = self.fetch_json(url).await?;
        let stops = collect_parsed("stop", self.schema.parse_stops(&body));
        Ok(stops.into_iter().find(|stop| stop.id == stop_id))
    }

    #[instrument(skip(self))]
    async fn get_lines(&self) -> Result<Vec<Line>, FeedError> {
        let lines = match self.schema.lines_url()? {
            Some(url) => {
                let body = self.fetch_json(url).await?;
                collect_parsed("line", self.schema.parse_lines(&body))
            },
            None => lines_from_stops(&self.get_all_stops().await?),
        };
        debug!(count = lines.len(), "Lines loaded");
        Ok(lines)
    }

    #[instrument(skip(self))]
    async fn get_departures(
        &self,
        stop_id: &str,
        line_id: Option<&str>,
    ) -> Result<Vec<Departure>, FeedError> {
        let raw = self.fetch_raw_departures(stop_id, line_id).await?;
        let departures = sort_departures(raw, Utc::now());
        debug!(count = departures.len(), "Departures found");
        Ok(departures)
    }

    #[instrument(skip(self, selection), fields(stop_id = %selection.stop_id))]
    async fn fetch_snapshot(&self, selection: &StopSelection) -> Result<Snapshot, FeedError> {
        let raw = self
            .fetch_raw_departures(&selection.stop_id, selection.line_id.as_deref())
            .await?;
        let snapshot = normalize(selection, raw, Utc::now());
        if snapshot.is_empty() {
            warn!("No departures found");
        }
        debug!(count = snapshot.departures.len(), groups = snapshot.grouped.len(), "Snapshot built");
        Ok(snapshot)
    }

    async fn check_reachable(&self) -> bool {
        let Ok(url) = self.schema.stops_url() else {
            return false;
        };
        self.client
            .get(url)
            .timeout(Duration::from_secs(self.config.reachability_timeout_secs))
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }
}
