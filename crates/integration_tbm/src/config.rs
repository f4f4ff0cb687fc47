//! Feed configuration

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Stop;
use crate::parser::{FeedSchema, LegacySchema, SiriSchema};

/// Line choice meaning "every line at the stop"
pub const ALL_LINES: &str = "all";

/// Which upstream API to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// SIRI-Lite StopMonitoring (Mecatran)
    #[default]
    Siri,
    /// Legacy infotbm REST API
    Legacy,
}

impl Backend {
    /// Default base URL for this backend
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Siri => "https://bdx.mecatran.com/utw/ws",
            Self::Legacy => "https://ws.infotbm.com/ws/1.0",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Siri => write!(f, "siri"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

/// Configuration for the departure feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Upstream API flavor
    #[serde(default)]
    pub backend: Backend,

    /// Base URL override; the backend default is used when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// SIRI `AccountKey`
    #[serde(default = "default_account_key")]
    pub account_key: String,

    /// SIRI dataset name in the endpoint path
    #[serde(default = "default_network")]
    pub network: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout of the reachability probe in seconds
    #[serde(default = "default_reachability_timeout_secs")]
    pub reachability_timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_account_key() -> String {
    "opendata-bordeaux-metropole-flux-gtfs-rt".to_string()
}

fn default_network() -> String {
    "bordeaux".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_reachability_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("tbm-departures/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            base_url: None,
            account_key: default_account_key(),
            network: default_network(),
            timeout_secs: default_timeout_secs(),
            reachability_timeout_secs: default_reachability_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl FeedConfig {
    /// Create a configuration suitable for testing
    #[must_use]
    pub fn for_testing(backend: Backend, base_url: impl Into<String>) -> Self {
        Self {
            backend,
            base_url: Some(base_url.into()),
            account_key: "test-key".to_string(),
            timeout_secs: 5,
            reachability_timeout_secs: 2,
            ..Default::default()
        }
    }

    /// Base URL actually used
    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.backend.default_base_url())
    }

    /// Build the schema strategy selected by `backend`
    #[must_use]
    pub fn schema(&self) -> Box<dyn FeedSchema> {
        let base = self.effective_base_url();
        match self.backend {
            Backend::Siri => Box::new(SiriSchema::new(base, &self.network, &self.account_key)),
            Backend::Legacy => Box::new(LegacySchema::new(base)),
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.effective_base_url().trim().is_empty() {
            return Err("base_url must not be empty".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }

        if self.reachability_timeout_secs == 0 {
            return Err("reachability_timeout_secs must be greater than 0".to_string());
        }

        if self.backend == Backend::Siri {
            if self.account_key.trim().is_empty() {
                return Err("account_key is required for the siri backend".to_string());
            }
            if self.network.trim().is_empty() {
                return Err("network is required for the siri backend".to_string());
            }
        }

        Ok(())
    }
}

/// The stop (and optional line) a feed is configured to watch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopSelection {
    /// Stop identifier
    pub stop_id: String,
    /// Cached display name of the stop
    #[serde(default)]
    pub stop_name: String,
    /// Restrict departures to this line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_id: Option<String>,
}

impl StopSelection {
    /// Watch every line at a stop
    #[must_use]
    pub fn new(stop_id: impl Into<String>, stop_name: impl Into<String>) -> Self {
        Self {
            stop_id: stop_id.into(),
            stop_name: stop_name.into(),
            line_id: None,
        }
    }

    /// Restrict to one line
    #[must_use]
    pub fn with_line(mut self, line_id: impl Into<String>) -> Self {
        self.line_id = Some(line_id.into());
        self
    }

    /// Build a selection from a discovered stop and a line choice
    ///
    /// An empty choice or [`ALL_LINES`] watches every line.
    #[must_use]
    pub fn from_choice(stop: &Stop, choice: &str) -> Self {
        let selection = Self::new(&stop.id, &stop.name);
        let choice = choice.trim();
        if choice.is_empty() || choice == ALL_LINES {
            selection
        } else {
            selection.with_line(choice)
        }
    }

    /// Identifier unique per stop/line pair
    #[must_use]
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.stop_id, self.line_id.as_deref().unwrap_or(ALL_LINES))
    }

    /// Name to display, falling back to the stop id
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.stop_name.is_empty() {
            &self.stop_id
        } else {
            &self.stop_name
        }
    }
}
