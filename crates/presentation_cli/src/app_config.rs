//! CLI configuration
//!
//! Layered with the `config` crate: built-in defaults, then `tbm.toml` in the
//! working directory (or an explicit `--config` file), then `TBM__*`
//! environment variables such as `TBM__FEED__BACKEND=legacy` or
//! `TBM__STOP__STOP_ID=3687`.

use std::path::Path;

use integration_tbm::{FeedConfig, StopSelection};
use serde::{Deserialize, Serialize};

/// Polling settings for `watch`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollConfig {
    /// Seconds between polls
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Departures listed per refresh
    #[serde(default = "default_max_listed")]
    pub max_listed: usize,
}

const fn default_interval_secs() -> u64 {
    60
}

const fn default_max_listed() -> usize {
    5
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_listed: default_max_listed(),
        }
    }
}

/// Full CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream feed
    #[serde(default)]
    pub feed: FeedConfig,

    /// Watched stop, written by `setup`
    #[serde(default)]
    pub stop: Option<StopSelection>,

    /// Polling
    #[serde(default)]
    pub poll: PollConfig,
}

impl AppConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Without `path`, `tbm.toml` is read if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("tbm").required(false),
        };

        let builder = config::Config::builder()
            .set_default("poll.interval_secs", default_interval_secs())?
            .set_default("poll.max_listed", 5)?
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("TBM")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.feed.validate()?;

        if self.poll.interval_secs == 0 {
            return Err("poll.interval_secs must be greater than 0".to_string());
        }

        if self.stop.as_ref().is_some_and(|stop| stop.stop_id.trim().is_empty()) {
            return Err("stop.stop_id must not be empty".to_string());
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct StopSection<'a> {
    stop: &'a StopSelection,
}

/// Render a selection as a `[stop]` section ready to paste into `tbm.toml`
pub fn stop_section(selection: &StopSelection) -> Result<String, toml::ser::Error> {
    toml::to_string(&StopSection { stop: selection })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use integration_tbm::Backend;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.poll.max_listed, 5);
        assert!(config.stop.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[feed]
backend = "legacy"
timeout_secs = 12

[stop]
stop_id = "3687"
stop_name = "Quinconces"
line_id = "B"

[poll]
interval_secs = 30
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.feed.backend, Backend::Legacy);
        assert_eq!(config.feed.timeout_secs, 12);
        assert_eq!(config.feed.network, "bordeaux");
        assert_eq!(config.poll.interval_secs, 30);
        assert_eq!(config.poll.max_listed, 5);

        let stop = config.stop.unwrap();
        assert_eq!(stop.unique_id(), "3687_B");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/tbm.toml"))).is_err());
    }

    #[test]
    fn test_validate_zero_interval() {
        let config = AppConfig {
            poll: PollConfig {
                interval_secs: 0,
                max_listed: 5,
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stop_section() {
        let rendered = stop_section(&StopSelection::new("3687", "Quinconces").with_line("B")).unwrap();
        assert!(rendered.starts_with("[stop]"));
        assert!(rendered.contains("stop_id = \"3687\""));
        assert!(rendered.contains("line_id = \"B\""));

        let all_lines = stop_section(&StopSelection::new("3687", "Quinconces")).unwrap();
        assert!(!all_lines.contains("line_id"));
    }
}
