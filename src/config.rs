//! Runtime configuration for query collection and reporting.
//!
//! The configuration is injected as plain values and functions: collectors
//! and reporters receive a shared [`Config`] rather than reading process
//! globals. The backtrace cleaner is an injected closure and is skipped by
//! serde.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default topic query events are published under.
pub const DEFAULT_EVENT_TOPIC: &str = "db.query";

/// Default number of cleaned call-site frames appended in verbose mode.
pub const DEFAULT_BACKTRACE_LENGTH: usize = 1;

/// Injected backtrace-cleaning function.
///
/// Receives raw captured frames and returns the cleaned frames worth
/// showing; the collector truncates the result to
/// [`Config::backtrace_length`].
pub type BacktraceCleaner = Arc<dyn Fn(Vec<String>) -> Vec<String> + Send + Sync>;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

fn default_event_topic() -> String {
    DEFAULT_EVENT_TOPIC.to_string()
}

fn default_backtrace_length() -> usize {
    DEFAULT_BACKTRACE_LENGTH
}

fn default_show_table_stats() -> bool {
    true
}

/// Shared settings for collectors and the reporter.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Topic the query collector subscribes to (default: "db.query").
    #[serde(default = "default_event_topic")]
    pub event_topic: String,

    /// Maximum number of cleaned call-site frames per query (default: 1).
    #[serde(default = "default_backtrace_length")]
    pub backtrace_length: usize,

    /// Annotate collected queries with source locations and list raw
    /// queries in failure messages (default: false).
    #[serde(default)]
    pub verbose: bool,

    /// Append the per-table usage diff to failure messages (default: true).
    #[serde(default = "default_show_table_stats")]
    pub show_table_stats: bool,

    /// Truncate reported queries to this many characters (default: none).
    #[serde(default)]
    pub truncate_query_size: Option<usize>,

    /// Injected backtrace cleaner; source-location annotation is disabled
    /// when absent.
    #[serde(skip)]
    pub backtrace_cleaner: Option<BacktraceCleaner>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_topic: default_event_topic(),
            backtrace_length: DEFAULT_BACKTRACE_LENGTH,
            verbose: false,
            show_table_stats: true,
            truncate_query_size: None,
            backtrace_cleaner: None,
        }
    }
}

impl Config {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event topic.
    pub fn with_event_topic(mut self, topic: impl Into<String>) -> Self {
        self.event_topic = topic.into();
        self
    }

    /// Set the backtrace length.
    pub fn with_backtrace_length(mut self, length: usize) -> Self {
        self.backtrace_length = length;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set whether table usage stats are reported.
    pub fn with_show_table_stats(mut self, show: bool) -> Self {
        self.show_table_stats = show;
        self
    }

    /// Set the query truncation size.
    pub fn with_truncate_query_size(mut self, size: usize) -> Self {
        self.truncate_query_size = Some(size);
        self
    }

    /// Set the backtrace cleaner.
    pub fn with_backtrace_cleaner(mut self, cleaner: BacktraceCleaner) -> Self {
        self.backtrace_cleaner = Some(cleaner);
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_topic.is_empty() {
            return Err(ConfigError::ValidationError(
                "event_topic must not be empty".to_string(),
            ));
        }

        if self.backtrace_length == 0 {
            return Err(ConfigError::ValidationError(
                "backtrace_length must be positive".to_string(),
            ));
        }

        if self.truncate_query_size == Some(0) {
            return Err(ConfigError::ValidationError(
                "truncate_query_size must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("event_topic", &self.event_topic)
            .field("backtrace_length", &self.backtrace_length)
            .field("verbose", &self.verbose)
            .field("show_table_stats", &self.show_table_stats)
            .field("truncate_query_size", &self.truncate_query_size)
            .field("backtrace_cleaner", &self.backtrace_cleaner.is_some())
            .finish()
    }
}
