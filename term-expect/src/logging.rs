//! Logging configuration.
//!
//! Batch resolution and metric execution can emit one event per partition
//! or per metric, which gets noisy on wide suites. [`LogConfig`] gates those
//! detail events at runtime; [`setup`] installs a `tracing-subscriber`
//! pipeline. Both deserialize from JSON like the rest of the configuration.

use serde::{Deserialize, Serialize};

/// Runtime switches for per-item log events.
///
/// Run summaries and root metric failures are always logged; this only
/// controls the events whose count grows with the number of partitions or
/// metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Debug event per computed metric, with its value
    pub log_metric_details: bool,
    /// Debug event per enumerated partition
    pub log_partition_details: bool,
    /// Warning per metric skipped because a dependency failed
    pub log_skipped_metrics: bool,
    /// Longest logged value before truncation, in bytes
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_metric_details: false,
            log_partition_details: true,
            log_skipped_metrics: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Everything on, long values kept.
    pub fn verbose() -> Self {
        Self {
            log_metric_details: true,
            log_partition_details: true,
            log_skipped_metrics: true,
            max_field_length: 1024,
        }
    }

    /// Only summaries and root failures.
    pub fn production() -> Self {
        Self {
            log_metric_details: false,
            log_partition_details: false,
            log_skipped_metrics: false,
            max_field_length: 128,
        }
    }

    pub fn balanced() -> Self {
        Self::default()
    }
}

/// Debug event gated on [`LogConfig::log_metric_details`].
#[macro_export]
macro_rules! log_metric {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_metric_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Debug event gated on [`LogConfig::log_partition_details`].
#[macro_export]
macro_rules! log_partition {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_partition_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Warning gated on [`LogConfig::log_skipped_metrics`].
#[macro_export]
macro_rules! log_skipped {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_skipped_metrics {
            tracing::warn!($($arg)*);
        }
    };
}

/// Truncates `value` to at most `max_length` bytes on a char boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber installation.
pub mod setup {
    use serde::{Deserialize, Serialize};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    use crate::error::{Result, TermError};

    /// Output format of the installed `fmt` layer.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum LogFormat {
        #[default]
        Full,
        Compact,
        Json,
    }

    /// Subscriber configuration.
    ///
    /// ```json
    /// { "level": "warn", "crate_level": "debug", "format": "json" }
    /// ```
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub struct LoggingConfig {
        /// Filter level for every other crate
        pub level: String,
        /// Filter level for `term_expect`
        pub crate_level: String,
        pub format: LogFormat,
        /// Full filter directive; replaces `level` and `crate_level`
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: "info".to_string(),
                crate_level: "debug".to_string(),
                format: LogFormat::Full,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        pub fn production() -> Self {
            Self {
                level: "warn".to_string(),
                crate_level: "info".to_string(),
                format: LogFormat::Json,
                env_filter: None,
            }
        }

        pub fn development() -> Self {
            Self {
                level: "debug".to_string(),
                crate_level: "debug".to_string(),
                format: LogFormat::Compact,
                env_filter: None,
            }
        }

        pub fn with_format(mut self, format: LogFormat) -> Self {
            self.format = format;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// The filter directive this configuration installs.
        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!("{},term_expect={}", self.level, self.crate_level),
            }
        }

        fn build_filter(&self) -> Result<EnvFilter> {
            EnvFilter::try_new(self.env_filter()).map_err(|e| {
                TermError::configuration(format!(
                    "invalid log filter '{}': {e}",
                    self.env_filter()
                ))
            })
        }
    }

    /// Installs a global subscriber. `RUST_LOG` overrides the configured filter.
    ///
    /// Fails with a configuration error on a malformed filter or when a
    /// global subscriber is already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use term_expect::logging::setup::{init_logging, LogFormat, LoggingConfig};
    ///
    /// let config = LoggingConfig::development().with_format(LogFormat::Json);
    /// init_logging(config).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<()> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => config.build_filter()?,
        };

        let fmt_layer = match config.format {
            LogFormat::Full => tracing_subscriber::fmt::layer().boxed(),
            LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
            LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TermError::configuration(format!("cannot install subscriber: {e}")))
    }
}
