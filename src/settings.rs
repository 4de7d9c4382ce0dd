//! Ripple application settings
use std::time::Duration;

use crate::config_error;
use crate::error::Result;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_DELIVERY_DEADLINE_MS: &str = "30000";
pub const DEFAULT_INITIAL_BACKOFF_MS: &str = "100";
pub const DEFAULT_MAX_BACKOFF_MS: &str = "5000";
pub const DEFAULT_CATCH_UP_TIMEOUT_MS: &str = "1000";

/// How a single value is pushed to a single peer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliverySettings {
    /// Overall time budget for one (peer, value) delivery
    pub deadline: Duration,
    /// Wait after the first failed attempt
    pub initial_backoff: Duration,
    /// Ceiling for the doubling backoff
    pub max_backoff: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(30),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    // Fan-out retry behaviour
    pub delivery: DeliverySettings,

    // Shared deadline for the startup catch-up pass over all peers
    pub catch_up_timeout: Duration,

    // Log output format (logs always go to stderr)
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delivery: DeliverySettings::default(),
            catch_up_timeout: Duration::from_secs(1),
            log_format: LogFormat::Text,
        }
    }
}

impl Settings {
    /// Reject settings the retrier and catch-up loops cannot run with
    pub fn validate(self) -> Result<Self> {
        let delivery = &self.delivery;
        if delivery.deadline.is_zero() {
            return Err(config_error!("delivery deadline must be greater than zero"));
        }
        if delivery.initial_backoff.is_zero() {
            return Err(config_error!("initial backoff must be greater than zero"));
        }
        if delivery.initial_backoff > delivery.max_backoff {
            return Err(config_error!(
                "initial backoff {}ms exceeds max backoff {}ms",
                delivery.initial_backoff.as_millis(),
                delivery.max_backoff.as_millis()
            ));
        }
        if self.catch_up_timeout.is_zero() {
            return Err(config_error!("catch-up timeout must be greater than zero"));
        }
        Ok(self)
    }
}
