//! CLI for this application
//!
use std::time::Duration;

use crate::error::Result;
use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
#[command(name = settings::APP_NAME, version = settings::APP_VERSION)]
pub struct Cli {
    // Overall budget for delivering one value to one peer
    #[clap(
        long,
        default_value = settings::DEFAULT_DELIVERY_DEADLINE_MS,
        env("RIPPLE_DELIVERY_DEADLINE_MS"),
        help = "Milliseconds to keep retrying delivery of a value to a peer"
    )]
    pub delivery_deadline_ms: u64,

    // Retry backoff: first wait
    #[clap(
        long,
        default_value = settings::DEFAULT_INITIAL_BACKOFF_MS,
        env("RIPPLE_INITIAL_BACKOFF_MS"),
        help = "Initial retry backoff in milliseconds (doubles per failure)"
    )]
    pub initial_backoff_ms: u64,

    // Retry backoff: ceiling
    #[clap(
        long,
        default_value = settings::DEFAULT_MAX_BACKOFF_MS,
        env("RIPPLE_MAX_BACKOFF_MS"),
        help = "Maximum retry backoff in milliseconds"
    )]
    pub max_backoff_ms: u64,

    // Catch-up on init
    #[clap(
        long,
        default_value = settings::DEFAULT_CATCH_UP_TIMEOUT_MS,
        env("RIPPLE_CATCH_UP_TIMEOUT_MS"),
        help = "Milliseconds allowed for reading existing messages from peers on init"
    )]
    pub catch_up_timeout_ms: u64,

    #[clap(
        long,
        default_value = "text",
        env("RIPPLE_LOG_FORMAT"),
        help = "log-format: 'text' or 'json' (written to stderr)"
    )]
    pub log_format: settings::LogFormat,
}

impl Cli {
    pub fn into_settings(self) -> Result<settings::Settings> {
        settings::Settings {
            delivery: settings::DeliverySettings {
                deadline: Duration::from_millis(self.delivery_deadline_ms),
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
            },
            catch_up_timeout: Duration::from_millis(self.catch_up_timeout_ms),
            log_format: self.log_format,
        }
        .validate()
    }
}
