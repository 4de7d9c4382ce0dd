//! Per-peer delivery of a single value with exponential backoff.
//!
//! One retrier task runs for every (peer, value) pair a node fans out. Tasks
//! share nothing: each has its own backoff and its own deadline, and the
//! spawning handler never waits on them.
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::broadcast::{BroadcastRequest, BROADCAST};
use super::store::Value;
use super::NodeName;
use crate::settings::DeliverySettings;
use crate::transport::{Body, RequestSender};

/// Doubling delay with a ceiling
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Double the delay, never past the ceiling
    pub fn advance(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.max);
    }
}

/// How a delivery task ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The peer acknowledged the value
    Delivered { attempts: u32 },
    /// The deadline passed without an acknowledgment
    Abandoned { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts } | DeliveryOutcome::Abandoned { attempts } => {
                *attempts
            }
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

#[derive(Clone)]
pub struct DeliveryRetrier {
    transport: Arc<dyn RequestSender>,
    settings: DeliverySettings,
}

impl std::fmt::Debug for DeliveryRetrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryRetrier")
            .field("settings", &self.settings)
            .finish()
    }
}

impl DeliveryRetrier {
    pub fn new(transport: Arc<dyn RequestSender>, settings: DeliverySettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Push `value` to `peer` until it acknowledges or the deadline passes.
    ///
    /// Each attempt waits for the acknowledgment for at most the current
    /// backoff. The first attempt always runs to completion, so an
    /// unreachable peer costs at least one failed attempt and overruns the
    /// deadline by at most one acknowledgment wait.
    ///
    /// The early waits are short: a peer whose round trip exceeds
    /// `initial_backoff` sees the value resent until the backoff catches up
    /// with its latency. Duplicates are harmless since the peer only
    /// acknowledges a value it already holds.
    pub async fn deliver(&self, peer: &NodeName, value: Value) -> DeliveryOutcome {
        let deadline = Instant::now() + self.settings.deadline;
        let mut backoff = Backoff::new(self.settings.initial_backoff, self.settings.max_backoff);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let body = match Body::with_payload(BROADCAST, &BroadcastRequest { message: value }) {
                Ok(body) => body,
                Err(e) => {
                    warn!("Cannot encode value {} for {}: {}", value, peer, e);
                    return DeliveryOutcome::Abandoned { attempts };
                }
            };

            match self
                .transport
                .send_request_response(peer, body, backoff.current())
                .await
            {
                Ok(_) => {
                    debug!(
                        "Delivered {} to {} after {} attempt(s)",
                        value, peer, attempts
                    );
                    return DeliveryOutcome::Delivered { attempts };
                }
                Err(e) => debug!(
                    "Attempt {} delivering {} to {} failed: {}",
                    attempts, value, peer, e
                ),
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(backoff.current().min(deadline - now)).await;
            if Instant::now() >= deadline {
                break;
            }
            backoff.advance();
        }

        warn!(
            "Giving up delivering {} to {} after {} attempt(s)",
            value, peer, attempts
        );
        DeliveryOutcome::Abandoned { attempts }
    }
}
