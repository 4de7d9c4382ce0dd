//! One-shot state transfer when a node starts.
//!
//! Peers are asked for their messages one at a time, in the order `init`
//! listed them, under a single shared deadline. The first complete answer is
//! merged into the local store and the pass ends. This is best effort: a node
//! that hears from nobody simply starts with what it already has.
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use super::broadcast::{ReadResponse, READ};
use super::store::MessageStore;
use super::{NodeIdentity, NodeName};
use crate::transport::{Body, RequestSender};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatchUpOutcome {
    /// Merged `count` values reported by `from`
    Seeded { from: NodeName, count: usize },
    /// No peer answered before the deadline
    Exhausted,
}

#[derive(Clone, Debug)]
pub struct CatchUpSync {
    store: Arc<MessageStore>,
    timeout: Duration,
}

impl CatchUpSync {
    pub fn new(store: Arc<MessageStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn run(
        &self,
        transport: &dyn RequestSender,
        identity: &NodeIdentity,
    ) -> CatchUpOutcome {
        let node_id = &identity.node_id;
        let deadline = Instant::now() + self.timeout;

        for peer in identity.peers() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("[{}] Catch-up deadline passed before asking {}", node_id, peer);
                break;
            }

            let reply = match transport
                .send_request_response(peer, Body::new(READ), remaining)
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    debug!("[{}] Skipping {} for catch-up: {}", node_id, peer, e);
                    continue;
                }
            };
            let response: ReadResponse = match reply.body.decode() {
                Ok(response) => response,
                Err(e) => {
                    debug!("[{}] Unusable catch-up reply from {}: {}", node_id, peer, e);
                    continue;
                }
            };

            let count = response.messages.len();
            self.store.seed(response.messages);
            info!(
                "[{}] Caught up on {} message(s) from {}",
                node_id, count, peer
            );
            return CatchUpOutcome::Seeded {
                from: peer.clone(),
                count,
            };
        }

        debug!(
            "[{}] No peer answered the catch-up read, keeping {} local message(s)",
            node_id,
            self.store.len()
        );
        CatchUpOutcome::Exhausted
    }
}
