//! Replicated broadcast: accept a value once, then push it to every peer.
//!
//! A node that sees a value for the first time stores it and starts one
//! independent delivery task per peer. A node that already holds the value
//! only acknowledges it, which bounds the traffic for every value to one
//! fan-out wave per node.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::catch_up::CatchUpSync;
use super::retrier::{DeliveryOutcome, DeliveryRetrier};
use super::store::{MessageStore, Value};
use super::topology::TopologyGraph;
use super::{NodeIdentity, NodeName};
use crate::error::{Result, RippleError};
use crate::settings::{DeliverySettings, Settings};
use crate::transport::messages::INIT;
use crate::transport::{Body, Handler, Message, RequestSender};

pub const BROADCAST: &str = "broadcast";
pub const BROADCAST_OK: &str = "broadcast_ok";
pub const READ: &str = "read";
pub const READ_OK: &str = "read_ok";
pub const TOPOLOGY: &str = "topology";
pub const TOPOLOGY_OK: &str = "topology_ok";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastRequest {
    pub message: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadResponse {
    pub messages: Vec<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyRequest {
    pub topology: HashMap<NodeName, Vec<NodeName>>,
}

#[derive(Debug)]
pub struct ReplicationController {
    store: Arc<MessageStore>,
    topology: Arc<TopologyGraph>,
    delivery: DeliverySettings,
    catch_up_timeout: Duration,
    catch_up_started: AtomicBool,
}

impl ReplicationController {
    pub fn new(settings: &Settings) -> Self {
        Self {
            store: Arc::new(MessageStore::new()),
            topology: Arc::new(TopologyGraph::new()),
            delivery: settings.delivery,
            catch_up_timeout: settings.catch_up_timeout,
            catch_up_started: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> Arc<MessageStore> {
        Arc::clone(&self.store)
    }

    pub fn topology(&self) -> Arc<TopologyGraph> {
        Arc::clone(&self.topology)
    }

    /// Start the catch-up pass in the background. Only the first call does
    /// anything.
    pub fn start_catch_up(&self, transport: Arc<dyn RequestSender>) -> Result<()> {
        let identity = transport.identity()?;
        if self.catch_up_started.swap(true, Ordering::SeqCst) {
            debug!("[{}] Catch-up already ran, ignoring", identity.node_id);
            return Ok(());
        }

        let sync = CatchUpSync::new(self.store(), self.catch_up_timeout);
        tokio::spawn(async move {
            sync.run(&*transport, &identity).await;
        });
        Ok(())
    }

    /// Handle one inbound `broadcast`.
    ///
    /// Returns the delivery tasks started for a newly accepted value (empty
    /// when the value was already known). Callers are free to drop them.
    pub async fn on_broadcast(
        &self,
        transport: Arc<dyn RequestSender>,
        request: &Message,
    ) -> Result<Vec<JoinHandle<DeliveryOutcome>>> {
        let BroadcastRequest { message: value } = request.body.decode()?;
        let identity = transport.identity()?;

        // contains() keeps the common duplicate case on the read lock; the
        // insert result settles races between concurrent first sightings
        let deliveries = if self.store.contains(value) || !self.store.insert(value) {
            debug!(
                "[{}] Already have {}, not forwarding (from {})",
                identity.node_id, value, request.src
            );
            Vec::new()
        } else {
            debug!(
                "[{}] Accepted {} from {}, forwarding",
                identity.node_id, value, request.src
            );
            self.fan_out(Arc::clone(&transport), &identity, &request.src, value)
        };

        // Only requests that carry a msg_id expect an answer
        if request.body.msg_id.is_some() {
            transport.reply(request, Body::new(BROADCAST_OK))?;
        }
        Ok(deliveries)
    }

    /// Spawn one delivery task per peer, skipping the node we heard it from
    pub fn fan_out(
        &self,
        transport: Arc<dyn RequestSender>,
        identity: &NodeIdentity,
        source: &NodeName,
        value: Value,
    ) -> Vec<JoinHandle<DeliveryOutcome>> {
        let retrier = DeliveryRetrier::new(transport, self.delivery);
        identity
            .peers()
            .filter(|peer| *peer != source)
            .map(|peer| {
                let retrier = retrier.clone();
                let peer = peer.clone();
                tokio::spawn(async move { retrier.deliver(&peer, value).await })
            })
            .collect()
    }

    pub fn on_read(&self, transport: &dyn RequestSender, request: &Message) -> Result<()> {
        let response = ReadResponse {
            messages: self.store.snapshot(),
        };
        transport.reply(request, Body::with_payload(READ_OK, &response)?)
    }

    pub fn on_topology(&self, transport: &dyn RequestSender, request: &Message) -> Result<()> {
        let TopologyRequest { topology } = request.body.decode()?;
        info!(
            "[{}] Received topology covering {} node(s)",
            request.dest,
            topology.len()
        );
        self.topology.build(topology);
        transport.reply(request, Body::new(TOPOLOGY_OK))
    }
}

#[async_trait]
impl Handler for ReplicationController {
    fn kinds(&self) -> &'static [&'static str] {
        &[INIT, BROADCAST, READ, TOPOLOGY]
    }

    async fn handle(&self, transport: Arc<dyn RequestSender>, request: &Message) -> Result<()> {
        match request.body.kind.as_str() {
            INIT => self.start_catch_up(transport),
            // Deliveries run detached; nobody waits for them
            BROADCAST => self.on_broadcast(transport, request).await.map(|_| ()),
            READ => self.on_read(&*transport, request),
            TOPOLOGY => self.on_topology(&*transport, request),
            other => Err(RippleError::NotSupported(format!(
                "replication does not handle {}",
                other
            ))),
        }
    }
}
