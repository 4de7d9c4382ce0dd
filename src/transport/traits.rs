//! Transport traits for the handler/transport seam
//!
//! Handlers only ever see a `RequestSender`, so the replication logic runs
//! unchanged against the stdio transport or an in-memory test double.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::messages::{Body, Message};
use crate::error::Result;
use crate::node::{NodeIdentity, NodeName};

/// Trait for sending messages without waiting for an answer
pub trait Sender: Send + Sync {
    /// Identity supplied by `init`; `NotInitialized` before that
    fn identity(&self) -> Result<NodeIdentity>;

    /// Send a body to `dest` without expecting a reply
    fn send(&self, dest: &NodeName, body: Body) -> Result<()>;

    /// Answer `request`, correlating on its `msg_id`
    fn reply(&self, request: &Message, body: Body) -> Result<()>;
}

/// Trait for request-response communication with peers
#[async_trait]
pub trait RequestSender: Sender {
    /// Send a request to `target` and wait up to `timeout` for the reply.
    ///
    /// An `error` reply is returned as `RippleError::Rpc`; no reply in time
    /// is `RippleError::Timeout`.
    async fn send_request_response(
        &self,
        target: &NodeName,
        body: Body,
        timeout: Duration,
    ) -> Result<Message>;
}

/// Something that answers one or more message types
#[async_trait]
pub trait Handler: Send + Sync {
    /// Message types this handler is registered for
    fn kinds(&self) -> &'static [&'static str];

    /// Handle one inbound message. Errors are sent back to the requester.
    async fn handle(&self, transport: Arc<dyn RequestSender>, request: &Message) -> Result<()>;
}
