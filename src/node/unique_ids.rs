//! Cluster-unique identifiers without coordination.
//!
//! An id is the current unix time, the node's number and a per-process
//! counter, so two nodes never collide and one node never repeats itself
//! within a second.
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::NodeName;
use crate::error::Result;
use crate::transport::{Body, Handler, Message, RequestSender};

pub const GENERATE: &str = "generate";
pub const GENERATE_OK: &str = "generate_ok";

const NODE_WIDTH: usize = 10;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateResponse {
    pub id: String,
}

#[derive(Debug)]
pub struct UniqueIdService {
    counter: AtomicU32,
}

impl Default for UniqueIdService {
    fn default() -> Self {
        Self::new()
    }
}

impl UniqueIdService {
    pub fn new() -> Self {
        Self {
            counter: AtomicU32::new(1),
        }
    }

    pub fn generate(&self, node: &NodeName) -> String {
        let seconds = chrono::Utc::now().timestamp() as u32;
        format_id(seconds, node, self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

/// `{seconds:08x}{node:0>10}{count:06}`, node with its `n` prefix dropped
fn format_id(seconds: u32, node: &NodeName, count: u32) -> String {
    let node = node.as_str();
    let node = node.strip_prefix('n').unwrap_or(node);
    let node: String = node.chars().take(NODE_WIDTH).collect();
    format!(
        "{:08x}{:0>width$}{:06}",
        seconds,
        node,
        count,
        width = NODE_WIDTH
    )
}

#[async_trait]
impl Handler for UniqueIdService {
    fn kinds(&self) -> &'static [&'static str] {
        &[GENERATE]
    }

    async fn handle(&self, transport: Arc<dyn RequestSender>, request: &Message) -> Result<()> {
        let identity = transport.identity()?;
        let response = GenerateResponse {
            id: self.generate(&identity.node_id),
        };
        transport.reply(request, Body::with_payload(GENERATE_OK, &response)?)
    }
}
