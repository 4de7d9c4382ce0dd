//! In-memory transport double for handler tests.
//!
//! Records everything sent and answers requests from a script: peers can be
//! unreachable (requests time out), fail a number of times before
//! acknowledging, or hold a set of values returned from `read`.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use super::messages::{Body, Message};
use super::traits::{RequestSender, Sender};
use crate::error::{Result, RippleError};
use crate::node::{NodeIdentity, NodeName};

#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    identity: Option<NodeIdentity>,
    sent: Mutex<Vec<(NodeName, Body)>>,
    requests: Mutex<Vec<(NodeName, Body)>>,
    attempts: Mutex<HashMap<NodeName, u32>>,
    failures_before_ack: Mutex<HashMap<NodeName, u32>>,
    unreachable: Mutex<HashSet<NodeName>>,
    read_replies: Mutex<HashMap<NodeName, Vec<i64>>>,
}

impl MockTransport {
    pub(crate) fn new(node_id: &str, node_ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            identity: Some(NodeIdentity::new(
                node_id.into(),
                node_ids.iter().map(|id| NodeName::from(*id)).collect(),
            )),
            ..Default::default()
        })
    }

    pub(crate) fn uninitialized() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_first(&self, peer: &str, failures: u32) {
        self.failures_before_ack.lock().insert(peer.into(), failures);
    }

    pub(crate) fn set_unreachable(&self, peer: &str) {
        self.unreachable.lock().insert(peer.into());
    }

    pub(crate) fn set_read_reply(&self, peer: &str, values: &[i64]) {
        self.read_replies.lock().insert(peer.into(), values.to_vec());
    }

    /// Everything sent with `send` or `reply`
    pub(crate) fn sent(&self) -> Vec<(NodeName, Body)> {
        self.sent.lock().clone()
    }

    /// Every request issued, in order
    pub(crate) fn requests(&self) -> Vec<(NodeName, Body)> {
        self.requests.lock().clone()
    }

    pub(crate) fn requests_to(&self, peer: &str) -> usize {
        let peer = NodeName::from(peer);
        self.requests.lock().iter().filter(|(dest, _)| *dest == peer).count()
    }

    fn local_name(&self) -> NodeName {
        self.identity
            .as_ref()
            .map(|identity| identity.node_id.clone())
            .unwrap_or_default()
    }
}

impl Sender for MockTransport {
    fn identity(&self) -> Result<NodeIdentity> {
        self.identity.clone().ok_or(RippleError::NotInitialized)
    }

    fn send(&self, dest: &NodeName, body: Body) -> Result<()> {
        self.sent.lock().push((dest.clone(), body));
        Ok(())
    }

    fn reply(&self, request: &Message, mut body: Body) -> Result<()> {
        body.in_reply_to = request.body.msg_id;
        self.send(&request.src, body)
    }
}

#[async_trait]
impl RequestSender for MockTransport {
    async fn send_request_response(
        &self,
        target: &NodeName,
        body: Body,
        timeout: Duration,
    ) -> Result<Message> {
        self.requests.lock().push((target.clone(), body.clone()));
        let attempt = {
            let mut attempts = self.attempts.lock();
            let count = attempts.entry(target.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let unreachable = self.unreachable.lock().contains(target);
        if unreachable {
            tokio::time::sleep(timeout).await;
            return Err(RippleError::Timeout(format!("{} did not answer", target)));
        }

        let failures = self
            .failures_before_ack
            .lock()
            .get(target)
            .copied()
            .unwrap_or(0);
        if attempt <= failures {
            return Err(RippleError::Rpc {
                code: 11,
                text: "temporarily unavailable".to_string(),
            });
        }

        let mut reply = if body.kind == "read" {
            let values = self.read_replies.lock().get(target).cloned();
            match values {
                Some(values) => Body::with_payload("read_ok", &json!({ "messages": values }))?,
                None => {
                    tokio::time::sleep(timeout).await;
                    return Err(RippleError::Timeout(format!("{} has nothing to read", target)));
                }
            }
        } else {
            Body::new(format!("{}_ok", body.kind))
        };
        reply.in_reply_to = body.msg_id;
        Ok(Message {
            src: target.clone(),
            dest: self.local_name(),
            body: reply,
        })
    }
}
