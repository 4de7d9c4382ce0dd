//! In-process cluster for integration tests.
//!
//! Every node is a real `LineTransport` served over an in-memory duplex pipe.
//! A router task per node reads what the node writes and forwards it: to
//! another node's input, or to the test client waiting on a reply. Links can
//! be cut in both directions to simulate partitions, and every inter-node
//! `broadcast` is counted per directed link.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::io::{split, AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, oneshot};

use ripple::node::{self, NodeName};
use ripple::settings::{DeliverySettings, Settings};
use ripple::transport::{Body, Message};

pub const CLIENT: &str = "c1";

/// Timings short enough for tests over in-memory pipes
pub fn fast_settings() -> Settings {
    Settings {
        delivery: DeliverySettings {
            deadline: Duration::from_secs(3),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(400),
        },
        catch_up_timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

#[derive(Default)]
struct Router {
    inputs: Mutex<HashMap<NodeName, mpsc::UnboundedSender<Message>>>,
    cut: Mutex<HashSet<(NodeName, NodeName)>>,
    broadcasts: Mutex<HashMap<(NodeName, NodeName), usize>>,
    waiting: Mutex<HashMap<u64, oneshot::Sender<Message>>>,
}

impl Router {
    fn route(&self, msg: Message) {
        if msg.dest.is_client() {
            let waiter = msg
                .body
                .in_reply_to
                .and_then(|id| self.waiting.lock().remove(&id));
            if let Some(waiter) = waiter {
                let _ = waiter.send(msg);
            }
            return;
        }

        let link = (msg.src.clone(), msg.dest.clone());
        if self.cut.lock().contains(&link) {
            return;
        }
        if msg.body.kind == "broadcast" {
            *self.broadcasts.lock().entry(link).or_insert(0) += 1;
        }
        // Nodes that have not joined yet drop everything
        if let Some(input) = self.inputs.lock().get(&msg.dest) {
            let _ = input.send(msg);
        }
    }
}

pub struct Cluster {
    router: Arc<Router>,
    settings: Settings,
    next_msg_id: AtomicU64,
}

impl Cluster {
    pub fn new(settings: Settings) -> Self {
        Self {
            router: Arc::new(Router::default()),
            settings,
            next_msg_id: AtomicU64::new(1),
        }
    }

    /// Start nodes `n1..=n<count>` and initialize each with the full membership
    pub async fn start(count: usize, settings: Settings) -> Self {
        let cluster = Self::new(settings);
        let members = Self::names(count);
        for member in &members {
            cluster.add_node(member, &members).await;
        }
        cluster
    }

    pub fn names(count: usize) -> Vec<NodeName> {
        (1..=count).map(|k| NodeName::from(format!("n{}", k))).collect()
    }

    /// Start `name`, wire it into the router, and send it `init`
    pub async fn add_node(&self, name: &NodeName, members: &[NodeName]) {
        let transport = node::build_transport(&self.settings);
        let (ours, theirs) = tokio::io::duplex(256 * 1024);
        let (node_read, node_write) = split(theirs);
        let (from_node, to_node) = split(ours);
        tokio::spawn(transport.run(node_read, node_write));

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        tokio::spawn(feed(input_rx, to_node));
        tokio::spawn(drain(from_node, Arc::clone(&self.router)));
        self.router.inputs.lock().insert(name.clone(), input_tx);

        let reply = self
            .request(
                name,
                "init",
                json!({ "node_id": name, "node_ids": members }),
            )
            .await
            .expect("init was not acknowledged");
        assert_eq!(reply.body.kind, "init_ok");
    }

    /// Send a client request to `node` and wait for the reply
    pub async fn request(
        &self,
        node: &NodeName,
        kind: &str,
        fields: serde_json::Value,
    ) -> Option<Message> {
        let msg_id = self.next_msg_id.fetch_add(1, Ordering::Relaxed);
        let mut body = Body::with_payload(kind, &fields).expect("payload is an object");
        body.msg_id = Some(msg_id);

        let (reply_tx, reply_rx) = oneshot::channel();
        self.router.waiting.lock().insert(msg_id, reply_tx);
        self.router.route(Message {
            src: CLIENT.into(),
            dest: node.clone(),
            body,
        });
        match tokio::time::timeout(Duration::from_secs(5), reply_rx).await {
            Ok(Ok(reply)) => Some(reply),
            _ => {
                self.router.waiting.lock().remove(&msg_id);
                None
            }
        }
    }

    pub async fn broadcast(&self, node: &NodeName, value: i64) {
        let reply = self
            .request(node, "broadcast", json!({ "message": value }))
            .await
            .expect("broadcast was not acknowledged");
        assert_eq!(reply.body.kind, "broadcast_ok");
    }

    /// Sorted values held by `node`
    pub async fn read(&self, node: &NodeName) -> Vec<i64> {
        let reply = self
            .request(node, "read", json!({}))
            .await
            .expect("read was not answered");
        assert_eq!(reply.body.kind, "read_ok");
        let mut values: Vec<i64> = serde_json::from_value(reply.body.fields["messages"].clone())
            .expect("messages is a list of integers");
        values.sort_unstable();
        values
    }

    /// Poll until every node in `nodes` holds exactly `expected`
    pub async fn wait_for(&self, nodes: &[NodeName], expected: &[i64], within: Duration) -> bool {
        let mut expected = expected.to_vec();
        expected.sort_unstable();
        expected.dedup();

        let deadline = tokio::time::Instant::now() + within;
        loop {
            let mut converged = true;
            for node in nodes {
                if self.read(node).await != expected {
                    converged = false;
                    break;
                }
            }
            if converged {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Drop all traffic between `a` and `b`
    pub fn partition(&self, a: &NodeName, b: &NodeName) {
        let mut cut = self.router.cut.lock();
        cut.insert((a.clone(), b.clone()));
        cut.insert((b.clone(), a.clone()));
    }

    pub fn heal(&self) {
        self.router.cut.lock().clear();
    }

    /// `broadcast` messages sent from `src` to `dest`
    pub fn broadcasts_between(&self, src: &NodeName, dest: &NodeName) -> usize {
        self.router
            .broadcasts
            .lock()
            .get(&(src.clone(), dest.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_broadcasts(&self) -> usize {
        self.router.broadcasts.lock().values().sum()
    }
}

async fn feed(mut input_rx: mpsc::UnboundedReceiver<Message>, mut to_node: WriteHalf<DuplexStream>) {
    while let Some(msg) = input_rx.recv().await {
        let mut line = serde_json::to_vec(&msg).expect("message serializes");
        line.push(b'\n');
        if to_node.write_all(&line).await.is_err() {
            break;
        }
    }
}

async fn drain(from_node: ReadHalf<DuplexStream>, router: Arc<Router>) {
    let mut lines = BufReader::new(from_node).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match serde_json::from_str::<Message>(&line) {
            Ok(msg) => router.route(msg),
            Err(e) => panic!("node wrote an unparseable line {:?}: {}", line, e),
        }
    }
}
