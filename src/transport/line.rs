//! Newline-delimited JSON transport.
//!
//! Reads one message per line, completes pending requests when a reply
//! arrives, and runs every other message on its own task through the handler
//! registered for its type. All output goes through a single writer task so
//! lines are never interleaved.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::messages::{Body, Message, INIT, INIT_OK};
use super::traits::{Handler, RequestSender, Sender};
use crate::error::{Result, RippleError};
use crate::node::{NodeIdentity, NodeName};
use crate::transport_error;

pub struct LineTransport {
    identity: OnceLock<NodeIdentity>,
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    next_msg_id: AtomicU64,
    // msg_id of an outstanding request -> waiter for its reply
    pending: Mutex<HashMap<u64, oneshot::Sender<Message>>>,
    outbox_tx: mpsc::UnboundedSender<Message>,
    outbox_rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
}

impl std::fmt::Debug for LineTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineTransport")
            .field("identity", &self.identity.get())
            .field("handlers", &self.handlers.read().len())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl LineTransport {
    pub fn new() -> Arc<Self> {
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            identity: OnceLock::new(),
            handlers: RwLock::new(HashMap::new()),
            next_msg_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            outbox_tx,
            outbox_rx: Mutex::new(Some(outbox_rx)),
        })
    }

    /// Register `handler` for every message type it declares
    pub fn register(&self, handler: Arc<dyn Handler>) {
        let mut handlers = self.handlers.write();
        for kind in handler.kinds() {
            if handlers.insert(kind.to_string(), Arc::clone(&handler)).is_some() {
                warn!("Replacing existing handler for message type {}", kind);
            }
        }
    }

    /// Our own name, or an empty name before `init`
    pub fn local_name(&self) -> NodeName {
        self.identity
            .get()
            .map(|identity| identity.node_id.clone())
            .unwrap_or_default()
    }

    /// Number of requests still waiting for a reply
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }

    /// Serve messages from `reader`, writing everything we send to `writer`.
    ///
    /// Returns when `reader` reaches end of input. Tasks spawned for handlers
    /// and deliveries are not awaited.
    pub async fn run<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let outbox_rx = self
            .outbox_rx
            .lock()
            .take()
            .ok_or_else(|| transport_error!("transport is already running"))?;
        tokio::spawn(write_loop(outbox_rx, writer));

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(msg) => self.dispatch(msg),
                Err(e) => warn!("[{}] Dropping unparseable line: {}", self.local_name(), e),
            }
        }

        info!("[{}] Input closed, transport stopping", self.local_name());
        Ok(())
    }

    fn dispatch(self: &Arc<Self>, msg: Message) {
        if let Some(in_reply_to) = msg.body.in_reply_to {
            let waiter = self.pending.lock().remove(&in_reply_to);
            match waiter {
                Some(waiter) => {
                    // The requester may have timed out in the meantime
                    let _ = waiter.send(msg);
                }
                None => debug!(
                    "[{}] Dropping {} from {} for unknown request {}",
                    self.local_name(),
                    msg.body.kind,
                    msg.src,
                    in_reply_to
                ),
            }
            return;
        }

        // Identity must be in place before any later message is handled
        if msg.body.kind == INIT {
            if let Err(e) = self.initialize(&msg) {
                self.fail(&msg, e);
                return;
            }
        }

        let transport = Arc::clone(self);
        tokio::spawn(async move {
            transport.handle_message(msg).await;
        });
    }

    fn initialize(&self, msg: &Message) -> Result<()> {
        let identity: NodeIdentity = msg.body.decode()?;
        info!(
            "[{}] Initialized in cluster of {} nodes: {:?}",
            identity.node_id,
            identity.node_ids.len(),
            identity.node_ids
        );
        self.identity
            .set(identity)
            .map_err(|_| transport_error!("init received more than once"))
    }

    async fn handle_message(self: Arc<Self>, msg: Message) {
        let handler = self.handlers.read().get(&msg.body.kind).cloned();
        let transport: Arc<dyn RequestSender> = self.clone();
        let result = match handler {
            Some(handler) => handler.handle(transport, &msg).await,
            None if msg.body.kind == INIT => Ok(()),
            None => Err(RippleError::NotSupported(format!(
                "no handler for message type {}",
                msg.body.kind
            ))),
        };

        match result {
            Ok(()) if msg.body.kind == INIT => {
                if let Err(e) = self.reply(&msg, Body::new(INIT_OK)) {
                    error!("[{}] Failed to acknowledge init: {}", self.local_name(), e);
                }
            }
            Ok(()) => {}
            Err(e) => self.fail(&msg, e),
        }
    }

    /// Log a handler failure and report it to the requester if it expects a reply
    fn fail(&self, msg: &Message, err: RippleError) {
        warn!(
            "[{}] Failed handling {} from {}: {}",
            self.local_name(),
            msg.body.kind,
            msg.src,
            err
        );
        if msg.body.msg_id.is_none() {
            return;
        }
        if let Err(e) = self.reply(msg, Body::error(err.error_code(), err.to_string())) {
            error!("[{}] Failed to send error reply: {}", self.local_name(), e);
        }
    }
}

async fn write_loop<W>(mut outbox_rx: mpsc::UnboundedReceiver<Message>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = outbox_rx.recv().await {
        let mut line = match serde_json::to_vec(&msg) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize {} to {}: {}", msg.body.kind, msg.dest, e);
                continue;
            }
        };
        line.push(b'\n');
        if let Err(e) = writer.write_all(&line).await {
            error!("Output closed, stopping writer: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            error!("Output flush failed, stopping writer: {}", e);
            break;
        }
    }
}

impl Sender for LineTransport {
    fn identity(&self) -> Result<NodeIdentity> {
        self.identity
            .get()
            .cloned()
            .ok_or(RippleError::NotInitialized)
    }

    fn send(&self, dest: &NodeName, body: Body) -> Result<()> {
        let msg = Message {
            src: self.local_name(),
            dest: dest.clone(),
            body,
        };
        self.outbox_tx
            .send(msg)
            .map_err(|_| transport_error!("outbox closed"))
    }

    fn reply(&self, request: &Message, mut body: Body) -> Result<()> {
        body.in_reply_to = request.body.msg_id;
        self.send(&request.src, body)
    }
}

#[async_trait]
impl RequestSender for LineTransport {
    async fn send_request_response(
        &self,
        target: &NodeName,
        mut body: Body,
        timeout: Duration,
    ) -> Result<Message> {
        let msg_id = self.next_msg_id.fetch_add(1, Ordering::Relaxed);
        body.msg_id = Some(msg_id);

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(msg_id, reply_tx);
        if let Err(e) = self.send(target, body) {
            self.pending.lock().remove(&msg_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) if reply.body.is_error() => Err(reply.body.to_rpc_error()),
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(transport_error!("reply channel for msg {} closed", msg_id)),
            Err(_) => {
                self.pending.lock().remove(&msg_id);
                Err(RippleError::Timeout(format!(
                    "no reply from {} to msg {} within {}ms",
                    target,
                    msg_id,
                    timeout.as_millis()
                )))
            }
        }
    }
}
