use std::sync::Arc;

use tracing::info;

pub mod broadcast;
pub mod catch_up;
pub mod echo;
pub mod node_id;
pub mod retrier;
pub mod store;
pub mod topology;
pub mod unique_ids;

use crate::settings::Settings;
use crate::transport::LineTransport;
pub use broadcast::ReplicationController;
pub use catch_up::{CatchUpOutcome, CatchUpSync};
pub use echo::EchoService;
pub use node_id::{NodeIdentity, NodeName};
pub use retrier::{Backoff, DeliveryOutcome, DeliveryRetrier};
pub use store::{MessageStore, Value};
pub use topology::TopologyGraph;
pub use unique_ids::UniqueIdService;

/// Build a transport with every service this node offers registered on it
pub fn build_transport(settings: &Settings) -> Arc<LineTransport> {
    let transport = LineTransport::new();
    transport.register(Arc::new(ReplicationController::new(settings)));
    transport.register(Arc::new(EchoService::new()));
    transport.register(Arc::new(UniqueIdService::new()));
    info!(
        "Node ready: delivery deadline {}ms, backoff {}ms..{}ms, catch-up {}ms",
        settings.delivery.deadline.as_millis(),
        settings.delivery.initial_backoff.as_millis(),
        settings.delivery.max_backoff.as_millis(),
        settings.catch_up_timeout.as_millis()
    );
    transport
}
