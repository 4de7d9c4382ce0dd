//! Line-oriented JSON transport
//!
//! Frames messages one per line over any async reader/writer pair (stdin and
//! stdout in production), correlates replies to outstanding requests, and
//! dispatches inbound messages to registered handlers concurrently.
pub mod line;
pub mod messages;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use line::LineTransport;
pub use messages::{Body, ErrorCode, Message};
pub use traits::{Handler, RequestSender, Sender};
