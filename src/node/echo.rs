use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::transport::{Body, Handler, Message, RequestSender};

pub const ECHO: &str = "echo";
pub const ECHO_OK: &str = "echo_ok";

/// Answers `echo` with the request's own fields
#[derive(Clone, Debug, Default)]
pub struct EchoService;

impl EchoService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Handler for EchoService {
    fn kinds(&self) -> &'static [&'static str] {
        &[ECHO]
    }

    async fn handle(&self, transport: Arc<dyn RequestSender>, request: &Message) -> Result<()> {
        let mut body = Body::new(ECHO_OK);
        body.fields = request.body.fields.clone();
        transport.reply(request, body)
    }
}
