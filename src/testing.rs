//! Gateway stubs shared by unit tests

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::models::{Completion, Message};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Gateway whose replies come from a closure of (call number, model, conversation)
pub struct StubGateway<F> {
    respond: F,
    calls: AtomicU32,
}

impl<F> StubGateway<F>
where
    F: Fn(u32, &str, &[Message]) -> Result<String, GatewayError> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: AtomicU32::new(0),
        }
    }

    /// Number of calls made so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> Gateway for StubGateway<F>
where
    F: Fn(u32, &str, &[Message]) -> Result<String, GatewayError> + Send + Sync,
{
    async fn complete(&self, model: &str, conversation: &[Message]) -> Result<Completion, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.respond)(call, model, conversation).map(|text| Completion {
            text,
            input_tokens: 10,
            output_tokens: 5,
            latency: Duration::from_millis(20),
        })
    }
}

/// Last user message of a conversation
pub fn last_user_message(conversation: &[Message]) -> &str {
    conversation
        .last()
        .map(|message| message.content.as_str())
        .unwrap_or_default()
}
