use async_trait::async_trait;

use crate::{
    domain::{ChatId, InboundMessage},
    Result,
};

/// Port to the external messaging network.
///
/// The TCP gateway is the first implementation; tests use in-memory fakes.
/// The shape is intentionally narrow so other transports can fit behind it.
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Next inbound message, or `None` once the network session ends.
    async fn next_message(&self) -> Result<Option<InboundMessage>>;

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()>;
}

/// Port from a command handler back to the supervising process.
#[async_trait]
pub trait ControlPort: Send + Sync {
    /// The supervisor's elapsed running time, in seconds. Measures the
    /// supervisor, not this worker.
    async fn supervisor_uptime(&self) -> Result<f64>;

    /// Ask the supervisor for a coordinated restart of this worker.
    async fn request_reset(&self) -> Result<()>;
}
