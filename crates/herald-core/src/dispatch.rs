//! Message-to-handler routing.
//!
//! Every enabled descriptor whose matcher accepts the message body fires,
//! each on its own task; descriptors are not mutually exclusive at this
//! layer. That multi-fire behavior is a first-class contract, not an
//! accident — menu-style plugins keep their patterns disjoint in practice.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::{
    domain::InboundMessage,
    ports::{ChatPort, ControlPort},
    registry::Registry,
    Result,
};

/// Everything a command handler can reach: the message, the registry it was
/// matched from, and the ports back out to the chat network and the
/// supervisor.
#[derive(Clone)]
pub struct HandlerContext {
    pub message: InboundMessage,
    /// Trimmed message text with the command prefix stripped.
    pub body: String,
    pub prefix: String,
    pub registry: Arc<Registry>,
    pub chat: Arc<dyn ChatPort>,
    pub control: Arc<dyn ControlPort>,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext) -> Result<()>;
}

pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Route one inbound message.
    ///
    /// Handler failures are isolated: an error is logged and reported back
    /// into the chat when feasible, and a panic dies with its own task.
    /// Dispatch never awaits handler completion, so one slow or broken
    /// handler cannot block later messages; the returned handles exist for
    /// callers that want to join (tests).
    pub fn dispatch(&self, ctx: &HandlerContext) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        for (key, desc) in self.registry.enabled() {
            if !desc.matcher.matches(&ctx.body) {
                continue;
            }

            let handler = Arc::clone(&desc.handler);
            let ctx = ctx.clone();
            let key = key.to_string();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = handler.handle(&ctx).await {
                    warn!("command {key} failed: {e}");
                    let note = format!("command failed: {e}");
                    if let Err(send_err) = ctx.chat.send_text(ctx.message.chat, &note).await {
                        warn!("could not report {key} failure to chat: {send_err}");
                    }
                }
            }));
        }
        tasks
    }
}

/// Strip the command prefix (when present) and trim.
pub fn command_body(text: &str, prefix: &str) -> String {
    let t = text.trim();
    let t = if !prefix.is_empty() {
        t.strip_prefix(prefix).unwrap_or(t)
    } else {
        t
    };
    t.trim().to_string()
}
