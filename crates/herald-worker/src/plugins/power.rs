//! Owner command: coordinated restart through the supervisor.

use std::sync::Arc;

use async_trait::async_trait;

use herald_core::{
    dispatch::{CommandHandler, HandlerContext},
    registry::{CommandDescriptor, Matcher, Registry},
    Result,
};

pub fn register(registry: &mut Registry) -> Result<()> {
    let descriptor = CommandDescriptor::new(
        Matcher::pattern_ci(r"^(restart|reset)$")?,
        Arc::new(RestartCommand),
    )
    .tags(["owner"])
    .help(["restart"]);
    registry.register("restart", descriptor);
    Ok(())
}

struct RestartCommand;

#[async_trait]
impl CommandHandler for RestartCommand {
    async fn handle(&self, ctx: &HandlerContext) -> Result<()> {
        // Acknowledge first: the reset tears this whole process down.
        ctx.chat
            .send_text(ctx.message.chat, "restarting, back in a moment")
            .await?;
        ctx.control.request_reset().await
    }
}
