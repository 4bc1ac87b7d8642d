use std::sync::Arc;

use async_trait::async_trait;

use herald_core::{
    dispatch::{CommandHandler, HandlerContext},
    registry::{CommandDescriptor, Matcher, Registry},
    Result,
};

pub fn register(registry: &mut Registry) -> Result<()> {
    let descriptor = CommandDescriptor::new(
        Matcher::ExactIgnoreCase("ping".to_string()),
        Arc::new(PingCommand),
    )
    .tags(["info"])
    .help(["ping"]);
    registry.register("ping", descriptor);
    Ok(())
}

struct PingCommand;

#[async_trait]
impl CommandHandler for PingCommand {
    async fn handle(&self, ctx: &HandlerContext) -> Result<()> {
        ctx.chat.send_text(ctx.message.chat, "pong").await
    }
}
