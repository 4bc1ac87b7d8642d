//! Host runtime report, answered by the supervisor over the control channel.

use std::sync::Arc;

use async_trait::async_trait;

use herald_core::{
    dispatch::{CommandHandler, HandlerContext},
    registry::{CommandDescriptor, Matcher, Registry},
    utils::format_duration,
    Result,
};

pub fn register(registry: &mut Registry) -> Result<()> {
    let descriptor = CommandDescriptor::new(
        Matcher::pattern_ci(r"^(runtime|uptime)$")?,
        Arc::new(RuntimeCommand),
    )
    .tags(["info"])
    .help(["runtime"]);
    registry.register("runtime", descriptor);
    Ok(())
}

struct RuntimeCommand;

#[async_trait]
impl CommandHandler for RuntimeCommand {
    async fn handle(&self, ctx: &HandlerContext) -> Result<()> {
        let secs = ctx.control.supervisor_uptime().await?;
        let text = format!("host running for {}", format_duration(secs as u64));
        ctx.chat.send_text(ctx.message.chat, &text).await
    }
}
