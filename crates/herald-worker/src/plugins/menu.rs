//! Command overview, grouped by tag.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tracing::warn;

use herald_core::{
    dispatch::{CommandHandler, HandlerContext},
    registry::{CommandDescriptor, Matcher, Registry},
    utils::format_duration,
    Result,
};

pub fn register(registry: &mut Registry) -> Result<()> {
    let descriptor = CommandDescriptor::new(
        Matcher::pattern_ci(r"^(menu|help|cmd)$")?,
        Arc::new(MenuCommand),
    )
    .tags(["info"])
    .help(["menu"]);
    registry.register("menu", descriptor);
    Ok(())
}

struct MenuCommand;

#[async_trait]
impl CommandHandler for MenuCommand {
    async fn handle(&self, ctx: &HandlerContext) -> Result<()> {
        let text = render_menu(ctx).await;
        ctx.chat.send_text(ctx.message.chat, &text).await
    }
}

async fn render_menu(ctx: &HandlerContext) -> String {
    let now = Local::now();
    let mut lines = vec![
        format!("@{}", ctx.message.sender),
        format!("date: {}", now.format("%A %d/%m/%Y")),
    ];

    match ctx.control.supervisor_uptime().await {
        Ok(secs) => lines.push(format!("runtime: {}", format_duration(secs as u64))),
        Err(e) => warn!("menu could not fetch uptime: {e}"),
    }

    let mut sections: Vec<_> = ctx.registry.aggregate_by_tag().into_iter().collect();
    sections.sort_by(|a, b| a.0.cmp(&b.0));

    for (tag, mut entries) in sections {
        entries.sort();
        lines.push(String::new());
        lines.push(format!("〔 {} 〕", tag.to_uppercase()));
        for entry in entries {
            lines.push(format!("  {}{entry}", ctx.prefix));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{
        domain::{ChatId, InboundMessage},
        ports::{ChatPort, ControlPort},
    };
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct SinkChat {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatPort for SinkChat {
        async fn next_message(&self) -> Result<Option<InboundMessage>> {
            Ok(None)
        }

        async fn send_text(&self, _chat: ChatId, text: &str) -> Result<()> {
            self.sent.lock().await.push(text.to_string());
            Ok(())
        }
    }

    struct FixedControl;

    #[async_trait]
    impl ControlPort for FixedControl {
        async fn supervisor_uptime(&self) -> Result<f64> {
            Ok(65.2)
        }

        async fn request_reset(&self) -> Result<()> {
            Ok(())
        }
    }

    fn ctx(registry: Registry) -> HandlerContext {
        HandlerContext {
            message: InboundMessage {
                chat: ChatId(1),
                sender: "ana".to_string(),
                text: ".menu".to_string(),
            },
            body: "menu".to_string(),
            prefix: ".".to_string(),
            registry: Arc::new(registry),
            chat: Arc::new(SinkChat::default()),
            control: Arc::new(FixedControl),
        }
    }

    #[tokio::test]
    async fn menu_sorts_tags_and_entries_and_dedups() {
        let mut registry = Registry::new();
        register(&mut registry).unwrap();
        // Second descriptor sharing the "menu" help entry under the same tag.
        registry.register(
            "extra",
            CommandDescriptor::new(Matcher::Exact("zz".into()), Arc::new(MenuCommand))
                .tags(["info", "tools"])
                .help(["menu", "alpha"]),
        );

        let text = render_menu(&ctx(registry)).await;

        assert!(text.contains("runtime: 1m 5s"));
        assert!(text.contains("〔 INFO 〕"));
        assert!(text.contains("〔 TOOLS 〕"));
        assert_eq!(text.matches("  .menu").count(), 2, "once per tag section");

        // Entries under a tag are alphabetical.
        let info_at = text.find("〔 INFO 〕").unwrap();
        let alpha_at = text[info_at..].find(".alpha").unwrap();
        let menu_at = text[info_at..].find(".menu").unwrap();
        assert!(alpha_at < menu_at);
    }
}
