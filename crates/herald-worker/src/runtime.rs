//! Worker runtime: pumps inbound network messages into the dispatcher.

use std::sync::Arc;

use tracing::{debug, info};

use herald_core::{
    config::Config,
    dispatch::{command_body, Dispatcher, HandlerContext},
    ports::{ChatPort, ControlPort},
    registry::Registry,
    Result,
};

pub struct WorkerRuntime {
    cfg: Arc<Config>,
    registry: Arc<Registry>,
    chat: Arc<dyn ChatPort>,
    control: Arc<dyn ControlPort>,
    dispatcher: Dispatcher,
}

impl WorkerRuntime {
    pub fn new(
        cfg: Arc<Config>,
        registry: Arc<Registry>,
        chat: Arc<dyn ChatPort>,
        control: Arc<dyn ControlPort>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&registry));
        Self {
            cfg,
            registry,
            chat,
            control,
            dispatcher,
        }
    }

    /// Pump until the network session ends. A clean end-of-stream is a
    /// deliberate stop (exit 0); stream errors bubble up as a crash so the
    /// supervisor relaunches us.
    pub async fn run(&self) -> Result<()> {
        while let Some(message) = self.chat.next_message().await? {
            let ctx = HandlerContext {
                body: command_body(&message.text, &self.cfg.command_prefix),
                message,
                prefix: self.cfg.command_prefix.clone(),
                registry: Arc::clone(&self.registry),
                chat: Arc::clone(&self.chat),
                control: Arc::clone(&self.control),
            };

            let fired = self.dispatcher.dispatch(&ctx).len();
            if fired > 0 {
                debug!(chat = ctx.message.chat.0, fired, body = %ctx.body, "dispatched");
            }
        }

        info!("network session ended");
        Ok(())
    }
}
