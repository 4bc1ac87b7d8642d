//! Worker process: holds the live session to the messaging network and runs
//! the command handlers. Launched and supervised by `herald`; talks back to
//! it over the stdio control channel.

use std::sync::Arc;

use herald_core::{config::Config, credentials, ports::ChatPort};
use herald_gateway::{GatewayClient, Login};

mod control;
mod plugins;
mod runtime;

use control::StdioControlLink;
use runtime::WorkerRuntime;

#[tokio::main]
async fn main() -> Result<(), herald_core::Error> {
    herald_core::logging::init("herald-worker")?;

    let cfg = Arc::new(Config::load()?);
    let pairing = parse_pairing_args(std::env::args().skip(1));

    let login = if credentials::has_credential(&cfg.session_file)? {
        Login::Resume
    } else if let Some((phone, method)) = pairing {
        Login::Pair { phone, method }
    } else {
        return Err(herald_core::Error::Config(
            "no session credential and no pairing flags; launch through the supervisor"
                .to_string(),
        ));
    };

    let gateway = GatewayClient::connect(&cfg.gateway_addr, &cfg.session_file, login).await?;
    let chat: Arc<dyn ChatPort> = Arc::new(gateway);
    tracing::info!(gateway = %cfg.gateway_addr, "connected to messaging gateway");

    let registry = Arc::new(plugins::load_all()?);
    tracing::info!(commands = registry.len(), "plugin registry loaded");

    let control = Arc::new(StdioControlLink::spawn(cfg.control_reply_timeout));

    WorkerRuntime::new(cfg, registry, chat, control).run().await
}

/// Pull the synthesized pairing flags back out of the forwarded argv.
/// Unknown arguments are someone else's business and pass through untouched.
fn parse_pairing_args(args: impl Iterator<Item = String>) -> Option<(String, String)> {
    let mut phone = None;
    let mut method = None;
    for arg in args {
        if let Some(v) = arg.strip_prefix("--phone=") {
            phone = Some(v.to_string());
        } else if let Some(v) = arg.strip_prefix("--method=") {
            method = Some(v.to_string());
        }
    }
    Some((phone?, method.unwrap_or_else(|| "code".to_string())))
}
