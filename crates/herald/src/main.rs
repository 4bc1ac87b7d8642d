use std::sync::Arc;

use herald_core::{config::Config, supervisor::Supervisor};

#[tokio::main]
async fn main() -> Result<(), herald_core::Error> {
    herald_core::logging::init("herald")?;

    let cfg = Arc::new(Config::load()?);
    let forward_args: Vec<String> = std::env::args().skip(1).collect();

    tracing::info!(worker = %cfg.worker_path.display(), "herald starting");

    let supervisor = Supervisor::new(cfg, forward_args);
    if let Err(e) = supervisor.start().await {
        // Failures before the first launch are fatal; retries only ever
        // apply to the worker.
        tracing::error!("startup failed: {e}");
        return Err(e);
    }

    supervisor.wait_stopped().await;
    Ok(())
}
