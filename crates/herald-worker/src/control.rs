//! Worker side of the control channel.
//!
//! Signals go out on stdout, one per line; the supervisor's uptime reply
//! comes back on stdin. Everything else this process prints goes to stderr,
//! so stdout stays clean for the protocol.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout},
    sync::{oneshot, Mutex},
    time::timeout,
};
use tracing::warn;

use herald_core::{control::ControlSignal, errors::Error, ports::ControlPort, Result};

pub struct StdioControlLink {
    out: Mutex<Stdout>,
    pending: Arc<Mutex<Option<oneshot::Sender<f64>>>>,
    reply_timeout: Duration,
}

impl StdioControlLink {
    /// Start the stdin reader and hand back the link.
    pub fn spawn(reply_timeout: Duration) -> Self {
        let pending: Arc<Mutex<Option<oneshot::Sender<f64>>>> = Arc::new(Mutex::new(None));

        let waiters = Arc::clone(&pending);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let Ok(secs) = line.trim().parse::<f64>() else {
                    warn!(%line, "unexpected control reply");
                    continue;
                };
                if let Some(tx) = waiters.lock().await.take() {
                    let _ = tx.send(secs);
                }
            }
        });

        Self {
            out: Mutex::new(stdout()),
            pending,
            reply_timeout,
        }
    }

    async fn send_signal(&self, signal: ControlSignal) -> Result<()> {
        let mut out = self.out.lock().await;
        out.write_all(format!("{signal}\n").as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ControlPort for StdioControlLink {
    async fn supervisor_uptime(&self) -> Result<f64> {
        let (tx, rx) = oneshot::channel();
        {
            let mut slot = self.pending.lock().await;
            if slot.is_some() {
                return Err(Error::Control("uptime query already in flight".to_string()));
            }
            *slot = Some(tx);
        }

        self.send_signal(ControlSignal::UptimeQuery).await?;

        match timeout(self.reply_timeout, rx).await {
            Ok(Ok(secs)) => Ok(secs),
            Ok(Err(_)) => Err(Error::Control("control channel closed".to_string())),
            Err(_) => {
                self.pending.lock().await.take();
                Err(Error::Control(
                    "timed out waiting for uptime reply".to_string(),
                ))
            }
        }
    }

    async fn request_reset(&self) -> Result<()> {
        self.send_signal(ControlSignal::Reset).await
    }
}
