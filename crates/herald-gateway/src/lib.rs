//! Messaging-gateway adapter.
//!
//! Implements the core `ChatPort` over a newline-delimited JSON connection to
//! the external gateway that owns the real network session. Pairing and
//! session-token persistence happen here, at the boundary; the core only ever
//! asks whether the credential artifact exists.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::Mutex,
};
use tracing::{info, warn};

use herald_core::{
    domain::{ChatId, InboundMessage},
    errors::Error,
    ports::ChatPort,
    Result,
};

/// How this client introduces itself to the gateway.
#[derive(Clone, Debug)]
pub enum Login {
    /// Resume with the stored session token.
    Resume,
    /// First-time pairing by phone number.
    Pair { phone: String, method: String },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame<'a> {
    Resume { token: &'a str },
    Pair { phone: &'a str, method: &'a str },
    Send { chat: i64, text: &'a str },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Ready {
        #[serde(default)]
        session: Option<String>,
    },
    PairingCode {
        code: String,
    },
    Message {
        chat: i64,
        sender: String,
        text: String,
    },
    #[serde(other)]
    Unknown,
}

pub struct GatewayClient {
    session_file: PathBuf,
    reader: Mutex<Lines<BufReader<OwnedReadHalf>>>,
    writer: Mutex<OwnedWriteHalf>,
}

impl GatewayClient {
    /// Connect and authenticate. Resolves once the gateway reports `ready`.
    pub async fn connect(addr: &str, session_file: &Path, login: Login) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::External(format!("gateway connect {addr}: {e}")))?;
        let (read_half, write_half) = stream.into_split();

        let client = Self {
            session_file: session_file.to_path_buf(),
            reader: Mutex::new(BufReader::new(read_half).lines()),
            writer: Mutex::new(write_half),
        };

        client
            .handshake(login)
            .await
            .map_err(|e| Error::External(format!("gateway handshake: {e:#}")))?;

        Ok(client)
    }

    async fn handshake(&self, login: Login) -> anyhow::Result<()> {
        match login {
            Login::Resume => {
                let token = std::fs::read_to_string(&self.session_file).with_context(|| {
                    format!("reading session token {}", self.session_file.display())
                })?;
                self.write_frame(&ClientFrame::Resume { token: token.trim() })
                    .await?;
            }
            Login::Pair { phone, method } => {
                self.write_frame(&ClientFrame::Pair {
                    phone: &phone,
                    method: &method,
                })
                .await?;
            }
        }

        loop {
            let Some(frame) = self.read_frame().await? else {
                anyhow::bail!("gateway closed before ready");
            };
            match frame {
                ServerFrame::Ready { session } => {
                    if let Some(token) = session {
                        std::fs::write(&self.session_file, token).with_context(|| {
                            format!("persisting session token {}", self.session_file.display())
                        })?;
                        info!("session token stored");
                    }
                    return Ok(());
                }
                ServerFrame::PairingCode { code } => {
                    // Operator action: enter this code on the paired device.
                    info!(%code, "pairing code issued");
                }
                ServerFrame::Message { .. } => {
                    warn!("gateway sent a message before ready, dropping");
                }
                ServerFrame::Unknown => {}
            }
        }
    }

    async fn write_frame(&self, frame: &ClientFrame<'_>) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(frame)?;
        line.push('\n');
        let mut w = self.writer.lock().await;
        w.write_all(line.as_bytes()).await?;
        w.flush().await?;
        Ok(())
    }

    async fn read_frame(&self) -> anyhow::Result<Option<ServerFrame>> {
        let mut r = self.reader.lock().await;
        loop {
            let Some(line) = r.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ServerFrame>(&line) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    warn!("unparseable gateway frame: {e}");
                    continue;
                }
            }
        }
    }
}

#[async_trait]
impl ChatPort for GatewayClient {
    async fn next_message(&self) -> Result<Option<InboundMessage>> {
        loop {
            let frame = self
                .read_frame()
                .await
                .map_err(|e| Error::External(format!("gateway read: {e:#}")))?;
            match frame {
                None => return Ok(None),
                Some(ServerFrame::Message { chat, sender, text }) => {
                    return Ok(Some(InboundMessage {
                        chat: ChatId(chat),
                        sender,
                        text,
                    }));
                }
                Some(ServerFrame::PairingCode { code }) => {
                    info!(%code, "pairing code issued");
                }
                Some(ServerFrame::Ready { .. }) | Some(ServerFrame::Unknown) => {}
            }
        }
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()> {
        self.write_frame(&ClientFrame::Send { chat: chat.0, text })
            .await
            .map_err(|e| Error::External(format!("gateway send: {e:#}")))
    }
}
