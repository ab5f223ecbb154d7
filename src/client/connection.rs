//! Network client with heartbeat

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_SERVER_ADDR;
use crate::net::codec::JsonLinesCodec;
use crate::net::protocol::{ClientMsg, ServerMsg};
use crate::util::time::unix_secs_f64;

use super::mirror::{ClientMirror, ClientPhase};

/// Client connection settings
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    /// How often an unsolicited ping goes out
    pub heartbeat_interval: Duration,
    pub max_line_length: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 12345))),
            heartbeat_interval: Duration::from_secs(10),
            max_line_length: 8 * 1024,
        }
    }
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to connect: {0}")]
    Connect(#[from] io::Error),

    #[error("Connection to the server is closed")]
    Disconnected,

    #[error("{action} is not allowed in phase {phase:?}")]
    NotAllowed {
        action: &'static str,
        phase: ClientPhase,
    },
}

/// A connected player
///
/// Every server message is applied to the mirror before it is handed to
/// [`BattleClient::recv`], so the mirror is never behind what the caller saw.
pub struct BattleClient {
    outbound: mpsc::UnboundedSender<ClientMsg>,
    inbound: mpsc::UnboundedReceiver<ServerMsg>,
    mirror: Arc<Mutex<ClientMirror>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl BattleClient {
    /// Connect and start the reader, writer and heartbeat tasks
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(config.server_addr).await?;
        stream.set_nodelay(true)?;
        info!(server = %config.server_addr, "Connected to battle server");

        let (read_half, write_half) = stream.into_split();
        let reader = FramedRead::new(
            read_half,
            JsonLinesCodec::<ServerMsg>::new(config.max_line_length),
        );
        let writer = FramedWrite::new(
            write_half,
            JsonLinesCodec::<ClientMsg>::new(config.max_line_length),
        );

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let mirror = Arc::new(Mutex::new(ClientMirror::new()));
        let cancel = CancellationToken::new();

        let tasks = vec![
            tokio::spawn(read_loop(
                reader,
                mirror.clone(),
                inbound_tx,
                outbound_tx.clone(),
                cancel.clone(),
            )),
            tokio::spawn(write_loop(writer, outbound_rx, cancel.clone())),
            tokio::spawn(heartbeat(
                config.heartbeat_interval,
                outbound_tx.clone(),
                cancel.clone(),
            )),
        ];

        Ok(Self {
            outbound: outbound_tx,
            inbound,
            mirror,
            cancel,
            tasks,
        })
    }

    /// Pick a monster, only during selection
    pub fn select_monster(&self, monster: &str) -> Result<(), ClientError> {
        {
            let mirror = self.mirror.lock();
            if !mirror.can_select_monster() {
                return Err(ClientError::NotAllowed {
                    action: "monster selection",
                    phase: mirror.phase,
                });
            }
        }
        self.send(ClientMsg::MonsterSelection {
            monster: monster.to_string(),
        })
    }

    /// Pick a move for the current turn, once per turn
    pub fn select_move(&self, ability: &str) -> Result<(), ClientError> {
        {
            let mut mirror = self.mirror.lock();
            if !mirror.can_select_move() {
                return Err(ClientError::NotAllowed {
                    action: "move selection",
                    phase: mirror.phase,
                });
            }
            mirror.awaiting_move = false;
        }
        self.send(ClientMsg::MoveSelection {
            ability: ability.to_string(),
        })
    }

    /// Queue any message, bypassing phase checks
    pub fn send(&self, msg: ClientMsg) -> Result<(), ClientError> {
        self.outbound.send(msg).map_err(|_| ClientError::Disconnected)
    }

    /// Next server message, `None` once the connection is gone
    pub async fn recv(&mut self) -> Option<ServerMsg> {
        self.inbound.recv().await
    }

    /// Copy of the current mirror
    pub fn mirror(&self) -> ClientMirror {
        self.mirror.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop all tasks and close the socket
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                debug!(error = %e, "Client task ended abnormally");
            }
        }
    }
}

impl Drop for BattleClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn read_loop(
    mut reader: FramedRead<tokio::net::tcp::OwnedReadHalf, JsonLinesCodec<ServerMsg>>,
    mirror: Arc<Mutex<ClientMirror>>,
    inbound: mpsc::UnboundedSender<ServerMsg>,
    outbound: mpsc::UnboundedSender<ClientMsg>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = reader.next() => frame,
        };

        let msg = match frame {
            Some(Ok(Ok(msg))) => msg,
            Some(Ok(Err(e))) => {
                warn!(error = %e, "Failed to parse server message");
                continue;
            }
            Some(Err(e)) => {
                warn!(error = %e, "Connection error");
                break;
            }
            None => {
                info!("Server closed the connection");
                break;
            }
        };

        mirror.lock().apply(&msg);

        let reply = match &msg {
            ServerMsg::Ping => Some(ClientMsg::Pong),
            ServerMsg::PlayerId { player_id, .. } => {
                info!(player_id = %player_id, "Assigned player id");
                Some(ClientMsg::PlayerJoin {
                    timestamp: Some(unix_secs_f64()),
                })
            }
            _ => None,
        };
        if let Some(reply) = reply {
            if outbound.send(reply).is_err() {
                break;
            }
        }

        // The caller may not be listening; the mirror is still current
        let _ = inbound.send(msg);
    }

    cancel.cancel();
}

async fn write_loop(
    mut writer: FramedWrite<tokio::net::tcp::OwnedWriteHalf, JsonLinesCodec<ClientMsg>>,
    mut outbound: mpsc::UnboundedReceiver<ClientMsg>,
    cancel: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = outbound.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        if let Err(e) = writer.send(msg).await {
            warn!(error = %e, "Send failed");
            break;
        }
    }

    cancel.cancel();
}

async fn heartbeat(
    interval: Duration,
    outbound: mpsc::UnboundedSender<ClientMsg>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if outbound.send(ClientMsg::Ping).is_err() {
                    break;
                }
            }
        }
    }
}
