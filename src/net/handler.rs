//! Per-connection session: handshake, reader loop and writer task

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{JoinError, MatchHandle, PlayerId, PlayerInput};
use crate::net::broadcast::{DisconnectReason, PlayerConnection};
use crate::net::codec::JsonLinesCodec;
use crate::net::protocol::{ClientMsg, RejectReason, ServerMsg};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;

type Reader = FramedRead<OwnedReadHalf, JsonLinesCodec<ClientMsg>>;
type Writer = FramedWrite<OwnedWriteHalf, JsonLinesCodec<ServerMsg>>;

/// Drive one accepted connection until it goes away
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, peer = %peer, "New connection");

    let max_line_length = state.config.max_line_length;
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, JsonLinesCodec::new(max_line_length));
    let mut writer: Writer = FramedWrite::new(write_half, JsonLinesCodec::new(max_line_length));

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let cancel = state.shutdown.child_token();
    let connection = PlayerConnection::new(conn_id, outbound_tx.clone(), cancel.clone());

    let player_id = match state.match_handle.join(connection).await {
        Ok(player_id) => player_id,
        Err(e) => {
            let reason = match e {
                JoinError::ServerFull => RejectReason::ServerFull,
                JoinError::MatchInProgress => RejectReason::MatchInProgress,
                JoinError::MatchClosed => {
                    debug!(conn_id = %conn_id, "Match closed, dropping connection");
                    return;
                }
            };
            info!(conn_id = %conn_id, peer = %peer, error = %e, "Connection rejected");
            if let Err(e) = writer.send(ServerMsg::ConnectionRejected { reason }).await {
                debug!(conn_id = %conn_id, error = %e, "Failed to send rejection");
            }
            return;
        }
    };

    // Identity goes out before anything the match might queue for this player
    let identity = ServerMsg::PlayerId {
        player_id,
        status: "connected".to_string(),
    };
    if let Err(e) = writer.send(identity).await {
        error!(player_id = %player_id, error = %e, "Failed to send player id");
        state
            .match_handle
            .disconnect(player_id, conn_id, DisconnectReason::HandshakeFailed)
            .await;
        return;
    }

    if state.match_handle.confirm(player_id, conn_id).await.is_err() {
        debug!(player_id = %player_id, "Match closed before confirmation");
        return;
    }

    let writer_handle = tokio::spawn(write_loop(
        player_id,
        conn_id,
        writer,
        outbound_rx,
        cancel.clone(),
        state.match_handle.clone(),
    ));

    let reason = read_loop(player_id, &mut reader, &outbound_tx, &state, &cancel).await;

    // Signal disconnect to match loop
    state.match_handle.disconnect(player_id, conn_id, reason).await;
    cancel.cancel();
    writer_handle.abort();

    info!(player_id = %player_id, conn_id = %conn_id, reason = %reason, "Connection closed");
}

/// Reader loop: socket -> match, with heartbeat on silence
async fn read_loop(
    player_id: PlayerId,
    reader: &mut Reader,
    outbound: &mpsc::UnboundedSender<ServerMsg>,
    state: &AppState,
    cancel: &CancellationToken,
) -> DisconnectReason {
    let rate_limiter = PlayerRateLimiter::new(state.config.input_rate_limit);
    let read_timeout = state.config.read_timeout;
    let max_missed_pings = state.config.max_missed_pings;
    let mut missed_pings = 0u32;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return DisconnectReason::Cancelled,
            next = timeout(read_timeout, reader.next()) => next,
        };

        let frame = match next {
            Err(_) => {
                missed_pings += 1;
                if missed_pings > max_missed_pings {
                    warn!(player_id = %player_id, missed_pings, "Peer stopped answering");
                    return DisconnectReason::TimedOut;
                }
                debug!(player_id = %player_id, missed_pings, "Read timeout, sending ping");
                if outbound.send(ServerMsg::Ping).is_err() {
                    return DisconnectReason::SendFailed;
                }
                continue;
            }
            Ok(None) => return DisconnectReason::Closed,
            Ok(Some(Err(e))) => {
                warn!(player_id = %player_id, error = %e, "Transport error");
                return DisconnectReason::TransportError;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        // Any line, even a bad one, proves the peer is alive
        missed_pings = 0;

        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                continue;
            }
        };

        if !rate_limiter.check_input() {
            warn!(player_id = %player_id, "Rate limited input message");
            continue;
        }

        match msg {
            ClientMsg::PlayerJoin { timestamp } => {
                info!(player_id = %player_id, client_time = ?timestamp, "Player join confirmed");
            }
            ClientMsg::Ping => {
                if outbound.send(ServerMsg::Pong).is_err() {
                    return DisconnectReason::SendFailed;
                }
            }
            ClientMsg::Pong => {
                debug!(player_id = %player_id, "Received pong");
            }
            msg => {
                let input = PlayerInput {
                    player_id,
                    msg,
                    received_at: unix_millis(),
                };
                if state.match_handle.submit(input).await.is_err() {
                    debug!(player_id = %player_id, "Match closed");
                    return DisconnectReason::Cancelled;
                }
            }
        }
    }
}

/// Writer task: outbound queue -> socket
async fn write_loop(
    player_id: PlayerId,
    conn_id: Uuid,
    mut writer: Writer,
    mut outbound: mpsc::UnboundedReceiver<ServerMsg>,
    cancel: CancellationToken,
    match_handle: MatchHandle,
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
            debug!(player_id = %player_id, error = %e, "Socket send failed");
            match_handle
                .disconnect(player_id, conn_id, DisconnectReason::SendFailed)
                .await;
            cancel.cancel();
            break;
        }
    }
}
