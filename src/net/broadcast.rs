//! Outbound delivery to connected players

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::game::PlayerId;
use crate::net::protocol::ServerMsg;

/// Handle to one live connection, held by the match
///
/// Messages go through an unbounded queue to the connection's writer task, so
/// the match never waits on a socket.
#[derive(Debug, Clone)]
pub struct PlayerConnection {
    pub conn_id: Uuid,
    outbound: mpsc::UnboundedSender<ServerMsg>,
    cancel: CancellationToken,
}

impl PlayerConnection {
    pub fn new(
        conn_id: Uuid,
        outbound: mpsc::UnboundedSender<ServerMsg>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            conn_id,
            outbound,
            cancel,
        }
    }

    /// Queue a message for this connection
    pub fn send(&self, msg: ServerMsg) -> Result<(), DeliveryError> {
        if self.cancel.is_cancelled() {
            return Err(DeliveryError::Closed);
        }
        self.outbound.send(msg).map_err(|_| DeliveryError::Closed)
    }

    /// Tear down the connection's reader and writer
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// Send `msg` to every target, returning the players whose delivery failed
pub fn deliver_all<'a, I>(targets: I, msg: &ServerMsg) -> Vec<PlayerId>
where
    I: IntoIterator<Item = (PlayerId, &'a PlayerConnection)>,
{
    targets
        .into_iter()
        .filter_map(|(player_id, conn)| conn.send(msg.clone()).err().map(|_| player_id))
        .collect()
}

/// Outbound delivery errors
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,
}

/// Why a connection went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Peer closed the stream
    Closed,
    /// Reset, abort or other transport failure while reading
    TransportError,
    /// Too many silent heartbeat intervals
    TimedOut,
    /// Writing to the peer failed
    SendFailed,
    /// Identity message could not be delivered
    HandshakeFailed,
    /// Server is shutting down or the match dropped the connection
    Cancelled,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DisconnectReason::Closed => "closed by peer",
            DisconnectReason::TransportError => "transport error",
            DisconnectReason::TimedOut => "heartbeat timeout",
            DisconnectReason::SendFailed => "send failed",
            DisconnectReason::HandshakeFailed => "handshake failed",
            DisconnectReason::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}
