//! Accept loop

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket};
use tracing::{debug, error, info};

use crate::app::AppState;
use crate::net::handler::handle_connection;

/// Bind the listening socket with address reuse and keepalive enabled
pub fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    // Inherited by accepted sockets
    socket.set_keepalive(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

/// Accept connections until shutdown, one task per connection
pub async fn serve(listener: TcpListener, state: AppState) {
    if let Ok(addr) = listener.local_addr() {
        info!("Server listening on {}", addr);
    }

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                info!("Listener stopped");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
                    }
                    tokio::spawn(handle_connection(stream, peer, state.clone()));
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    // Usually fd exhaustion, give it a moment
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
        }
    }
}
