//! TCP transport: framing, wire messages and per-connection tasks

pub mod broadcast;
pub mod codec;
pub mod handler;
pub mod listener;
pub mod protocol;

pub use broadcast::{DisconnectReason, PlayerConnection};
pub use codec::{JsonLinesCodec, ProtocolError};
pub use listener::{bind, serve};
pub use protocol::{ClientMsg, ServerMsg};
