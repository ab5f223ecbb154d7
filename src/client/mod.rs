//! Client-side synchronization shim
//!
//! Mirrors exactly what the server broadcasts. Nothing here computes a
//! battle outcome.

pub mod connection;
pub mod mirror;

pub use connection::{BattleClient, ClientConfig, ClientError};
pub use mirror::{ClientMirror, ClientPhase, PlayerView};
