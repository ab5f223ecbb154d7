//! Monster Battle Server - authoritative sync server for two-player battles
//!
//! One match per process. Connections speak newline-delimited JSON over TCP;
//! a single match task owns all game state and resolves turns.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod net;
pub mod util;
