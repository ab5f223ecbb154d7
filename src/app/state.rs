//! Application state shared across connections

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::game::{Catalog, GameMatch, MatchHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_handle: MatchHandle,
    /// Cancelled once the server starts shutting down
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build the state together with the match it talks to.
    ///
    /// The caller spawns `GameMatch::run`.
    pub fn new(config: Config, catalog: Catalog) -> (Self, GameMatch) {
        let config = Arc::new(config);
        let shutdown = CancellationToken::new();

        let (game_match, match_handle) = GameMatch::new(Arc::new(catalog), shutdown.clone());

        let state = Self {
            config,
            match_handle,
            shutdown,
        };
        (state, game_match)
    }
}
