//! Local mirror of the server's broadcasts

use std::collections::BTreeMap;

use crate::game::{Catalog, PlayerId};
use crate::net::protocol::{RejectReason, ServerMsg, TurnEvent};

/// Phase as seen by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// No identity yet
    Connecting,
    /// Identity received, opponent not there yet
    Waiting,
    Selection,
    Battle,
    Finished,
}

/// What a client knows about one player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub monster: String,
    pub health: i32,
    pub max_health: i32,
    pub shield_active: bool,
    pub burn_turns: u32,
    pub special_used: bool,
}

/// Client state, updated only from server messages
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMirror {
    pub player_id: Option<PlayerId>,
    pub phase: ClientPhase,
    /// Turn the players are choosing moves for
    pub turn: u64,
    pub players: BTreeMap<PlayerId, PlayerView>,
    /// A move may be submitted for the current turn
    pub awaiting_move: bool,
    pub winner: Option<PlayerId>,
    pub winner_monster: Option<String>,
    /// Events of the most recently resolved turn
    pub last_events: Vec<TurnEvent>,
    pub peer_disconnected: Option<PlayerId>,
    pub rejected: Option<RejectReason>,
}

impl ClientMirror {
    pub fn new() -> Self {
        Self {
            player_id: None,
            phase: ClientPhase::Connecting,
            turn: 0,
            players: BTreeMap::new(),
            awaiting_move: false,
            winner: None,
            winner_monster: None,
            last_events: Vec::new(),
            peer_disconnected: None,
            rejected: None,
        }
    }

    /// Fold one server message into the mirror
    pub fn apply(&mut self, msg: &ServerMsg) {
        match msg {
            ServerMsg::PlayerId { player_id, .. } => {
                self.player_id = Some(*player_id);
                self.phase = ClientPhase::Waiting;
            }
            ServerMsg::GameStart { .. } => {
                self.phase = ClientPhase::Selection;
            }
            ServerMsg::BattleStart { players } => {
                self.players = players
                    .iter()
                    .map(|(id, info)| {
                        let view = PlayerView {
                            monster: info.monster.clone(),
                            health: info.health,
                            max_health: info.max_health,
                            shield_active: false,
                            burn_turns: 0,
                            special_used: false,
                        };
                        (*id, view)
                    })
                    .collect();
                self.phase = ClientPhase::Battle;
                self.turn = 1;
                self.awaiting_move = true;
            }
            ServerMsg::GameState {
                turn,
                players,
                events,
            } => {
                for (id, snapshot) in players {
                    if let Some(view) = self.players.get_mut(id) {
                        view.health = snapshot.health;
                        view.max_health = snapshot.max_health;
                        view.shield_active = snapshot.shield_active;
                        view.burn_turns = snapshot.burn_turns;
                        view.special_used = snapshot.special_used;
                    }
                }
                self.turn = turn + 1;
                self.last_events = events.clone();
                self.awaiting_move = self.peer_disconnected.is_none();
            }
            ServerMsg::BattleEnd {
                winner,
                winner_monster,
            } => {
                self.phase = ClientPhase::Finished;
                self.winner = Some(*winner);
                self.winner_monster = Some(winner_monster.clone());
                self.awaiting_move = false;
            }
            ServerMsg::PlayerDisconnected { player_id } => {
                self.peer_disconnected = Some(*player_id);
                self.awaiting_move = false;
            }
            ServerMsg::ConnectionRejected { reason } => {
                self.rejected = Some(*reason);
            }
            ServerMsg::Ping | ServerMsg::Pong => {}
        }
    }

    pub fn me(&self) -> Option<&PlayerView> {
        self.players.get(&self.player_id?)
    }

    pub fn opponent(&self) -> Option<&PlayerView> {
        self.players.get(&self.player_id?.opponent())
    }

    pub fn can_select_monster(&self) -> bool {
        self.phase == ClientPhase::Selection
    }

    pub fn can_select_move(&self) -> bool {
        self.phase == ClientPhase::Battle && self.awaiting_move
    }

    /// Moves offered for this player's monster, without a spent special
    pub fn available_moves(&self, catalog: &Catalog) -> Vec<String> {
        let Some(me) = self.me() else {
            return Vec::new();
        };
        let Some(entry) = catalog.monster(&me.monster) else {
            return Vec::new();
        };

        catalog
            .moveset(entry.element)
            .iter()
            .filter(|name| {
                !(me.special_used
                    && catalog
                        .ability(name.as_str())
                        .is_some_and(|ability| ability.is_special()))
            })
            .cloned()
            .collect()
    }
}

impl Default for ClientMirror {
    fn default() -> Self {
        Self::new()
    }
}
