//! Snapshot building for network transmission

use std::collections::BTreeMap;

use crate::net::protocol::{BattlePlayerInfo, PlayerSnapshot, ServerMsg, TurnEvent};

use super::MatchState;

/// Builds the state messages broadcast to both players
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Monster and health of every player, sent when battle begins
    pub fn battle_start(state: &MatchState) -> ServerMsg {
        let players = state
            .slots()
            .filter_map(|slot| {
                let fighter = slot.fighter.as_ref()?;
                Some((
                    slot.player_id,
                    BattlePlayerInfo {
                        monster: fighter.monster.clone(),
                        health: fighter.health,
                        max_health: fighter.max_health,
                    },
                ))
            })
            .collect();

        ServerMsg::BattleStart { players }
    }

    /// Post-resolution snapshot of a turn
    pub fn game_state(state: &MatchState, turn: u64, events: Vec<TurnEvent>) -> ServerMsg {
        let players: BTreeMap<_, _> = state
            .slots()
            .filter_map(|slot| {
                let fighter = slot.fighter.as_ref()?;
                Some((
                    slot.player_id,
                    PlayerSnapshot {
                        health: fighter.health,
                        max_health: fighter.max_health,
                        shield_active: fighter.shield_active,
                        burn_turns: fighter.burn_turns_remaining,
                        special_used: fighter.special_move_used,
                    },
                ))
            })
            .collect();

        ServerMsg::GameState {
            turn,
            players,
            events,
        }
    }
}
