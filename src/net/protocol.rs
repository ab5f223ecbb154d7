//! Wire protocol message definitions
//! These are the line-delimited JSON types for client-server communication

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::PlayerId;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Handshake confirmation after the identity assignment
    PlayerJoin {
        /// Client wall clock in seconds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// Monster pick during the selection phase
    MonsterSelection { monster: String },

    /// Ability pick for the current turn
    MoveSelection {
        #[serde(rename = "move")]
        ability: String,
    },

    /// Liveness check
    Ping,

    /// Liveness answer
    Pong,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Identity assignment, first message on every accepted connection
    PlayerId { player_id: PlayerId, status: String },

    /// Both players present, selection begins
    GameStart {
        #[serde(default)]
        message: String,
    },

    /// Both monsters picked, battle begins
    BattleStart {
        players: BTreeMap<PlayerId, BattlePlayerInfo>,
    },

    /// Post-resolution snapshot
    GameState {
        /// The turn that was just resolved
        turn: u64,
        players: BTreeMap<PlayerId, PlayerSnapshot>,
        /// What happened during the turn, in resolution order
        #[serde(default)]
        events: Vec<TurnEvent>,
    },

    /// Terminal outcome
    BattleEnd {
        winner: PlayerId,
        winner_monster: String,
    },

    /// A peer left the match
    PlayerDisconnected { player_id: PlayerId },

    /// Connection refused at accept time
    ConnectionRejected { reason: RejectReason },

    /// Liveness check
    Ping,

    /// Liveness answer
    Pong,
}

/// Why a connection was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Both player slots are taken
    ServerFull,
    /// The match already left the waiting phase
    MatchInProgress,
}

/// Player entry of a battle start message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattlePlayerInfo {
    pub monster: String,
    pub health: i32,
    pub max_health: i32,
}

/// Player entry of a game state snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub health: i32,
    pub max_health: i32,
    pub shield_active: bool,
    pub burn_turns: u32,
    pub special_used: bool,
}

/// Things that happened while resolving a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Burn ticked before any move
    BurnDamage {
        player_id: PlayerId,
        damage: i32,
        turns_left: u32,
    },

    /// Damage landed on the defender
    Hit {
        attacker: PlayerId,
        defender: PlayerId,
        ability: String,
        damage: i32,
    },

    /// The defender's shield sent the damage back to the attacker
    Reflected {
        attacker: PlayerId,
        defender: PlayerId,
        ability: String,
        damage: i32,
    },

    /// A reflect shield went up
    ShieldRaised { player_id: PlayerId },

    /// Health restored
    Healed { player_id: PlayerId, amount: i32 },

    /// Burn applied to a player
    Burned { player_id: PlayerId, turns: u32 },

    /// Special move refused because the slot is spent
    SpecialAlreadyUsed { player_id: PlayerId, ability: String },

    /// Ability name not in the catalog
    UnknownAbility { player_id: PlayerId, ability: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_client_messages() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"move_selection","move":"nuke"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::MoveSelection {
                ability: "nuke".to_string()
            }
        );

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"player_join","timestamp":1700000000.25}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::PlayerJoin {
                timestamp: Some(1_700_000_000.25)
            }
        );

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMsg::Ping);
    }

    #[test]
    fn rejects_unknown_or_incomplete_messages() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"monster_selection"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"monster":"Finsta"}"#).is_err());
    }

    #[test]
    fn battle_start_keys_players_by_id() {
        let mut players = BTreeMap::new();
        players.insert(
            PlayerId::ONE,
            BattlePlayerInfo {
                monster: "Sparchu".to_string(),
                health: 275,
                max_health: 275,
            },
        );
        let value = serde_json::to_value(ServerMsg::BattleStart { players }).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "battle_start",
                "players": { "1": { "monster": "Sparchu", "health": 275, "max_health": 275 } }
            })
        );

        let back: ServerMsg = serde_json::from_value(value).unwrap();
        assert!(matches!(
            back,
            ServerMsg::BattleStart { players } if players.contains_key(&PlayerId::ONE)
        ));
    }

    #[test]
    fn server_message_shapes() {
        assert_eq!(
            serde_json::to_value(ServerMsg::PlayerId {
                player_id: PlayerId::TWO,
                status: "connected".to_string()
            })
            .unwrap(),
            json!({"type": "player_id", "player_id": 2, "status": "connected"})
        );
        assert_eq!(
            serde_json::to_value(ServerMsg::ConnectionRejected {
                reason: RejectReason::ServerFull
            })
            .unwrap(),
            json!({"type": "connection_rejected", "reason": "server_full"})
        );
        assert_eq!(
            serde_json::to_value(TurnEvent::Healed {
                player_id: PlayerId::ONE,
                amount: 80
            })
            .unwrap(),
            json!({"event": "healed", "player_id": 1, "amount": 80})
        );
    }
}
