//! Game simulation modules

pub mod catalog;
pub mod combat;
pub mod r#match;
pub mod snapshot;

pub use catalog::{AbilityEntry, Catalog, Element, MonsterEntry, SpecialEffect};
pub use r#match::{GameMatch, JoinError, MatchHandle, MatchPhase, MatchState, PlayerSlot};

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::net::protocol::ClientMsg;

/// Player identity within a match, always 1 or 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PlayerId(u8);

impl PlayerId {
    pub const ONE: PlayerId = PlayerId(1);
    pub const TWO: PlayerId = PlayerId(2);
    pub const ALL: [PlayerId; 2] = [PlayerId::ONE, PlayerId::TWO];

    pub fn new(raw: u8) -> Option<Self> {
        match raw {
            1 | 2 => Some(Self(raw)),
            _ => None,
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The other seat at the table
    pub fn opponent(self) -> PlayerId {
        PlayerId(3 - self.0)
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// JSON object keys arrive as strings, and tagged enums buffer them as such,
// so both `1` and `"1"` are accepted.
impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PlayerIdVisitor;

        impl<'de> Visitor<'de> for PlayerIdVisitor {
            type Value = PlayerId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("player id 1 or 2")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<PlayerId, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(PlayerId::new)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<PlayerId, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(PlayerId::new)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PlayerId, E> {
                v.parse::<u8>()
                    .ok()
                    .and_then(PlayerId::new)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(PlayerIdVisitor)
    }
}

/// Player input received from a connection
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: PlayerId,
    pub msg: ClientMsg,
    pub received_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_ids_pair_up() {
        assert_eq!(PlayerId::ONE.opponent(), PlayerId::TWO);
        assert_eq!(PlayerId::TWO.opponent(), PlayerId::ONE);
        assert_eq!(PlayerId::new(2), Some(PlayerId::TWO));
        assert_eq!(PlayerId::new(0), None);
        assert_eq!(PlayerId::new(3), None);
    }

    #[test]
    fn player_id_accepts_numbers_and_string_keys() {
        assert_eq!(serde_json::from_str::<PlayerId>("2").unwrap(), PlayerId::TWO);
        assert_eq!(serde_json::from_str::<PlayerId>("\"1\"").unwrap(), PlayerId::ONE);
        assert!(serde_json::from_str::<PlayerId>("3").is_err());
        assert_eq!(serde_json::to_string(&PlayerId::ONE).unwrap(), "1");
    }
}
