//! Match state and the authoritative command loop
//!
//! A single `GameMatch` task owns the `MatchState`. Connections talk to it
//! only through `MatchHandle`, whose commands are applied one at a time, so a
//! turn always resolves as one uninterrupted step.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::net::broadcast::{deliver_all, DisconnectReason, PlayerConnection};
use crate::net::protocol::{ClientMsg, ServerMsg, TurnEvent};

use super::catalog::{Catalog, SpecialEffect};
use super::combat::{CombatSystem, Combatant, HitResult, BURN_TURNS};
use super::snapshot::SnapshotBuilder;
use super::{PlayerId, PlayerInput};
use crate::util::time::unix_millis;

/// Match phase, strictly forward-moving
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchPhase {
    /// Waiting for two players
    Waiting,
    /// Players are picking monsters
    Selection,
    /// Turns are being resolved
    Battle,
    /// A winner was declared
    Finished,
}

/// One seat at the table (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub player_id: PlayerId,
    pub connection: PlayerConnection,
    /// The identity message reached the client
    pub confirmed: bool,
    pub ready: bool,
    /// Selected monster and its battle state
    pub fighter: Option<Combatant>,
}

/// Result of resolving one turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub turn: u64,
    pub events: Vec<TurnEvent>,
    pub winner: Option<PlayerId>,
}

/// Match state (owned by match task)
#[derive(Debug, Clone)]
pub struct MatchState {
    pub phase: MatchPhase,
    pub current_turn: u64,
    pub pending_moves: BTreeMap<PlayerId, String>,
    pub winner: Option<PlayerId>,
    slots: [Option<PlayerSlot>; 2],
}

impl MatchState {
    pub fn new() -> Self {
        Self {
            phase: MatchPhase::Waiting,
            current_turn: 1,
            pending_moves: BTreeMap::new(),
            winner: None,
            slots: [None, None],
        }
    }

    pub fn slot(&self, player_id: PlayerId) -> Option<&PlayerSlot> {
        self.slots[player_id.index()].as_ref()
    }

    pub fn slot_mut(&mut self, player_id: PlayerId) -> Option<&mut PlayerSlot> {
        self.slots[player_id.index()].as_mut()
    }

    /// Occupied slots in player id order
    pub fn slots(&self) -> impl Iterator<Item = &PlayerSlot> {
        self.slots.iter().flatten()
    }

    pub fn player_count(&self) -> usize {
        self.slots().count()
    }

    /// Connections that have received their identity and may get broadcasts
    pub fn confirmed_connections(&self) -> impl Iterator<Item = (PlayerId, &PlayerConnection)> {
        self.slots()
            .filter(|slot| slot.confirmed)
            .map(|slot| (slot.player_id, &slot.connection))
    }

    pub fn lowest_free_id(&self) -> Option<PlayerId> {
        PlayerId::ALL
            .into_iter()
            .find(|id| self.slots[id.index()].is_none())
    }

    pub fn insert_player(&mut self, player_id: PlayerId, connection: PlayerConnection) {
        self.slots[player_id.index()] = Some(PlayerSlot {
            player_id,
            connection,
            confirmed: false,
            ready: false,
            fighter: None,
        });
    }

    pub fn remove_player(&mut self, player_id: PlayerId) -> Option<PlayerSlot> {
        self.pending_moves.remove(&player_id);
        self.slots[player_id.index()].take()
    }

    /// Both seats taken and both monsters picked
    pub fn all_ready(&self) -> bool {
        self.slots.iter().all(|slot| slot.as_ref().is_some_and(|s| s.ready))
    }

    /// Both players are present with a monster and both moves are in
    pub fn turn_ready(&self) -> bool {
        self.phase == MatchPhase::Battle
            && PlayerId::ALL.iter().all(|id| {
                self.slot(*id).is_some_and(|s| s.fighter.is_some())
                    && self.pending_moves.contains_key(id)
            })
    }

    /// Odd turns start with player 1, even turns with player 2
    pub fn turn_order(turn: u64) -> [PlayerId; 2] {
        if turn % 2 == 1 {
            [PlayerId::ONE, PlayerId::TWO]
        } else {
            [PlayerId::TWO, PlayerId::ONE]
        }
    }

    fn fighters_mut(&mut self) -> Option<[&mut Combatant; 2]> {
        let [one, two] = &mut self.slots;
        let one = one.as_mut()?.fighter.as_mut()?;
        let two = two.as_mut()?.fighter.as_mut()?;
        Some([one, two])
    }

    pub fn finish(&mut self, winner: PlayerId) {
        self.phase = MatchPhase::Finished;
        self.winner = Some(winner);
    }

    /// Resolve the current turn if both moves are in.
    ///
    /// Burn ticks first, then both moves in parity order. The first knockout
    /// ends the match and skips whatever is left of the turn.
    pub fn resolve_turn(&mut self, catalog: &Catalog) -> Option<TurnOutcome> {
        if !self.turn_ready() {
            return None;
        }

        let turn = self.current_turn;
        let moves = std::mem::take(&mut self.pending_moves);
        let mut events = Vec::new();
        let fighters = self.fighters_mut()?;
        let winner = play_turn(turn, fighters, &moves, catalog, &mut events);

        match winner {
            Some(winner) => self.finish(winner),
            None => self.current_turn += 1,
        }

        Some(TurnOutcome {
            turn,
            events,
            winner,
        })
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

fn play_turn(
    turn: u64,
    [one, two]: [&mut Combatant; 2],
    moves: &BTreeMap<PlayerId, String>,
    catalog: &Catalog,
    events: &mut Vec<TurnEvent>,
) -> Option<PlayerId> {
    for (player_id, fighter) in [(PlayerId::ONE, &mut *one), (PlayerId::TWO, &mut *two)] {
        if let Some(damage) = fighter.apply_burn() {
            let turns_left = fighter.burn_turns_remaining;
            debug!(player_id = %player_id, damage, turns_left, "Burn damage");
            events.push(TurnEvent::BurnDamage {
                player_id,
                damage,
                turns_left,
            });
            if fighter.is_fainted() {
                return Some(player_id.opponent());
            }
        }
    }

    for attacker_id in MatchState::turn_order(turn) {
        let Some(ability) = moves.get(&attacker_id) else {
            continue;
        };
        let (attacker, defender) = if attacker_id == PlayerId::ONE {
            (&mut *one, &mut *two)
        } else {
            (&mut *two, &mut *one)
        };

        execute_move(attacker_id, attacker, defender, ability, catalog, events);

        if defender.is_fainted() {
            return Some(attacker_id);
        }
        if attacker.is_fainted() {
            return Some(attacker_id.opponent());
        }
    }

    None
}

fn execute_move(
    attacker_id: PlayerId,
    attacker: &mut Combatant,
    defender: &mut Combatant,
    ability_name: &str,
    catalog: &Catalog,
    events: &mut Vec<TurnEvent>,
) {
    let Some(ability) = catalog.ability(ability_name) else {
        warn!(player_id = %attacker_id, ability = ability_name, "Unknown ability, skipping move");
        events.push(TurnEvent::UnknownAbility {
            player_id: attacker_id,
            ability: ability_name.to_string(),
        });
        return;
    };

    let Some(effect) = ability.special else {
        strike(attacker_id, attacker, defender, ability_name, catalog, events);
        return;
    };

    if attacker.special_move_used {
        warn!(player_id = %attacker_id, ability = ability_name, "Special move already used");
        events.push(TurnEvent::SpecialAlreadyUsed {
            player_id: attacker_id,
            ability: ability_name.to_string(),
        });
        return;
    }
    attacker.special_move_used = true;

    match effect {
        SpecialEffect::ReflectShield => {
            attacker.shield_active = true;
            events.push(TurnEvent::ShieldRaised {
                player_id: attacker_id,
            });
        }
        SpecialEffect::HealingWave => {
            let amount = attacker.heal(ability.damage.saturating_abs());
            events.push(TurnEvent::Healed {
                player_id: attacker_id,
                amount,
            });
        }
        SpecialEffect::BurningFury => {
            strike(attacker_id, attacker, defender, ability_name, catalog, events);
            defender.burn_turns_remaining = BURN_TURNS;
            events.push(TurnEvent::Burned {
                player_id: attacker_id.opponent(),
                turns: BURN_TURNS,
            });
        }
    }
}

fn strike(
    attacker_id: PlayerId,
    attacker: &mut Combatant,
    defender: &mut Combatant,
    ability_name: &str,
    catalog: &Catalog,
    events: &mut Vec<TurnEvent>,
) {
    let Some(ability) = catalog.ability(ability_name) else {
        return;
    };
    let damage =
        CombatSystem::calculate_damage(ability, attacker, defender, catalog.effectiveness());
    let defender_id = attacker_id.opponent();

    let event = match CombatSystem::apply_hit(attacker, defender, damage) {
        HitResult::Landed(damage) => TurnEvent::Hit {
            attacker: attacker_id,
            defender: defender_id,
            ability: ability_name.to_string(),
            damage,
        },
        HitResult::Reflected(damage) => {
            debug!(player_id = %defender_id, damage, "Shield reflected damage");
            TurnEvent::Reflected {
                attacker: attacker_id,
                defender: defender_id,
                ability: ability_name.to_string(),
                damage,
            }
        }
    };
    events.push(event);
}

/// Why a connection could not take a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("both player slots are taken")]
    ServerFull,

    #[error("the match has already started")]
    MatchInProgress,

    #[error("the match is no longer running")]
    MatchClosed,
}

/// The match task has stopped
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("the match is no longer running")]
pub struct MatchClosed;

/// Commands applied by the match task, in arrival order
#[derive(Debug)]
pub enum MatchCommand {
    /// A connection was accepted and wants a seat
    Join {
        connection: PlayerConnection,
        reply: oneshot::Sender<Result<PlayerId, JoinError>>,
    },
    /// The identity message was delivered
    Confirm { player_id: PlayerId, conn_id: Uuid },
    /// Gameplay intent from a player
    Input(PlayerInput),
    /// The connection is gone
    Disconnect {
        player_id: PlayerId,
        conn_id: Uuid,
        reason: DisconnectReason,
    },
}

/// Handle to the running match
#[derive(Clone)]
pub struct MatchHandle {
    commands: mpsc::Sender<MatchCommand>,
}

impl MatchHandle {
    /// Ask for a seat; resolves once the match has decided
    pub async fn join(&self, connection: PlayerConnection) -> Result<PlayerId, JoinError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(MatchCommand::Join { connection, reply })
            .await
            .map_err(|_| JoinError::MatchClosed)?;
        response.await.map_err(|_| JoinError::MatchClosed)?
    }

    pub async fn confirm(&self, player_id: PlayerId, conn_id: Uuid) -> Result<(), MatchClosed> {
        self.commands
            .send(MatchCommand::Confirm { player_id, conn_id })
            .await
            .map_err(|_| MatchClosed)
    }

    pub async fn submit(&self, input: PlayerInput) -> Result<(), MatchClosed> {
        self.commands
            .send(MatchCommand::Input(input))
            .await
            .map_err(|_| MatchClosed)
    }

    pub async fn disconnect(&self, player_id: PlayerId, conn_id: Uuid, reason: DisconnectReason) {
        let command = MatchCommand::Disconnect {
            player_id,
            conn_id,
            reason,
        };
        if self.commands.send(command).await.is_err() {
            debug!(player_id = %player_id, "Match already stopped, dropping disconnect");
        }
    }
}

/// The authoritative game match
pub struct GameMatch {
    state: MatchState,
    catalog: Arc<Catalog>,
    commands: mpsc::Receiver<MatchCommand>,
    shutdown: CancellationToken,
}

impl GameMatch {
    /// Create a new match
    pub fn new(catalog: Arc<Catalog>, shutdown: CancellationToken) -> (Self, MatchHandle) {
        let (commands_tx, commands) = mpsc::channel(256);

        let game_match = Self {
            state: MatchState::new(),
            catalog,
            commands,
            shutdown,
        };

        (game_match, MatchHandle { commands: commands_tx })
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Apply commands until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!("Match waiting for players");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Match shutting down");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }

        for slot in self.state.slots() {
            slot.connection.close();
        }
        info!(phase = ?self.state.phase, winner = ?self.state.winner, "Match stopped");
    }

    fn handle_command(&mut self, command: MatchCommand) {
        match command {
            MatchCommand::Join { connection, reply } => {
                let result = self.handle_join(connection);
                // The connection gave up while waiting, free the seat again
                if let Err(Ok(player_id)) = reply.send(result) {
                    self.state.remove_player(player_id);
                }
            }
            MatchCommand::Confirm { player_id, conn_id } => {
                self.handle_confirm(player_id, conn_id);
            }
            MatchCommand::Input(input) => self.handle_input(input),
            MatchCommand::Disconnect {
                player_id,
                conn_id,
                reason,
            } => {
                let current = self
                    .state
                    .slot(player_id)
                    .is_some_and(|slot| slot.connection.conn_id == conn_id);
                if current {
                    self.disconnect_player(player_id, reason);
                } else {
                    debug!(player_id = %player_id, conn_id = %conn_id, "Ignoring stale disconnect");
                }
            }
        }
    }

    /// Handle a new connection asking for a seat
    fn handle_join(&mut self, connection: PlayerConnection) -> Result<PlayerId, JoinError> {
        if self.state.phase != MatchPhase::Waiting {
            warn!(
                conn_id = %connection.conn_id,
                phase = ?self.state.phase,
                "Rejecting connection, match in progress"
            );
            return Err(JoinError::MatchInProgress);
        }

        let Some(player_id) = self.state.lowest_free_id() else {
            warn!(conn_id = %connection.conn_id, "Rejecting connection, server full");
            return Err(JoinError::ServerFull);
        };

        info!(player_id = %player_id, conn_id = %connection.conn_id, "Player slot assigned");
        self.state.insert_player(player_id, connection);
        Ok(player_id)
    }

    fn handle_confirm(&mut self, player_id: PlayerId, conn_id: Uuid) {
        let Some(slot) = self.state.slot_mut(player_id) else {
            return;
        };
        if slot.connection.conn_id != conn_id {
            return;
        }
        slot.confirmed = true;
        info!(player_id = %player_id, "Player connected");

        let confirmed = self.state.slots().filter(|slot| slot.confirmed).count();
        if self.state.phase == MatchPhase::Waiting && confirmed == PlayerId::ALL.len() {
            self.state.phase = MatchPhase::Selection;
            info!("Both players connected, entering selection");
            self.broadcast(ServerMsg::GameStart {
                message: "Both players connected! Select your monsters.".to_string(),
            });
        }
    }

    fn handle_input(&mut self, input: PlayerInput) {
        if self.state.slot(input.player_id).is_none() {
            debug!(player_id = %input.player_id, "Input from a player without a seat");
            return;
        }

        let latency_ms = unix_millis().saturating_sub(input.received_at);
        match input.msg {
            ClientMsg::MonsterSelection { monster } => {
                self.handle_selection(input.player_id, monster, latency_ms);
            }
            ClientMsg::MoveSelection { ability } => {
                self.handle_move(input.player_id, ability, latency_ms);
            }
            other => {
                debug!(player_id = %input.player_id, msg = ?other, "Ignoring non-gameplay input");
            }
        }
    }

    /// Pick or re-pick a monster; allowed until both players are ready
    fn handle_selection(&mut self, player_id: PlayerId, monster: String, latency_ms: u64) {
        if self.state.phase != MatchPhase::Selection {
            debug!(player_id = %player_id, phase = ?self.state.phase, "Ignoring monster selection");
            return;
        }

        let Some(entry) = self.catalog.monster(&monster) else {
            warn!(player_id = %player_id, monster = %monster, "Unknown monster, ignoring");
            return;
        };
        let fighter = Combatant::new(&monster, entry);

        if let Some(slot) = self.state.slot_mut(player_id) {
            slot.fighter = Some(fighter);
            slot.ready = true;
        }
        info!(player_id = %player_id, monster = %monster, latency_ms, "Monster selected");

        if self.state.all_ready() {
            self.start_battle();
        }
    }

    fn start_battle(&mut self) {
        self.state.phase = MatchPhase::Battle;
        info!("Battle started");
        let msg = SnapshotBuilder::battle_start(&self.state);
        self.broadcast(msg);
    }

    /// Record a move; a later move replaces an earlier one until the turn resolves
    fn handle_move(&mut self, player_id: PlayerId, ability: String, latency_ms: u64) {
        if self.state.phase != MatchPhase::Battle {
            debug!(player_id = %player_id, phase = ?self.state.phase, "Ignoring move selection");
            return;
        }

        info!(
            player_id = %player_id,
            ability = %ability,
            turn = self.state.current_turn,
            latency_ms,
            "Move selected"
        );
        if let Some(previous) = self.state.pending_moves.insert(player_id, ability) {
            debug!(player_id = %player_id, previous = %previous, "Replaced pending move");
        }

        let Some(outcome) = self.state.resolve_turn(&self.catalog) else {
            return;
        };

        match outcome.winner {
            Some(winner) => {
                let winner_monster = self
                    .state
                    .slot(winner)
                    .and_then(|slot| slot.fighter.as_ref())
                    .map(|fighter| fighter.monster.clone())
                    .unwrap_or_default();
                info!(
                    turn = outcome.turn,
                    winner = %winner,
                    monster = %winner_monster,
                    "Battle ended"
                );
                self.broadcast(ServerMsg::BattleEnd {
                    winner,
                    winner_monster,
                });
            }
            None => {
                info!(turn = outcome.turn, events = outcome.events.len(), "Turn resolved");
                let msg = SnapshotBuilder::game_state(&self.state, outcome.turn, outcome.events);
                self.broadcast(msg);
            }
        }
    }

    /// Send to every confirmed player, dropping the ones that fail
    fn broadcast(&mut self, msg: ServerMsg) {
        let failed = deliver_all(self.state.confirmed_connections(), &msg);
        for player_id in failed {
            warn!(player_id = %player_id, "Delivery failed");
            self.disconnect_player(player_id, DisconnectReason::SendFailed);
        }
    }

    fn disconnect_player(&mut self, player_id: PlayerId, reason: DisconnectReason) {
        let Some(slot) = self.state.remove_player(player_id) else {
            return;
        };
        slot.connection.close();
        info!(
            player_id = %player_id,
            reason = %reason,
            phase = ?self.state.phase,
            "Player disconnected"
        );

        // Peers never learned about a seat whose identity was not delivered
        if slot.confirmed && self.state.player_count() > 0 {
            self.broadcast(ServerMsg::PlayerDisconnected { player_id });
        }
    }
}
