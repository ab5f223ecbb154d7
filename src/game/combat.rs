//! Combat system - damage, shields, burn

use super::catalog::{AbilityEntry, Element, EffectivenessMatrix, MonsterEntry};

/// Turns of burn inflicted by a burning special
pub const BURN_TURNS: u32 = 2;

/// Battle state of one player's monster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combatant {
    pub monster: String,
    pub element: Element,
    pub attack: i32,
    pub defense: i32,

    pub health: i32,
    pub max_health: i32,

    // Status effects
    pub shield_active: bool,
    pub burn_turns_remaining: u32,
    pub special_move_used: bool,
}

impl Combatant {
    pub fn new(monster: &str, entry: &MonsterEntry) -> Self {
        Self {
            monster: monster.to_string(),
            element: entry.element,
            attack: entry.attack,
            defense: entry.defense,
            health: entry.health,
            max_health: entry.health,
            shield_active: false,
            burn_turns_remaining: 0,
            special_move_used: false,
        }
    }

    pub fn is_fainted(&self) -> bool {
        self.health <= 0
    }

    /// Subtract damage, never dropping below zero
    pub fn take_damage(&mut self, damage: i32) {
        self.health = CombatSystem::apply_damage(self.health, damage);
    }

    /// Restore health up to the maximum, returns the amount actually healed
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.health;
        self.health = self.health.saturating_add(amount.max(0)).min(self.max_health);
        self.health - before
    }

    /// Tick burn if active, returns the damage taken
    pub fn apply_burn(&mut self) -> Option<i32> {
        if self.burn_turns_remaining == 0 {
            return None;
        }
        let damage = CombatSystem::burn_damage(self.max_health);
        self.take_damage(damage);
        self.burn_turns_remaining -= 1;
        Some(damage)
    }
}

/// Where a hit ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitResult {
    /// The defender took the damage
    Landed(i32),
    /// The defender's shield consumed the hit and the attacker took it
    Reflected(i32),
}

/// Combat system for damage and status resolution
pub struct CombatSystem;

impl CombatSystem {
    /// Damage of a damaging ability, floored and never below 1
    pub fn calculate_damage(
        ability: &AbilityEntry,
        attacker: &Combatant,
        defender: &Combatant,
        effectiveness: &EffectivenessMatrix,
    ) -> i32 {
        let multiplier = effectiveness.multiplier(ability.element, defender.element);
        let ratio = f64::from(attacker.attack) / f64::from(defender.defense);
        let raw = f64::from(ability.damage) * multiplier * ratio;
        (raw.floor() as i32).max(1)
    }

    /// Burn damage per turn: a tenth of max health, at least 1
    pub fn burn_damage(max_health: i32) -> i32 {
        (max_health / 10).max(1)
    }

    /// Apply damage to health, clamped at zero
    pub fn apply_damage(current_health: i32, damage: i32) -> i32 {
        current_health.saturating_sub(damage).max(0)
    }

    /// Deliver a hit, letting an active shield reflect it back
    pub fn apply_hit(attacker: &mut Combatant, defender: &mut Combatant, damage: i32) -> HitResult {
        if defender.shield_active && damage > 0 {
            defender.shield_active = false;
            attacker.take_damage(damage);
            HitResult::Reflected(damage)
        } else {
            defender.take_damage(damage);
            HitResult::Landed(damage)
        }
    }
}
