//! Static game catalog - monsters, abilities, elemental effectiveness
//!
//! The catalog is loaded once at startup and shared read-only (`Arc<Catalog>`)
//! by the match and by clients. The built-in data is also shipped as
//! `data/catalog.json`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Monster and ability elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Fire,
    Water,
    Plant,
    Normal,
}

impl Element {
    pub const ALL: [Element; 4] = [Element::Fire, Element::Water, Element::Plant, Element::Normal];

    fn index(self) -> usize {
        match self {
            Element::Fire => 0,
            Element::Water => 1,
            Element::Plant => 2,
            Element::Normal => 3,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Element::Fire => "fire",
            Element::Water => "water",
            Element::Plant => "plant",
            Element::Normal => "normal",
        };
        f.write_str(name)
    }
}

/// Base stats of a selectable monster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterEntry {
    pub element: Element,
    pub health: i32,
    pub attack: i32,
    pub defense: i32,
}

/// One-time special effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialEffect {
    /// Raise a shield that reflects the next hit
    ReflectShield,
    /// Heal by the ability's absolute base damage
    HealingWave,
    /// Regular damage plus two turns of burn on the defender
    BurningFury,
}

/// An ability a monster can use in battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityEntry {
    /// Base damage; negative values heal
    pub damage: i32,
    pub element: Element,
    /// Present on single-use special moves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<SpecialEffect>,
}

impl AbilityEntry {
    pub fn is_special(&self) -> bool {
        self.special.is_some()
    }
}

/// Attacking element x defending element damage multipliers
#[derive(Debug, Clone, PartialEq)]
pub struct EffectivenessMatrix {
    table: [[f64; 4]; 4],
}

impl EffectivenessMatrix {
    /// Multiplier for an ability of `attacking` element hitting a `defending` monster
    pub fn multiplier(&self, attacking: Element, defending: Element) -> f64 {
        self.table[attacking.index()][defending.index()]
    }

    fn from_nested(
        nested: &BTreeMap<Element, BTreeMap<Element, f64>>,
    ) -> Result<Self, CatalogError> {
        let mut table = [[1.0; 4]; 4];
        for attacking in Element::ALL {
            let row = nested
                .get(&attacking)
                .ok_or(CatalogError::MissingEffectiveness(attacking, None))?;
            for defending in Element::ALL {
                let value = *row
                    .get(&defending)
                    .ok_or(CatalogError::MissingEffectiveness(attacking, Some(defending)))?;
                if ![0.5, 1.0, 2.0].contains(&value) {
                    return Err(CatalogError::InvalidMultiplier {
                        attacking,
                        defending,
                        value,
                    });
                }
                table[attacking.index()][defending.index()] = value;
            }
        }
        Ok(Self { table })
    }

    fn to_nested(&self) -> BTreeMap<Element, BTreeMap<Element, f64>> {
        Element::ALL
            .iter()
            .map(|&attacking| {
                let row = Element::ALL
                    .iter()
                    .map(|&defending| (defending, self.multiplier(attacking, defending)))
                    .collect();
                (attacking, row)
            })
            .collect()
    }
}

/// Serialized catalog layout
#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    monsters: BTreeMap<String, MonsterEntry>,
    abilities: BTreeMap<String, AbilityEntry>,
    effectiveness: BTreeMap<Element, BTreeMap<Element, f64>>,
    movesets: BTreeMap<Element, Vec<String>>,
}

/// Immutable lookup tables consumed by turn resolution
#[derive(Debug, Clone)]
pub struct Catalog {
    monsters: BTreeMap<String, MonsterEntry>,
    abilities: BTreeMap<String, AbilityEntry>,
    effectiveness: EffectivenessMatrix,
    movesets: BTreeMap<Element, Vec<String>>,
}

impl Catalog {
    /// Load and validate a catalog from a JSON file
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a catalog from JSON text
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        Self::from_file(file)
    }

    /// Serialize into the on-disk JSON layout
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let file = CatalogFile {
            monsters: self.monsters.clone(),
            abilities: self.abilities.clone(),
            effectiveness: self.effectiveness.to_nested(),
            movesets: self.movesets.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    fn from_file(file: CatalogFile) -> Result<Self, CatalogError> {
        let effectiveness = EffectivenessMatrix::from_nested(&file.effectiveness)?;

        for (name, monster) in &file.monsters {
            if monster.health <= 0 || monster.attack <= 0 || monster.defense <= 0 {
                return Err(CatalogError::InvalidMonster(name.clone()));
            }
        }

        for moves in file.movesets.values() {
            if let Some(unknown) = moves.iter().find(|m| !file.abilities.contains_key(*m)) {
                return Err(CatalogError::UnknownMovesetAbility(unknown.clone()));
            }
        }

        Ok(Self {
            monsters: file.monsters,
            abilities: file.abilities,
            effectiveness,
            movesets: file.movesets,
        })
    }

    pub fn monster(&self, name: &str) -> Option<&MonsterEntry> {
        self.monsters.get(name)
    }

    pub fn ability(&self, name: &str) -> Option<&AbilityEntry> {
        self.abilities.get(name)
    }

    pub fn effectiveness(&self) -> &EffectivenessMatrix {
        &self.effectiveness
    }

    /// Monster names in catalog order
    pub fn monster_names(&self) -> impl Iterator<Item = &str> {
        self.monsters.keys().map(String::as_str)
    }

    /// Abilities offered to monsters of an element
    pub fn moveset(&self, element: Element) -> &[String] {
        self.movesets.get(&element).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for Catalog {
    fn default() -> Self {
        use Element::*;

        let monster = |element, health, attack, defense| MonsterEntry {
            element,
            health,
            attack,
            defense,
        };
        let ability = |damage, element, special| AbilityEntry {
            damage,
            element,
            special,
        };

        let monsters = [
            // Plant: high health and defense, low attack
            ("Larvea", monster(Plant, 450, 40, 70)),
            ("Pouch", monster(Plant, 500, 55, 90)),
            ("Plumette", monster(Plant, 525, 60, 95)),
            ("Cleaf", monster(Plant, 525, 65, 90)),
            ("Draem", monster(Plant, 560, 70, 110)),
            ("Ivieron", monster(Plant, 610, 75, 120)),
            ("Pluma", monster(Plant, 650, 80, 130)),
            // Fire: low health, strong attack
            ("Atrox", monster(Fire, 225, 75, 40)),
            ("Jacana", monster(Fire, 250, 85, 45)),
            ("Sparchu", monster(Fire, 275, 90, 50)),
            ("Cindrill", monster(Fire, 325, 105, 65)),
            ("Charmadillo", monster(Fire, 360, 120, 70)),
            // Water: balanced
            ("Finsta", monster(Water, 350, 60, 60)),
            ("Friolera", monster(Water, 390, 70, 70)),
            ("Gulfin", monster(Water, 410, 75, 75)),
            ("Finiette", monster(Water, 450, 85, 85)),
        ];

        let abilities = [
            ("scratch", ability(20, Normal, None)),
            ("spark", ability(35, Fire, None)),
            ("nuke", ability(50, Fire, None)),
            ("splash", ability(30, Water, None)),
            ("shards", ability(50, Water, None)),
            ("spiral", ability(40, Plant, None)),
            ("earthquake", ability(55, Plant, None)),
            (
                "reflect_shield",
                ability(0, Plant, Some(SpecialEffect::ReflectShield)),
            ),
            (
                "healing_wave",
                ability(-80, Water, Some(SpecialEffect::HealingWave)),
            ),
            (
                "burning_fury",
                ability(45, Fire, Some(SpecialEffect::BurningFury)),
            ),
        ];

        // Rows are the attacking element, columns the defending one
        let table = [
            // fire  water plant normal
            [1.0, 0.5, 2.0, 1.0],
            [2.0, 1.0, 0.5, 1.0],
            [0.5, 2.0, 1.0, 1.0],
            [1.0, 1.0, 1.0, 1.0],
        ];

        let movesets = [
            (Fire, vec!["scratch", "spark", "nuke", "burning_fury"]),
            (Water, vec!["scratch", "splash", "shards", "healing_wave"]),
            (Plant, vec!["scratch", "spiral", "earthquake", "reflect_shield"]),
            (Normal, vec!["scratch"]),
        ];

        Self {
            monsters: monsters
                .into_iter()
                .map(|(name, entry)| (name.to_string(), entry))
                .collect(),
            abilities: abilities
                .into_iter()
                .map(|(name, entry)| (name.to_string(), entry))
                .collect(),
            effectiveness: EffectivenessMatrix { table },
            movesets: movesets
                .into_iter()
                .map(|(element, moves)| (element, moves.into_iter().map(String::from).collect()))
                .collect(),
        }
    }
}

/// Catalog loading errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Effectiveness matrix has no entry for {0} against {1:?}")]
    MissingEffectiveness(Element, Option<Element>),

    #[error("Effectiveness {attacking} -> {defending} is {value}, expected 0.5, 1 or 2")]
    InvalidMultiplier {
        attacking: Element,
        defending: Element,
        value: f64,
    },

    #[error("Monster {0} has non-positive stats")]
    InvalidMonster(String),

    #[error("Moveset references unknown ability {0}")]
    UnknownMovesetAbility(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matrix_matches_elemental_rules() {
        let catalog = Catalog::default();
        let m = catalog.effectiveness();
        assert_eq!(m.multiplier(Element::Fire, Element::Water), 0.5);
        assert_eq!(m.multiplier(Element::Fire, Element::Plant), 2.0);
        assert_eq!(m.multiplier(Element::Water, Element::Fire), 2.0);
        assert_eq!(m.multiplier(Element::Plant, Element::Water), 2.0);
        assert_eq!(m.multiplier(Element::Plant, Element::Fire), 0.5);
        for defending in Element::ALL {
            assert_eq!(m.multiplier(Element::Normal, defending), 1.0);
        }
    }

    #[test]
    fn builtin_entries() {
        let catalog = Catalog::default();
        let sparchu = catalog.monster("Sparchu").unwrap();
        assert_eq!(sparchu.element, Element::Fire);
        assert_eq!((sparchu.health, sparchu.attack, sparchu.defense), (275, 90, 50));

        let heal = catalog.ability("healing_wave").unwrap();
        assert_eq!(heal.damage, -80);
        assert_eq!(heal.special, Some(SpecialEffect::HealingWave));
        assert!(!catalog.ability("nuke").unwrap().is_special());
        assert!(catalog.monster("Missingno").is_none());
    }

    #[test]
    fn shipped_catalog_file_matches_builtin() {
        let shipped = Catalog::from_json(include_str!("../../data/catalog.json")).unwrap();
        let builtin = Catalog::default();
        assert_eq!(shipped.monsters, builtin.monsters);
        assert_eq!(shipped.abilities, builtin.abilities);
        assert_eq!(shipped.effectiveness, builtin.effectiveness);
        assert_eq!(shipped.movesets, builtin.movesets);
    }

    #[test]
    fn json_layout_survives_a_reload() {
        let builtin = Catalog::default();
        let reloaded = Catalog::from_json(&builtin.to_json().unwrap()).unwrap();
        assert_eq!(reloaded.abilities, builtin.abilities);
        assert_eq!(reloaded.effectiveness, builtin.effectiveness);
    }

    #[test]
    fn rejects_partial_matrix() {
        let raw = r#"{
            "monsters": {},
            "abilities": {},
            "effectiveness": { "fire": { "fire": 1, "water": 0.5, "plant": 2, "normal": 1 } },
            "movesets": {}
        }"#;
        assert!(matches!(
            Catalog::from_json(raw),
            Err(CatalogError::MissingEffectiveness(Element::Water, None))
        ));
    }

    #[test]
    fn rejects_out_of_range_multiplier() {
        let mut file: serde_json::Value =
            serde_json::from_str(&Catalog::default().to_json().unwrap()).unwrap();
        file["effectiveness"]["fire"]["water"] = serde_json::json!(3.0);
        assert!(matches!(
            Catalog::from_json(&file.to_string()),
            Err(CatalogError::InvalidMultiplier { value, .. }) if value == 3.0
        ));
    }

    #[test]
    fn movesets_follow_elements() {
        let catalog = Catalog::default();
        assert_eq!(
            catalog.moveset(Element::Water),
            ["scratch", "splash", "shards", "healing_wave"]
        );
        assert_eq!(catalog.moveset(Element::Normal), ["scratch"]);
    }
}
