//! Character sheet types.
//!
//! The engine reads characters; it never levels them up or edits their
//! sheets. The only field it writes back is current health, and that
//! goes through the [`crate::store::CharacterStore`] trait.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the D&D-style modifier for an ability score.
///
/// Uses the standard floor((score - 10) / 2), so a score of 9 gives -1,
/// not 0.
pub fn ability_modifier(score: u8) -> i32 {
    (score as i32 - 10).div_euclid(2)
}

/// The six standard ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(
        strength: u8,
        dexterity: u8,
        constitution: u8,
        intelligence: u8,
        wisdom: u8,
        charisma: u8,
    ) -> Self {
        Self {
            strength,
            dexterity,
            constitution,
            intelligence,
            wisdom,
            charisma,
        }
    }

    pub fn strength_modifier(&self) -> i32 {
        ability_modifier(self.strength)
    }

    pub fn dexterity_modifier(&self) -> i32 {
        ability_modifier(self.dexterity)
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

/// A spell known by a character. Only surfaced in prompts; the combat
/// engine does not resolve casting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spell {
    pub name: String,
    pub level: u8,
}

/// A named special ability, surfaced in prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialAbility {
    pub name: String,
    pub description: String,
}

/// A player character or NPC sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub class: String,
    pub abilities: AbilityScores,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub armor_class: i32,
    pub initiative_bonus: i32,
    pub spells: Vec<Spell>,
    pub special_abilities: Vec<SpecialAbility>,
}

impl Character {
    /// Create a character at full health and mana. Armor class defaults
    /// to 10 plus the dexterity modifier.
    pub fn new(
        name: impl Into<String>,
        class: impl Into<String>,
        abilities: AbilityScores,
        max_health: i32,
        max_mana: i32,
    ) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            class: class.into(),
            abilities,
            health: max_health,
            max_health,
            mana: max_mana,
            max_mana,
            armor_class: 10 + abilities.dexterity_modifier(),
            initiative_bonus: 0,
            spells: Vec::new(),
            special_abilities: Vec::new(),
        }
    }

    pub fn with_armor_class(mut self, armor_class: i32) -> Self {
        self.armor_class = armor_class;
        self
    }

    pub fn with_initiative_bonus(mut self, initiative_bonus: i32) -> Self {
        self.initiative_bonus = initiative_bonus;
        self
    }

    pub fn with_spells(mut self, spells: Vec<Spell>) -> Self {
        self.spells = spells;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Clamp a proposed health value to the valid range for this
    /// character.
    pub fn clamp_health(&self, health: i32) -> i32 {
        health.clamp(0, self.max_health)
    }
}
