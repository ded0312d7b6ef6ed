//! Game context assembled for a single narration turn.

use crate::character::Character;
use crate::combat::CombatState;
use crate::lang::Language;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an adventure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdventureId(pub Uuid);

impl AdventureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AdventureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AdventureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-adventure configuration chosen at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdventureSettings {
    pub world_style: String,
    pub tone_style: String,
    pub magic_level: String,
    pub setting: Option<String>,
    pub language: Language,
}

impl Default for AdventureSettings {
    fn default() -> Self {
        Self {
            world_style: "high fantasy".to_string(),
            tone_style: "heroic".to_string(),
            magic_level: "common".to_string(),
            setting: None,
            language: Language::EnUs,
        }
    }
}

impl AdventureSettings {
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}

/// Mutable player-facing state rendered into the prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerState {
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub inventory: Vec<String>,
    pub quest_progress: String,
}

/// Everything the narrator needs to produce one response.
///
/// Built fresh per turn by the caller; the engine never holds one
/// across turns.
#[derive(Debug, Clone)]
pub struct GameContext {
    pub adventure_id: AdventureId,
    /// Narration of the current scene.
    pub scene: String,
    pub current_location: String,
    /// The player's free-text action for this turn.
    pub player_action: String,
    pub characters: Vec<Character>,
    pub player_state: PlayerState,
    pub settings: AdventureSettings,
    /// Summaries of the most recent scenes, newest first. The
    /// similarity window uses at most the first five.
    pub recent_scene_summaries: Vec<String>,
    pub active_quest_titles: Vec<String>,
    /// Names already established in the story, used to tell genuinely
    /// new characters apart from recurring ones.
    pub known_character_names: Vec<String>,
    pub combat: Option<CombatState>,
}

impl GameContext {
    pub fn new(adventure_id: AdventureId, scene: impl Into<String>) -> Self {
        Self {
            adventure_id,
            scene: scene.into(),
            current_location: String::new(),
            player_action: String::new(),
            characters: Vec::new(),
            player_state: PlayerState::default(),
            settings: AdventureSettings::default(),
            recent_scene_summaries: Vec::new(),
            active_quest_titles: Vec::new(),
            known_character_names: Vec::new(),
            combat: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.player_action = action.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.current_location = location.into();
        self
    }

    pub fn with_settings(mut self, settings: AdventureSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn language(&self) -> Language {
        self.settings.language
    }

    /// The prior-scene window the validator compares new narration
    /// against: up to five of the most recent summaries.
    pub fn similarity_window(&self) -> &[String] {
        let n = self.recent_scene_summaries.len().min(5);
        &self.recent_scene_summaries[..n]
    }
}
