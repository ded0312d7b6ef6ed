//! Narrative generation.
//!
//! The game master assembles a prompt from the game context and memory
//! block, calls the completion backend, validates the result, and
//! retries on rejection with escalating sampling parameters and a
//! correction block naming what went wrong. Retries back off
//! exponentially; when the attempt budget runs out the caller gets a
//! terminal error carrying the last failure.

use crate::context::GameContext;
use crate::lang::Language;
use crate::memory::{Memory, MemoryContext, MemoryFlags, MemoryKind};
use crate::provider::{CompletionClient, CompletionOptions, Embedder};
use crate::similarity::SimilarityEngine;
use crate::store::StoreError;
use crate::validator::{
    detect_new_elements, validate_structure, NarrativeResponse, ResponseValidator,
    ValidationContext, ValidatorConfig, Verdict,
};
use std::time::Duration;
use thiserror::Error;

/// Errors from a narration turn.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("Narrative generation failed after {attempts} attempts: {last_failure}")]
    GenerationExhausted { attempts: u32, last_failure: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Retry and sampling configuration.
#[derive(Debug, Clone)]
pub struct NarratorConfig {
    pub max_attempts: u32,
    pub base_temperature: f32,
    /// Added per retry.
    pub temperature_step: f32,
    /// Added once when stagnation was detected.
    pub stagnation_temperature_bonus: f32,
    pub max_temperature: f32,
    pub base_penalty: f32,
    pub penalty_step: f32,
    pub stagnation_penalty_bonus: f32,
    pub max_tokens: u32,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_temperature: 0.9,
            temperature_step: 0.15,
            stagnation_temperature_bonus: 0.2,
            max_temperature: 1.4,
            base_penalty: 0.7,
            penalty_step: 0.1,
            stagnation_penalty_bonus: 0.2,
            max_tokens: 2048,
        }
    }
}

impl NarratorConfig {
    /// Temperature for the given retry (0 = first attempt).
    pub fn temperature_for(&self, retry: u32, stagnating: bool) -> f32 {
        let mut temperature = self.base_temperature + self.temperature_step * retry as f32;
        if stagnating {
            temperature += self.stagnation_temperature_bonus;
        }
        temperature.min(self.max_temperature)
    }

    /// Presence/frequency penalty for the given retry.
    pub fn penalty_for(&self, retry: u32, stagnating: bool) -> f32 {
        let mut penalty = self.base_penalty + self.penalty_step * retry as f32;
        if stagnating {
            penalty += self.stagnation_penalty_bonus;
        }
        penalty
    }

    /// Exponential backoff before the given retry.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        Duration::from_secs(1u64 << retry.min(6))
    }
}

/// The narrative orchestrator.
pub struct GameMaster<C, E> {
    client: C,
    validator: ResponseValidator<E>,
    config: NarratorConfig,
}

impl<C: CompletionClient, E: Embedder> GameMaster<C, E> {
    pub fn new(client: C, embedder: E) -> Self {
        Self {
            client,
            validator: ResponseValidator::new(SimilarityEngine::new(embedder)),
            config: NarratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: NarratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_validator_config(mut self, config: ValidatorConfig) -> Self {
        self.validator = self.validator.with_config(config);
        self
    }

    /// The underlying completion client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Produce one validated narrative response for the turn.
    pub async fn generate_narrative(
        &self,
        context: &GameContext,
        memory: &MemoryContext,
    ) -> Result<NarrativeResponse, NarratorError> {
        let language = context.language();
        let previous_location = if context.current_location.is_empty() {
            None
        } else {
            Some(context.current_location.as_str())
        };
        let validation_context = ValidationContext {
            language,
            action: &context.player_action,
            recent_scenes: context.similarity_window(),
            previous_location,
            known_names: &context.known_character_names,
        };

        let mut last_failure: Option<String> = None;
        let mut stagnating = false;

        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.backoff_for(attempt)).await;
            }

            let prompt = self.build_prompt(context, memory, last_failure.as_deref());
            let options = CompletionOptions {
                temperature: self.config.temperature_for(attempt, stagnating),
                max_tokens: self.config.max_tokens,
                presence_penalty: self.config.penalty_for(attempt, stagnating),
                frequency_penalty: self.config.penalty_for(attempt, stagnating),
                stop: language.stop_sequences(),
                ..Default::default()
            };
            tracing::debug!(
                attempt,
                temperature = options.temperature,
                stagnating,
                "requesting narration"
            );

            let raw = match self.client.complete(&prompt, &options).await {
                Ok(raw) => raw,
                Err(error) => {
                    tracing::warn!(%error, attempt, "completion call failed");
                    last_failure = Some(error.to_string());
                    continue;
                }
            };

            match self.validator.validate(&raw, &validation_context).await {
                Ok(Verdict::Accepted(response)) => {
                    tracing::info!(attempt, "narration accepted");
                    return Ok(response);
                }
                Ok(Verdict::Rejected {
                    failure,
                    stagnating: window_stagnating,
                }) => {
                    stagnating |= window_stagnating;
                    last_failure = Some(failure.to_string());
                }
                Err(error) => {
                    // Embedding trouble is not the model's fault; fall
                    // back to accepting a structurally valid response.
                    tracing::warn!(%error, "semantic checks unavailable, accepting on structure");
                    match validate_structure(&raw, language) {
                        Ok(response) => return Ok(response),
                        Err(failure) => last_failure = Some(failure.to_string()),
                    }
                }
            }
        }

        Err(NarratorError::GenerationExhausted {
            attempts: self.config.max_attempts,
            last_failure: last_failure.unwrap_or_else(|| "no response produced".to_string()),
        })
    }

    /// Like [`generate_narrative`](Self::generate_narrative) but
    /// returns the canonical serialized JSON.
    pub async fn generate_narrative_json(
        &self,
        context: &GameContext,
        memory: &MemoryContext,
    ) -> Result<String, NarratorError> {
        let response = self.generate_narrative(context, memory).await?;
        Ok(response.to_json_string(context.language()))
    }

    fn build_prompt(
        &self,
        context: &GameContext,
        memory: &MemoryContext,
        correction: Option<&str>,
    ) -> String {
        let language = context.language();
        let labels = language.labels();
        let mut prompt = String::new();

        prompt.push_str(language.system_prompt());
        prompt.push_str("\n\n");

        if needs_location_change(context) {
            prompt.push_str(language.location_change_instruction());
            prompt.push_str("\n\n");
        }
        if context.active_quest_titles.is_empty() {
            prompt.push_str(language.quest_hook_instruction());
            prompt.push_str("\n\n");
        }

        if !memory.is_empty() {
            prompt.push_str(&memory.to_prompt_block());
            prompt.push_str("\n\n");
        }

        let settings = &context.settings;
        prompt.push_str(&format!("{}: {}\n", labels.world_style, settings.world_style));
        prompt.push_str(&format!("{}: {}\n", labels.tone, settings.tone_style));
        prompt.push_str(&format!("{}: {}\n", labels.magic, settings.magic_level));
        if let Some(setting) = &settings.setting {
            prompt.push_str(&format!("{}: {}\n", labels.setting, setting));
        }
        if !context.current_location.is_empty() {
            prompt.push_str(&format!("{}: {}\n", labels.location, context.current_location));
        }
        prompt.push_str(&format!("{}: {}\n", labels.scene, context.scene));

        if !context.characters.is_empty() {
            let roster: Vec<String> = context
                .characters
                .iter()
                .map(|c| format!("{} ({}, {}/{})", c.name, c.class, c.health, c.max_health))
                .collect();
            prompt.push_str(&format!("{}: {}\n", labels.characters, roster.join(", ")));
        }

        let state = &context.player_state;
        prompt.push_str(&format!(
            "{}: {}/{}\n",
            labels.health, state.health, state.max_health
        ));
        prompt.push_str(&format!("{}: {}/{}\n", labels.mana, state.mana, state.max_mana));
        let inventory = if state.inventory.is_empty() {
            labels.empty.to_string()
        } else {
            state.inventory.join(", ")
        };
        prompt.push_str(&format!("{}: {}\n", labels.inventory, inventory));
        if !state.quest_progress.is_empty() {
            prompt.push_str(&format!(
                "{}: {}\n",
                labels.quest_progress, state.quest_progress
            ));
        }

        if let Some(combat) = &context.combat {
            prompt.push_str(&format!(
                "{} - {} {}\n",
                labels.combat, labels.round, combat.round
            ));
            if let Some(current) = combat.current_participant() {
                prompt.push_str(&format!("{}: {}\n", labels.current_turn, current.name));
            }
            for participant in &combat.participants {
                let effects = if participant.effects.is_empty() {
                    String::new()
                } else {
                    let names: Vec<&str> = participant
                        .effects
                        .iter()
                        .map(|e| e.name.as_str())
                        .collect();
                    format!(" [{}]", names.join(", "))
                };
                prompt.push_str(&format!(
                    "- {}: initiative {}, {}/{}{}\n",
                    participant.name,
                    participant.initiative,
                    participant.health,
                    participant.max_health,
                    effects
                ));
            }
        }
        prompt.push('\n');

        if let Some(failure) = correction {
            prompt.push_str(&format!(
                "{}: {}\n\n",
                language.correction_header(),
                failure
            ));
        }

        prompt.push_str(language.schema_example());
        prompt.push_str("\n\n");
        prompt.push_str(&format!("{}: {}\n", labels.action, context.player_action));
        prompt
    }
}

/// The last three scenes all happening in the current location means
/// the story has lingered; the prompt asks for a move.
fn needs_location_change(context: &GameContext) -> bool {
    if context.current_location.is_empty() || context.recent_scene_summaries.len() < 3 {
        return false;
    }
    let location = context.current_location.to_lowercase();
    context.recent_scene_summaries[..3]
        .iter()
        .all(|summary| summary.to_lowercase().contains(&location))
}

/// Turn an accepted narration into memory records for the next turn's
/// ranking: discovered locations, newly met characters, quest hooks.
pub fn harvest_memories(context: &GameContext, response: &NarrativeResponse) -> Vec<Memory> {
    let previous_location = if context.current_location.is_empty() {
        None
    } else {
        Some(context.current_location.as_str())
    };
    let elements = detect_new_elements(
        &response.narration,
        previous_location,
        &context.known_character_names,
    );

    let mut memories = Vec::new();
    if let Some(location) = elements.new_location {
        memories.push(
            Memory::new(
                context.adventure_id,
                MemoryKind::Location,
                location,
                response.narration.clone(),
            )
            .with_flags(MemoryFlags {
                discovery: true,
                ..Default::default()
            }),
        );
    }
    for name in elements.new_names {
        memories.push(
            Memory::new(
                context.adventure_id,
                MemoryKind::Character,
                name,
                response.narration.clone(),
            )
            .with_flags(MemoryFlags {
                interaction: true,
                ..Default::default()
            }),
        );
    }
    if elements.quest_hook {
        memories.push(
            Memory::new(
                context.adventure_id,
                MemoryKind::Quest,
                first_sentence(&response.narration),
                response.narration.clone(),
            )
            .with_flags(MemoryFlags {
                quest_related: true,
                ..Default::default()
            }),
        );
    }
    memories
}

fn first_sentence(text: &str) -> String {
    match text.find(['.', '!', '?']) {
        Some(end) => text[..=end].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Localized terminal message carrying the failure detail, for callers
/// that surface errors to players.
pub fn exhaustion_message(language: Language, error: &NarratorError) -> String {
    match language {
        Language::EnUs => format!("The story could not continue: {error}"),
        Language::PtBr => format!("A história não pôde continuar: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AdventureId, AdventureSettings};
    use crate::memory::MemoryContext;
    use crate::testing::{FixedEmbedder, ScriptedCompletions};

    fn game_master(
        responses: Vec<&str>,
    ) -> GameMaster<ScriptedCompletions, FixedEmbedder> {
        GameMaster::new(
            ScriptedCompletions::new(responses),
            FixedEmbedder::uniform(vec![1.0, 0.0]),
        )
    }

    fn context() -> GameContext {
        GameContext::new(AdventureId::new(), "A quiet village square at dusk.")
            .with_action("explore the alley")
            .with_location("Village Square")
    }

    #[test]
    fn test_temperature_escalation() {
        let config = NarratorConfig::default();
        assert!((config.temperature_for(0, false) - 0.9).abs() < 1e-6);
        assert!((config.temperature_for(1, false) - 1.05).abs() < 1e-6);
        assert!((config.temperature_for(2, false) - 1.2).abs() < 1e-6);
        assert!((config.temperature_for(1, true) - 1.25).abs() < 1e-6);
        // Capped.
        assert!((config.temperature_for(4, true) - 1.4).abs() < 1e-6);
    }

    #[test]
    fn test_penalty_escalation() {
        let config = NarratorConfig::default();
        assert!((config.penalty_for(0, false) - 0.7).abs() < 1e-6);
        assert!((config.penalty_for(2, false) - 0.9).abs() < 1e-6);
        assert!((config.penalty_for(1, true) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = NarratorConfig::default();
        assert_eq!(config.backoff_for(1), Duration::from_secs(2));
        assert_eq!(config.backoff_for(2), Duration::from_secs(4));
    }

    #[test]
    fn test_prompt_contains_sections() {
        let game_master = game_master(vec![]);
        let mut context = context();
        context.settings = AdventureSettings {
            setting: Some("The coastal city of Dunmar".to_string()),
            ..Default::default()
        };
        context.player_state.inventory = vec!["rope".to_string(), "lantern".to_string()];

        let prompt = game_master.build_prompt(&context, &MemoryContext::default(), None);

        assert!(prompt.contains("Game Master"));
        assert!(prompt.contains("World style: high fantasy"));
        assert!(prompt.contains("Setting: The coastal city of Dunmar"));
        assert!(prompt.contains("Current location: Village Square"));
        assert!(prompt.contains("Inventory: rope, lantern"));
        assert!(prompt.contains("Player action: explore the alley"));
        // No quests yet, so the hook instruction is present.
        assert!(prompt.contains("no active quest"));
    }

    #[test]
    fn test_prompt_correction_block() {
        let game_master = game_master(vec![]);
        let prompt = game_master.build_prompt(
            &context(),
            &MemoryContext::default(),
            Some("SIMILARITY: narration repeats a recent scene"),
        );
        assert!(prompt.contains("previous response was rejected"));
        assert!(prompt.contains("SIMILARITY"));
    }

    #[test]
    fn test_needs_location_change() {
        let mut context = context();
        assert!(!needs_location_change(&context));

        context.recent_scene_summaries = vec![
            "Shadows lengthen over the village square.".to_string(),
            "A cart rattles through the village square.".to_string(),
            "The village square empties as night falls.".to_string(),
        ];
        assert!(needs_location_change(&context));

        context.recent_scene_summaries[1] = "You rest in the forest clearing.".to_string();
        assert!(!needs_location_change(&context));
    }

    #[test]
    fn test_harvest_memories() {
        let mut context = context();
        context.known_character_names = vec!["Mira".to_string()];
        let response = NarrativeResponse {
            narration: "You follow Mira into the Underdocks, where a smuggler named \
                        Vesk offers you a contract."
                .to_string(),
            atmosphere: String::new(),
            available_actions: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        };

        let memories = harvest_memories(&context, &response);
        let kinds: Vec<MemoryKind> = memories.iter().map(|m| m.kind).collect();
        assert!(kinds.contains(&MemoryKind::Location));
        assert!(kinds.contains(&MemoryKind::Character));
        assert!(kinds.contains(&MemoryKind::Quest));
        assert!(memories.iter().any(|m| m.title == "Vesk"));
        assert!(memories.iter().any(|m| m.title == "Underdocks"));
    }
}
