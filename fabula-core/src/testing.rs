//! Testing utilities.
//!
//! Deterministic stand-ins for every external collaborator:
//! - `ScriptedCompletions` for the completion backend
//! - `FixedEmbedder` / `FailingEmbedder` for the embedding backend
//! - `SequenceRoller` for dice
//! - `InMemoryStore` for the persistence traits
//!
//! Integration tests drive whole turns through these without a server.

use crate::character::{AbilityScores, Character, CharacterId};
use crate::combat::DiceRoller;
use crate::context::AdventureId;
use crate::memory::Memory;
use crate::provider::{
    CompletionClient, CompletionError, CompletionOptions, Embedder, EmbeddingError,
};
use crate::store::{CharacterStore, MemorySource, SceneSource, StoreError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A completion client that replays scripted responses in order.
pub struct ScriptedCompletions {
    responses: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
    /// Options seen per call, for asserting sampling escalation.
    seen_options: Mutex<Vec<CompletionOptions>>,
}

impl ScriptedCompletions {
    pub fn new<I: Into<String>>(responses: Vec<I>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            calls: AtomicUsize::new(0),
            seen_options: Mutex::new(Vec::new()),
        }
    }

    /// Number of completion calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Temperatures of every call made so far, in order.
    pub fn seen_temperatures(&self) -> Vec<f32> {
        lock(&self.seen_options)
            .iter()
            .map(|options| options.temperature)
            .collect()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletions {
    async fn complete(
        &self,
        _prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.seen_options).push(options.clone());
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| CompletionError("no scripted response left".to_string()))
    }
}

/// An embedder that returns a fixed vector, with optional per-text
/// overrides for exact matches.
#[derive(Debug, Clone)]
pub struct FixedEmbedder {
    default: Vec<f32>,
    overrides: HashMap<String, Vec<f32>>,
}

impl FixedEmbedder {
    /// Every text embeds to the same vector.
    pub fn uniform(default: Vec<f32>) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.overrides.insert(text.into(), vector);
        self
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self
            .overrides
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// An embedder that always fails, for degraded-path tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError("embedding backend down".to_string()))
    }
}

/// A dice roller that replays a fixed sequence, cycling when it runs
/// out.
#[derive(Debug, Clone)]
pub struct SequenceRoller {
    values: Vec<u32>,
    index: usize,
}

impl SequenceRoller {
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, index: 0 }
    }
}

impl DiceRoller for SequenceRoller {
    fn roll(&mut self, _sides: u32) -> u32 {
        if self.values.is_empty() {
            return 1;
        }
        let value = self.values[self.index % self.values.len()];
        self.index += 1;
        value
    }
}

/// In-memory implementation of all three store traits.
#[derive(Default)]
pub struct InMemoryStore {
    memories: Mutex<Vec<Memory>>,
    /// Scene summaries, newest first.
    scenes: Mutex<Vec<String>>,
    health: Mutex<HashMap<CharacterId, i32>>,
    fail_memories: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memories(memories: Vec<Memory>) -> Self {
        Self {
            memories: Mutex::new(memories),
            ..Default::default()
        }
    }

    /// A store whose memory reads always fail.
    pub fn failing() -> Self {
        Self {
            fail_memories: true,
            ..Default::default()
        }
    }

    pub fn push_memory(&self, memory: Memory) {
        lock(&self.memories).push(memory);
    }

    /// Record a new scene summary as the most recent one.
    pub fn push_scene(&self, summary: impl Into<String>) {
        lock(&self.scenes).insert(0, summary.into());
    }

    /// Last persisted health for a character, if any update happened.
    pub fn health_of(&self, character_id: CharacterId) -> Option<i32> {
        lock(&self.health).get(&character_id).copied()
    }
}

#[async_trait]
impl MemorySource for InMemoryStore {
    async fn memories_for_adventure(
        &self,
        adventure_id: AdventureId,
    ) -> Result<Vec<Memory>, StoreError> {
        if self.fail_memories {
            return Err(StoreError::MemoryUnavailable(
                "scripted memory outage".to_string(),
            ));
        }
        Ok(lock(&self.memories)
            .iter()
            .filter(|memory| memory.adventure_id == adventure_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SceneSource for InMemoryStore {
    async fn recent_scene_summaries(
        &self,
        _adventure_id: AdventureId,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let scenes = lock(&self.scenes);
        Ok(scenes.iter().take(limit).cloned().collect())
    }
}

#[async_trait]
impl CharacterStore for InMemoryStore {
    async fn update_health(
        &self,
        character_id: CharacterId,
        health: i32,
    ) -> Result<(), StoreError> {
        lock(&self.health).insert(character_id, health);
        Ok(())
    }
}

/// A ready-made fighter for combat tests.
pub fn sample_fighter(name: &str, dexterity: u8) -> Character {
    Character::new(
        name,
        "Fighter",
        AbilityScores::new(14, dexterity, 12, 10, 10, 10),
        20,
        0,
    )
}
