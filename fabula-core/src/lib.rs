//! Narrative continuity and combat engine for an AI game master.
//!
//! The crate takes a player's free-text action plus the adventure's
//! accumulated state and produces either a validated narrative
//! response or a resolved combat turn:
//!
//! - [`memory`] ranks and deduplicates what the story remembers;
//! - [`narrator`] assembles the prompt, calls the model and retries
//!   with escalating sampling until [`validator`] accepts a response;
//! - [`similarity`] supplies the structural and semantic metrics the
//!   validator judges progression with;
//! - [`classifier`] decides when an action drops into [`combat`],
//!   which resolves initiative, attacks, stances and escapes
//!   deterministically through an injectable dice roller.
//!
//! Persistence and the model server sit behind the traits in
//! [`store`] and [`provider`]; [`testing`] ships scripted
//! implementations of all of them.

pub mod character;
pub mod classifier;
pub mod combat;
pub mod context;
pub mod lang;
pub mod memory;
pub mod narrator;
pub mod provider;
pub mod similarity;
pub mod store;
pub mod testing;
pub mod validator;

pub use character::{AbilityScores, Character, CharacterId};
pub use classifier::{Classifier, CombatTrigger, KeywordClassifier};
pub use combat::{
    CombatAction, CombatEngine, CombatError, CombatState, CombatStatus, DiceRoller,
    ParticipantId,
};
pub use context::{AdventureId, AdventureSettings, GameContext, PlayerState};
pub use lang::Language;
pub use memory::{Memory, MemoryContext, MemoryFlags, MemoryKind, MemoryStatus};
pub use narrator::{GameMaster, NarratorConfig, NarratorError};
pub use provider::{CompletionClient, CompletionOptions, Embedder};
pub use similarity::{cosine_similarity, text_similarity, SimilarityEngine};
pub use store::{CharacterStore, MemorySource, SceneSource, StoreError};
pub use validator::{
    NarrativeResponse, ResponseValidator, ValidationCategory, ValidatorConfig, Verdict,
};
