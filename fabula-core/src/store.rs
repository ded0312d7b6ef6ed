//! Durable-store interfaces.
//!
//! The engine treats persistence as someone else's problem: it reads
//! memories and scene summaries through these traits and writes combat
//! health updates back through them. The crate ships an in-memory
//! implementation in [`crate::testing`]; anything real lives outside.

use crate::character::CharacterId;
use crate::context::AdventureId;
use crate::memory::Memory;
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Memory store unavailable: {0}")]
    MemoryUnavailable(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Source of persisted memories for an adventure.
#[async_trait]
pub trait MemorySource: Send + Sync {
    /// Fetch all memories recorded for the adventure, in creation
    /// order.
    async fn memories_for_adventure(
        &self,
        adventure_id: AdventureId,
    ) -> Result<Vec<Memory>, StoreError>;
}

/// Source of persisted scene summaries for an adventure.
#[async_trait]
pub trait SceneSource: Send + Sync {
    /// Fetch up to `limit` scene summaries, newest first.
    async fn recent_scene_summaries(
        &self,
        adventure_id: AdventureId,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;
}

/// Write-through sink for character health changes during combat.
#[async_trait]
pub trait CharacterStore: Send + Sync {
    /// Persist a new current-health value. The caller has already
    /// clamped it to the character's valid range.
    async fn update_health(
        &self,
        character_id: CharacterId,
        health: i32,
    ) -> Result<(), StoreError>;
}
