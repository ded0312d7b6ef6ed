//! Adventure memory: the typed records the story accumulates, their
//! ranking against the player's current action, and the deduplicated
//! context block handed to the prompt builder.
//!
//! Ranking blends three signals:
//! - recency: exponential decay with a 24-hour half-life scale,
//! - importance: a base weight per memory kind plus flag bonuses,
//! - relevance: token overlap between the action and the memory text.

use crate::context::AdventureId;
use crate::similarity::text_similarity;
use crate::store::{MemorySource, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const RECENCY_WEIGHT: f64 = 0.4;
const IMPORTANCE_WEIGHT: f64 = 0.3;
const RELEVANCE_WEIGHT: f64 = 0.3;

/// Two memories with description similarity above this are considered
/// duplicates.
const DUPLICATE_THRESHOLD: f64 = 0.8;

/// Per-bucket caps for the rendered context block.
const MAX_SCENES: usize = 5;
const MAX_QUESTS: usize = 3;
const MAX_CHARACTERS: usize = 5;
const MAX_LOCATIONS: usize = 5;
const MAX_ITEMS: usize = 3;

/// Unique identifier for a memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a memory records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Scene,
    Quest,
    Character,
    Location,
    Item,
}

impl MemoryKind {
    /// Base importance weight for the ranking blend.
    pub fn base_weight(&self) -> f64 {
        match self {
            MemoryKind::Scene => 1.0,
            MemoryKind::Quest => 1.5,
            MemoryKind::Character => 1.2,
            MemoryKind::Location => 1.1,
            MemoryKind::Item => 0.9,
        }
    }
}

/// Lifecycle state of a memory. Resolved quests stop appearing in the
/// active-quest bucket but still rank for relevance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStatus {
    #[default]
    Active,
    Resolved,
}

/// Fixed metadata flags that raise a memory's importance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryFlags {
    pub combat: bool,
    pub discovery: bool,
    pub interaction: bool,
    pub quest_related: bool,
    pub key_item: bool,
}

impl MemoryFlags {
    pub fn importance_bonus(&self) -> f64 {
        let mut bonus = 0.0;
        if self.combat {
            bonus += 0.3;
        }
        if self.discovery {
            bonus += 0.2;
        }
        if self.interaction {
            bonus += 0.2;
        }
        if self.quest_related {
            bonus += 0.4;
        }
        if self.key_item {
            bonus += 0.3;
        }
        bonus
    }
}

/// One remembered fact about the adventure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub adventure_id: AdventureId,
    pub kind: MemoryKind,
    pub title: String,
    pub description: String,
    pub status: MemoryStatus,
    pub flags: MemoryFlags,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    pub fn new(
        adventure_id: AdventureId,
        kind: MemoryKind,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::new(),
            adventure_id,
            kind,
            title: title.into(),
            description: description.into(),
            status: MemoryStatus::Active,
            flags: MemoryFlags::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_flags(mut self, flags: MemoryFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    pub fn resolved(mut self) -> Self {
        self.status = MemoryStatus::Resolved;
        self
    }

    /// Importance component of the ranking score.
    pub fn importance_score(&self) -> f64 {
        self.kind.base_weight() + self.flags.importance_bonus()
    }

    /// Recency component: exponential decay over age in hours.
    pub fn recency_score(&self, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - self.created_at).num_seconds().max(0) as f64 / 3600.0;
        (-age_hours / 24.0).exp()
    }

    /// Relevance component: 0.2 per action token found in the memory
    /// text, capped at 1.0.
    pub fn relevance_score(&self, action: &str) -> f64 {
        let haystack = format!(
            "{} {}",
            self.title.to_lowercase(),
            self.description.to_lowercase()
        );
        let mut score: f64 = 0.0;
        for token in action.to_lowercase().split_whitespace() {
            if haystack.contains(token) {
                score += 0.2;
            }
        }
        score.min(1.0)
    }

    fn rank_score(&self, action: &str, now: DateTime<Utc>) -> f64 {
        RECENCY_WEIGHT * self.recency_score(now)
            + IMPORTANCE_WEIGHT * self.importance_score()
            + RELEVANCE_WEIGHT * self.relevance_score(action)
    }
}

/// Order memories by blended score, best first. A pure reordering: the
/// output always has the same length as the input.
pub fn rank_at(mut memories: Vec<Memory>, action: &str, now: DateTime<Utc>) -> Vec<Memory> {
    let mut scored: Vec<(f64, Memory)> = memories
        .drain(..)
        .map(|memory| (memory.rank_score(action, now), memory))
        .collect();
    // Stable sort keeps creation order among equal scores.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, memory)| memory).collect()
}

/// Rank against the current wall clock.
pub fn rank(memories: Vec<Memory>, action: &str) -> Vec<Memory> {
    rank_at(memories, action, Utc::now())
}

/// Drop near-duplicate memories, keeping the higher-ranked one.
///
/// Greedy over the ranked order: a memory survives only if its
/// description is sufficiently different from every survivor so far.
pub fn deduplicate(ranked: Vec<Memory>) -> Vec<Memory> {
    let mut kept: Vec<Memory> = Vec::with_capacity(ranked.len());
    for candidate in ranked {
        let candidate_text = candidate.description.trim().to_lowercase();
        let duplicate = kept.iter().any(|survivor| {
            text_similarity(&survivor.description.trim().to_lowercase(), &candidate_text)
                > DUPLICATE_THRESHOLD
        });
        if !duplicate {
            kept.push(candidate);
        }
    }
    kept
}

/// Ranked, deduplicated memories bucketed by kind for the prompt.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    pub recent_scenes: Vec<Memory>,
    pub active_quests: Vec<Memory>,
    pub known_characters: Vec<Memory>,
    pub discovered_locations: Vec<Memory>,
    pub important_items: Vec<Memory>,
}

impl MemoryContext {
    /// Load, rank and bucket the adventure's memories against the
    /// current action.
    pub async fn build(
        source: &dyn MemorySource,
        adventure_id: AdventureId,
        action: &str,
    ) -> Result<Self, StoreError> {
        let memories = source.memories_for_adventure(adventure_id).await?;
        tracing::debug!(
            adventure = %adventure_id,
            count = memories.len(),
            "building memory context"
        );
        Ok(Self::from_memories(memories, action, Utc::now()))
    }

    /// Deterministic variant used by tests.
    pub fn from_memories(memories: Vec<Memory>, action: &str, now: DateTime<Utc>) -> Self {
        let ranked = deduplicate(rank_at(memories, action, now));

        let mut context = MemoryContext::default();
        for memory in ranked {
            let (bucket, cap) = match memory.kind {
                MemoryKind::Scene => (&mut context.recent_scenes, MAX_SCENES),
                MemoryKind::Quest => {
                    if memory.status != MemoryStatus::Active {
                        continue;
                    }
                    (&mut context.active_quests, MAX_QUESTS)
                }
                MemoryKind::Character => (&mut context.known_characters, MAX_CHARACTERS),
                MemoryKind::Location => (&mut context.discovered_locations, MAX_LOCATIONS),
                MemoryKind::Item => (&mut context.important_items, MAX_ITEMS),
            };
            if bucket.len() < cap {
                bucket.push(memory);
            }
        }
        context
    }

    pub fn is_empty(&self) -> bool {
        self.recent_scenes.is_empty()
            && self.active_quests.is_empty()
            && self.known_characters.is_empty()
            && self.discovered_locations.is_empty()
            && self.important_items.is_empty()
    }

    /// Render the context block for the prompt.
    pub fn to_prompt_block(&self) -> String {
        let mut block = String::new();

        let sections: [(&str, &[Memory]); 5] = [
            ("Recent events", &self.recent_scenes),
            ("Active quests", &self.active_quests),
            ("Known characters", &self.known_characters),
            ("Discovered locations", &self.discovered_locations),
            ("Important items", &self.important_items),
        ];

        for (header, memories) in sections {
            if memories.is_empty() {
                continue;
            }
            block.push_str(header);
            block.push_str(":\n");
            for memory in memories {
                block.push_str("- ");
                block.push_str(&memory.title);
                if !memory.description.is_empty() {
                    block.push_str(": ");
                    block.push_str(&memory.description);
                }
                block.push('\n');
            }
            block.push('\n');
        }

        block.trim_end().to_string()
    }
}
