//! Deterministic turn-based combat.
//!
//! The engine holds no state between calls: it builds a
//! [`CombatState`] value at initiation and mutates it in place per
//! action. All randomness goes through the [`DiceRoller`] trait so
//! tests can script every roll.
//!
//! Health changes write through to the character store before the
//! in-combat mirror is updated, so a persisted sheet never shows a
//! value combat did not produce.

use crate::character::{ability_modifier, Character, CharacterId};
use crate::context::AdventureId;
use crate::store::{CharacterStore, StoreError};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Dexterity check DC to break away from combat.
const FLEE_DC: i32 = 15;

/// Armor class bonus from taking a defensive stance.
const DEFEND_AC_BONUS: i32 = 2;

/// Errors from combat resolution.
#[derive(Debug, Error)]
pub enum CombatError {
    #[error("Attack requires a target")]
    MissingTarget,

    #[error("No participant with id {0}")]
    UnknownParticipant(ParticipantId),

    #[error("Combat is not active (status: {0:?})")]
    NotActive(CombatStatus),

    #[error("Action {0:?} is not supported in combat")]
    UnsupportedAction(CombatAction),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Source of die rolls. `roll(sides)` returns a uniform value in
/// `1..=sides`.
pub trait DiceRoller {
    fn roll(&mut self, sides: u32) -> u32;
}

/// Roller backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngRoller;

impl DiceRoller for ThreadRngRoller {
    fn roll(&mut self, sides: u32) -> u32 {
        rand::thread_rng().gen_range(1..=sides)
    }
}

/// Roller over any [`Rng`], seedable for reproducible fights.
#[derive(Debug, Clone)]
pub struct RngRoller<R: Rng> {
    rng: R,
}

impl RngRoller<StdRng> {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> RngRoller<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> DiceRoller for RngRoller<R> {
    fn roll(&mut self, sides: u32) -> u32 {
        self.rng.gen_range(1..=sides)
    }
}

/// Unique identifier for a combat encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombatId(pub Uuid);

impl CombatId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CombatId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a combatant within one encounter, derived from the
/// character id and side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn player(character_id: CharacterId) -> Self {
        Self(format!("player_{character_id}"))
    }

    pub fn npc(character_id: CharacterId) -> Self {
        Self(format!("npc_{character_id}"))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Combat lifecycle. `Fled` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatStatus {
    Active,
    Completed,
    Fled,
}

/// Actions a combatant can take on their turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatAction {
    Attack,
    Defend,
    Flee,
    Cast,
    UseItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Buff,
    Debuff,
    Damage,
    Heal,
}

/// Which stat a status effect modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectTarget {
    ArmorClass,
    Attack,
    Damage,
    Health,
    Initiative,
}

/// A temporary modifier on a combatant. Durations count down at the
/// end of every turn; an effect at zero is removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEffect {
    pub name: String,
    pub kind: EffectKind,
    pub target: EffectTarget,
    pub value: i32,
    pub duration: u32,
}

/// How a logged action resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatOutcome {
    Hit,
    Miss,
    Defended,
    Escaped,
    FleeFailed,
}

/// One resolved action in the combat log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatLogEntry {
    pub round: u32,
    pub turn_index: usize,
    pub actor: ParticipantId,
    pub target: Option<ParticipantId>,
    pub action: CombatAction,
    pub outcome: CombatOutcome,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

/// A combatant: a snapshot of the character sheet plus live combat
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatParticipant {
    pub id: ParticipantId,
    pub character_id: CharacterId,
    pub name: String,
    pub is_npc: bool,
    pub initiative: i32,
    pub health: i32,
    pub max_health: i32,
    pub armor_class: i32,
    pub strength: u8,
    pub dexterity: u8,
    pub effects: Vec<StatusEffect>,
}

impl CombatParticipant {
    fn from_character(character: &Character, is_npc: bool, initiative: i32) -> Self {
        Self {
            id: if is_npc {
                ParticipantId::npc(character.id)
            } else {
                ParticipantId::player(character.id)
            },
            character_id: character.id,
            name: character.name.clone(),
            is_npc,
            initiative,
            health: character.health,
            max_health: character.max_health,
            armor_class: character.armor_class,
            strength: character.abilities.strength,
            dexterity: character.abilities.dexterity,
            effects: Vec::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Sum of active effect values for one target stat.
    pub fn effect_total(&self, target: EffectTarget) -> i32 {
        self.effects
            .iter()
            .filter(|effect| effect.target == target)
            .map(|effect| effect.value)
            .sum()
    }

    pub fn strength_modifier(&self) -> i32 {
        ability_modifier(self.strength)
    }

    pub fn dexterity_modifier(&self) -> i32 {
        ability_modifier(self.dexterity)
    }
}

/// Full state of one combat encounter. Plain data, serializable, owned
/// by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatState {
    pub id: CombatId,
    pub adventure_id: AdventureId,
    pub status: CombatStatus,
    pub round: u32,
    pub current_turn_index: usize,
    /// Participant ids in acting order, fixed at initiation.
    pub turn_order: Vec<ParticipantId>,
    pub participants: Vec<CombatParticipant>,
    pub log: Vec<CombatLogEntry>,
}

impl CombatState {
    pub fn is_active(&self) -> bool {
        self.status == CombatStatus::Active
    }

    pub fn current_participant(&self) -> Option<&CombatParticipant> {
        let id = self.turn_order.get(self.current_turn_index)?;
        self.participant(id)
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&CombatParticipant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    fn participant_mut(&mut self, id: &ParticipantId) -> Option<&mut CombatParticipant> {
        self.participants.iter_mut().find(|p| &p.id == id)
    }

    fn alive_players(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| !p.is_npc && p.is_alive())
            .count()
    }

    fn alive_npcs(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.is_npc && p.is_alive())
            .count()
    }
}

/// Resolves combat actions against a [`CombatState`].
pub struct CombatEngine<R: DiceRoller> {
    roller: R,
}

impl Default for CombatEngine<ThreadRngRoller> {
    fn default() -> Self {
        Self::new(ThreadRngRoller)
    }
}

impl<R: DiceRoller> CombatEngine<R> {
    pub fn new(roller: R) -> Self {
        Self { roller }
    }

    /// Start an encounter: roll initiative for everyone and fix the
    /// turn order.
    ///
    /// Order is initiative descending; ties go to players before NPCs,
    /// then to creation order. The tie-break is part of the contract,
    /// not a sort accident.
    pub fn initiate(
        &mut self,
        adventure_id: AdventureId,
        players: &[Character],
        npcs: &[Character],
    ) -> CombatState {
        let mut participants: Vec<CombatParticipant> = Vec::new();
        for character in players {
            let initiative = self.roll_initiative(character);
            participants.push(CombatParticipant::from_character(character, false, initiative));
        }
        for character in npcs {
            let initiative = self.roll_initiative(character);
            participants.push(CombatParticipant::from_character(character, true, initiative));
        }

        let mut order: Vec<usize> = (0..participants.len()).collect();
        order.sort_by_key(|&i| {
            let p = &participants[i];
            (-p.initiative, p.is_npc, i)
        });

        let participants: Vec<CombatParticipant> = {
            let mut sorted = Vec::with_capacity(participants.len());
            let mut remaining: Vec<Option<CombatParticipant>> =
                participants.into_iter().map(Some).collect();
            for i in order {
                if let Some(p) = remaining[i].take() {
                    sorted.push(p);
                }
            }
            sorted
        };

        let turn_order = participants.iter().map(|p| p.id.clone()).collect();
        let state = CombatState {
            id: CombatId::new(),
            adventure_id,
            status: CombatStatus::Active,
            round: 1,
            current_turn_index: 0,
            turn_order,
            participants,
            log: Vec::new(),
        };

        tracing::info!(
            combat = %state.id.0,
            participants = state.participants.len(),
            "combat initiated"
        );
        state
    }

    fn roll_initiative(&mut self, character: &Character) -> i32 {
        self.roller.roll(20) as i32
            + character.abilities.dexterity_modifier()
            + character.initiative_bonus
    }

    /// Resolve one action for the combatant whose turn it is.
    ///
    /// Appends exactly one log entry and, unless the action ended the
    /// encounter, runs end-of-turn processing (effect countdown, turn
    /// advance, round increment, end-condition check).
    pub async fn perform_action(
        &mut self,
        state: &mut CombatState,
        action: CombatAction,
        target: Option<&ParticipantId>,
        characters: &dyn CharacterStore,
    ) -> Result<(), CombatError> {
        if !state.is_active() {
            return Err(CombatError::NotActive(state.status));
        }

        let actor_id = state
            .turn_order
            .get(state.current_turn_index)
            .cloned()
            .ok_or_else(|| CombatError::UnknownParticipant(ParticipantId("?".to_string())))?;

        match action {
            CombatAction::Attack => {
                let target_id = target.ok_or(CombatError::MissingTarget)?;
                self.resolve_attack(state, &actor_id, target_id, characters)
                    .await?;
            }
            CombatAction::Defend => self.resolve_defend(state, &actor_id),
            CombatAction::Flee => {
                if self.resolve_flee(state, &actor_id)? {
                    // A successful escape ends the encounter on the
                    // spot; no further turn processing happens.
                    return Ok(());
                }
            }
            CombatAction::Cast | CombatAction::UseItem => {
                return Err(CombatError::UnsupportedAction(action));
            }
        }

        end_turn(state);
        Ok(())
    }

    async fn resolve_attack(
        &mut self,
        state: &mut CombatState,
        actor_id: &ParticipantId,
        target_id: &ParticipantId,
        characters: &dyn CharacterStore,
    ) -> Result<(), CombatError> {
        let actor = state
            .participant(actor_id)
            .ok_or_else(|| CombatError::UnknownParticipant(actor_id.clone()))?;
        let strength_modifier = actor.strength_modifier();
        let attack_bonus = actor.effect_total(EffectTarget::Attack);
        let damage_bonus = actor.effect_total(EffectTarget::Damage);

        let (armor_class, target_character, target_health, target_max) = {
            let target = state
                .participant(target_id)
                .ok_or_else(|| CombatError::UnknownParticipant(target_id.clone()))?;
            (
                target.armor_class,
                target.character_id,
                target.health,
                target.max_health,
            )
        };

        let attack_total = self.roller.roll(20) as i32 + strength_modifier + attack_bonus;
        let (outcome, detail) = if attack_total >= armor_class {
            let damage =
                (self.roller.roll(8) as i32 + strength_modifier + damage_bonus).max(0);
            let new_health = (target_health - damage).clamp(0, target_max);
            characters.update_health(target_character, new_health).await?;
            if let Some(target) = state.participant_mut(target_id) {
                target.health = new_health;
            }
            (
                CombatOutcome::Hit,
                format!("Attack roll {attack_total} vs AC {armor_class}: hit for {damage} damage"),
            )
        } else {
            (
                CombatOutcome::Miss,
                format!("Attack roll {attack_total} vs AC {armor_class}: miss"),
            )
        };

        tracing::debug!(actor = %actor_id, target = %target_id, %detail, "attack resolved");
        state.log.push(CombatLogEntry {
            round: state.round,
            turn_index: state.current_turn_index,
            actor: actor_id.clone(),
            target: Some(target_id.clone()),
            action: CombatAction::Attack,
            outcome,
            detail,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn resolve_defend(&mut self, state: &mut CombatState, actor_id: &ParticipantId) {
        if let Some(actor) = state.participant_mut(actor_id) {
            actor.effects.push(StatusEffect {
                name: "Defensive stance".to_string(),
                kind: EffectKind::Buff,
                target: EffectTarget::ArmorClass,
                value: DEFEND_AC_BONUS,
                duration: 1,
            });
        }
        state.log.push(CombatLogEntry {
            round: state.round,
            turn_index: state.current_turn_index,
            actor: actor_id.clone(),
            target: None,
            action: CombatAction::Defend,
            outcome: CombatOutcome::Defended,
            detail: format!("Takes a defensive stance (+{DEFEND_AC_BONUS} AC for 1 round)"),
            timestamp: Utc::now(),
        });
    }

    fn resolve_flee(
        &mut self,
        state: &mut CombatState,
        actor_id: &ParticipantId,
    ) -> Result<bool, CombatError> {
        let dexterity_modifier = state
            .participant(actor_id)
            .ok_or_else(|| CombatError::UnknownParticipant(actor_id.clone()))?
            .dexterity_modifier();

        let check = self.roller.roll(20) as i32 + dexterity_modifier;
        let escaped = check >= FLEE_DC;
        let (outcome, detail) = if escaped {
            state.status = CombatStatus::Fled;
            (
                CombatOutcome::Escaped,
                format!("Flee check {check} vs DC {FLEE_DC}: escaped"),
            )
        } else {
            (
                CombatOutcome::FleeFailed,
                format!("Flee check {check} vs DC {FLEE_DC}: failed to escape"),
            )
        };

        tracing::debug!(actor = %actor_id, escaped, "flee resolved");
        state.log.push(CombatLogEntry {
            round: state.round,
            turn_index: state.current_turn_index,
            actor: actor_id.clone(),
            target: None,
            action: CombatAction::Flee,
            outcome,
            detail,
            timestamp: Utc::now(),
        });
        Ok(escaped)
    }
}

/// End-of-turn processing: count down effect durations, advance the
/// turn pointer, bump the round on wraparound, then check whether one
/// side has fallen.
///
/// Durations tick at the end of every turn, so a duration-1 effect
/// applied on its owner's turn is gone before the next combatant acts.
fn end_turn(state: &mut CombatState) {
    for participant in &mut state.participants {
        for effect in &mut participant.effects {
            effect.duration = effect.duration.saturating_sub(1);
        }
        participant.effects.retain(|effect| effect.duration > 0);
    }

    if !state.turn_order.is_empty() {
        state.current_turn_index = (state.current_turn_index + 1) % state.turn_order.len();
        if state.current_turn_index == 0 {
            state.round += 1;
        }
    }

    if state.alive_players() == 0 || state.alive_npcs() == 0 {
        state.status = CombatStatus::Completed;
        tracing::info!(combat = %state.id.0, round = state.round, "combat completed");
    }
}
