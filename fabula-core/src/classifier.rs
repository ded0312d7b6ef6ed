//! Keyword classification of player actions.
//!
//! Decides whether a free-text action should drop the adventure into
//! combat, and which combat action it maps to. Also classifies
//! observation actions, which get looser repetition thresholds in the
//! validator: looking around legitimately re-describes the scene.
//!
//! Keyword lists cover both supported languages; the same classifier
//! instance serves en-US and pt-BR adventures.

use crate::combat::CombatAction;
use lazy_static::lazy_static;

lazy_static! {
    static ref INITIATE_KEYWORDS: Vec<&'static str> = vec![
        "start combat",
        "roll initiative",
        "ambush",
        "engage",
        "charge",
        "iniciar combate",
        "rolar iniciativa",
        "emboscada",
        "investir",
    ];
    static ref ATTACK_KEYWORDS: Vec<&'static str> = vec![
        "attack", "strike", "hit", "swing", "stab", "shoot", "slash", "atacar", "golpear",
        "acertar", "atirar", "esfaquear",
    ];
    static ref DEFEND_KEYWORDS: Vec<&'static str> = vec![
        "defend", "block", "parry", "shield", "brace", "defender", "bloquear", "aparar",
        "escudo",
    ];
    static ref FLEE_KEYWORDS: Vec<&'static str> = vec![
        "flee", "run away", "escape", "retreat", "fugir", "correr", "escapar", "recuar",
    ];
    static ref CAST_KEYWORDS: Vec<&'static str> = vec![
        "cast", "spell", "conjure", "conjurar", "feitiço", "feitico", "magia",
    ];
    /// Stems of verbs that examine rather than act. Matched as word
    /// prefixes so "observes", "observa" and "olho" all hit.
    static ref OBSERVATION_STEMS: Vec<&'static str> = vec![
        "observ", "watch", "look", "understand", "entend", "olh", "perceb",
    ];
    /// Observation verbs that are complete words in their own right.
    /// Matched exactly: "very" must not hit "ver".
    static ref OBSERVATION_WORDS: Vec<&'static str> = vec!["see", "ver"];
    static ref QUEST_HOOK_KEYWORDS: Vec<&'static str> = vec![
        "quest", "mission", "task", "bounty", "contract", "missão", "missao", "tarefa",
        "contrato", "recompensa",
    ];
}

/// How a combat-triggering action should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatTrigger {
    /// Start combat without a specific opening move.
    Initiate,
    Action(CombatAction),
}

/// Maps player action text to combat triggers.
pub trait Classifier: Send + Sync {
    fn classify(&self, action: &str) -> Option<CombatTrigger>;
}

/// Substring-list classifier. Initiation phrases win over single-verb
/// matches so "roll initiative" is not read as an attack.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn classify(&self, action: &str) -> Option<CombatTrigger> {
        let action = action.to_lowercase();

        if contains_any(&action, &INITIATE_KEYWORDS) {
            return Some(CombatTrigger::Initiate);
        }
        if contains_any(&action, &ATTACK_KEYWORDS) {
            return Some(CombatTrigger::Action(CombatAction::Attack));
        }
        if contains_any(&action, &DEFEND_KEYWORDS) {
            return Some(CombatTrigger::Action(CombatAction::Defend));
        }
        if contains_any(&action, &FLEE_KEYWORDS) {
            return Some(CombatTrigger::Action(CombatAction::Flee));
        }
        if contains_any(&action, &CAST_KEYWORDS) {
            return Some(CombatTrigger::Action(CombatAction::Cast));
        }
        None
    }
}

fn contains_any(action: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| has_keyword(action, keyword))
}

/// Whether the action reads as examining the scene rather than acting
/// on it.
pub fn is_observation_action(action: &str) -> bool {
    let action = action.to_lowercase();
    action.split(|c: char| !c.is_alphanumeric()).any(|word| {
        !word.is_empty()
            && (OBSERVATION_WORDS.iter().any(|exact| word == *exact)
                || OBSERVATION_STEMS.iter().any(|stem| word.starts_with(stem)))
    })
}

/// Whether the text mentions a quest, mission or similar hook.
pub fn mentions_quest_hook(text: &str) -> bool {
    let text = text.to_lowercase();
    contains_any(&text, &QUEST_HOOK_KEYWORDS)
}

/// Word-boundary keyword match. Multi-word keywords match as plain
/// substrings.
pub(crate) fn has_keyword(text: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        return text.contains(keyword);
    }
    let mut start = 0;
    while let Some(position) = text[start..].find(keyword) {
        let begin = start + position;
        let end = begin + keyword.len();
        let boundary_before = begin == 0
            || !text[..begin]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let boundary_after = end == text.len()
            || !text[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if boundary_before && boundary_after {
            return true;
        }
        start = end;
    }
    false
}
