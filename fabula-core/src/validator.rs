//! Response validation.
//!
//! A model response survives two layers:
//! 1. structure: one JSON object with exactly the localized fields,
//!    non-empty narration, 3-5 suggested actions;
//! 2. progression: the narration must move the story. It is rejected
//!    when it is too close to a recent scene, unrelated to all of
//!    them, or when the window as a whole has gone stagnant.
//!
//! A response that fails progression can still be accepted when it
//! introduces something genuinely new (a location, a named character,
//! a quest hook). `ValidatorConfig::strict` disables that bypass.

use crate::classifier::{is_observation_action, mentions_quest_hook};
use crate::lang::Language;
use crate::provider::Embedder;
use crate::similarity::{
    text_similarity, SemanticComparison, SimilarityEngine, SimilarityError,
};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

lazy_static! {
    /// Stems of verbs that advance the plot.
    static ref PROGRESSION_STEMS: Vec<&'static str> = vec![
        "discov", "find", "found", "reveal", "learn", "arriv", "reach", "enter", "obtain",
        "unlock", "uncov", "escap", "descobr", "encontr", "revel", "aprend", "cheg",
        "alcanc", "alcanç", "obt", "desbloque",
    ];
    /// Markers of cause and effect.
    static ref CONSEQUENCE_STEMS: Vec<&'static str> = vec![
        "because", "therefore", "as a result", "consequen", "caus", "lead", "led",
        "trigger", "forc", "porque", "portanto", "como resultado", "provoc", "desencade",
        "obrig",
    ];
    /// Markers of novelty.
    static ref NOVELTY_STEMS: Vec<&'static str> = vec![
        "new", "stranger", "unknown", "mysterious", "sudden", "appear", "emerg", "novo",
        "nova", "desconhecid", "misterios", "surg", "aparec", "estranh",
    ];
    /// Capitalized words that are never proper names.
    static ref NAME_DENYLIST: Vec<&'static str> = vec![
        "The", "This", "That", "You", "Your", "They", "She", "He", "It", "But", "And",
        "Then", "With", "When", "While", "Suddenly", "Uma", "Ums", "Ela", "Ele", "Eles",
        "Mas", "Com", "Quando", "Enquanto", "Voce", "Você",
    ];
}

const PROGRESSION_WEIGHT: f64 = 0.4;
const CONSEQUENCE_WEIGHT: f64 = 0.3;
const NOVELTY_WEIGHT: f64 = 0.3;

/// Which layer rejected a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCategory {
    /// Malformed or mis-shaped JSON.
    Structure,
    /// Too close to a recent scene.
    Similarity,
    /// Unrelated to every recent scene.
    Coherence,
    /// The recent window as a whole is going in circles.
    Stagnation,
    /// Nothing in the narration advances the story.
    InsufficientProgression,
}

impl ValidationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCategory::Structure => "STRUCTURE",
            ValidationCategory::Similarity => "SIMILARITY",
            ValidationCategory::Coherence => "COHERENCE",
            ValidationCategory::Stagnation => "STAGNATION",
            ValidationCategory::InsufficientProgression => "INSUFFICIENT_PROGRESSION",
        }
    }
}

/// A rejected response, with enough detail to build a correction
/// block and a log line.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub category: ValidationCategory,
    pub reason: String,
    pub max_similarity: Option<f64>,
    pub average_similarity: Option<f64>,
}

impl ValidationFailure {
    fn structure(reason: impl Into<String>) -> Self {
        Self {
            category: ValidationCategory::Structure,
            reason: reason.into(),
            max_similarity: None,
            average_similarity: None,
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category.as_str(), self.reason)
    }
}

/// A structurally valid response.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeResponse {
    pub narration: String,
    /// Empty when the model omitted the optional atmosphere field.
    pub atmosphere: String,
    pub available_actions: Vec<String>,
}

impl NarrativeResponse {
    /// Serialize back to the canonical JSON shape in the adventure's
    /// language.
    pub fn to_json_string(&self, language: Language) -> String {
        let value = serde_json::json!({
            language.narration_field(): self.narration,
            language.atmosphere_field(): self.atmosphere,
            language.actions_field(): self.available_actions,
        });
        value.to_string()
    }
}

/// Thresholds for the progression checks. Observation actions get the
/// looser variants: re-describing a scene you are examining is fine.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Reject the new-element bypass and accept on progression alone.
    pub strict: bool,
    pub similarity_ceiling: f64,
    pub observation_similarity_ceiling: f64,
    pub coherence_floor: f64,
    pub stagnation_ceiling: f64,
    pub observation_stagnation_ceiling: f64,
    pub purpose_threshold: f64,
    pub observation_purpose_threshold: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            strict: false,
            similarity_ceiling: 0.85,
            observation_similarity_ceiling: 0.80,
            coherence_floor: 0.20,
            stagnation_ceiling: 0.75,
            observation_stagnation_ceiling: 0.70,
            purpose_threshold: 0.35,
            observation_purpose_threshold: 0.40,
        }
    }
}

impl ValidatorConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }
}

/// Keyword-level reading of whether narration serves the story.
#[derive(Debug, Clone, Copy)]
pub struct PurposeEvaluation {
    pub has_progression: bool,
    pub has_consequence: bool,
    pub has_novelty: bool,
    pub score: f64,
}

/// Score a narration's storytelling purpose from keyword families.
pub fn evaluate_scene_purpose(narration: &str) -> PurposeEvaluation {
    let text = narration.to_lowercase();
    let has_progression = matches_family(&text, &PROGRESSION_STEMS);
    let has_consequence = matches_family(&text, &CONSEQUENCE_STEMS);
    let has_novelty = matches_family(&text, &NOVELTY_STEMS);

    let mut score = 0.0;
    if has_progression {
        score += PROGRESSION_WEIGHT;
    }
    if has_consequence {
        score += CONSEQUENCE_WEIGHT;
    }
    if has_novelty {
        score += NOVELTY_WEIGHT;
    }

    PurposeEvaluation {
        has_progression,
        has_consequence,
        has_novelty,
        score,
    }
}

fn matches_family(text: &str, stems: &[&str]) -> bool {
    stems.iter().any(|stem| {
        if stem.contains(' ') {
            text.contains(stem)
        } else {
            text.split(|c: char| !c.is_alphanumeric())
                .any(|word| !word.is_empty() && word.starts_with(stem))
        }
    })
}

/// Genuinely new story elements found in a narration.
#[derive(Debug, Clone, Default)]
pub struct NewElements {
    pub new_location: Option<String>,
    pub new_names: Vec<String>,
    pub quest_hook: bool,
}

impl NewElements {
    pub fn any(&self) -> bool {
        self.new_location.is_some() || !self.new_names.is_empty() || self.quest_hook
    }
}

/// Scan a narration for new locations, new proper names and quest
/// hooks.
pub fn detect_new_elements(
    narration: &str,
    previous_location: Option<&str>,
    known_names: &[String],
) -> NewElements {
    let mut elements = NewElements {
        quest_hook: mentions_quest_hook(narration),
        ..Default::default()
    };

    let known_lower: Vec<String> = known_names.iter().map(|n| n.to_lowercase()).collect();
    let previous_lower = previous_location.map(|l| l.to_lowercase());

    let tokens: Vec<&str> = narration.split_whitespace().collect();
    let mut sentence_start = true;
    for (index, raw) in tokens.iter().enumerate() {
        let word: &str = raw.trim_matches(|c: char| !c.is_alphanumeric());
        let starts_sentence = sentence_start;
        sentence_start = raw.ends_with(['.', '!', '?']);

        if word.len() < 3 || !is_capitalized(word) {
            continue;
        }
        if NAME_DENYLIST.iter().any(|deny| *deny == word) {
            continue;
        }

        let word_lower = word.to_lowercase();
        let after_location_preposition = index > 0 && is_location_preposition(&tokens[..index]);

        if after_location_preposition {
            let is_previous = previous_lower
                .as_deref()
                .is_some_and(|prev| prev.contains(&word_lower));
            if !is_previous && elements.new_location.is_none() {
                elements.new_location = Some(word.to_string());
            }
            continue;
        }

        // Sentence-initial capitals are ambiguous; skip them.
        if starts_sentence {
            continue;
        }
        if known_lower.iter().any(|known| known == &word_lower) {
            continue;
        }
        if !elements.new_names.iter().any(|n| n == word) {
            elements.new_names.push(word.to_string());
        }
    }

    elements
}

fn is_capitalized(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => chars.all(|c| c.is_lowercase()),
        _ => false,
    }
}

fn is_location_preposition(preceding: &[&str]) -> bool {
    let last = preceding
        .last()
        .map(|w| w.to_lowercase())
        .unwrap_or_default();
    if matches!(last.as_str(), "na" | "no" | "em") {
        return true;
    }
    if last == "the" || last == "o" || last == "a" {
        let before = preceding
            .iter()
            .rev()
            .nth(1)
            .map(|w| w.to_lowercase())
            .unwrap_or_default();
        return matches!(before.as_str(), "in" | "at" | "into" | "to" | "toward" | "para");
    }
    false
}

/// Extract the first balanced JSON object from free text.
///
/// The model often wraps its JSON in prose or code fences; this walks
/// brace depth with string and escape awareness and returns the first
/// complete object.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Structural validation: shape, field names, action count.
pub fn validate_structure(
    raw: &str,
    language: Language,
) -> Result<NarrativeResponse, ValidationFailure> {
    let json = extract_json_object(raw)
        .ok_or_else(|| ValidationFailure::structure("no JSON object in response"))?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| ValidationFailure::structure(format!("invalid JSON: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| ValidationFailure::structure("response is not a JSON object"))?;

    let narration = object
        .get(language.narration_field())
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ValidationFailure::structure(format!(
                "missing or non-string \"{}\"",
                language.narration_field()
            ))
        })?;
    if narration.trim().is_empty() {
        return Err(ValidationFailure::structure(format!(
            "empty \"{}\"",
            language.narration_field()
        )));
    }

    let atmosphere = match object.get(language.atmosphere_field()) {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(ValidationFailure::structure(format!(
                "non-string \"{}\"",
                language.atmosphere_field()
            )))
        }
    };

    let actions_value = object.get(language.actions_field()).ok_or_else(|| {
        ValidationFailure::structure(format!("missing \"{}\"", language.actions_field()))
    })?;
    let actions_array = actions_value.as_array().ok_or_else(|| {
        ValidationFailure::structure(format!("\"{}\" is not an array", language.actions_field()))
    })?;

    let mut available_actions = Vec::with_capacity(actions_array.len());
    for action in actions_array {
        match action.as_str() {
            Some(s) if !s.trim().is_empty() => available_actions.push(s.to_string()),
            _ => {
                return Err(ValidationFailure::structure(format!(
                    "\"{}\" contains a non-string entry",
                    language.actions_field()
                )))
            }
        }
    }
    if available_actions.len() < 3 || available_actions.len() > 5 {
        return Err(ValidationFailure::structure(format!(
            "expected 3 to 5 actions, got {}",
            available_actions.len()
        )));
    }

    let allowed = language.allowed_fields();
    for key in object.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(ValidationFailure::structure(format!(
                "unexpected field \"{key}\""
            )));
        }
    }

    Ok(NarrativeResponse {
        narration: narration.to_string(),
        atmosphere,
        available_actions,
    })
}

/// Context the progression checks run against.
#[derive(Debug, Clone)]
pub struct ValidationContext<'a> {
    pub language: Language,
    /// The player action that produced this response.
    pub action: &'a str,
    /// Recent scene summaries, newest first, at most five.
    pub recent_scenes: &'a [String],
    pub previous_location: Option<&'a str>,
    pub known_names: &'a [String],
}

/// Outcome of a full validation pass.
#[derive(Debug, Clone)]
pub enum Verdict {
    Accepted(NarrativeResponse),
    Rejected {
        failure: ValidationFailure,
        /// True when stagnation was detected, even if the rejection
        /// was for another category. Drives sampling escalation.
        stagnating: bool,
    },
}

/// Runs the structural and progression checks.
pub struct ResponseValidator<E> {
    engine: SimilarityEngine<E>,
    config: ValidatorConfig,
}

impl<E: Embedder> ResponseValidator<E> {
    pub fn new(engine: SimilarityEngine<E>) -> Self {
        Self {
            engine,
            config: ValidatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate a raw model response end to end.
    ///
    /// Structural and progression rejections come back as a
    /// [`Verdict`]; only embedding-infrastructure trouble is an `Err`,
    /// so the caller can decide whether to degrade to structure-only
    /// acceptance.
    pub async fn validate(
        &self,
        raw: &str,
        context: &ValidationContext<'_>,
    ) -> Result<Verdict, SimilarityError> {
        let response = match validate_structure(raw, context.language) {
            Ok(response) => response,
            Err(failure) => {
                tracing::debug!(%failure, "response rejected");
                return Ok(Verdict::Rejected {
                    failure,
                    stagnating: false,
                });
            }
        };

        let comparison = self
            .engine
            .compare(&response.narration, context.recent_scenes)
            .await?;

        Ok(self.judge_progression(response, &comparison, context))
    }

    /// Progression checks against an already computed comparison.
    pub fn judge_progression(
        &self,
        response: NarrativeResponse,
        comparison: &SemanticComparison,
        context: &ValidationContext<'_>,
    ) -> Verdict {
        if !comparison.has_priors() {
            // First scenes have nothing to repeat.
            return Verdict::Accepted(response);
        }

        let observation = is_observation_action(context.action);
        let (similarity_ceiling, stagnation_ceiling, purpose_threshold) = if observation {
            (
                self.config.observation_similarity_ceiling,
                self.config.observation_stagnation_ceiling,
                self.config.observation_purpose_threshold,
            )
        } else {
            (
                self.config.similarity_ceiling,
                self.config.stagnation_ceiling,
                self.config.purpose_threshold,
            )
        };

        // Verbatim repetition trips this even when embeddings are
        // forgiving.
        let structural_max = context
            .recent_scenes
            .iter()
            .map(|scene| text_similarity(&response.narration, scene))
            .fold(0.0, f64::max);

        let max_similarity = comparison.max_similarity.max(structural_max);
        let too_similar = max_similarity > similarity_ceiling;
        let too_different = comparison.max_similarity < self.config.coherence_floor;
        let stagnating = comparison.average_similarity > stagnation_ceiling;

        let purpose = evaluate_scene_purpose(&response.narration);
        let valid_by_purpose =
            purpose.score >= purpose_threshold && !too_similar && !too_different && !stagnating;

        let new_elements = detect_new_elements(
            &response.narration,
            context.previous_location,
            context.known_names,
        );

        if valid_by_purpose || (!self.config.strict && new_elements.any()) {
            return Verdict::Accepted(response);
        }

        let failure = if too_similar {
            ValidationFailure {
                category: ValidationCategory::Similarity,
                reason: format!(
                    "narration repeats a recent scene (similarity {max_similarity:.2} > {similarity_ceiling:.2})"
                ),
                max_similarity: Some(max_similarity),
                average_similarity: Some(comparison.average_similarity),
            }
        } else if too_different {
            ValidationFailure {
                category: ValidationCategory::Coherence,
                reason: format!(
                    "narration is unrelated to every recent scene (similarity {:.2} < {:.2})",
                    comparison.max_similarity, self.config.coherence_floor
                ),
                max_similarity: Some(comparison.max_similarity),
                average_similarity: Some(comparison.average_similarity),
            }
        } else if stagnating {
            ValidationFailure {
                category: ValidationCategory::Stagnation,
                reason: format!(
                    "recent scenes are going in circles (average similarity {:.2} > {stagnation_ceiling:.2})",
                    comparison.average_similarity
                ),
                max_similarity: Some(comparison.max_similarity),
                average_similarity: Some(comparison.average_similarity),
            }
        } else {
            ValidationFailure {
                category: ValidationCategory::InsufficientProgression,
                reason: format!(
                    "narration does not advance the story (purpose score {:.2} < {purpose_threshold:.2}, no new location, name or quest hook)",
                    purpose.score
                ),
                max_similarity: Some(comparison.max_similarity),
                average_similarity: Some(comparison.average_similarity),
            }
        };

        tracing::debug!(%failure, stagnating, "response rejected");
        Verdict::Rejected {
            failure,
            stagnating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedEmbedder;

    fn valid_raw(actions: usize) -> String {
        let actions_json: Vec<String> = (0..actions)
            .map(|i| format!("\"Option {i}\""))
            .collect();
        format!(
            "{{\"narration\": \"You discover a hidden stair beneath the altar.\", \
             \"atmosphere\": \"Cold air.\", \
             \"available_actions\": [{}]}}",
            actions_json.join(", ")
        )
    }

    #[test]
    fn test_extract_json_from_prose() {
        let raw = "Here you go:\n```json\n{\"a\": {\"b\": 1}}\n```";
        assert_eq!(extract_json_object(raw), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn test_extract_json_braces_in_strings() {
        let raw = "{\"a\": \"closing } brace and \\\" quote\"} trailing";
        assert_eq!(
            extract_json_object(raw),
            Some("{\"a\": \"closing } brace and \\\" quote\"}")
        );
    }

    #[test]
    fn test_extract_json_unbalanced() {
        assert_eq!(extract_json_object("{\"a\": 1"), None);
        assert_eq!(extract_json_object("no braces here"), None);
    }

    #[test]
    fn test_structure_accepts_three_to_five_actions() {
        for count in 3..=5 {
            assert!(validate_structure(&valid_raw(count), Language::EnUs).is_ok());
        }
    }

    #[test]
    fn test_structure_rejects_wrong_action_counts() {
        for count in [0, 1, 2, 6, 7] {
            let failure = validate_structure(&valid_raw(count), Language::EnUs).unwrap_err();
            assert_eq!(failure.category, ValidationCategory::Structure);
            assert!(failure.reason.contains(&format!("got {count}")));
        }
    }

    #[test]
    fn test_structure_rejects_extraneous_field() {
        let raw = "{\"narration\": \"x\", \"available_actions\": [\"a\", \"b\", \"c\"], \
                   \"mood\": \"dark\"}";
        let failure = validate_structure(raw, Language::EnUs).unwrap_err();
        assert!(failure.reason.contains("mood"));
    }

    #[test]
    fn test_structure_reports_missing_narration_before_extra_field() {
        // The required-field check runs before the extraneous-field
        // check, so the missing narration is what gets reported.
        let raw = "{\"available_actions\": [\"a\", \"b\", \"c\"], \"mood\": \"dark\"}";
        let failure = validate_structure(raw, Language::EnUs).unwrap_err();
        assert!(failure.reason.contains("narration"));
        assert!(!failure.reason.contains("mood"));
    }

    #[test]
    fn test_structure_missing_atmosphere_defaults_empty() {
        let raw = "{\"narration\": \"x\", \"available_actions\": [\"a\", \"b\", \"c\"]}";
        let response = validate_structure(raw, Language::EnUs).unwrap();
        assert_eq!(response.atmosphere, "");
    }

    #[test]
    fn test_structure_localized_fields() {
        let raw = "{\"narracao\": \"Você encontra uma porta.\", \
                   \"acoes_disponiveis\": [\"a\", \"b\", \"c\"]}";
        assert!(validate_structure(raw, Language::PtBr).is_ok());
        // The same shape is malformed for an en-US adventure.
        assert!(validate_structure(raw, Language::EnUs).is_err());
    }

    #[test]
    fn test_structure_rejects_empty_narration() {
        let raw = "{\"narration\": \"  \", \"available_actions\": [\"a\", \"b\", \"c\"]}";
        assert!(validate_structure(raw, Language::EnUs).is_err());
    }

    #[test]
    fn test_purpose_scoring() {
        let full = evaluate_scene_purpose(
            "You discover a new passage because the wall suddenly gives way.",
        );
        assert!(full.has_progression);
        assert!(full.has_consequence);
        assert!(full.has_novelty);
        assert!((full.score - 1.0).abs() < 1e-9);

        let flat = evaluate_scene_purpose("The rain keeps falling on the same roof.");
        assert_eq!(flat.score, 0.0);
    }

    #[test]
    fn test_detect_new_name() {
        let known = vec!["Mira".to_string()];
        let elements = detect_new_elements(
            "You greet Mira while a man called Torvald watches.",
            None,
            &known,
        );
        assert_eq!(elements.new_names, vec!["Torvald".to_string()]);
    }

    #[test]
    fn test_detect_new_location() {
        let elements = detect_new_elements(
            "You walk into the Underdocks as rain falls.",
            Some("Harbor Market"),
            &[],
        );
        assert_eq!(elements.new_location.as_deref(), Some("Underdocks"));
    }

    #[test]
    fn test_detect_ignores_previous_location() {
        let elements = detect_new_elements(
            "You remain in the Harbor as before.",
            Some("Harbor Market"),
            &[],
        );
        assert!(elements.new_location.is_none());
    }

    fn context<'a>(
        action: &'a str,
        scenes: &'a [String],
        known: &'a [String],
    ) -> ValidationContext<'a> {
        ValidationContext {
            language: Language::EnUs,
            action,
            recent_scenes: scenes,
            previous_location: None,
            known_names: known,
        }
    }

    #[tokio::test]
    async fn test_accepts_with_no_priors() {
        let validator =
            ResponseValidator::new(SimilarityEngine::new(FixedEmbedder::uniform(vec![1.0, 0.0])));
        let verdict = validator
            .validate(&valid_raw(3), &context("look", &[], &[]))
            .await
            .unwrap();
        assert!(matches!(verdict, Verdict::Accepted(_)));
    }

    #[tokio::test]
    async fn test_rejects_unrelated_narration_as_coherence() {
        let narration = "Numbers scroll down a green terminal screen.";
        let raw = format!(
            "{{\"narration\": \"{narration}\", \
             \"available_actions\": [\"a\", \"b\", \"c\", \"d\"]}}"
        );
        let scenes = vec!["The knight rides through the forest.".to_string()];
        let embedder = FixedEmbedder::uniform(vec![0.0, 1.0]).with_vector(narration, vec![1.0, 0.0]);
        let validator = ResponseValidator::new(SimilarityEngine::new(embedder));

        let verdict = validator
            .validate(&raw, &context("ride on", &scenes, &[]))
            .await
            .unwrap();
        match verdict {
            Verdict::Rejected { failure, .. } => {
                assert_eq!(failure.category, ValidationCategory::Coherence);
                assert!(failure.max_similarity.unwrap() < 0.20);
            }
            Verdict::Accepted(_) => panic!("expected coherence rejection"),
        }
    }

    #[tokio::test]
    async fn test_rejects_verbatim_repetition() {
        let narration = "The knight rides through the forest.";
        let raw = format!(
            "{{\"narration\": \"{narration}\", \
             \"available_actions\": [\"a\", \"b\", \"c\"]}}"
        );
        let scenes = vec![narration.to_string()];
        let validator =
            ResponseValidator::new(SimilarityEngine::new(FixedEmbedder::uniform(vec![1.0, 0.0])));

        let verdict = validator
            .validate(&raw, &context("ride on", &scenes, &[]))
            .await
            .unwrap();
        match verdict {
            Verdict::Rejected { failure, .. } => {
                assert_eq!(failure.category, ValidationCategory::Similarity);
            }
            Verdict::Accepted(_) => panic!("expected similarity rejection"),
        }
    }

    #[tokio::test]
    async fn test_new_element_bypasses_similarity() {
        // Identical embedding, but a new proper name appears.
        let narration = "The knight rides through the forest until Aldric hails him.";
        let raw = format!(
            "{{\"narration\": \"{narration}\", \
             \"available_actions\": [\"a\", \"b\", \"c\"]}}"
        );
        let scenes = vec!["The knight rides through the forest at dusk again.".to_string()];
        let validator =
            ResponseValidator::new(SimilarityEngine::new(FixedEmbedder::uniform(vec![1.0, 0.0])));

        let verdict = validator
            .validate(&raw, &context("ride on", &scenes, &[]))
            .await
            .unwrap();
        assert!(matches!(verdict, Verdict::Accepted(_)));
    }

    #[tokio::test]
    async fn test_strict_mode_disables_bypass() {
        let narration = "The knight rides through the forest until Aldric hails him.";
        let raw = format!(
            "{{\"narration\": \"{narration}\", \
             \"available_actions\": [\"a\", \"b\", \"c\"]}}"
        );
        let scenes = vec!["The knight rides through the forest at dusk again.".to_string()];
        let validator =
            ResponseValidator::new(SimilarityEngine::new(FixedEmbedder::uniform(vec![1.0, 0.0])))
                .with_config(ValidatorConfig::strict());

        let verdict = validator
            .validate(&raw, &context("ride on", &scenes, &[]))
            .await
            .unwrap();
        match verdict {
            Verdict::Rejected { failure, .. } => {
                assert_eq!(failure.category, ValidationCategory::Similarity);
            }
            Verdict::Accepted(_) => panic!("strict mode should reject"),
        }
    }

    #[test]
    fn test_canonical_json_round_trip() {
        let response = NarrativeResponse {
            narration: "You discover a stair.".to_string(),
            atmosphere: String::new(),
            available_actions: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        };
        let json = response.to_json_string(Language::PtBr);
        let reparsed = validate_structure(&json, Language::PtBr).unwrap();
        assert_eq!(reparsed, response);
    }
}
