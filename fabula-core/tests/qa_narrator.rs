//! End-to-end narration scenarios with scripted model backends.

use fabula_core::context::{AdventureId, GameContext};
use fabula_core::memory::MemoryContext;
use fabula_core::narrator::{GameMaster, NarratorError};
use fabula_core::testing::{FailingEmbedder, FixedEmbedder, ScriptedCompletions};

const PROGRESSING_NARRATION: &str =
    "You discover a hidden stair because the wall gives way, revealing a new passage below.";

fn valid_response(narration: &str) -> String {
    format!(
        "{{\"narration\": \"{narration}\", \
         \"atmosphere\": \"Dust and cold air.\", \
         \"available_actions\": [\"Descend\", \"Light a torch\", \"Listen first\"]}}"
    )
}

fn context_with_history() -> GameContext {
    let mut context = GameContext::new(AdventureId::new(), "You stand before the altar.")
        .with_action("push the altar aside")
        .with_location("Ruined Chapel");
    context.recent_scene_summaries = vec![
        "You searched the chapel nave for clues.".to_string(),
        "Rain hammered the broken roof of the chapel.".to_string(),
    ];
    context.active_quest_titles = vec!["Find the crypt".to_string()];
    context
}

/// Embedder where scenes sit at one point and the accepted narration
/// lands at cosine 0.5 from them.
fn moderate_embedder() -> FixedEmbedder {
    FixedEmbedder::uniform(vec![1.0, 0.0])
        .with_vector(PROGRESSING_NARRATION, vec![0.5, 0.866_025_4])
}

#[tokio::test]
async fn qa_accepts_valid_response_first_try() {
    let client = ScriptedCompletions::new(vec![valid_response(PROGRESSING_NARRATION)]);
    let game_master = GameMaster::new(client, moderate_embedder());
    let context = context_with_history();

    let response = game_master
        .generate_narrative(&context, &MemoryContext::default())
        .await
        .unwrap();

    assert_eq!(response.narration, PROGRESSING_NARRATION);
    assert_eq!(response.available_actions.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn qa_retries_after_malformed_json_then_succeeds() {
    let client = ScriptedCompletions::new(vec![
        "I cannot answer in JSON today.".to_string(),
        "{\"narration\": \"x\", \"available_actions\": [\"a\"]}".to_string(),
        valid_response(PROGRESSING_NARRATION),
    ]);
    let game_master = GameMaster::new(client, moderate_embedder());
    let context = context_with_history();

    let response = game_master
        .generate_narrative(&context, &MemoryContext::default())
        .await
        .unwrap();

    assert_eq!(response.narration, PROGRESSING_NARRATION);
}

#[tokio::test(start_paused = true)]
async fn qa_temperature_escalates_across_retries() {
    let client = ScriptedCompletions::new(vec![
        "not json".to_string(),
        "still not json".to_string(),
        valid_response(PROGRESSING_NARRATION),
    ]);
    let game_master = GameMaster::new(client, moderate_embedder());
    let context = context_with_history();

    game_master
        .generate_narrative(&context, &MemoryContext::default())
        .await
        .unwrap();

    let temperatures = game_master.client().seen_temperatures();
    assert_eq!(temperatures.len(), 3);
    assert!((temperatures[0] - 0.9).abs() < 1e-6);
    assert!((temperatures[1] - 1.05).abs() < 1e-6);
    assert!((temperatures[2] - 1.2).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn qa_stagnation_adds_temperature_bonus() {
    // First response repeats the scene verbatim in embedding space:
    // rejected for similarity with the window flagged stagnant.
    let repeated = "You searched the chapel nave for clues once more today.";
    let client = ScriptedCompletions::new(vec![
        valid_response(repeated),
        valid_response(PROGRESSING_NARRATION),
    ]);
    let game_master = GameMaster::new(client, moderate_embedder());
    let context = context_with_history();

    game_master
        .generate_narrative(&context, &MemoryContext::default())
        .await
        .unwrap();

    let temperatures = game_master.client().seen_temperatures();
    assert_eq!(temperatures.len(), 2);
    // 0.9 + 0.15 (retry) + 0.2 (stagnation bonus).
    assert!((temperatures[1] - 1.25).abs() < 1e-6);
}

// Scenario: structurally perfect JSON whose narration has nothing to
// do with the story. Every attempt is rejected for coherence and the
// turn ends in a terminal error naming the category.
#[tokio::test(start_paused = true)]
async fn qa_unrelated_narration_exhausts_as_coherence() {
    let unrelated = "Numbers scroll down a green terminal screen in silence.";
    let embedder = FixedEmbedder::uniform(vec![1.0, 0.0]).with_vector(unrelated, vec![0.0, 1.0]);
    let client = ScriptedCompletions::new(vec![
        valid_response(unrelated),
        valid_response(unrelated),
        valid_response(unrelated),
    ]);
    let game_master = GameMaster::new(client, embedder);
    let context = context_with_history();

    let error = game_master
        .generate_narrative(&context, &MemoryContext::default())
        .await
        .unwrap_err();

    match error {
        NarratorError::GenerationExhausted {
            attempts,
            last_failure,
        } => {
            assert_eq!(attempts, 3);
            assert!(last_failure.contains("COHERENCE"), "got: {last_failure}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// Scenario: the narration repeats a recent scene almost verbatim but
// introduces a brand-new named character, so the new-element rule
// accepts it anyway.
#[tokio::test]
async fn qa_new_character_bypasses_repetition() {
    let narration = "You searched the chapel nave for clues until Brother Almeric arrived.";
    let client = ScriptedCompletions::new(vec![valid_response(narration)]);
    // Identical embeddings everywhere: max similarity 1.0.
    let game_master = GameMaster::new(client, FixedEmbedder::uniform(vec![1.0, 0.0]));
    let context = context_with_history();

    let response = game_master
        .generate_narrative(&context, &MemoryContext::default())
        .await
        .unwrap();

    assert!(response.narration.contains("Almeric"));
}

#[tokio::test]
async fn qa_embedding_outage_degrades_to_structural_acceptance() {
    let client = ScriptedCompletions::new(vec![valid_response(PROGRESSING_NARRATION)]);
    let game_master = GameMaster::new(client, FailingEmbedder);
    let context = context_with_history();

    let response = game_master
        .generate_narrative(&context, &MemoryContext::default())
        .await
        .unwrap();

    assert_eq!(response.narration, PROGRESSING_NARRATION);
}

#[tokio::test(start_paused = true)]
async fn qa_completion_outage_counts_as_attempts() {
    // The scripted client errors once exhausted; all three attempts
    // fail and the error reports the attempt budget.
    let client = ScriptedCompletions::new(Vec::<String>::new());
    let game_master = GameMaster::new(client, moderate_embedder());
    let context = context_with_history();

    let error = game_master
        .generate_narrative(&context, &MemoryContext::default())
        .await
        .unwrap_err();

    match error {
        NarratorError::GenerationExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(game_master.client().calls(), 3);
}

#[tokio::test]
async fn qa_localized_response_shape() {
    use fabula_core::context::AdventureSettings;
    use fabula_core::lang::Language;

    let raw = "{\"narracao\": \"Você descobre uma escada oculta que revela uma nova passagem.\", \
               \"acoes_disponiveis\": [\"Descer\", \"Acender uma tocha\", \"Escutar\"]}";
    let client = ScriptedCompletions::new(vec![raw]);
    let game_master = GameMaster::new(client, FixedEmbedder::uniform(vec![1.0, 0.0]));

    let mut context = GameContext::new(AdventureId::new(), "Diante do altar.")
        .with_action("empurrar o altar");
    context.settings = AdventureSettings::default().with_language(Language::PtBr);

    let json = game_master
        .generate_narrative_json(&context, &MemoryContext::default())
        .await
        .unwrap();

    assert!(json.contains("\"narracao\""));
    assert!(json.contains("\"acoes_disponiveis\""));
    assert!(!json.contains("\"narration\""));
}
