//! Language support for prompts and responses.
//!
//! The engine is bilingual (American English and Brazilian Portuguese).
//! The language changes the system prompt, the labels used in the
//! context block, and the field names the model must emit in its JSON
//! response. The validator reads the same field tables, so a pt-BR
//! adventure rejects an en-US shaped response as malformed.

use serde::{Deserialize, Serialize};

/// Supported adventure languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "pt-BR")]
    PtBr,
}

impl Language {
    /// Parse a BCP 47-ish language code. Unknown codes fall back to
    /// en-US.
    pub fn from_code(code: &str) -> Self {
        match code.to_lowercase().as_str() {
            "pt-br" | "pt" => Language::PtBr,
            _ => Language::EnUs,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::EnUs => "en-US",
            Language::PtBr => "pt-BR",
        }
    }

    /// Name of the mandatory narration field in the model's JSON
    /// response.
    pub fn narration_field(&self) -> &'static str {
        match self {
            Language::EnUs => "narration",
            Language::PtBr => "narracao",
        }
    }

    /// Name of the optional atmosphere field.
    pub fn atmosphere_field(&self) -> &'static str {
        match self {
            Language::EnUs => "atmosphere",
            Language::PtBr => "atmosfera",
        }
    }

    /// Name of the suggested-actions array field.
    pub fn actions_field(&self) -> &'static str {
        match self {
            Language::EnUs => "available_actions",
            Language::PtBr => "acoes_disponiveis",
        }
    }

    /// Every field the response object may carry. Anything else is a
    /// structural error.
    pub fn allowed_fields(&self) -> [&'static str; 3] {
        [
            self.narration_field(),
            self.atmosphere_field(),
            self.actions_field(),
        ]
    }

    /// Stop sequences that truncate the model when it starts writing
    /// the player's turn for them.
    pub fn stop_sequences(&self) -> Vec<String> {
        match self {
            Language::EnUs => vec!["Player:".to_string(), "PLAYER:".to_string()],
            Language::PtBr => vec!["Jogador:".to_string(), "JOGADOR:".to_string()],
        }
    }

    /// The base system prompt for the game master.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Language::EnUs => {
                "You are a skilled Game Master narrating an interactive RPG adventure. \
                 Continue the story from the player's action. Advance the plot with \
                 concrete events and consequences; never merely restate the current \
                 scene. Introduce new locations, characters and discoveries when the \
                 story calls for them. Stay consistent with everything established so \
                 far.\n\
                 Respond ONLY with a single valid JSON object, no prose before or \
                 after it, using exactly these fields: \"narration\" (the story \
                 continuation), \"atmosphere\" (optional sensory description), \
                 \"available_actions\" (an array of 3 to 5 suggested next actions)."
            }
            Language::PtBr => {
                "Você é um Mestre de Jogo habilidoso narrando uma aventura de RPG \
                 interativa. Continue a história a partir da ação do jogador. Avance a \
                 trama com eventos e consequências concretas; nunca apenas repita a \
                 cena atual. Introduza novos lugares, personagens e descobertas quando \
                 a história pedir. Mantenha coerência com tudo o que já foi \
                 estabelecido.\n\
                 Responda APENAS com um único objeto JSON válido, sem texto antes ou \
                 depois, usando exatamente estes campos: \"narracao\" (a continuação \
                 da história), \"atmosfera\" (descrição sensorial opcional), \
                 \"acoes_disponiveis\" (uma lista de 3 a 5 próximas ações sugeridas)."
            }
        }
    }

    /// An example of the exact JSON shape expected, in this language's
    /// field names.
    pub fn schema_example(&self) -> &'static str {
        match self {
            Language::EnUs => {
                "Example response format:\n\
                 {\n\
                 \x20 \"narration\": \"The old door gives way and cold air rushes out...\",\n\
                 \x20 \"atmosphere\": \"Dust motes drift through a shaft of grey light.\",\n\
                 \x20 \"available_actions\": [\"Light a torch\", \"Call out into the dark\", \"Search the doorway\"]\n\
                 }"
            }
            Language::PtBr => {
                "Exemplo do formato de resposta:\n\
                 {\n\
                 \x20 \"narracao\": \"A porta velha cede e um ar frio escapa...\",\n\
                 \x20 \"atmosfera\": \"Poeira flutua em um feixe de luz cinzenta.\",\n\
                 \x20 \"acoes_disponiveis\": [\"Acender uma tocha\", \"Gritar na escuridão\", \"Examinar a entrada\"]\n\
                 }"
            }
        }
    }

    /// Header for the correction block injected on a retry.
    pub fn correction_header(&self) -> &'static str {
        match self {
            Language::EnUs => "Your previous response was rejected for the following reason",
            Language::PtBr => "Sua resposta anterior foi rejeitada pelo seguinte motivo",
        }
    }

    /// Instruction appended when the story has lingered in one place.
    pub fn location_change_instruction(&self) -> &'static str {
        match self {
            Language::EnUs => {
                "IMPORTANT: the story has stayed in the same location for several \
                 scenes. Move the action somewhere new in this response."
            }
            Language::PtBr => {
                "IMPORTANTE: a história permaneceu no mesmo lugar por várias cenas. \
                 Leve a ação para um lugar novo nesta resposta."
            }
        }
    }

    /// Instruction appended when there is no active quest to pull the
    /// story forward.
    pub fn quest_hook_instruction(&self) -> &'static str {
        match self {
            Language::EnUs => {
                "IMPORTANT: there is no active quest. Introduce a concrete goal, \
                 mission or mystery the player can pursue."
            }
            Language::PtBr => {
                "IMPORTANTE: não há nenhuma missão ativa. Introduza um objetivo, \
                 missão ou mistério concreto que o jogador possa perseguir."
            }
        }
    }

    /// Labels for the context block rendered into the prompt.
    pub fn labels(&self) -> ContextLabels {
        match self {
            Language::EnUs => ContextLabels {
                scene: "Current scene",
                location: "Current location",
                characters: "Characters",
                health: "Health",
                mana: "Mana",
                inventory: "Inventory",
                quest_progress: "Quest progress",
                action: "Player action",
                combat: "Active combat",
                round: "Round",
                current_turn: "Current turn",
                world_style: "World style",
                tone: "Tone",
                magic: "Magic level",
                setting: "Setting",
                empty: "none",
            },
            Language::PtBr => ContextLabels {
                scene: "Cena atual",
                location: "Localização atual",
                characters: "Personagens",
                health: "Vida",
                mana: "Mana",
                inventory: "Inventário",
                quest_progress: "Progresso da missão",
                action: "Ação do jogador",
                combat: "Combate ativo",
                round: "Rodada",
                current_turn: "Turno atual",
                world_style: "Estilo de mundo",
                tone: "Tom",
                magic: "Nível de magia",
                setting: "Cenário",
                empty: "nenhum",
            },
        }
    }
}

/// Localized labels for the prompt's context block.
#[derive(Debug, Clone, Copy)]
pub struct ContextLabels {
    pub scene: &'static str,
    pub location: &'static str,
    pub characters: &'static str,
    pub health: &'static str,
    pub mana: &'static str,
    pub inventory: &'static str,
    pub quest_progress: &'static str,
    pub action: &'static str,
    pub combat: &'static str,
    pub round: &'static str,
    pub current_turn: &'static str,
    pub world_style: &'static str,
    pub tone: &'static str,
    pub magic: &'static str,
    pub setting: &'static str,
    pub empty: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        assert_eq!(Language::from_code("pt-BR"), Language::PtBr);
        assert_eq!(Language::from_code("pt"), Language::PtBr);
        assert_eq!(Language::from_code("en-US"), Language::EnUs);
        assert_eq!(Language::from_code("fr-FR"), Language::EnUs);
    }

    #[test]
    fn test_field_names_differ_by_language() {
        assert_eq!(Language::EnUs.narration_field(), "narration");
        assert_eq!(Language::PtBr.narration_field(), "narracao");
        assert_eq!(Language::PtBr.actions_field(), "acoes_disponiveis");
    }

    #[test]
    fn test_schema_example_uses_localized_fields() {
        assert!(Language::EnUs.schema_example().contains("available_actions"));
        assert!(Language::PtBr.schema_example().contains("acoes_disponiveis"));
    }

    #[test]
    fn test_serde_codes() {
        let json = serde_json::to_string(&Language::PtBr).unwrap();
        assert_eq!(json, "\"pt-BR\"");
        let parsed: Language = serde_json::from_str("\"en-US\"").unwrap();
        assert_eq!(parsed, Language::EnUs);
    }
}
