use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};
use ts_rs::TS;

/// Generated content kinds. Doubles as the type tag of persisted history
/// records, stored lowercase.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    sqlx::Type,
    TS,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[ts(export)]
pub enum ArtifactKind {
    Quiz,
    Explanation,
    MindMap,
    Flashcards,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuizQuestion {
    #[serde(rename = "questionText")]
    pub text: String,
    pub options: Vec<String>,
    #[serde(rename = "correctAnswerIndex")]
    pub correct_index: u32,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuizPayload {
    #[serde(rename = "quizTitle")]
    pub title: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExplanationPayload {
    #[serde(rename = "bodyText")]
    pub body: String,
    #[serde(rename = "chatHistory", default)]
    pub chat_history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MindMapNode {
    pub id: String,
    pub label: String,
    pub level: u32,
    #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MindMapPayload {
    pub title: String,
    pub nodes: Vec<MindMapNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Flashcard {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FlashcardsPayload {
    pub title: String,
    #[serde(rename = "flashcards")]
    pub cards: Vec<Flashcard>,
}

/// One generated content object. Exactly one variant is active in a session
/// at a time; producing a new artifact of any kind replaces the current one.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "lowercase")]
#[ts(export)]
pub enum Artifact {
    Quiz(QuizPayload),
    Explanation(ExplanationPayload),
    MindMap(MindMapPayload),
    Flashcards(FlashcardsPayload),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Quiz(_) => ArtifactKind::Quiz,
            Artifact::Explanation(_) => ArtifactKind::Explanation,
            Artifact::MindMap(_) => ArtifactKind::MindMap,
            Artifact::Flashcards(_) => ArtifactKind::Flashcards,
        }
    }

    /// Title carried by the payload itself. Explanations have none; callers
    /// derive one from the source text.
    pub fn title(&self) -> Option<&str> {
        match self {
            Artifact::Quiz(quiz) => Some(&quiz.title),
            Artifact::Explanation(_) => None,
            Artifact::MindMap(map) => Some(&map.title),
            Artifact::Flashcards(cards) => Some(&cards.title),
        }
    }

    /// Parse the model's response text for `kind`. Structured kinds expect a
    /// JSON document (possibly fenced); explanations are free text.
    pub fn from_response_text(kind: ArtifactKind, raw: &str) -> Result<Self, serde_json::Error> {
        let cleaned = clean_fences(raw);
        Ok(match kind {
            ArtifactKind::Quiz => Artifact::Quiz(serde_json::from_str(cleaned)?),
            ArtifactKind::MindMap => Artifact::MindMap(serde_json::from_str(cleaned)?),
            ArtifactKind::Flashcards => Artifact::Flashcards(serde_json::from_str(cleaned)?),
            ArtifactKind::Explanation => Artifact::Explanation(ExplanationPayload {
                body: raw.trim().to_string(),
                chat_history: Vec::new(),
            }),
        })
    }

    /// Untagged payload body for persistence.
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Artifact::Quiz(payload) => serde_json::to_value(payload),
            Artifact::Explanation(payload) => serde_json::to_value(payload),
            Artifact::MindMap(payload) => serde_json::to_value(payload),
            Artifact::Flashcards(payload) => serde_json::to_value(payload),
        }
    }

    /// Re-type a stored payload body by its record tag.
    pub fn from_parts(kind: ArtifactKind, payload: &Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ArtifactKind::Quiz => Artifact::Quiz(serde_json::from_value(payload.clone())?),
            ArtifactKind::Explanation => {
                Artifact::Explanation(serde_json::from_value(payload.clone())?)
            }
            ArtifactKind::MindMap => Artifact::MindMap(serde_json::from_value(payload.clone())?),
            ArtifactKind::Flashcards => {
                Artifact::Flashcards(serde_json::from_value(payload.clone())?)
            }
        })
    }
}

/// Strip a surrounding markdown code fence from a structured payload.
pub fn clean_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
