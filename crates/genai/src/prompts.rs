use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use crate::artifact::{ArtifactKind, ChatRole, ChatTurn};

/// Requested difficulty for generated study content.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, TS,
)]
#[ts(export)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Build the prompt for one generation request.
pub fn build_prompt(kind: ArtifactKind, source_text: &str, difficulty: Difficulty) -> String {
    match kind {
        ArtifactKind::Quiz => format!(
            "Generate a 5-question multiple-choice quiz from the provided text. \
             Difficulty: {difficulty}.\n\
             The output must be valid JSON with the exact schema.\n\
             Text: {source_text}"
        ),
        ArtifactKind::Explanation => format!(
            "You are a helpful AI tutor. Generate a detailed explanation of key concepts \
             from the text for a '{difficulty}' level learner. Format with Markdown.\n\
             Text: {source_text}"
        ),
        ArtifactKind::MindMap => format!(
            "Extract key concepts and their relationships from the text to create a \
             hierarchical mind map structure. Identify the main topic, subtopics, and \
             supporting details. Return as JSON with nodes and their relationships.\n\
             Text: {source_text}"
        ),
        ArtifactKind::Flashcards => format!(
            "Create 10 flashcards from the provided text. Each flashcard should have a \
             clear question on the front and a detailed answer on the back. \
             Difficulty: {difficulty}. Focus on key concepts, definitions, and important facts.\n\
             Return JSON per schema.\n\
             Text: {source_text}"
        ),
    }
}

/// Build the prompt for a chat follow-up, scoped by the visible transcript.
pub fn build_chat_prompt(history: &[ChatTurn], question: &str, difficulty: Difficulty) -> String {
    let mut prompt = format!(
        "You are an AI tutor. A detailed explanation is already on screen. Answer the \
         user's follow-up question briefly and conversationally, based on the chat \
         history. Difficulty: {difficulty}.\nChat history:\n"
    );
    for turn in history {
        let speaker = match turn.role {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        };
        prompt.push_str(&format!("{speaker}: {}\n", turn.text));
    }
    prompt.push_str(&format!("Question: {question}"));
    prompt
}

/// Response schema requested from the endpoint, in its own schema dialect.
/// Explanations and chat replies are free text and carry no schema.
pub fn response_schema(kind: ArtifactKind) -> Option<Value> {
    match kind {
        ArtifactKind::Explanation => None,
        ArtifactKind::Quiz => Some(json!({
            "type": "OBJECT",
            "properties": {
                "quizTitle": { "type": "STRING" },
                "questions": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "questionText": { "type": "STRING" },
                            "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                            "correctAnswerIndex": { "type": "INTEGER" },
                            "explanation": { "type": "STRING" },
                        },
                        "required": ["questionText", "options", "correctAnswerIndex", "explanation"],
                    },
                },
            },
            "required": ["quizTitle", "questions"],
        })),
        ArtifactKind::MindMap => Some(json!({
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "nodes": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": { "type": "STRING" },
                            "label": { "type": "STRING" },
                            "level": { "type": "INTEGER" },
                            "parentId": { "type": "STRING" },
                            "description": { "type": "STRING" },
                        },
                        "required": ["id", "label", "level"],
                    },
                },
            },
            "required": ["title", "nodes"],
        })),
        ArtifactKind::Flashcards => Some(json!({
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "flashcards": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": { "type": "STRING" },
                            "question": { "type": "STRING" },
                            "answer": { "type": "STRING" },
                            "topic": { "type": "STRING" },
                            "difficulty": { "type": "STRING" },
                        },
                        "required": ["id", "question", "answer", "topic"],
                    },
                },
            },
            "required": ["title", "flashcards"],
        })),
    }
}
