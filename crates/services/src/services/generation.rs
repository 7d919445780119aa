use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use db::{
    DbService,
    models::history_record::{CreateHistoryRecord, HistoryRecord},
};
use genai::{
    artifact::{Artifact, ArtifactKind, ChatRole, ChatTurn},
    client::{GenerateRequest, GenerativeApi},
    error::GenAiError,
    prompts::{self, Difficulty},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use ts_rs::TS;
use utils::auth::AuthProvider;
use uuid::Uuid;

use crate::services::config::ModelConfig;

/// Upper bound on pasted or extracted source text.
pub const MAX_SOURCE_TEXT_LEN: usize = 1_000_000;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("sign in to generate and save study content")]
    AuthRequired,
    #[error(transparent)]
    Api(#[from] GenAiError),
    #[error("the model response did not match the expected structure: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Whether a finished request mutated the session or was silently superseded
/// by a newer request on the same lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Applied,
    Superseded,
}

/// Main generation and chat follow-up run on independent lanes; a new
/// request cancels only its own lane's predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Lane {
    Generation,
    Chat,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    pub difficulty: Difficulty,
}

/// Point-in-time view of the session for rendering.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub active: Option<Artifact>,
    pub loading: bool,
    pub chat_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuestionFeedback {
    pub question: String,
    pub selected_index: Option<u32>,
    pub correct_index: u32,
    pub is_correct: bool,
    pub explanation: String,
}

/// Graded result of one quiz attempt.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FeedbackReport {
    pub score: u32,
    pub question_count: u32,
    pub questions: Vec<QuestionFeedback>,
}

#[derive(Default)]
struct SessionState {
    active: Option<Artifact>,
    loading: bool,
    chat_loading: bool,
    error: Option<String>,
}

/// Drives one generation request at a time against the model endpoint and
/// persists successes to the owner's history.
#[derive(Clone)]
pub struct GenerationSession {
    db: DbService,
    api: Arc<dyn GenerativeApi>,
    auth: Arc<dyn AuthProvider>,
    models: ModelConfig,
    state: Arc<Mutex<SessionState>>,
    lanes: Arc<DashMap<Lane, CancellationToken>>,
}

impl GenerationSession {
    pub fn new(
        db: DbService,
        api: Arc<dyn GenerativeApi>,
        auth: Arc<dyn AuthProvider>,
        models: ModelConfig,
    ) -> Self {
        Self {
            db,
            api,
            auth,
            models,
            state: Arc::new(Mutex::new(SessionState::default())),
            lanes: Arc::new(DashMap::new()),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.with_state(|state| SessionSnapshot {
            active: state.active.clone(),
            loading: state.loading,
            chat_loading: state.chat_loading,
            error: state.error.clone(),
        })
    }

    pub fn dismiss_error(&self) {
        self.with_state(|state| state.error = None);
    }

    /// Generate a new artifact from `source_text`. Cancels any pending
    /// generation first; only the newest request may touch the session.
    pub async fn generate(
        &self,
        kind: ArtifactKind,
        source_text: &str,
        options: GenerateOptions,
    ) -> Result<RequestOutcome, SessionError> {
        let trimmed = source_text.trim();
        if trimmed.is_empty() {
            return Err(self.record_error(SessionError::Validation(
                "provide some text to generate from".to_string(),
            )));
        }
        if trimmed.len() > MAX_SOURCE_TEXT_LEN {
            return Err(self.record_error(SessionError::Validation(
                "source text is too large".to_string(),
            )));
        }
        let Some(owner_id) = self.auth.current_user() else {
            return Err(self.record_error(SessionError::AuthRequired));
        };

        let token = self.begin_request(Lane::Generation);
        self.with_state(|state| {
            state.loading = true;
            state.error = None;
        });

        let request = GenerateRequest {
            model: self.model_for(kind),
            prompt: prompts::build_prompt(kind, trimmed, options.difficulty),
            response_schema: prompts::response_schema(kind),
        };

        let resolution = tokio::select! {
            _ = token.cancelled() => None,
            result = self.api.generate(request) => Some(result),
        };
        // A superseded request leaves every piece of state alone, including
        // the loading flag the newer request now owns.
        let Some(result) = resolution else {
            return Ok(RequestOutcome::Superseded);
        };
        if token.is_cancelled() {
            return Ok(RequestOutcome::Superseded);
        }

        let raw = match result {
            Ok(raw) => raw,
            Err(err) => return Err(self.finish_generation_with(err.into())),
        };
        let mut artifact = match Artifact::from_response_text(kind, &raw) {
            Ok(artifact) => artifact,
            Err(err) => return Err(self.finish_generation_with(err.into())),
        };

        if let Artifact::Explanation(payload) = &mut artifact {
            payload.chat_history = seed_chat_history(&payload.body);
        }

        let title = artifact_title(&artifact, trimmed);
        self.with_state(|state| {
            state.active = Some(artifact.clone());
            state.loading = false;
            state.error = None;
        });

        self.persist_artifact(owner_id, &artifact, &title).await;

        Ok(RequestOutcome::Applied)
    }

    /// Send a chat follow-up against the active explanation. The user's turn
    /// is appended optimistically and stays in the transcript even if the
    /// request is later superseded.
    pub async fn send_chat_message(
        &self,
        message: &str,
        difficulty: Difficulty,
    ) -> Result<RequestOutcome, SessionError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(self.record_error(SessionError::Validation(
                "message cannot be empty".to_string(),
            )));
        }

        let history = {
            let mut state = self.state.lock().expect("session state lock poisoned");
            let Some(Artifact::Explanation(payload)) = &mut state.active else {
                drop(state);
                return Err(self.record_error(SessionError::Validation(
                    "chat is only available while an explanation is active".to_string(),
                )));
            };
            payload.chat_history.push(ChatTurn {
                role: ChatRole::User,
                text: message.to_string(),
            });
            payload.chat_history.clone()
        };

        let token = self.begin_request(Lane::Chat);
        self.with_state(|state| {
            state.chat_loading = true;
            state.error = None;
        });

        let request = GenerateRequest::text(
            self.models.structured_model.clone(),
            prompts::build_chat_prompt(&history, message, difficulty),
        );

        let resolution = tokio::select! {
            _ = token.cancelled() => None,
            result = self.api.generate(request) => Some(result),
        };
        let Some(result) = resolution else {
            return Ok(RequestOutcome::Superseded);
        };
        if token.is_cancelled() {
            return Ok(RequestOutcome::Superseded);
        }

        match result {
            Ok(reply) => {
                self.with_state(|state| {
                    if let Some(Artifact::Explanation(payload)) = &mut state.active {
                        payload.chat_history.push(ChatTurn {
                            role: ChatRole::Model,
                            text: reply,
                        });
                    }
                    state.chat_loading = false;
                });
                Ok(RequestOutcome::Applied)
            }
            Err(err) => {
                self.with_state(|state| state.chat_loading = false);
                Err(self.record_error(err.into()))
            }
        }
    }

    /// Grade the active quiz and persist the attempt. `answers[i]` is the
    /// selected option index for question `i`; `None` marks it unanswered.
    pub async fn submit_quiz_answers(
        &self,
        answers: &[Option<u32>],
    ) -> Result<FeedbackReport, SessionError> {
        let quiz = self.with_state(|state| match &state.active {
            Some(Artifact::Quiz(quiz)) => Ok(quiz.clone()),
            _ => Err(SessionError::Validation(
                "no active quiz to grade".to_string(),
            )),
        })?;
        let Some(owner_id) = self.auth.current_user() else {
            return Err(self.record_error(SessionError::AuthRequired));
        };

        let mut score = 0;
        let questions: Vec<QuestionFeedback> = quiz
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let selected = answers.get(index).copied().flatten();
                let is_correct = selected == Some(question.correct_index);
                if is_correct {
                    score += 1;
                }
                QuestionFeedback {
                    question: question.text.clone(),
                    selected_index: selected,
                    correct_index: question.correct_index,
                    is_correct,
                    explanation: question.explanation.clone(),
                }
            })
            .collect();

        let report = FeedbackReport {
            score,
            question_count: quiz.questions.len() as u32,
            questions,
        };

        let data = CreateHistoryRecord {
            owner_id,
            kind: ArtifactKind::Quiz,
            title: quiz.title.clone(),
            payload: serde_json::to_value(&report)?,
            score: Some(i64::from(report.score)),
            question_count: Some(i64::from(report.question_count)),
        };
        if let Err(err) = HistoryRecord::create(&self.db.pool, &data, Uuid::new_v4()).await {
            tracing::warn!(error = %err, "failed to save quiz attempt");
        }

        Ok(report)
    }

    /// Install a stored artifact back into the session without generating.
    pub fn rehydrate(&self, record: &HistoryRecord) -> Result<(), SessionError> {
        let artifact = record.artifact()?;
        self.cancel_lane(Lane::Generation);
        self.with_state(|state| {
            state.active = Some(artifact);
            state.loading = false;
            state.error = None;
        });
        Ok(())
    }

    /// Cancel everything in flight and drop the active artifact. Persisted
    /// history is untouched.
    pub fn reset(&self) {
        self.cancel_lane(Lane::Generation);
        self.cancel_lane(Lane::Chat);
        self.with_state(|state| {
            state.active = None;
            state.loading = false;
            state.chat_loading = false;
            state.error = None;
        });
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.lock().expect("session state lock poisoned");
        f(&mut state)
    }

    /// Invalidate the lane's previous request, then issue a fresh token.
    fn begin_request(&self, lane: Lane) -> CancellationToken {
        if let Some(previous) = self.lanes.get(&lane) {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.lanes.insert(lane, token.clone());
        token
    }

    fn cancel_lane(&self, lane: Lane) {
        if let Some((_, token)) = self.lanes.remove(&lane) {
            token.cancel();
        }
    }

    fn model_for(&self, kind: ArtifactKind) -> String {
        match kind {
            ArtifactKind::Explanation => self.models.text_model.clone(),
            _ => self.models.structured_model.clone(),
        }
    }

    fn record_error(&self, err: SessionError) -> SessionError {
        self.with_state(|state| state.error = Some(err.to_string()));
        err
    }

    fn finish_generation_with(&self, err: SessionError) -> SessionError {
        self.with_state(|state| {
            state.loading = false;
            state.error = Some(err.to_string());
        });
        err
    }

    /// Write a history record for a freshly applied artifact. Failures are
    /// logged, never surfaced; the on-screen result already succeeded.
    async fn persist_artifact(&self, owner_id: Uuid, artifact: &Artifact, title: &str) {
        let payload = match artifact.payload() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize artifact for history");
                return;
            }
        };
        let data = CreateHistoryRecord {
            owner_id,
            kind: artifact.kind(),
            title: title.to_string(),
            payload,
            score: None,
            question_count: None,
        };
        if let Err(err) = HistoryRecord::create(&self.db.pool, &data, Uuid::new_v4()).await {
            tracing::warn!(error = %err, "failed to save history record");
        }
    }
}

/// Prime the transcript so follow-up questions land in context.
fn seed_chat_history(explanation: &str) -> Vec<ChatTurn> {
    vec![
        ChatTurn {
            role: ChatRole::User,
            text: format!("Here is the context for our conversation: \"\"\"{explanation}\"\"\""),
        },
        ChatTurn {
            role: ChatRole::Model,
            text: "Great! I've read the explanation. What would you like to know?".to_string(),
        },
    ]
}

fn artifact_title(artifact: &Artifact, source_text: &str) -> String {
    match artifact.title() {
        Some(title) if !title.trim().is_empty() => title.to_string(),
        _ => match artifact.kind() {
            ArtifactKind::Quiz => "New Quiz".to_string(),
            ArtifactKind::MindMap => "Mind Map".to_string(),
            ArtifactKind::Flashcards => "Flashcards".to_string(),
            ArtifactKind::Explanation => {
                let prefix: String = source_text.chars().take(40).collect();
                format!("Explanation: {prefix}...")
            }
        },
    }
}
