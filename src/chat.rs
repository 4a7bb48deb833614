//! Chat turn orchestration
//!
//! One submission reads the session's context window, assembles the prompt,
//! calls the inference gateway once and appends the resulting turn.

use crate::chat_history::{ChatHistoryError, ChatHistoryStore, ConversationTurn, StorageStats};
use crate::inference::{GenerationError, InferenceGateway};
use crate::prompt::{PromptAssembler, CONTEXT_WINDOW_TURNS};
use crate::thoughts::{preview, ThoughtKind, ThoughtSink};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Empty request")]
    Validation,

    #[error(transparent)]
    Storage(#[from] ChatHistoryError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Result of a successful submission
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub turn: ConversationTurn,
    /// False when the stored reply is a failure sentinel
    pub generated: bool,
}

impl ChatOutcome {
    pub fn reply(&self) -> &str {
        &self.turn.ai_response
    }
}

/// Reply stored in place of a model answer when generation fails.
pub fn failure_reply(err: &GenerationError) -> String {
    format!("Error: {}", err)
}

pub struct ChatService {
    store: Arc<dyn ChatHistoryStore>,
    gateway: Arc<dyn InferenceGateway>,
    assembler: PromptAssembler,
    thoughts: Arc<dyn ThoughtSink>,
    /// Store `Error: <reason>` as the reply when the model call fails
    persist_failed_turns: bool,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatHistoryStore>,
        gateway: Arc<dyn InferenceGateway>,
        assembler: PromptAssembler,
        thoughts: Arc<dyn ThoughtSink>,
    ) -> Self {
        Self {
            store,
            gateway,
            assembler,
            thoughts,
            persist_failed_turns: true,
        }
    }

    pub fn with_persist_failed_turns(mut self, persist: bool) -> Self {
        self.persist_failed_turns = persist;
        self
    }

    pub fn store(&self) -> &Arc<dyn ChatHistoryStore> {
        &self.store
    }

    pub fn model(&self) -> &str {
        self.gateway.model()
    }

    fn thought(&self, kind: ThoughtKind, message: String) {
        self.thoughts.emit(kind, message);
    }

    /// Handle one user message for `session_id`.
    pub async fn submit(&self, session_id: &str, raw_input: &str) -> Result<ChatOutcome, ChatError> {
        let input = raw_input.trim();
        if input.is_empty() {
            self.thought(ThoughtKind::Error, "Empty request".to_string());
            return Err(ChatError::Validation);
        }

        let history = self
            .store
            .recent_turns(session_id, CONTEXT_WINDOW_TURNS)
            .await
            .map_err(|e| self.storage_failure(e))?;

        let (reply, generated) = match self.generate_reply(input, &history).await {
            Ok(text) => (text, true),
            Err(e) if self.persist_failed_turns => (failure_reply(&e), false),
            Err(e) => return Err(ChatError::Generation(e)),
        };

        let turn = self
            .store
            .append(session_id, input, &reply)
            .await
            .map_err(|e| self.storage_failure(e))?;

        self.thought(ThoughtKind::System, "Turn saved to history".to_string());
        Ok(ChatOutcome { turn, generated })
    }

    async fn generate_reply(
        &self,
        input: &str,
        history: &[ConversationTurn],
    ) -> Result<String, GenerationError> {
        let ellipsis = if input.chars().count() > 200 { "..." } else { "" };
        self.thought(
            ThoughtKind::UserInput,
            format!("{}{}", preview(input, 200), ellipsis),
        );

        let messages = self.assembler.assemble(input, history, self.thoughts.as_ref());

        self.thought(ThoughtKind::Thinking, "Starting reply generation...".to_string());
        self.thought(
            ThoughtKind::System,
            format!("Using Ollama API (model: {})", self.gateway.model()),
        );

        match self.gateway.generate(&messages).await {
            Ok(reply) => {
                self.thought(
                    ThoughtKind::Response,
                    format!(
                        "Generated reply ({} characters): {}...",
                        reply.chars().count(),
                        preview(&reply, 100)
                    ),
                );
                Ok(reply)
            }
            Err(e) => {
                self.thought(ThoughtKind::Error, format!("Generation failed: {}", e));
                Err(e)
            }
        }
    }

    fn storage_failure(&self, e: ChatHistoryError) -> ChatError {
        self.thought(ThoughtKind::Error, format!("Request failed: {}", e));
        ChatError::Storage(e)
    }

    /// Full chronological history of the session
    pub async fn history(&self, session_id: &str) -> Result<Vec<ConversationTurn>, ChatError> {
        Ok(self.store.all_turns(session_id).await?)
    }

    /// Remove the session's history, returning the number of turns deleted
    pub async fn clear(&self, session_id: &str) -> Result<u64, ChatError> {
        let removed = self.store.clear_session(session_id).await?;
        self.thought(
            ThoughtKind::System,
            format!("Cleared {} turns from history", removed),
        );
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<StorageStats, ChatError> {
        Ok(self.store.stats().await?)
    }
}
