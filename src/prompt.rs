//! Prompt assembly
//!
//! Turns the current input plus stored history into the ordered message list
//! sent to the model: one system instruction, then at most
//! [`CONTEXT_WINDOW_TURNS`] prior turns as user/assistant pairs, then the input.

use crate::chat_history::ConversationTurn;
use crate::thoughts::{preview, ThoughtKind, ThoughtSink};
use serde::{Deserialize, Serialize};

/// Number of prior turns included in a prompt
pub const CONTEXT_WINDOW_TURNS: usize = 10;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Answer simply, without formalities, and feel free to be casual. Markdown is supported.";

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_prompt: String,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl PromptAssembler {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// Reads OLLAMA_CHAT_SYSTEM_PROMPT, falling back to the built-in instruction.
    pub fn from_env() -> Self {
        match std::env::var("OLLAMA_CHAT_SYSTEM_PROMPT") {
            Ok(prompt) if !prompt.trim().is_empty() => Self::new(prompt),
            _ => Self::default(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Build the message list for one model call.
    ///
    /// `history` must be chronological. Only its last [`CONTEXT_WINDOW_TURNS`]
    /// entries are used. The current input is always appended as the final user
    /// message, even when empty.
    pub fn assemble(
        &self,
        current_input: &str,
        history: &[ConversationTurn],
        sink: &dyn ThoughtSink,
    ) -> Vec<ChatMessage> {
        let window = &history[history.len().saturating_sub(CONTEXT_WINDOW_TURNS)..];
        let mut messages = Vec::with_capacity(2 + window.len() * 2);

        messages.push(ChatMessage::system(self.system_prompt.clone()));
        sink.emit(
            ThoughtKind::System,
            format!("System prompt: {}...", preview(&self.system_prompt, 50)),
        );

        if !history.is_empty() {
            sink.emit(
                ThoughtKind::Thinking,
                format!("Loading history ({} turns)", history.len()),
            );
            for turn in window {
                messages.push(ChatMessage::user(turn.user_input.clone()));
                messages.push(ChatMessage::assistant(turn.ai_response.clone()));
                sink.emit(
                    ThoughtKind::Context,
                    format!(
                        "{}... → {}...",
                        preview(&turn.user_input, 30),
                        preview(&turn.ai_response, 30)
                    ),
                );
            }
        }

        messages.push(ChatMessage::user(current_input));
        sink.emit(
            ThoughtKind::Thinking,
            format!(
                "Added current request ({} characters)",
                current_input.chars().count()
            ),
        );

        messages
    }
}
