//! In-memory chat history storage backend
//!
//! Fast, simple storage for development and testing.
//! Data is lost when the process exits.

use crate::chat_history::{
    current_timestamp, ChatHistoryError, ChatHistoryStore, ConversationTurn, Result, StorageStats,
};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct MemoryState {
    turns: Vec<ConversationTurn>,
    next_id: i64,
}

/// In-memory storage backend
#[derive(Clone)]
pub struct MemoryChatHistoryStore {
    state: Arc<RwLock<MemoryState>>,
    max_turns: Option<usize>,
}

impl MemoryChatHistoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            max_turns: None,
        }
    }

    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            max_turns: Some(max_turns),
        }
    }

    fn prune_turns_if_needed(&self, state: &mut MemoryState) {
        if let Some(max) = self.max_turns {
            if state.turns.len() > max {
                let to_remove = state.turns.len() - max;
                state.turns.drain(0..to_remove);
            }
        }
    }

    fn lock_error<E: std::fmt::Display>(e: E) -> ChatHistoryError {
        ChatHistoryError::Storage(format!("Lock error: {}", e))
    }
}

impl Default for MemoryChatHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChatHistoryStore for MemoryChatHistoryStore {
    async fn init(&self) -> Result<()> {
        // Nothing to initialize for memory storage
        Ok(())
    }

    async fn append(
        &self,
        session_id: &str,
        user_input: &str,
        ai_response: &str,
    ) -> Result<ConversationTurn> {
        let mut state = self.state.write().map_err(Self::lock_error)?;

        // Turns are kept in insertion order; timestamps must never go backwards.
        let mut created_at = current_timestamp();
        if let Some(last) = state.turns.last() {
            if last.created_at > created_at {
                created_at = last.created_at;
            }
        }

        state.next_id += 1;
        let turn = ConversationTurn {
            id: state.next_id,
            session_id: session_id.to_string(),
            user_input: user_input.to_string(),
            ai_response: ai_response.to_string(),
            created_at,
        };
        state.turns.push(turn.clone());

        self.prune_turns_if_needed(&mut state);
        Ok(turn)
    }

    async fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let state = self.state.read().map_err(Self::lock_error)?;

        let mut results: Vec<ConversationTurn> = state
            .turns
            .iter()
            .rev()
            .filter(|turn| turn.session_id == session_id)
            .take(limit)
            .cloned()
            .collect();

        results.reverse();
        Ok(results)
    }

    async fn all_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let state = self.state.read().map_err(Self::lock_error)?;

        Ok(state
            .turns
            .iter()
            .filter(|turn| turn.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn clear_session(&self, session_id: &str) -> Result<u64> {
        let mut state = self.state.write().map_err(Self::lock_error)?;

        let before = state.turns.len();
        state.turns.retain(|turn| turn.session_id != session_id);
        Ok((before - state.turns.len()) as u64)
    }

    async fn stats(&self) -> Result<StorageStats> {
        let state = self.state.read().map_err(Self::lock_error)?;

        let sessions: HashSet<&str> = state
            .turns
            .iter()
            .map(|turn| turn.session_id.as_str())
            .collect();

        Ok(StorageStats {
            total_turns: state.turns.len(),
            total_sessions: sessions.len(),
            backend_type: "memory".to_string(),
            storage_path: None,
        })
    }

    async fn health(&self) -> Result<bool> {
        // Always healthy for in-memory storage
        Ok(true)
    }
}
