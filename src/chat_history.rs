//! Chat History Module
//!
//! Conversation turns grouped by browser session, with pluggable storage backends.
//! A turn is one user input paired with the reply produced for it; turns are
//! immutable once stored and are only ever removed in bulk, one session at a time.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatHistoryError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChatHistoryError>;

/// One exchange: a user input and the reply stored for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Store-assigned, monotonically increasing identifier
    pub id: i64,
    pub session_id: String,
    pub user_input: String,
    pub ai_response: String,
    /// Assigned by the store at insert time
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// ISO-8601 rendering used on the wire (`2025-07-16T09:30:00.000000Z`).
    pub fn timestamp_iso(&self) -> String {
        format_timestamp(self.created_at)
    }
}

/// Storage statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_turns: usize,
    pub total_sessions: usize,
    pub backend_type: String,
    pub storage_path: Option<String>,
}

/// Chat history storage trait
///
/// Implementations assign `id` and `created_at` themselves so that concurrent
/// appends under one session still produce a well-defined order.
#[async_trait::async_trait]
pub trait ChatHistoryStore: Send + Sync {
    /// Initialize the storage backend
    async fn init(&self) -> Result<()>;

    /// Append a new turn for the session and return it as stored
    async fn append(
        &self,
        session_id: &str,
        user_input: &str,
        ai_response: &str,
    ) -> Result<ConversationTurn>;

    /// Up to `limit` most recent turns, oldest first
    async fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>>;

    /// Full history of the session, oldest first
    async fn all_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>>;

    /// Delete every turn of the session, returning how many were removed
    async fn clear_session(&self, session_id: &str) -> Result<u64>;

    /// Get storage statistics
    async fn stats(&self) -> Result<StorageStats>;

    /// Health check
    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
