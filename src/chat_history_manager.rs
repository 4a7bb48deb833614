//! Chat History Manager
//!
//! Selects and initializes the storage backend from configuration.

use crate::chat_history::{ChatHistoryError, ChatHistoryStore, Result};
use crate::chat_history_memory::MemoryChatHistoryStore;

#[cfg(feature = "sqlite")]
use crate::chat_history_sqlite::SqliteChatHistoryStore;

use std::sync::Arc;

#[cfg(feature = "sqlite")]
const DEFAULT_BACKEND: &str = "sqlite";
#[cfg(not(feature = "sqlite"))]
const DEFAULT_BACKEND: &str = "memory";

const DEFAULT_SQLITE_URL: &str = "sqlite:./data/chat_history.db";

/// Configuration for chat history
#[derive(Debug, Clone)]
pub struct ChatHistoryConfig {
    /// Storage backend ("memory" or "sqlite")
    pub backend: String,
    /// SQLite database URL
    pub sqlite_url: String,
    /// Max turns kept by the memory backend
    pub memory_max_turns: Option<usize>,
}

impl Default for ChatHistoryConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            sqlite_url: DEFAULT_SQLITE_URL.to_string(),
            memory_max_turns: None,
        }
    }
}

impl ChatHistoryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let backend = std::env::var("OLLAMA_CHAT_HISTORY_BACKEND")
            .ok()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND.to_string());

        let sqlite_url = std::env::var("OLLAMA_CHAT_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SQLITE_URL.to_string());

        let memory_max_turns = std::env::var("OLLAMA_CHAT_MEMORY_MAX_TURNS")
            .ok()
            .and_then(|s| s.trim().parse().ok());

        Self {
            backend,
            sqlite_url,
            memory_max_turns,
        }
    }
}

/// Chat history manager
pub struct ChatHistoryManager;

impl ChatHistoryManager {
    /// Create and initialize the configured storage backend
    pub async fn open_store(config: &ChatHistoryConfig) -> Result<Arc<dyn ChatHistoryStore>> {
        let store = Self::create_backend(config).await?;
        store.init().await?;
        tracing::info!("Chat history backend ready: {}", config.backend);
        Ok(store)
    }

    async fn create_backend(config: &ChatHistoryConfig) -> Result<Arc<dyn ChatHistoryStore>> {
        match config.backend.as_str() {
            "memory" => {
                let store = if let Some(max) = config.memory_max_turns {
                    MemoryChatHistoryStore::with_max_turns(max)
                } else {
                    MemoryChatHistoryStore::new()
                };
                Ok(Arc::new(store))
            }
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                ensure_parent_dir(&config.sqlite_url)?;
                let store = SqliteChatHistoryStore::new(&config.sqlite_url).await?;
                Ok(Arc::new(store))
            }
            other => Err(ChatHistoryError::InvalidInput(format!(
                "Unknown backend: {}",
                other
            ))),
        }
    }
}

/// Create the directory holding a file-backed SQLite database.
#[cfg(feature = "sqlite")]
fn ensure_parent_dir(sqlite_url: &str) -> Result<()> {
    if sqlite_url.contains(":memory:") || sqlite_url.contains("mode=memory") {
        return Ok(());
    }
    let path = sqlite_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
