//! SQLite chat history storage backend
//!
//! Persistent, single-file storage. Every write is a single statement, so the
//! database's own locking keeps appends atomic.

use crate::chat_history::{
    current_timestamp, ChatHistoryError, ChatHistoryStore, ConversationTurn, Result, StorageStats,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{ConnectOptions, Row};
use std::str::FromStr;
use std::time::Duration;

const TURN_COLUMNS: &str = "id, session_id, user_input, ai_response, created_at";

/// SQLite storage backend
#[derive(Clone)]
pub struct SqliteChatHistoryStore {
    pool: SqlitePool,
    storage_path: Option<String>,
}

impl SqliteChatHistoryStore {
    /// Create a new SQLite store with the given database URL
    /// URL format: "sqlite:path/to/database.db" or "sqlite::memory:" for in-memory
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| ChatHistoryError::Storage(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .disable_statement_logging();

        let in_memory = is_memory_url(database_url);

        // An in-memory database lives exactly as long as its connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| ChatHistoryError::Storage(format!("SQLite connection error: {}", e)))?;

        let storage_path = if in_memory {
            None
        } else {
            Some(
                database_url
                    .trim_start_matches("sqlite://")
                    .trim_start_matches("sqlite:")
                    .to_string(),
            )
        };

        Ok(Self { pool, storage_path })
    }

    async fn init_schema(&self) -> Result<()> {
        let schema = include_str!("chat_history_schema.sql");

        // Execute statements one at a time, skipping comment-only lines
        let mut statements = Vec::new();
        for statement in schema.split(';') {
            let trimmed = statement
                .lines()
                .filter(|line| {
                    let l = line.trim();
                    !l.is_empty() && !l.starts_with("--")
                })
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();

            if !trimmed.is_empty() {
                statements.push(trimmed);
            }
        }

        for statement in statements {
            tracing::debug!(
                "Executing SQL: {}",
                statement.chars().take(80).collect::<String>()
            );

            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    ChatHistoryError::Storage(format!(
                        "Schema creation error for statement '{}...': {}",
                        statement.chars().take(80).collect::<String>(),
                        e
                    ))
                })?;
        }

        Ok(())
    }

    fn row_to_turn(row: &SqliteRow) -> Result<ConversationTurn> {
        let micros: i64 = row.get("created_at");
        let created_at = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
            ChatHistoryError::Storage(format!("Invalid stored timestamp: {}", micros))
        })?;

        Ok(ConversationTurn {
            id: row.get("id"),
            session_id: row.get("session_id"),
            user_input: row.get("user_input"),
            ai_response: row.get("ai_response"),
            created_at,
        })
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[async_trait::async_trait]
impl ChatHistoryStore for SqliteChatHistoryStore {
    async fn init(&self) -> Result<()> {
        self.init_schema().await
    }

    async fn append(
        &self,
        session_id: &str,
        user_input: &str,
        ai_response: &str,
    ) -> Result<ConversationTurn> {
        // Clamped in SQL so a clock step back never reorders a session
        let created_at = current_timestamp().timestamp_micros();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO conversation_turns (session_id, user_input, ai_response, created_at)
            VALUES (?1, ?2, ?3, MAX(?4, COALESCE(
                (SELECT MAX(created_at) FROM conversation_turns WHERE session_id = ?1), 0)))
            RETURNING {}
            "#,
            TURN_COLUMNS
        ))
        .bind(session_id)
        .bind(user_input)
        .bind(ai_response)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ChatHistoryError::Storage(format!("Insert turn error: {}", e)))?;

        Self::row_to_turn(&row)
    }

    async fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversation_turns WHERE session_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2",
            TURN_COLUMNS
        ))
        .bind(session_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChatHistoryError::Storage(format!("Query error: {}", e)))?;

        let mut turns = rows
            .iter()
            .map(Self::row_to_turn)
            .collect::<Result<Vec<_>>>()?;

        // Newest-first from the query; callers want chronological order
        turns.reverse();
        Ok(turns)
    }

    async fn all_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversation_turns WHERE session_id = ?1 \
             ORDER BY created_at ASC, id ASC",
            TURN_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChatHistoryError::Storage(format!("Query error: {}", e)))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn clear_session(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM conversation_turns WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ChatHistoryError::Storage(format!("Delete error: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn stats(&self) -> Result<StorageStats> {
        let turn_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversation_turns")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ChatHistoryError::Storage(e.to_string()))?;

        let session_count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT session_id) FROM conversation_turns")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| ChatHistoryError::Storage(e.to_string()))?;

        Ok(StorageStats {
            total_turns: turn_count as usize,
            total_sessions: session_count as usize,
            backend_type: "sqlite".to_string(),
            storage_path: self.storage_path.clone(),
        })
    }

    async fn health(&self) -> Result<bool> {
        // Try a simple query to check if the database is accessible
        sqlx::query("SELECT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ChatHistoryError::Storage(format!("Health check error: {}", e)))?;
        Ok(true)
    }
}
