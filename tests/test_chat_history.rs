//! Integration tests for chat history storage
//!
//! The same behavioral checks run against every backend:
//! - Unknown sessions are empty, not errors
//! - Append / recent-window round trips
//! - Chronological ordering and the ten-turn window
//! - Session-scoped, idempotent clearing

use ollama_chat::chat_history::{ChatHistoryStore, ConversationTurn};
use ollama_chat::chat_history_manager::{ChatHistoryConfig, ChatHistoryManager};
use ollama_chat::chat_history_memory::MemoryChatHistoryStore;
#[cfg(feature = "sqlite")]
use ollama_chat::chat_history_sqlite::SqliteChatHistoryStore;
use std::sync::Arc;

async fn check_unknown_session(store: &dyn ChatHistoryStore) {
    assert!(store.recent_turns("never-seen", 10).await.unwrap().is_empty());
    assert!(store.all_turns("never-seen").await.unwrap().is_empty());
    assert_eq!(store.clear_session("never-seen").await.unwrap(), 0);
}

async fn check_round_trip(store: &dyn ChatHistoryStore) {
    let appended = store
        .append("sess_round_trip", "What is Rust?", "A systems language.")
        .await
        .unwrap();

    let recent = store.recent_turns("sess_round_trip", 1).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].user_input, "What is Rust?");
    assert_eq!(recent[0].ai_response, "A systems language.");
    assert_eq!(recent[0], appended);
}

async fn check_window_and_order(store: &dyn ChatHistoryStore) {
    for i in 1..=12 {
        store
            .append("sess_window", &format!("t{}", i), &format!("r{}", i))
            .await
            .unwrap();
    }

    let window = store.recent_turns("sess_window", 10).await.unwrap();
    let inputs: Vec<&str> = window.iter().map(|t| t.user_input.as_str()).collect();
    assert_eq!(
        inputs,
        vec!["t3", "t4", "t5", "t6", "t7", "t8", "t9", "t10", "t11", "t12"]
    );

    let all = store.all_turns("sess_window").await.unwrap();
    assert_eq!(all.len(), 12);
    assert!(is_chronological(&all));
    assert!(all.windows(2).all(|w| w[0].id < w[1].id));
}

async fn check_clear(store: &dyn ChatHistoryStore) {
    store.append("sess_clear", "one", "1").await.unwrap();
    store.append("sess_clear", "two", "2").await.unwrap();
    store.append("sess_keep", "three", "3").await.unwrap();

    assert_eq!(store.clear_session("sess_clear").await.unwrap(), 2);
    assert!(store.all_turns("sess_clear").await.unwrap().is_empty());
    assert_eq!(store.clear_session("sess_clear").await.unwrap(), 0);
    assert_eq!(store.all_turns("sess_keep").await.unwrap().len(), 1);
}

async fn check_concurrent_appends(store: Arc<dyn ChatHistoryStore>) {
    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .append("sess_concurrent", &format!("c{}", i), "ok")
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let all = store.all_turns("sess_concurrent").await.unwrap();
    assert_eq!(all.len(), 8);
    assert!(is_chronological(&all));
}

fn is_chronological(turns: &[ConversationTurn]) -> bool {
    turns
        .windows(2)
        .all(|w| (w[0].created_at, w[0].id) <= (w[1].created_at, w[1].id))
}

async fn run_all(store: Arc<dyn ChatHistoryStore>) {
    check_unknown_session(store.as_ref()).await;
    check_round_trip(store.as_ref()).await;
    check_window_and_order(store.as_ref()).await;
    check_clear(store.as_ref()).await;
    check_concurrent_appends(store.clone()).await;
}

#[tokio::test]
async fn test_memory_backend_behaviour() {
    let store = MemoryChatHistoryStore::new();
    store.init().await.unwrap();
    run_all(Arc::new(store)).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_memory_backend_behaviour() {
    let store = SqliteChatHistoryStore::new("sqlite::memory:").await.unwrap();
    store.init().await.unwrap();
    run_all(Arc::new(store)).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_file_backend_behaviour() {
    let dir = tempfile::tempdir().unwrap();
    let config = ChatHistoryConfig {
        backend: "sqlite".to_string(),
        sqlite_url: format!("sqlite:{}", dir.path().join("history.db").display()),
        ..Default::default()
    };
    let store = ChatHistoryManager::open_store(&config).await.unwrap();
    run_all(store).await;
}

#[tokio::test]
async fn test_manager_memory_backend_with_pruning() {
    let config = ChatHistoryConfig {
        backend: "memory".to_string(),
        memory_max_turns: Some(2),
        ..Default::default()
    };
    let store = ChatHistoryManager::open_store(&config).await.unwrap();

    store.append("sess", "a", "1").await.unwrap();
    store.append("sess", "b", "2").await.unwrap();
    store.append("sess", "c", "3").await.unwrap();

    let all = store.all_turns("sess").await.unwrap();
    let inputs: Vec<&str> = all.iter().map(|t| t.user_input.as_str()).collect();
    assert_eq!(inputs, vec!["b", "c"]);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_turns, 2);
    assert_eq!(stats.total_sessions, 1);
}
