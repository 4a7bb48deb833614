#![forbid(unsafe_code)]
#![doc = r#"
Ollama Chat

Browser chat front end for a locally hosted Ollama server. Each browser session
keeps its own conversation history; the last ten turns are replayed to the model
as context on every new message.

Crate highlights
- HTTP server (in `server`): `/`, `/chat`, `/history`, `/clear`, `/joke`, `/status`.
- Storage: `ChatHistoryStore` trait with in-memory and SQLite backends.
- Model access: `InferenceGateway` trait, implemented by `OllamaGateway` (`/api/chat`).

Modules
- `chat_history*`: turn model, storage backends, backend selection.
- `prompt`: system prompt + context window assembly.
- `inference`: Ollama client and reply decoding.
- `chat`: per-turn orchestration and failed-turn policy.
- `thoughts`: categorized trace events for each step of a turn.
- `humor`: static joke table.
- `session`: session cookie issuance and verification.
- `util`: tracing/env initialization, app state, shared HTTP helpers.
"#]

pub mod chat;
pub mod chat_history;
pub mod chat_history_manager;
pub mod chat_history_memory;
#[cfg(feature = "sqlite")]
pub mod chat_history_sqlite;
pub mod humor;
pub mod inference;
pub mod prompt;
pub mod server;
pub mod session;
pub mod thoughts;
pub mod util;

pub use crate::chat::{ChatError, ChatOutcome, ChatService};
pub use crate::chat_history::{ChatHistoryError, ChatHistoryStore, ConversationTurn, StorageStats};
pub use crate::chat_history_manager::{ChatHistoryConfig, ChatHistoryManager};
pub use crate::chat_history_memory::MemoryChatHistoryStore;
#[cfg(feature = "sqlite")]
pub use crate::chat_history_sqlite::SqliteChatHistoryStore;
pub use crate::humor::{JokeBook, FALLBACK_JOKE};
pub use crate::inference::{ChatReply, GenerationError, InferenceGateway, OllamaConfig, OllamaGateway};
pub use crate::prompt::{ChatMessage, MessageRole, PromptAssembler, CONTEXT_WINDOW_TURNS};
pub use crate::session::SessionKeys;
pub use crate::thoughts::{RecordingThoughtSink, ThoughtEvent, ThoughtKind, ThoughtSink, TracingThoughtSink};
