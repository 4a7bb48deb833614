use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::chat::ChatService;
use crate::chat_history_manager::{ChatHistoryConfig, ChatHistoryManager};
use crate::humor::JokeBook;
use crate::inference::{OllamaConfig, OllamaGateway};
use crate::prompt::PromptAssembler;
use crate::session::SessionKeys;
use crate::thoughts::TracingThoughtSink;

/// Initialize dotenv and structured tracing based on RUST_LOG.
/// - Supports explicit env file paths via ENV_FILE or DOTENV_PATH
/// - Falls back to default .env discovery
/// - Logs the source used
pub fn init_tracing() {
    let mut env_source: String = "none".into();
    for key in ["ENV_FILE", "DOTENV_PATH"] {
        if let Ok(p) = std::env::var(key) {
            let p = p.trim();
            if !p.is_empty()
                && std::path::Path::new(p).is_file()
                && dotenvy::from_filename(p).is_ok()
            {
                env_source = format!("{p} ({key})");
                break;
            }
        }
    }

    if env_source == "none" {
        if let Ok(path) = dotenvy::dotenv() {
            env_source = path.display().to_string();
        }
    }

    // Initialize tracing (respects RUST_LOG potentially provided by the env file).
    // try_init also bridges `log` records from actix middleware.
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = fmt().with_env_filter(EnvFilter::new(filter)).try_init();

    tracing::info!("Environment loaded from: {}", env_source);
}

/// Get the bind address for the HTTP server from env or default to 0.0.0.0:5000.
pub fn env_bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".into())
}

/// Read a boolean flag (1|true|yes|on / 0|false|no|off), `default` when unset or unrecognized.
pub fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key)
        .map(|v| v.trim().to_ascii_lowercase())
        .as_deref()
    {
        Ok("1") | Ok("true") | Ok("yes") | Ok("on") => true,
        Ok("0") | Ok("false") | Ok("no") | Ok("off") => false,
        _ => default,
    }
}

/// Shared application state used by the HTTP server and handlers.
pub struct AppState {
    pub chat: ChatService,
    pub jokes: JokeBook,
    pub sessions: SessionKeys,
}

impl AppState {
    pub fn new(chat: ChatService, jokes: JokeBook, sessions: SessionKeys) -> Self {
        Self {
            chat,
            jokes,
            sessions,
        }
    }

    /// Build the full application from environment configuration.
    ///
    /// Environment:
    /// - OLLAMA_CHAT_HISTORY_BACKEND / OLLAMA_CHAT_DATABASE_URL -> history store
    /// - OLLAMA_HOST / OLLAMA_CHAT_MODEL / ...                  -> inference gateway
    /// - OLLAMA_CHAT_PERSIST_FAILED_TURNS (default true)        -> failed-turn policy
    /// - OLLAMA_CHAT_HUMOR_PATH (default humor.json)            -> joke table
    /// - SECRET_KEY                                             -> session cookie signing
    pub async fn from_env() -> anyhow::Result<Self> {
        let history_config = ChatHistoryConfig::from_env();
        let store = ChatHistoryManager::open_store(&history_config).await?;

        let ollama_config = OllamaConfig::from_env();
        tracing::info!(
            "Inference gateway: {} (model {}, timeout {:?})",
            ollama_config.base_url,
            ollama_config.model,
            ollama_config.timeout
        );
        let gateway = OllamaGateway::new(ollama_config)?;

        let chat = ChatService::new(
            store,
            Arc::new(gateway),
            PromptAssembler::from_env(),
            Arc::new(TracingThoughtSink),
        )
        .with_persist_failed_turns(env_flag("OLLAMA_CHAT_PERSIST_FAILED_TURNS", true));

        let humor_path =
            std::env::var("OLLAMA_CHAT_HUMOR_PATH").unwrap_or_else(|_| "humor.json".into());
        let jokes = JokeBook::load(&humor_path)?;

        Ok(Self::new(chat, jokes, SessionKeys::from_env()))
    }
}

/// Build a JSON error response with the given HTTP status and message.
pub fn error_response(status: StatusCode, msg: &str) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "error": msg }))
}

/// Build CORS settings from environment variables.
///
/// Defaults are permissive when not configured.
pub fn cors_config_from_env() -> actix_cors::Cors {
    let mut cors = actix_cors::Cors::default();

    // Allowed origins
    if let Ok(origins) = std::env::var("CORS_ALLOWED_ORIGINS") {
        let s = origins.trim();
        if s == "*" {
            cors = cors.allow_any_origin();
        } else {
            for part in s.split(',') {
                let p = part.trim();
                if !p.is_empty() {
                    cors = cors.allowed_origin(p);
                }
            }
        }
    } else {
        cors = cors.allow_any_origin();
    }

    cors = cors.allow_any_method().allow_any_header();

    // Credentials are needed for the session cookie on cross-origin calls
    if env_flag("CORS_ALLOW_CREDENTIALS", false) {
        cors = cors.supports_credentials();
    }

    // Max age
    if let Ok(secs) = std::env::var("CORS_MAX_AGE") {
        if let Ok(n) = secs.trim().parse::<usize>() {
            cors = cors.max_age(n);
        }
    }

    cors
}
