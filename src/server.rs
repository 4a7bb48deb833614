use actix_web::cookie::Cookie;
use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chat::ChatError;
use crate::chat_history::ConversationTurn;
use crate::humor::RANDOM_CATEGORY;
use crate::util::{error_response, AppState};

/// Application shell served on `/`
const INDEX_HTML: &str = include_str!("../static/index.html");

/// Query parameters for `/joke`.
#[derive(Debug, Deserialize)]
pub struct JokeQuery {
    /// Category name, or "random" (the default).
    pub category: Option<String>,
}

/// One row of `/history`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub user: String,
    pub ai: String,
    pub time: String,
}

impl From<&ConversationTurn> for HistoryEntry {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            user: turn.user_input.clone(),
            ai: turn.ai_response.clone(),
            time: turn.timestamp_iso(),
        }
    }
}

/// Existing session id of the caller, or a fresh one plus the cookie to set.
fn resolve_session(state: &AppState, req: &HttpRequest) -> (String, Option<Cookie<'static>>) {
    match state.sessions.session_id(req) {
        Some(id) => (id, None),
        None => {
            let id = state.sessions.issue();
            let cookie = state.sessions.cookie(&id);
            (id, Some(cookie))
        }
    }
}

fn with_session_cookie(mut response: HttpResponse, cookie: Option<Cookie<'static>>) -> HttpResponse {
    if let Some(cookie) = cookie {
        if let Err(e) = response.add_cookie(&cookie) {
            warn!("Failed to set session cookie: {}", e);
        }
    }
    response
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON body: {}", err));
    InternalError::from_response(err, response).into()
}

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler));
    cfg.service(
        web::scope("")
            .service(
                web::resource("/")
                    .route(web::get().to(index))
                    .route(web::post().to(index)),
            )
            .route("/chat", web::post().to(chat))
            .route("/history", web::get().to(history))
            .route("/clear", web::post().to(clear_history))
            .route("/joke", web::get().to(joke))
            .route("/joke/categories", web::get().to(joke_categories))
            .route("/status", web::get().to(status)),
    );
}

/// Render the application shell, provisioning a session on first contact.
async fn index(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let (_, cookie) = resolve_session(&state, &req);
    let response = HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML);
    with_session_cookie(response, cookie)
}

async fn chat(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<serde_json::Value>,
) -> impl Responder {
    let message = body.get("message").and_then(|v| v.as_str()).unwrap_or("");
    let (session_id, cookie) = resolve_session(&state, &req);

    let response = match state.chat.submit(&session_id, message).await {
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({
            "response": outcome.reply(),
            "timestamp": outcome.turn.timestamp_iso(),
        })),
        Err(ChatError::Validation) => error_response(StatusCode::BAD_REQUEST, "Empty request"),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    with_session_cookie(response, cookie)
}

async fn history(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let Some(session_id) = state.sessions.session_id(&req) else {
        return HttpResponse::Ok().json(serde_json::json!({ "history": [] }));
    };

    match state.chat.history(&session_id).await {
        Ok(turns) => {
            let history: Vec<HistoryEntry> = turns.iter().map(HistoryEntry::from).collect();
            HttpResponse::Ok().json(serde_json::json!({ "history": history }))
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn clear_history(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    if let Some(session_id) = state.sessions.session_id(&req) {
        if let Err(e) = state.chat.clear(&session_id).await {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    }
    HttpResponse::Ok().json(serde_json::json!({ "status": "success" }))
}

async fn joke(state: web::Data<AppState>, query: web::Query<JokeQuery>) -> impl Responder {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(RANDOM_CATEGORY);
    web::Json(serde_json::json!({ "joke": state.jokes.joke(category) }))
}

async fn joke_categories(state: web::Data<AppState>) -> impl Responder {
    web::Json(serde_json::json!({ "categories": state.jokes.categories() }))
}

async fn status(state: web::Data<AppState>) -> impl Responder {
    let healthy = match state.chat.store().health().await {
        Ok(ok) => ok,
        Err(e) => {
            warn!("History store health check failed: {}", e);
            false
        }
    };
    let stats = state.chat.stats().await.ok();

    web::Json(serde_json::json!({
        "status": if healthy { "ok" } else { "degraded" },
        "service": "ollama-chat",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.chat.model(),
        "history": stats,
    }))
}
