use actix_web::{test, web, App};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use ollama_chat::chat::ChatService;
use ollama_chat::chat_history::ChatHistoryStore;
use ollama_chat::chat_history_memory::MemoryChatHistoryStore;
use ollama_chat::humor::JokeBook;
use ollama_chat::inference::{GenerationError, InferenceGateway, OllamaConfig, OllamaGateway};
use ollama_chat::prompt::{ChatMessage, PromptAssembler};
use ollama_chat::server::config_routes;
use ollama_chat::session::SessionKeys;
use ollama_chat::thoughts::RecordingThoughtSink;
use ollama_chat::util::AppState;

/// What the mock model server answers with
#[derive(Clone)]
enum Reply {
    Json(StatusCode, Value),
    Text(String),
    Slow(Duration, Value),
}

#[derive(Clone)]
struct UpstreamState {
    requests: Arc<AsyncMutex<Vec<Value>>>,
    reply: Reply,
}

async fn handle_chat(
    State(state): State<UpstreamState>,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    state.requests.lock().await.push(payload);
    match state.reply {
        Reply::Json(status, body) => (status, Json(body)).into_response(),
        Reply::Text(text) => text.into_response(),
        Reply::Slow(delay, body) => {
            tokio::time::sleep(delay).await;
            Json(body).into_response()
        }
    }
}

struct MockOllama {
    base_url: String,
    requests: Arc<AsyncMutex<Vec<Value>>>,
    join: JoinHandle<()>,
}

impl MockOllama {
    async fn start(reply: Reply) -> Self {
        let requests = Arc::new(AsyncMutex::new(Vec::new()));
        let state = UpstreamState {
            requests: requests.clone(),
            reply,
        };

        let app = Router::new()
            .route("/api/chat", post(handle_chat))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind upstream");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{}", addr);

        let join = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("upstream server error");
        });

        Self {
            base_url,
            requests,
            join,
        }
    }

    async fn replying(content: &str) -> Self {
        Self::start(Reply::Json(
            StatusCode::OK,
            json!({
                "model": "gemma3n",
                "message": {"role": "assistant", "content": content},
                "done": true
            }),
        ))
        .await
    }

    async fn requests(&self) -> Vec<Value> {
        self.requests.lock().await.clone()
    }

    async fn last_request(&self) -> Value {
        let guard = self.requests.lock().await;
        guard.last().cloned().unwrap_or_else(|| json!({}))
    }

    fn gateway(&self) -> OllamaGateway {
        OllamaGateway::new(OllamaConfig {
            base_url: self.base_url.clone(),
            ..Default::default()
        })
        .expect("build gateway")
    }
}

impl Drop for MockOllama {
    fn drop(&mut self) {
        self.join.abort();
    }
}

#[tokio::test]
async fn gateway_sends_fixed_options_without_streaming() {
    let upstream = MockOllama::replying("Hi there!").await;
    let gateway = upstream.gateway();

    let messages = vec![ChatMessage::system("Be brief."), ChatMessage::user("hello")];
    let reply = gateway.generate(&messages).await.expect("generate");
    assert_eq!(reply, "Hi there!");

    let payload = upstream.last_request().await;
    assert_eq!(payload["model"], "gemma3n");
    assert_eq!(payload["stream"], false);
    assert_eq!(payload["options"]["temperature"], 0.7);
    assert_eq!(payload["options"]["num_predict"], 4096);
    assert_eq!(
        payload["messages"],
        json!([
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": "hello"}
        ])
    );
}

#[tokio::test]
async fn gateway_reports_upstream_error_text() {
    let upstream = MockOllama::start(Reply::Json(
        StatusCode::NOT_FOUND,
        json!({"error": "model 'gemma3n' not found"}),
    ))
    .await;

    let err = upstream
        .gateway()
        .generate(&[ChatMessage::user("hello")])
        .await
        .unwrap_err();

    match err {
        GenerationError::Upstream { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "model 'gemma3n' not found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn gateway_rejects_non_json_body() {
    let upstream = MockOllama::start(Reply::Text("<html>oops</html>".to_string())).await;

    let err = upstream
        .gateway()
        .generate(&[ChatMessage::user("hello")])
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::MalformedResponse(_)));
}

#[tokio::test]
async fn gateway_renders_unexpected_json_shape() {
    let upstream = MockOllama::start(Reply::Json(StatusCode::OK, json!({"done": true}))).await;

    let reply = upstream
        .gateway()
        .generate(&[ChatMessage::user("hello")])
        .await
        .expect("generate");
    assert_eq!(reply, json!({"done": true}).to_string());
}

#[tokio::test]
async fn gateway_times_out() {
    let upstream = MockOllama::start(Reply::Slow(
        Duration::from_secs(5),
        json!({"message": {"content": "too late"}}),
    ))
    .await;

    let gateway = OllamaGateway::new(OllamaConfig {
        base_url: upstream.base_url.clone(),
        timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .expect("build gateway");

    let err = gateway
        .generate(&[ChatMessage::user("hello")])
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Timeout(_)), "got {:?}", err);
}

#[tokio::test]
async fn gateway_reports_unreachable_server() {
    // Reserve a port, then release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let gateway = OllamaGateway::new(OllamaConfig {
        base_url: format!("http://{}", addr),
        ..Default::default()
    })
    .expect("build gateway");

    let err = gateway
        .generate(&[ChatMessage::user("hello")])
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn service_replays_previous_turns_to_model() {
    let upstream = MockOllama::replying("ack").await;
    let store = Arc::new(MemoryChatHistoryStore::new());
    let service = ChatService::new(
        store.clone(),
        Arc::new(upstream.gateway()),
        PromptAssembler::new("You are terse."),
        Arc::new(RecordingThoughtSink::new()),
    );

    service.submit("sess_1", "first").await.expect("first turn");
    service.submit("sess_1", "second").await.expect("second turn");

    let requests = upstream.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1]["messages"],
        json!([
            {"role": "system", "content": "You are terse."},
            {"role": "user", "content": "first"},
            {"role": "assistant", "content": "ack"},
            {"role": "user", "content": "second"}
        ])
    );
    assert_eq!(store.all_turns("sess_1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn service_stores_sentinel_when_model_fails() {
    let upstream = MockOllama::start(Reply::Json(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "out of memory"}),
    ))
    .await;
    let store = Arc::new(MemoryChatHistoryStore::new());
    let service = ChatService::new(
        store.clone(),
        Arc::new(upstream.gateway()),
        PromptAssembler::default(),
        Arc::new(RecordingThoughtSink::new()),
    );

    let outcome = service.submit("sess_1", "hello").await.expect("submit");
    assert!(!outcome.generated);
    assert!(outcome.reply().starts_with("Error: "));
    assert!(outcome.reply().contains("out of memory"));

    let turns = store.all_turns("sess_1").await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].ai_response, outcome.reply());
}

#[actix_web::test]
async fn chat_endpoint_forwards_to_model() {
    let upstream = MockOllama::replying("Hello from the model").await;
    let chat = ChatService::new(
        Arc::new(MemoryChatHistoryStore::new()),
        Arc::new(upstream.gateway()),
        PromptAssembler::default(),
        Arc::new(RecordingThoughtSink::new()),
    );
    let state = AppState::new(chat, JokeBook::default(), SessionKeys::new(None));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(config_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({"message": "hello"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["response"], "Hello from the model");

    let payload = upstream.last_request().await;
    let messages = payload["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1], json!({"role": "user", "content": "hello"}));
}
