//! Thought trace events
//!
//! Each step of handling a chat turn (input received, prompt assembly, model
//! call, reply, failures) is reported to a [`ThoughtSink`]. Events are for
//! observability only; nothing reads them back to make decisions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

/// Category tag attached to every trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtKind {
    UserInput,
    System,
    Thinking,
    Context,
    Response,
    Error,
}

impl ThoughtKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThoughtKind::UserInput => "user_input",
            ThoughtKind::System => "system",
            ThoughtKind::Thinking => "thinking",
            ThoughtKind::Context => "context",
            ThoughtKind::Response => "response",
            ThoughtKind::Error => "error",
        }
    }

    /// Console prefix for the category
    pub fn prefix(&self) -> &'static str {
        match self {
            ThoughtKind::UserInput => "👤: ",
            ThoughtKind::System => "⚙️: ",
            ThoughtKind::Thinking => "💭: ",
            ThoughtKind::Context => "",
            ThoughtKind::Response => "🗨️: ",
            ThoughtKind::Error => "❌: ",
        }
    }
}

impl fmt::Display for ThoughtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThoughtEvent {
    pub kind: ThoughtKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ThoughtEvent {
    pub fn new(kind: ThoughtKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Receiver of thought trace events
pub trait ThoughtSink: Send + Sync {
    fn record(&self, event: ThoughtEvent);

    fn emit(&self, kind: ThoughtKind, message: String) {
        self.record(ThoughtEvent::new(kind, message));
    }
}

/// Forwards events to `tracing` under the `ollama_thoughts` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingThoughtSink;

impl ThoughtSink for TracingThoughtSink {
    fn record(&self, event: ThoughtEvent) {
        let line = format!(
            "[{}] {}{}",
            event.at.format("%H:%M:%S"),
            event.kind.prefix(),
            event.message
        );
        match event.kind {
            ThoughtKind::Error => {
                tracing::warn!(target: "ollama_thoughts", kind = %event.kind, "{}", line)
            }
            ThoughtKind::Context => {
                tracing::debug!(target: "ollama_thoughts", kind = %event.kind, "{}", line)
            }
            _ => tracing::info!(target: "ollama_thoughts", kind = %event.kind, "{}", line),
        }
    }
}

/// Keeps every event in memory; used by tests to assert on traces.
#[derive(Debug, Default)]
pub struct RecordingThoughtSink {
    events: Mutex<Vec<ThoughtEvent>>,
}

impl RecordingThoughtSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ThoughtEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<ThoughtKind> {
        self.events().iter().map(|e| e.kind).collect()
    }

    pub fn count(&self, kind: ThoughtKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

impl ThoughtSink for RecordingThoughtSink {
    fn record(&self, event: ThoughtEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
