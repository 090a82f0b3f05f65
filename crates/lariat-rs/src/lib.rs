//! Streaming tool-call orchestration for local text-generation engines.
//!
//! `lariat-rs` lets a text-generating model invoke external tools
//! mid-conversation. The model emits a structured call object inside its
//! token stream; the [`Agent`](agent::session::Agent) detects it while the
//! stream is still running, executes the tool through the
//! [`ToolRegistry`](tools::registry::ToolRegistry), injects the result back
//! into the conversation, and lets the model continue — repeating until the
//! model produces a call-free answer or the repeat guard trips.
//!
//! The crate is engine-agnostic: anything that can turn a prompt into a
//! lazy stream of text fragments can drive it by implementing
//! [`TextEngine`](engine::TextEngine). A ready-made adapter for a
//! llama.cpp-server-style HTTP completion endpoint ships as
//! [`LlamaServerEngine`](engine::http::LlamaServerEngine), and a scripted
//! in-memory engine ships for tests.
//!
//! # Getting started
//!
//! ```ignore
//! use lariat_rs::prelude::*;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     // An engine: here, a llama.cpp server on localhost.
//!     let engine = LlamaServerEngine::new("http://127.0.0.1:8080")?;
//!
//!     // The tools the model may call.
//!     let registry = builtin_registry().map_err(|e| e.to_string())?;
//!
//!     // One Agent can serve many concurrent, independent sessions.
//!     let agent = Agent::new(engine, registry, AgentConfig::default());
//!
//!     let mut stream = agent.chat(
//!         "You are a helpful assistant with tools.",
//!         "What is 2^10? Use the calculator.",
//!     );
//!     while let Some(event) = stream.next().await {
//!         match event {
//!             AgentEvent::Text(fragment) => print!("{fragment}"),
//!             AgentEvent::ToolResult { annotation, .. } => println!("{annotation}"),
//!             AgentEvent::Ended(reason) => println!("\n[{reason:?}]"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! If you're looking for how to...
//!
//! - **Detect calls in generated text:** see [`scan::find_calls`] and
//!   [`scan::ToolCall`]. The scanner tolerates narrative text on either
//!   side of a call and single-quoted payloads.
//! - **Declare tools:** see [`ToolSpec`](tools::registry::ToolSpec) and its
//!   builder — declared parameter types, optional defaults, and an
//!   `allows_empty_args` flag for genuinely zero-argument tools. The
//!   built-in set (calculator, compare, get_date, weather) is in
//!   [`tools::builtin`].
//! - **Drive the loop:** see [`Agent`](agent::session::Agent) and
//!   [`AgentConfig`](agent::config::AgentConfig). `Agent::chat()` returns a
//!   [`ChatStream`](agent::session::ChatStream) of
//!   [`AgentEvent`](agent::events::AgentEvent)s; the stream's terminal
//!   event carries the end reason (completed, repeat guard, turn limit).
//! - **Reference earlier results:** tool return values are stashed in a
//!   per-session [`ResultStore`](agent::results::ResultStore) under
//!   `$result_N` keys, which later calls may embed in their arguments.
//! - **Pick generation temperatures:** see
//!   [`SamplingController`](engine::sampling::SamplingController) — prompt
//!   heuristics for free chat, a fixed near-zero value for forced call
//!   completion.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`Agent`](agent::session::Agent) session loop, events, result store, repeat guard |
//! | [`scan`] | Incremental tool-call detection inside accumulating text |
//! | [`tools`] | [`ToolRegistry`](tools::registry::ToolRegistry), parameter coercion, built-in tools |
//! | [`engine`] | [`TextEngine`](engine::TextEngine) boundary, HTTP/SSE adapter, sampling control, scripted test engine |

pub mod agent;
pub mod engine;
pub mod prelude;
pub mod scan;
pub mod tools;

use serde::{Deserialize, Serialize};

// ── Constants ──────────────────────────────────────────────────────

/// Default token budget for a single generation pass.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Marker appended to the rendered history to open the assistant's turn.
pub const ASSISTANT_MARKER: &str = "ASSISTANT:";

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation history.
///
/// History is append-only within a session; tool result messages carry the
/// originating tool name in `tool_name`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_name: None,
        }
    }

    /// A tool result message, tagged with the tool that produced it.
    pub fn tool_result(tool: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_name: Some(tool.into()),
        }
    }
}

// ── Prompt rendering ───────────────────────────────────────────────

/// Render the full message history into a single prompt.
///
/// Each message becomes `ROLE: content` (role uppercased); the transcript
/// is newline-joined and terminated by the assistant-turn marker so the
/// engine continues as the assistant.
pub fn render_prompt(history: &[Message]) -> String {
    let mut prompt = String::new();
    for message in history {
        prompt.push_str(&message.role.to_string().to_uppercase());
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt.push_str(ASSISTANT_MARKER);
    prompt
}
