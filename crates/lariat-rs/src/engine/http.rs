//! HTTP/SSE adapter for a llama.cpp-server style completion endpoint.
//!
//! [`LlamaServerEngine`] posts to `/completion` with `stream: true` and
//! turns the server-sent `data:` lines into a [`TokenStream`]. Fragments
//! are surfaced as they arrive off the wire; the stream ends on the
//! server's stop marker, a `[DONE]` sentinel, or connection close.
//! Dropping the stream drops the HTTP response and cancels generation.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{EngineError, GenOptions, GenerateFuture, TextEngine, TokenStream};

/// Async client for a llama.cpp server (or compatible) completion endpoint.
pub struct LlamaServerEngine {
    client: reqwest::Client,
    completion_url: String,
}

impl LlamaServerEngine {
    /// Create an engine for the server at `base_url` (e.g.
    /// `http://127.0.0.1:8080`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent("lariat-rs/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| EngineError::Request(format!("failed to build HTTP client: {e}")))?;
        let base = base_url.into();
        Ok(Self {
            client,
            completion_url: format!("{}/completion", base.trim_end_matches('/')),
        })
    }
}

impl TextEngine for LlamaServerEngine {
    fn generate(&self, prompt: &str, options: &GenOptions) -> GenerateFuture<'_> {
        let client = self.client.clone();
        let url = self.completion_url.clone();
        let body = json!({
            "prompt": prompt,
            "stream": true,
            "temperature": options.temperature,
            "n_predict": options.max_tokens,
            "stop": options.stop_sequences,
        });
        debug!(
            "engine request: temp={}, max_tokens={}, prompt {} chars",
            options.temperature,
            options.max_tokens,
            prompt.len()
        );

        Box::pin(async move {
            let resp = client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| EngineError::Request(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(EngineError::Http {
                    status: status.as_u16(),
                    body,
                });
            }

            let state = StreamState {
                resp,
                lines: SseLineBuffer::new(),
                pending: VecDeque::new(),
                done: false,
            };
            let stream = futures::stream::unfold(state, |mut state| async move {
                loop {
                    if let Some(fragment) = state.pending.pop_front() {
                        return Some((fragment, state));
                    }
                    if state.done {
                        return None;
                    }
                    match state.resp.chunk().await {
                        Ok(Some(bytes)) => {
                            state.lines.push(&String::from_utf8_lossy(&bytes));
                            let events = state.lines.drain_events();
                            state.absorb(events);
                        }
                        Ok(None) => {
                            let events = state.lines.flush();
                            state.absorb(events);
                            state.done = true;
                        }
                        Err(e) => {
                            warn!("streaming chunk read failed: {e}");
                            state.done = true;
                        }
                    }
                }
            });
            Ok(Box::pin(stream) as TokenStream)
        })
    }
}

// ── SSE plumbing ───────────────────────────────────────────────────

struct StreamState {
    resp: reqwest::Response,
    lines: SseLineBuffer,
    pending: VecDeque<String>,
    done: bool,
}

impl StreamState {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Fragment(text) => self.pending.push_back(text),
                SseEvent::Done => self.done = true,
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Fragment(String),
    Done,
}

/// One `data:` payload from the llama.cpp server.
#[derive(Deserialize, Debug)]
struct CompletionChunk {
    content: Option<String>,
    stop: Option<bool>,
}

/// Accumulates wire chunks and yields events for each complete SSE line.
struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    /// Process all complete lines currently buffered.
    fn drain_events(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            parse_sse_line(line.trim(), &mut events);
        }
        events
    }

    /// Process whatever remains (an unterminated final line).
    fn flush(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        parse_sse_line(rest.trim(), &mut events);
        events
    }
}

fn parse_sse_line(line: &str, events: &mut Vec<SseEvent>) {
    if line.is_empty() || line.starts_with(':') {
        return;
    }
    let Some(data) = line.strip_prefix("data: ") else {
        return;
    };
    if data == "[DONE]" {
        events.push(SseEvent::Done);
        return;
    }
    match serde_json::from_str::<CompletionChunk>(data) {
        Ok(chunk) => {
            if let Some(content) = chunk.content
                && !content.is_empty()
            {
                events.push(SseEvent::Fragment(content));
            }
            if chunk.stop.unwrap_or(false) {
                events.push(SseEvent::Done);
            }
        }
        Err(e) => warn!("failed to parse SSE chunk: {e} — data: {data}"),
    }
}
