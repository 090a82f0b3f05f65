//! The per-session orchestration loop.
//!
//! [`Agent::chat`] spawns a session: a sequential state machine that
//! renders the history into a prompt, streams a generation pass while
//! scanning for tool calls, and either finishes (call-free output is the
//! final answer) or runs the two-pass call protocol — truncate the text at
//! the first call delimiter, force the payload closed at low temperature,
//! resolve symbolic references, dispatch, and feed the annotations back
//! into the history for the next turn.
//!
//! The two passes exist because a model may begin emitting a call
//! mid-narrative; re-prompting with the truncated prefix at near-zero
//! temperature maximizes the odds of a syntactically valid payload without
//! re-generating the narrative.
//!
//! Each session owns its history, result store, and repeat guard; one
//! [`Agent`] can serve any number of concurrent independent sessions.
//! Dropping the returned [`ChatStream`] cancels the session: the loop
//! notices the closed channel at its next event and unwinds, dropping the
//! engine stream with it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::config::AgentConfig;
use crate::agent::events::{AgentEvent, EndReason};
use crate::agent::guard::{RepeatGuard, call_signature};
use crate::agent::results::{ResultStore, render_value};
use crate::engine::{EngineError, GenOptions, SamplingController, TextEngine};
use crate::scan::{self, ToolCall};
use crate::tools::registry::{ToolError, ToolRegistry};
use crate::{Message, render_prompt};

// ── Agent ──────────────────────────────────────────────────────────

/// A tool-augmented chat agent.
///
/// Holds the engine, registry, and config behind `Arc`s; every
/// [`chat()`](Agent::chat) call clones them into a fresh, independent
/// session.
pub struct Agent {
    engine: Arc<dyn TextEngine>,
    registry: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        engine: impl TextEngine + 'static,
        registry: ToolRegistry,
        config: AgentConfig,
    ) -> Self {
        Self::with_shared(Arc::new(engine), Arc::new(registry), config)
    }

    /// Build from already-shared engine and registry handles (e.g. when a
    /// test wants to keep a handle on a scripted engine).
    pub fn with_shared(
        engine: Arc<dyn TextEngine>,
        registry: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            engine,
            registry,
            config,
        }
    }

    /// Start a chat session and return its lazy event stream.
    ///
    /// The stream yields narrative fragments and tool-result annotations as
    /// they become available and closes after a terminal
    /// [`AgentEvent::Ended`]. Not restartable — call again for a fresh
    /// session.
    pub fn chat(&self, system_prompt: &str, user_prompt: &str) -> ChatStream {
        let mut system = system_prompt.to_string();
        if self.config.include_tool_guide && !self.registry.is_empty() {
            system.push_str("\n\n");
            system.push_str(&self.registry.render_guide());
        }

        let session = Session {
            engine: Arc::clone(&self.engine),
            registry: Arc::clone(&self.registry),
            sampling: SamplingController::new(self.config.sampling.clone()),
            config: self.config.clone(),
            history: vec![Message::system(system), Message::user(user_prompt)],
            store: ResultStore::new(),
            guard: RepeatGuard::new(self.config.repeat_window),
        };

        let (tx, rx) = mpsc::unbounded();
        tokio::spawn(session.run(tx));
        ChatStream { receiver: rx }
    }
}

/// The lazy event stream of one chat session.
pub struct ChatStream {
    receiver: UnboundedReceiver<AgentEvent>,
}

impl Stream for ChatStream {
    type Item = AgentEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<AgentEvent>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

// ── Session ────────────────────────────────────────────────────────

/// Owned state of one running session.
struct Session {
    engine: Arc<dyn TextEngine>,
    registry: Arc<ToolRegistry>,
    sampling: SamplingController,
    config: AgentConfig,
    history: Vec<Message>,
    store: ResultStore,
    guard: RepeatGuard,
}

impl Session {
    async fn run(mut self, tx: UnboundedSender<AgentEvent>) {
        let mut turns: u32 = 0;
        loop {
            if let Some(cap) = self.config.max_turns
                && turns >= cap
            {
                info!("turn cap {cap} reached — ending session");
                let _ = tx.unbounded_send(AgentEvent::Ended(EndReason::TurnLimit));
                return;
            }
            turns += 1;

            let prompt = render_prompt(&self.history);
            let chat_temperature = self.sampling.for_chat(&prompt);
            debug!("turn {turns}: chat pass at temperature {chat_temperature:.2}");
            let (first_pass, calls) = match self
                .generate_until_call(&prompt, chat_temperature)
                .await
            {
                Ok(pass) => pass,
                Err(e) => {
                    warn!("generation failed: {e}");
                    return;
                }
            };

            if calls.is_empty() {
                // Call-free output is the final answer.
                self.history.push(Message::assistant(first_pass.trim()));
                if tx.unbounded_send(AgentEvent::Text(first_pass)).is_err() {
                    return;
                }
                let _ = tx.unbounded_send(AgentEvent::Ended(EndReason::Completed));
                return;
            }

            // A call began somewhere in the first pass. Keep only the text
            // before its opening delimiter (discarding partial or duplicate
            // fragments) and force the payload closed at low temperature.
            let prefix = first_pass.split('{').next().unwrap_or_default().to_string();
            let completion_prompt = format!("{prompt}{prefix}");
            let (second_pass, calls) = match self
                .generate_until_call(&completion_prompt, self.sampling.for_tool())
                .await
            {
                Ok(pass) => pass,
                Err(e) => {
                    warn!("call completion failed: {e}");
                    return;
                }
            };
            let canonical = format!("{prefix}{second_pass}");

            if !prefix.is_empty() && tx.unbounded_send(AgentEvent::Text(prefix)).is_err() {
                return;
            }
            if !second_pass.is_empty()
                && tx
                    .unbounded_send(AgentEvent::Text(second_pass))
                    .is_err()
            {
                return;
            }

            info!("turn {turns}: {} call(s) detected", calls.len());
            let mut turn_messages: Vec<Message> = Vec::new();
            for call in &calls {
                if call.args.is_empty() && !self.registry.allows_empty_args(&call.name) {
                    debug!("skipping {} with empty args", call.name);
                    turn_messages.push(Message::assistant(format!(
                        "WARNING! You are calling [{} with no args, please fix your JSON.]",
                        call.name
                    )));
                    continue;
                }
                let annotation = self.run_call(call).await;
                if tx
                    .unbounded_send(AgentEvent::ToolResult {
                        tool: call.name.clone(),
                        annotation: annotation.clone(),
                    })
                    .is_err()
                {
                    return;
                }
                turn_messages.push(Message::tool_result(&call.name, annotation));
            }

            self.history.push(Message::assistant(canonical));
            self.history.extend(turn_messages);
            // Empty placeholder marks the turn boundary.
            self.history.push(Message::assistant(""));

            let signature = call_signature(&calls);
            if self.guard.record(signature) {
                info!(
                    "aborting: identical call repeated {} turns in a row",
                    self.config.repeat_window
                );
                let _ = tx.unbounded_send(AgentEvent::Ended(EndReason::RepeatGuard));
                return;
            }
        }
    }

    /// One streaming pass. The scanner runs on the accumulated buffer at
    /// every fragment arrival; the pass stops early the moment any
    /// completed call is detected.
    async fn generate_until_call(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> Result<(String, Vec<ToolCall>), EngineError> {
        let options = GenOptions {
            temperature,
            max_tokens: self.config.max_tokens,
            stop_sequences: self.config.stop_sequences.clone(),
        };
        let mut stream = self.engine.generate(prompt, &options).await?;
        let mut buffer = String::new();
        while let Some(fragment) = stream.next().await {
            buffer.push_str(&fragment);
            let calls = scan::find_calls(&buffer);
            if !calls.is_empty() {
                return Ok((buffer, calls));
            }
        }
        Ok((buffer, Vec::new()))
    }

    /// Execute one detected call and produce its inline annotation.
    ///
    /// Every failure mode is local: the annotation reports it and the
    /// session continues.
    async fn run_call(&mut self, call: &ToolCall) -> String {
        if !self.registry.contains(&call.name) {
            return format!("[error: unknown tool {}]", call.name);
        }
        let resolved = self.store.resolve(&call.raw_span);
        if ResultStore::contains_reference(&resolved) {
            return "[error: unresolved result reference]".to_string();
        }
        match self.dispatch_resolved(&call.name, &resolved).await {
            Ok(value) => {
                let rendered = render_value(&value);
                let key = self.store.stash(value);
                format!("[{} → {rendered} | id {key}]", call.name)
            }
            Err(ToolError::UnknownTool { name }) => format!("[error: unknown tool {name}]"),
            Err(error) => format!("[{} raised {error}]", call.name),
        }
    }

    /// Re-decode the substituted span and dispatch through the registry.
    async fn dispatch_resolved(
        &self,
        name: &str,
        resolved_span: &str,
    ) -> Result<Value, ToolError> {
        let payload: Value = serde_json::from_str(resolved_span)
            .map_err(|e| ToolError::InvalidPayload(e.to_string()))?;
        let args = payload
            .as_object()
            .map(scan::extract_args)
            .unwrap_or_default();
        self.registry.dispatch(name, &args).await
    }
}
