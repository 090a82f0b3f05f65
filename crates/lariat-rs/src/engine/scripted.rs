//! Scripted engine for testing the orchestration loop.
//!
//! [`ScriptedEngine`] is a queue-based fake: tests script exactly which
//! fragment sequences each successive `generate` call streams back, without
//! touching a real model. Every call records its prompt and options for
//! later assertion — the two-pass loop can be verified end to end
//! (including the temperatures each pass was issued with).
//!
//! # Usage
//!
//! ```
//! use lariat_rs::engine::{GenOptions, ScriptedEngine, TextEngine};
//! use futures::StreamExt;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = ScriptedEngine::new()
//!     .script(["Hello ", "world"]);
//!
//! let mut stream = engine
//!     .generate("SYSTEM: hi\nASSISTANT:", &GenOptions::default())
//!     .await
//!     .unwrap();
//! let mut out = String::new();
//! while let Some(fragment) = stream.next().await {
//!     out.push_str(&fragment);
//! }
//! assert_eq!(out, "Hello world");
//! assert_eq!(engine.recorded_calls().len(), 1);
//! # }
//! ```
//!
//! # Panics
//!
//! `generate` panics when the script queue is empty — a test that
//! generates more passes than it scripted is a broken test.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{GenOptions, GenerateFuture, TextEngine, TokenStream};

/// One recorded `generate` invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub options: GenOptions,
}

/// A queue-based fake [`TextEngine`] for tests.
pub struct ScriptedEngine {
    scripts: Mutex<VecDeque<Vec<String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue the fragment sequence for the next unscripted `generate` call
    /// (builder pattern).
    pub fn script<I, S>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_script(fragments);
        self
    }

    /// Queue a fragment sequence on a shared engine.
    pub fn push_script<I, S>(&self, fragments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(fragments.into_iter().map(Into::into).collect());
    }

    /// Every prompt + options this engine has been called with, in order.
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEngine for ScriptedEngine {
    fn generate(&self, prompt: &str, options: &GenOptions) -> GenerateFuture<'_> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                prompt: prompt.to_string(),
                options: options.clone(),
            });
        let fragments = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .expect("ScriptedEngine: generate called with an empty script queue");
        Box::pin(async move {
            Ok(Box::pin(futures::stream::iter(fragments)) as TokenStream)
        })
    }
}
