//! Generation engine boundary: the [`TextEngine`] trait and its adapters.
//!
//! The orchestration loop consumes text generation as an opaque producer of
//! a lazy, finite token stream. Anything that can turn a prompt plus
//! sampling options into such a stream can drive the loop:
//!
//! - [`http::LlamaServerEngine`] — HTTP/SSE adapter for a llama.cpp-server
//!   style `/completion` endpoint.
//! - [`scripted::ScriptedEngine`] — queue-based fake for tests.
//! - [`sampling`] — temperature selection heuristics used by the loop.

pub mod http;
pub mod sampling;
pub mod scripted;

use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use thiserror::Error;

pub use http::LlamaServerEngine;
pub use sampling::{SamplingConfig, SamplingController};
pub use scripted::ScriptedEngine;

/// A finite, non-restartable stream of generated text fragments.
///
/// The stream terminates on a stop-sequence match, token budget exhaustion,
/// or natural end of generation. Dropping it cancels the underlying
/// generation.
pub type TokenStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Boxed future returned by [`TextEngine::generate`].
///
/// Type alias to keep the trait dyn-compatible, same shape as a boxed tool
/// future.
pub type GenerateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TokenStream, EngineError>> + Send + 'a>>;

/// Sampling options for one generation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct GenOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: crate::DEFAULT_MAX_TOKENS,
            stop_sequences: Vec::new(),
        }
    }
}

/// Errors establishing a generation stream.
///
/// Mid-stream decode problems are not errors: the adapters log and skip
/// them, and the stream simply ends early if the connection drops.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine request failed: {0}")]
    Request(String),
    #[error("engine returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

/// An opaque producer of generated text.
///
/// Implementors receive the fully rendered prompt and the sampling options
/// chosen by the loop, and return a lazy [`TokenStream`]. The future and the
/// stream must both be `Send` — sessions run on the async runtime.
pub trait TextEngine: Send + Sync {
    /// Start one streaming generation pass.
    fn generate(&self, prompt: &str, options: &GenOptions) -> GenerateFuture<'_>;
}
