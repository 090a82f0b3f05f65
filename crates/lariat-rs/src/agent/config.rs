//! Configuration for [`Agent`](super::session::Agent) sessions.
//!
//! Defaults: 2048-token passes, a stop sequence on the next user role
//! header, a 3-turn repeat window, no turn cap, and the tool guide
//! injected into the system prompt.

use crate::DEFAULT_MAX_TOKENS;
use crate::agent::guard::DEFAULT_REPEAT_WINDOW;
use crate::engine::SamplingConfig;

/// Configuration for a chat session.
///
/// Use [`AgentConfig::new()`] and the `with_*` builders for common
/// settings, or set fields directly with struct update syntax.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Token budget per generation pass.
    pub max_tokens: u32,
    /// Stop sequences passed to the engine. Defaults to the rendered user
    /// role header so generation halts before the model invents a user
    /// turn.
    pub stop_sequences: Vec<String>,
    /// Repeat-guard window capacity: identical call signatures for this
    /// many consecutive turns abort the session.
    pub repeat_window: usize,
    /// Optional cap on call-bearing turns. `None` runs until the model
    /// finishes or the repeat guard trips.
    pub max_turns: Option<u32>,
    /// Whether to append the registry's tool guide to the system prompt.
    pub include_tool_guide: bool,
    /// Temperature heuristics.
    pub sampling: SamplingConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            stop_sequences: vec!["USER:".to_string()],
            repeat_window: DEFAULT_REPEAT_WINDOW,
            max_turns: None,
            include_tool_guide: true,
            sampling: SamplingConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    pub fn with_repeat_window(mut self, capacity: usize) -> Self {
        self.repeat_window = capacity;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_tool_guide(mut self, include: bool) -> Self {
        self.include_tool_guide = include;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }
}
