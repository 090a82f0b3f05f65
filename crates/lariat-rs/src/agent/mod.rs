//! Agent runtime: the per-session orchestration loop and its state.
//!
//! - [`session::Agent`] — the chat agent and its session state machine.
//!   Start here.
//! - [`config::AgentConfig`] — token budget, stop sequences, repeat
//!   window, turn cap, sampling.
//! - [`events`] — [`AgentEvent`] stream items and [`EndReason`].
//! - [`results`] — per-session [`ResultStore`] for `$result_N` references.
//! - [`guard`] — [`RepeatGuard`] and call signatures.

pub mod config;
pub mod events;
pub mod guard;
pub mod results;
pub mod session;

// Re-export commonly used items at the module level.
pub use config::AgentConfig;
pub use events::{AgentEvent, EndReason, collect_transcript};
pub use guard::{RepeatGuard, call_signature};
pub use results::ResultStore;
pub use session::{Agent, ChatStream};
