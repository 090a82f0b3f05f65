//! Convenience re-exports for common `lariat-rs` types.
//!
//! Meant to be glob-imported when building agents:
//!
//! ```ignore
//! use lariat_rs::prelude::*;
//! ```
//!
//! This pulls in the types needed for the vast majority of programs: the
//! [`Agent`] + config, the event stream types, the [`TextEngine`] trait and
//! its adapters, and the tool registry. Specialized types (scanner
//! internals, the repeat guard) are intentionally excluded — import those
//! from their modules directly when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{Message, MessageRole, render_prompt};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    Agent, AgentConfig, AgentEvent, ChatStream, EndReason, collect_transcript,
};

// ── Engine boundary ─────────────────────────────────────────────────
pub use crate::engine::{
    EngineError, GenOptions, LlamaServerEngine, SamplingConfig, SamplingController,
    ScriptedEngine, TextEngine, TokenStream,
};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{
    ArgMap, ParamType, RegistryError, ToolError, ToolRegistry, ToolSpec, builtin_registry,
};
