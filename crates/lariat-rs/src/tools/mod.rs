//! Tool abstractions: declared schemas, coercion, dispatch, built-ins.
//!
//! Every capability the model can invoke is a
//! [`ToolSpec`](registry::ToolSpec) — a declared parameter schema plus an
//! async handler — collected into a [`ToolRegistry`](registry::ToolRegistry)
//! that validates at registration time and validates/coerces/dispatches at
//! call time.
//!
//! # Submodules
//!
//! - [`registry`] — [`ToolSpec`](registry::ToolSpec) builder,
//!   [`ParamType`](registry::ParamType) coercion rules,
//!   [`ToolRegistry`](registry::ToolRegistry), the
//!   [`ToolError`](registry::ToolError) taxonomy, JSON Schema export, and
//!   prompt-guide rendering.
//! - [`builtin`] — stock tools (calculator, compare, get_date, weather)
//!   and [`builtin_registry`](builtin::builtin_registry).

pub mod builtin;
pub mod registry;

// Re-export commonly used items at the module level.
pub use builtin::builtin_registry;
pub use registry::{
    ArgMap, ParamSpec, ParamType, RegistryError, ToolError, ToolRegistry, ToolSpec,
};
