//! Repeat-call guard: aborts a session stuck re-issuing the same call.
//!
//! Each turn's detected calls collapse into one signature (tool name plus
//! canonicalized arguments). Signatures enter a bounded trailing window;
//! when the window is full and every entry is identical, the session
//! aborts. The window slides — a single divergent turn ages matching
//! entries out rather than resetting anything.

use std::collections::VecDeque;

use serde_json::Value;

use crate::scan::ToolCall;

/// Default number of consecutive identical turns that trips the guard.
pub const DEFAULT_REPEAT_WINDOW: usize = 3;

/// Signature for the set of calls made in one turn.
///
/// `name:<canonical args>` per call, joined with `|`. Argument objects are
/// rendered with recursively sorted keys so key order cannot defeat the
/// guard. An empty call set yields the empty signature.
pub fn call_signature(calls: &[ToolCall]) -> String {
    calls
        .iter()
        .map(|call| {
            let mut rendered = String::new();
            write_canonical(&Value::Object(call.args.clone()), &mut rendered);
            format!("{}:{rendered}", call.name)
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Compact JSON with object keys sorted at every level.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Bounded trailing window of recent call signatures.
#[derive(Debug)]
pub struct RepeatGuard {
    window: VecDeque<String>,
    capacity: usize,
}

impl RepeatGuard {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record this turn's signature. Returns `true` when the window is full
    /// and every entry is identical — the caller must abort the session.
    pub fn record(&mut self, signature: String) -> bool {
        self.window.push_back(signature);
        if self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.window.len() == self.capacity
            && self.window.iter().all(|s| s == &self.window[0])
    }
}
