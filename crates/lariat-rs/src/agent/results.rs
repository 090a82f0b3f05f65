//! Per-session store of tool results addressable by symbolic keys.
//!
//! Every tool return value is stashed under a freshly minted `$result_N`
//! key; later calls may embed a key in their arguments and the orchestrator
//! substitutes the stored value before dispatch. Entries are append-only
//! for the lifetime of the session — stale keys stay resolvable.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// The symbolic reference pattern.
static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$result_\d+").expect("hardcoded pattern compiles"));

/// Render a stored value for substitution and annotations: bare content for
/// JSON strings, compact JSON for everything else.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Append-only store of tool results, owned by one session.
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: HashMap<String, Value>,
    counter: u64,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stash a value and return its freshly minted key.
    pub fn stash(&mut self, value: Value) -> String {
        self.counter += 1;
        let key = format!("$result_{}", self.counter);
        self.entries.insert(key.clone(), value);
        key
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every occurrence of a known key with its stored value.
    ///
    /// Never fails: unknown or not-yet-minted keys pass through literally,
    /// enabling partial resolution. Callers detect lingering references via
    /// [`contains_reference`](Self::contains_reference) before dispatch.
    pub fn resolve(&self, text: &str) -> String {
        KEY_PATTERN
            .replace_all(text, |caps: &regex::Captures<'_>| {
                match self.entries.get(&caps[0]) {
                    Some(value) => render_value(value),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Whether any symbolic key pattern remains in `text`.
    pub fn contains_reference(text: &str) -> bool {
        KEY_PATTERN.is_match(text)
    }
}
