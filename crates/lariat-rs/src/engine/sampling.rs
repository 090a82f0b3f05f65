//! Heuristic temperature control for generation passes.
//!
//! Free chat gets an adaptive temperature from two cheap prompt signals:
//! length in whitespace-delimited words, and the presence of code-like
//! punctuation. Forced call completion always runs near-deterministic.

use std::sync::LazyLock;

use regex::Regex;

/// Braces, brackets, parentheses, or keyword fragments indicating
/// structured content mid-prompt.
static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(def |class |\{|\[|\]|\(|\))").expect("hardcoded pattern compiles")
});

/// Tunable constants for [`SamplingController`].
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    /// Base temperature for prompts shorter than `long_prompt_words`.
    pub short_base: f32,
    /// Base temperature for longer prompts.
    pub long_base: f32,
    /// Word count at which a prompt counts as long.
    pub long_prompt_words: usize,
    /// Subtracted when code-like punctuation is detected.
    pub structured_penalty: f32,
    /// Fixed temperature for the forced call-completion pass.
    pub tool_temperature: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            short_base: 0.75,
            long_base: 0.45,
            long_prompt_words: 30,
            structured_penalty: 0.2,
            tool_temperature: 0.1,
        }
    }
}

/// Chooses generation temperatures for the two loop phases.
#[derive(Debug, Clone, Default)]
pub struct SamplingController {
    config: SamplingConfig,
}

impl SamplingController {
    pub fn new(config: SamplingConfig) -> Self {
        Self { config }
    }

    /// Temperature for a free-chat pass over the given prompt.
    ///
    /// Short prompts sample hotter than long ones; detected structured
    /// content biases toward determinism.
    pub fn for_chat(&self, prompt: &str) -> f32 {
        let words = prompt.split_whitespace().count();
        let base = if words < self.config.long_prompt_words {
            self.config.short_base
        } else {
            self.config.long_base
        };
        if CODE_PATTERN.is_match(prompt) {
            base - self.config.structured_penalty
        } else {
            base
        }
    }

    /// Temperature for the forced low-temperature call-completion pass.
    pub fn for_tool(&self) -> f32 {
        self.config.tool_temperature
    }
}
