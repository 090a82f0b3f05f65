//! Events yielded by a chat session stream.
//!
//! A session yields narrative [`Text`](AgentEvent::Text) fragments
//! interleaved with tool-result annotation strings, and closes with a
//! single [`Ended`](AgentEvent::Ended) event carrying the reason. The
//! repeat-guard abort is thereby observable as a distinct end-of-stream
//! reason rather than a silent stop.

/// One event from a chat session.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A narrative fragment produced by the model.
    Text(String),
    /// A tool result (or per-call error) annotation.
    ToolResult { tool: String, annotation: String },
    /// The session is over. Always the final event of a normal stream.
    Ended(EndReason),
}

/// Why a session stopped yielding output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The model produced a call-free answer.
    Completed,
    /// The identical call repeated for the whole guard window.
    RepeatGuard,
    /// The configured turn cap was reached.
    TurnLimit,
}

/// Reassemble the transcript from a collected event sequence.
///
/// Text fragments concatenate as-is; each annotation lands on its own line.
pub fn collect_transcript(events: &[AgentEvent]) -> String {
    let mut transcript = String::new();
    for event in events {
        match event {
            AgentEvent::Text(fragment) => transcript.push_str(fragment),
            AgentEvent::ToolResult { annotation, .. } => {
                if !transcript.is_empty() && !transcript.ends_with('\n') {
                    transcript.push('\n');
                }
                transcript.push_str(annotation);
                transcript.push('\n');
            }
            AgentEvent::Ended(_) => {}
        }
    }
    transcript
}
