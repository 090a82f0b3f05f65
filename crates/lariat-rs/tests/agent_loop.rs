//! End-to-end tests for the orchestration loop over a scripted engine.
//!
//! These drive whole sessions — two-pass generation, call detection,
//! symbolic result resolution, repeat-guard termination — without a real
//! model, asserting on the event stream and the prompts/options the engine
//! was actually issued.

use std::sync::Arc;

use futures::StreamExt;

use lariat_rs::agent::{Agent, AgentConfig, AgentEvent, EndReason, collect_transcript};
use lariat_rs::engine::{SamplingConfig, SamplingController, ScriptedEngine};
use lariat_rs::tools::builtin_registry;

const DATE_CALL: &str = r#"{"name": "get_date", "parameters": {}}"#;
const FOLLOWUP_CALL: &str =
    r#"{"name": "calculator", "parameters": {"expression": "$result_1 - 20000000"}}"#;

fn scripted_agent(engine: Arc<ScriptedEngine>) -> Agent {
    Agent::with_shared(
        engine,
        Arc::new(builtin_registry().expect("builtins register")),
        AgentConfig::default(),
    )
}

async fn collect(agent: &Agent, system: &str, user: &str) -> Vec<AgentEvent> {
    let mut stream = agent.chat(system, user);
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

fn annotations(events: &[AgentEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ToolResult { annotation, .. } => Some(annotation.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn full_session_stashes_and_resolves_results() {
    let engine = Arc::new(
        ScriptedEngine::new()
            // Turn 1: the model starts narrating, then opens a call.
            .script(["Let me check the date. ", DATE_CALL])
            // Turn 1, second pass: forced low-temp completion of the call.
            .script([DATE_CALL])
            // Turn 2: a call referencing the stashed result.
            .script([FOLLOWUP_CALL])
            .script([FOLLOWUP_CALL])
            // Turn 3: call-free final answer.
            .script(["All done."]),
    );
    let agent = scripted_agent(engine.clone());

    let events = collect(&agent, "You are helpful.", "What day is it?").await;
    assert_eq!(events.last(), Some(&AgentEvent::Ended(EndReason::Completed)));

    let notes = annotations(&events);
    assert_eq!(notes.len(), 2);

    // Turn 1: a date-shaped token under a fresh key.
    assert!(notes[0].starts_with("[get_date → "));
    assert!(notes[0].ends_with(" | id $result_1]"));
    let date: String = notes[0]
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(8)
        .collect();
    assert_eq!(date.len(), 8);

    // Turn 2: the $result_1 reference resolved to the stashed date before
    // dispatch — the subtraction succeeded instead of raising.
    assert!(notes[1].starts_with("[calculator → "), "got: {}", notes[1]);
    assert!(notes[1].ends_with(" | id $result_2]"));

    // Narrative fragments surfaced in order.
    assert_eq!(
        events[0],
        AgentEvent::Text("Let me check the date. ".into())
    );

    let transcript = collect_transcript(&events);
    assert!(transcript.starts_with("Let me check the date. "));
    assert!(transcript.contains("id $result_1"));
    assert!(transcript.ends_with("All done."));
}

#[tokio::test]
async fn two_pass_generation_uses_the_right_temperatures_and_prompts() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .script(["Checking. ", DATE_CALL])
            .script([DATE_CALL])
            .script(["Done."]),
    );
    let agent = scripted_agent(engine.clone());
    let _ = collect(&agent, "sys", "What day is it?").await;

    let calls = engine.recorded_calls();
    assert_eq!(calls.len(), 3);

    // Pass 1 runs at the adaptive chat temperature for its prompt.
    let controller = SamplingController::new(SamplingConfig::default());
    assert_eq!(
        calls[0].options.temperature,
        controller.for_chat(&calls[0].prompt)
    );

    // Pass 2 re-prompts with the truncated narrative prefix appended, at
    // the fixed near-zero tool temperature.
    assert_eq!(calls[1].options.temperature, 0.1);
    assert_eq!(calls[1].prompt, format!("{}Checking. ", calls[0].prompt));

    // Turn 2 sees the canonical assistant turn and the result annotation.
    assert!(calls[2].prompt.contains("Checking. "));
    assert!(calls[2].prompt.contains("[get_date → "));
    assert!(calls[2].prompt.ends_with("ASSISTANT:"));

    // Every pass carried the configured stop sequence and budget.
    for call in &calls {
        assert_eq!(call.options.stop_sequences, vec!["USER:".to_string()]);
        assert_eq!(call.options.max_tokens, 2048);
    }
}

#[tokio::test]
async fn identical_call_three_turns_running_aborts_the_session() {
    let repeat = r#"{"name": "calculator", "parameters": {"expression": "1+1"}}"#;
    let mut engine = ScriptedEngine::new();
    for _ in 0..3 {
        engine = engine.script([repeat]).script([repeat]);
    }
    let engine = Arc::new(engine);
    let agent = scripted_agent(engine.clone());

    let events = collect(&agent, "sys", "user").await;

    // Three annotations were still yielded, then the distinct abort reason.
    assert_eq!(annotations(&events).len(), 3);
    assert_eq!(
        events.last(),
        Some(&AgentEvent::Ended(EndReason::RepeatGuard))
    );

    // No fourth turn was generated: 3 turns × 2 passes.
    assert_eq!(engine.recorded_calls().len(), 6);
}

#[tokio::test]
async fn argument_order_cannot_defeat_the_repeat_guard() {
    let a = r#"{"name": "compare", "parameters": {"expressions": {"x": "1", "y": "2"}}}"#;
    let b = r#"{"name": "compare", "parameters": {"expressions": {"y": "2", "x": "1"}}}"#;
    let engine = Arc::new(
        ScriptedEngine::new()
            .script([a])
            .script([a])
            .script([b])
            .script([b])
            .script([a])
            .script([a]),
    );
    let agent = scripted_agent(engine.clone());

    let events = collect(&agent, "sys", "user").await;
    assert_eq!(
        events.last(),
        Some(&AgentEvent::Ended(EndReason::RepeatGuard))
    );
    assert_eq!(engine.recorded_calls().len(), 6);
}

#[tokio::test]
async fn single_quoted_call_is_detected_and_dispatched() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .script(["{'name': 'calculator', 'parameters': {'expression': '2^10'}}"])
            .script(["{'name': 'calculator', 'parameters': {'expression': '2^10'}}"])
            .script(["It is 1024."]),
    );
    let agent = scripted_agent(engine.clone());

    let events = collect(&agent, "sys", "user").await;
    let notes = annotations(&events);
    assert_eq!(notes.len(), 1);
    assert!(notes[0].starts_with("[calculator → 1024"), "got: {}", notes[0]);
    assert_eq!(events.last(), Some(&AgentEvent::Ended(EndReason::Completed)));
}

#[tokio::test]
async fn handler_error_is_annotated_and_session_recovers() {
    let bad = r#"{"name": "calculator", "parameters": {"expression": "1/0"}}"#;
    let engine = Arc::new(
        ScriptedEngine::new()
            .script([bad])
            .script([bad])
            .script(["Sorry, that divides by zero."]),
    );
    let agent = scripted_agent(engine.clone());

    let events = collect(&agent, "sys", "user").await;
    let notes = annotations(&events);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0], "[calculator raised division by zero]");
    assert_eq!(events.last(), Some(&AgentEvent::Ended(EndReason::Completed)));

    // The model saw the failure annotation in the next turn's prompt.
    let calls = engine.recorded_calls();
    assert!(calls[2].prompt.contains("[calculator raised division by zero]"));
}

#[tokio::test]
async fn sessions_from_one_agent_are_independent() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .script([DATE_CALL])
            .script([DATE_CALL])
            .script(["First session done."]),
    );
    let agent = scripted_agent(engine.clone());

    let first = collect(&agent, "sys", "user").await;
    assert!(annotations(&first)[0].contains("$result_1"));

    // A fresh session starts its keys over at $result_1.
    engine.push_script([DATE_CALL]);
    engine.push_script([DATE_CALL]);
    engine.push_script(["Second session done."]);
    let second = collect(&agent, "sys", "user").await;
    assert!(annotations(&second)[0].contains("$result_1"));
}
