//! Minimal chat example — a tool-augmented session against a local
//! llama.cpp server.
//!
//! Registers the built-in tools, sends a user prompt, and prints narrative
//! fragments and tool-result annotations as they arrive.
//!
//! # Usage
//!
//! ```bash
//! # With a llama.cpp server listening on localhost:8080:
//! cargo run --example basic_chat
//! ```

use futures::StreamExt;
use lariat_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt().init();

    // 1. Point an engine at the local completion server.
    let server = std::env::var("LLAMA_SERVER").unwrap_or_else(|_| "http://127.0.0.1:8080".into());
    let engine = LlamaServerEngine::new(server).map_err(|e| e.to_string())?;

    // 2. Register the tools the model can call.
    let registry = builtin_registry().map_err(|e| e.to_string())?;

    // 3. Configure the agent.
    let config = AgentConfig::new().with_max_turns(8);
    let agent = Agent::new(engine, registry, config);

    // 4. Run a session and stream its output.
    let mut stream = agent.chat(
        "You are a concise assistant. Use tools when they help.",
        "What is 2^10 plus today's date? Work it out step by step.",
    );
    while let Some(event) = stream.next().await {
        match event {
            AgentEvent::Text(fragment) => print!("{fragment}"),
            AgentEvent::ToolResult { annotation, .. } => println!("\n{annotation}"),
            AgentEvent::Ended(reason) => println!("\n--- session ended: {reason:?} ---"),
        }
    }
    Ok(())
}
