//! `loopwright run`: one task through a tool-calling agent.

use std::sync::Arc;

use loopwright_agent::{Agent, ToolCallStep};
use loopwright_config::AppConfig;
use loopwright_providers::OpenAiCompatProvider;
use tracing::info;

use crate::console::ConsoleNotifier;

pub async fn run(
    message: String,
    max_steps: Option<u32>,
    json_events: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set LOOPWRIGHT_API_KEY or OPENAI_API_KEY, or add it to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = Arc::new(OpenAiCompatProvider::from_config(&config.provider)?);
    let tools = Arc::new(loopwright_tools::default_registry(
        &config.tools.workspace_dir,
    ));

    let mut agent_config = config.agent.to_agent_config();
    if let Some(max_steps) = max_steps {
        agent_config.max_steps = max_steps;
    }
    info!(
        agent = %agent_config.name,
        model = %provider.model(),
        max_steps = agent_config.max_steps,
        "Starting run"
    );

    let mut agent = Agent::new(agent_config, provider, Box::new(ToolCallStep::new()))
        .with_tools(tools)
        .with_notifier(Arc::new(ConsoleNotifier::new(json_events)));

    let output = agent.run(Some(&message)).await?;
    println!("{output}");
    Ok(())
}
