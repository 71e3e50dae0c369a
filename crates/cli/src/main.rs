//! Loopwright CLI: the main entry point.
//!
//! Commands:
//! - `run`: run one task through a tool-calling agent
//! - `config`: print the effective configuration

use clap::{Parser, Subcommand};

mod commands;
mod console;

#[derive(Parser)]
#[command(
    name = "loopwright",
    about = "Loopwright: a step-bounded agent loop runner",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task until it finishes or the step budget runs out
    Run {
        /// The task for the agent
        #[arg(short, long)]
        message: String,

        /// Override agent.max_steps
        #[arg(long)]
        max_steps: Option<u32>,

        /// Print every agent event as a JSON line on stderr
        #[arg(long)]
        json_events: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            message,
            max_steps,
            json_events,
        } => commands::run::run(message, max_steps, json_events).await?,
        Commands::Config => commands::config_cmd::show()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run() {
        let cli = Cli::try_parse_from(["loopwright", "run", "-m", "write a haiku", "--max-steps", "3"])
            .unwrap();
        match cli.command {
            Commands::Run {
                message,
                max_steps,
                json_events,
            } => {
                assert_eq!(message, "write a haiku");
                assert_eq!(max_steps, Some(3));
                assert!(!json_events);
            }
            Commands::Config => panic!("expected run"),
        }
    }

    #[test]
    fn run_requires_message() {
        assert!(Cli::try_parse_from(["loopwright", "run"]).is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["loopwright", "config", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Config));
    }
}
