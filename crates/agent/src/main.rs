use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use filekeep_agent::{AgentConfig, AgentRuntime, AgentToken};
use filekeep_core::LogSink;
use tracing::info;

/// Watches directories and uploads the files worth keeping.
#[derive(Parser, Debug)]
#[command(name = "filekeep-agent", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "filekeep.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start monitoring (the default).
    Run,
    /// Save the agent token that links this installation to an account.
    SetToken {
        /// Token shown in the account settings.
        token: String,
    },
    /// Print whether an agent token is stored.
    ShowToken,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AgentConfig::load(&cli.config)?;
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            AgentRuntime::new(config, Arc::new(LogSink)).run().await?;
        }
        Commands::SetToken { token } => {
            let token = AgentToken::new(&token).ok_or("agent token must not be empty")?;
            token.save(&config.agent.token_path).await?;
            println!("Agent token saved to {}", config.agent.token_path.display());
        }
        Commands::ShowToken => match AgentToken::load(&config.agent.token_path).await? {
            Some(_) => println!(
                "Agent token is set ({})",
                config.agent.token_path.display()
            ),
            None => println!(
                "No agent token at {}",
                config.agent.token_path.display()
            ),
        },
    }
    Ok(())
}
