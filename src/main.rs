mod compose_processor;
mod config;
mod docker;
mod handlers;
mod mcp;
mod models;
mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, ImagePullPolicy};
use crate::docker::{ConnectionTarget, DockerClient, DockerEnv};
use crate::handlers::ToolHandlers;
use crate::mcp::tools::Tool;
use crate::mcp::McpServer;

#[derive(Parser)]
#[command(name = "docker-mcp")]
#[command(about = "MCP server exposing Docker container and compose tools over stdio")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Image pull policy for create-container (always, if-not-present)
    #[arg(long, global = true, value_parser = ImagePullPolicy::from_str)]
    image_pull_policy: Option<ImagePullPolicy>,

    /// Directory where compose files are written before deployment
    #[arg(long, global = true)]
    compose_dir: Option<PathBuf>,

    /// Default number of log lines returned by get-logs
    #[arg(long, global = true)]
    log_tail: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdin/stdout (default)
    Serve,
    /// Show which Docker engine the tools would talk to
    Target {
        /// Also connect and ping the engine
        #[arg(long)]
        ping: bool,
    },
    /// Print the tool definitions as JSON
    Tools,
    /// Show version information
    Version,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(policy) = self.image_pull_policy {
            config.image_pull_policy = policy;
        }
        if let Some(dir) = &self.compose_dir {
            config.compose_dir = dir.clone();
        }
        if let Some(tail) = self.log_tail.filter(|n| *n > 0) {
            config.log_tail = tail;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!(
                target_engine = %ConnectionTarget::resolve(&DockerEnv::capture()),
                pull_policy = config.image_pull_policy.as_str(),
                compose_dir = %config.compose_dir.display(),
                "starting docker-mcp server"
            );
            let server = McpServer::new(ToolHandlers::new(config));
            server.serve_stdio().await?;
        }
        Commands::Target { ping } => show_target(ping).await?,
        Commands::Tools => {
            let tools: Vec<serde_json::Value> = Tool::ALL.iter().map(Tool::definition).collect();
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "tools": tools }))?);
        }
        Commands::Version => {
            println!("docker-mcp v{}", env!("CARGO_PKG_VERSION"));
            println!("Docker tools for MCP clients");
        }
    }

    Ok(())
}

async fn show_target(ping: bool) -> Result<()> {
    let env = DockerEnv::capture();
    let target = ConnectionTarget::resolve(&env);
    println!("Mode:   {}", target.mode());
    println!("Target: {}", target.value().unwrap_or("(platform default)"));

    if ping {
        let client = DockerClient::from_env(&env)?;
        client
            .docker()
            .ping()
            .await
            .with_context(|| format!("Docker engine at {} did not answer", client.target()))?;
        println!("Engine: reachable");
    }
    Ok(())
}
