mod config;
mod error;

use std::io::Write;
use std::path::Path;

use clap::{Parser, Subcommand};
use connector::{Connection, SseTransport};
use runtime::{InferenceBackend, Runner};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;

const CONFIG_FILE: &str = "purser.toml";

#[derive(Parser)]
#[command(name = "purser")]
#[command(about = "A chat agent backed by remote MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// List the tools exposed by the remote tool source
    Tools,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat().await,
        Some(Commands::Tools) => cmd_tools().await,
    }
}

async fn cmd_chat() -> Result<()> {
    println!("purser v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    // Credential problems are configuration errors; they must surface
    // before anything touches the network.
    let token = config.token()?;
    let backend = InferenceBackend::builder(token, &config.model.model).build()?;

    println!("Endpoint: {}", config.endpoint.url);
    println!("Model: {}", config.model.model);

    // A failed open produces no handle, so there is nothing to release on
    // this path. From here on the connection is released exactly once.
    let connection = Connection::open(&config.endpoint).await?;

    let outcome = serve(&connection, backend, &config).await;

    // Runs on normal exit, EOF, Ctrl-C, and serve errors alike. A teardown
    // failure is logged and never replaces the original fault.
    if let Err(e) = connection.close().await {
        tracing::warn!("connection teardown failed: {e}");
    }

    outcome
}

async fn serve(
    connection: &Connection<SseTransport>,
    backend: InferenceBackend,
    config: &Config,
) -> Result<()> {
    let tools = connection.list_tools().await?;
    println!(
        "Connected to '{}' ({} tools)",
        connection.server_name(),
        tools.len()
    );

    let mut runner = Runner::build(tools, backend, &config.agent.capabilities);
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            // EOF
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        // A failed turn is that turn's output; the loop stays up.
        match runner.respond(connection, input).await {
            Ok(response) => {
                println!("\n{response}\n");
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    println!("Session ended.");
    Ok(())
}

async fn cmd_tools() -> Result<()> {
    let config = load_config()?;

    let connection = Connection::open(&config.endpoint).await?;

    let outcome = print_tools(&connection).await;

    if let Err(e) = connection.close().await {
        tracing::warn!("connection teardown failed: {e}");
    }

    outcome
}

async fn print_tools(connection: &Connection<SseTransport>) -> Result<()> {
    let tools = connection.list_tools().await?;

    if tools.is_empty() {
        println!("No tools exposed by '{}'.", connection.server_name());
        return Ok(());
    }

    println!("{:<32}  DESCRIPTION", "TOOL");
    println!("{}", "-".repeat(72));
    for tool in tools {
        println!(
            "{:<32}  {}",
            tool.name,
            tool.description.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

fn load_config() -> Result<Config> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        Ok(Config::load(path)?)
    } else {
        Ok(Config::default_config())
    }
}
