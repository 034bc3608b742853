use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

mod client;
mod config;
mod conversation;
mod markdown;
mod prompts;
mod session;
mod tui;
mod ui;

use client::CompletionClient;
use config::Config;
use session::SessionStore;

#[derive(Parser)]
#[command(name = "palaver")]
#[command(version)]
#[command(about = "Terminal chat client for a hosted completion endpoint", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the raw response
    Ask {
        /// The question; multiple words are joined
        query: Vec<String>,
    },
    /// Show the persisted session
    Session,
    /// Mint a fresh thread id
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        None => ui::App::new(config)?.run().await,
        Some(Commands::Ask { query }) => ask(config, query.join(" ")).await,
        Some(Commands::Session) => show_session(&config),
        Some(Commands::Reset) => reset_session(&config),
    }
}

async fn ask(config: Config, query: String) -> Result<()> {
    let query = query.trim().to_string();
    if query.is_empty() {
        bail!("nothing to ask");
    }

    let session = SessionStore::new(&config).load_or_create()?;
    let client = CompletionClient::new(&config)?;
    let response = client
        .complete(query, &session)
        .await
        .context("completion request failed")?;

    println!("{}", response);
    Ok(())
}

fn show_session(config: &Config) -> Result<()> {
    let session = SessionStore::new(config).load_or_create()?;
    println!("thread id: {}", session.thread_id);
    println!(
        "context:   {}",
        if session.context_enabled { "on" } else { "off" }
    );
    println!("created:   {}", session.created_at.to_rfc3339());
    Ok(())
}

fn reset_session(config: &Config) -> Result<()> {
    let session = SessionStore::new(config).reset()?;
    println!("new thread id: {}", session.thread_id);
    Ok(())
}
