//! Session command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use shipyard_client::OrchestratorClient;
use uuid::Uuid;

use crate::config::Config;

/// Session subcommands
#[derive(Subcommand)]
pub enum SessionCommands {
    /// Create a session for a repository
    Create {
        /// Repository URL
        #[arg(short, long)]
        repo: String,
    },
    /// Get session details
    Get {
        /// Session ID
        id: Uuid,
    },
}

/// Handle session commands
pub async fn handle_session_command(command: SessionCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        SessionCommands::Create { repo } => create_session(&client, &repo).await,
        SessionCommands::Get { id } => get_session(&client, id).await,
    }
}

async fn create_session(client: &OrchestratorClient, repo: &str) -> Result<()> {
    let session = client
        .create_session(repo)
        .await
        .context("Failed to create session")?;

    println!("{}", "✓ Session created".green().bold());
    println!("  ID:         {}", session.id.to_string().cyan());
    println!("  Repository: {}", session.repository_url);
    println!();
    println!(
        "{}",
        format!(
            "Start a pipeline with: shipyard pipeline start --session {} --mode hackathon",
            session.id
        )
        .dimmed()
    );

    Ok(())
}

async fn get_session(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let session = client
        .get_session(id)
        .await
        .context("Failed to get session")?;

    println!("{}", "Session Details:".bold());
    println!("  ID:         {}", session.id.to_string().cyan());
    println!("  Repository: {}", session.repository_url);
    println!(
        "  Created:    {}",
        session.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    Ok(())
}
