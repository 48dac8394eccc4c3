//! Approval command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use shipyard_client::OrchestratorClient;
use shipyard_core::domain::ApprovalDecision;
use uuid::Uuid;

use super::{colorize_gate_status, colorize_status};
use crate::config::Config;

/// Approval subcommands
#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// Approve a pending gate and let the pipeline continue
    Approve {
        /// Gate ID
        gate_id: Uuid,

        /// Optional note for the record
        #[arg(short, long)]
        feedback: Option<String>,
    },
    /// Reject a pending gate, failing the pipeline
    Reject {
        /// Gate ID
        gate_id: Uuid,

        /// Why the artifacts were rejected
        #[arg(short, long)]
        feedback: String,
    },
}

/// Handle approval commands
pub async fn handle_approval_command(command: ApprovalCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    let (gate_id, decision, feedback) = match command {
        ApprovalCommands::Approve { gate_id, feedback } => {
            (gate_id, ApprovalDecision::Approved, feedback)
        }
        ApprovalCommands::Reject { gate_id, feedback } => {
            (gate_id, ApprovalDecision::Rejected, Some(feedback))
        }
    };

    let resolved = client
        .respond_to_approval(gate_id, decision, feedback)
        .await
        .with_context(|| format!("Failed to respond to approval gate {}", gate_id))?;

    println!("{} Gate {}", "✓".green().bold(), resolved.gate_id.to_string().cyan());
    println!("  Gate:     {}", colorize_gate_status(resolved.gate_status));
    println!(
        "  Pipeline: {} ({})",
        resolved.pipeline_id.to_string().dimmed(),
        colorize_status(resolved.pipeline_status)
    );

    Ok(())
}
