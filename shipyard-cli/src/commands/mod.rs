//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod approval;
mod pipeline;
mod session;

pub use approval::ApprovalCommands;
pub use pipeline::PipelineCommands;
pub use session::SessionCommands;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use shipyard_core::domain::{GateStatus, PipelineStatus};

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Session management
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Pipeline runs
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Approval gates
    Approval {
        #[command(subcommand)]
        command: ApprovalCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Session { command } => session::handle_session_command(command, config).await,
        Commands::Pipeline { command } => {
            pipeline::handle_pipeline_command(command, config).await
        }
        Commands::Approval { command } => {
            approval::handle_approval_command(command, config).await
        }
    }
}

/// Colorize pipeline status for display
fn colorize_status(status: PipelineStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        PipelineStatus::Initializing => status_str.dimmed(),
        PipelineStatus::Running => status_str.cyan(),
        PipelineStatus::WaitingApproval => status_str.yellow(),
        PipelineStatus::Completed => status_str.green(),
        PipelineStatus::Failed => status_str.red(),
    }
}

/// Colorize gate status for display
fn colorize_gate_status(status: GateStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        GateStatus::Pending => status_str.yellow(),
        GateStatus::Approved => status_str.green(),
        GateStatus::Rejected => status_str.red(),
    }
}
