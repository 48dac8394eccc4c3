//! Pipeline command handlers
//!
//! Handles starting pipelines, inspecting their state and error log, and
//! following their event stream.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::*;
use futures::StreamExt;
use serde::Deserialize;
use shipyard_client::OrchestratorClient;
use shipyard_core::domain::{
    AgentStage, ApprovalGate, Artifact, PipelineFailure, PipelineState, PipelineStatus,
};
use shipyard_core::event::{EventType, StreamEvent};
use uuid::Uuid;

use super::{colorize_gate_status, colorize_status};
use crate::config::Config;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Start a pipeline for a session
    Start {
        /// Session ID
        #[arg(short, long)]
        session: Uuid,

        /// Pipeline mode: hackathon, placement or refactor
        #[arg(short, long, default_value = "hackathon")]
        mode: String,

        /// Follow the event stream after starting
        #[arg(short, long)]
        watch: bool,
    },
    /// Get pipeline details
    Get {
        /// Pipeline ID
        id: Uuid,
    },
    /// Follow a pipeline's event stream until it finishes
    Watch {
        /// Pipeline ID
        id: Uuid,
    },
    /// Show a pipeline's error log
    Errors {
        /// Pipeline ID
        id: Uuid,
    },
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        PipelineCommands::Start {
            session,
            mode,
            watch,
        } => start_pipeline(&client, session, &mode, watch).await,
        PipelineCommands::Get { id } => get_pipeline(&client, id).await,
        PipelineCommands::Watch { id } => watch_pipeline(&client, id).await,
        PipelineCommands::Errors { id } => list_errors(&client, id).await,
    }
}

async fn start_pipeline(
    client: &OrchestratorClient,
    session: Uuid,
    mode: &str,
    watch: bool,
) -> Result<()> {
    let pipeline_id = client
        .start_pipeline(session, mode)
        .await
        .context("Failed to start pipeline")?;

    println!("{}", "✓ Pipeline started".green().bold());
    println!("  ID:   {}", pipeline_id.to_string().cyan());
    println!("  Mode: {}", mode);

    if watch {
        println!();
        watch_pipeline(client, pipeline_id).await
    } else {
        println!();
        println!(
            "{}",
            format!("Follow it with: shipyard pipeline watch {}", pipeline_id).dimmed()
        );
        Ok(())
    }
}

async fn get_pipeline(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let pipeline = client
        .get_pipeline(id)
        .await
        .context("Failed to get pipeline")?;

    print_pipeline_details(&pipeline);
    Ok(())
}

async fn list_errors(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let entries = client
        .list_errors(id)
        .await
        .context("Failed to get error log")?;

    if entries.is_empty() {
        println!("{}", "No errors recorded for this pipeline.".green());
        return Ok(());
    }

    println!("{}", format!("Error log for pipeline {}:", id).bold());
    println!("{}", "─".repeat(80).dimmed());
    for view in entries {
        let line = if view.entry.recoverable {
            view.formatted.yellow()
        } else {
            view.formatted.red()
        };
        println!("{}", line);
    }
    println!("{}", "─".repeat(80).dimmed());

    Ok(())
}

// =============================================================================
// Event Stream
// =============================================================================

/// Fields of an `agent_progress` payload the watcher reports on
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Progress {
    status: PipelineStatus,
    current_agent: Option<AgentStage>,
    #[serde(default)]
    artifacts: Vec<Artifact>,
    #[serde(default)]
    approval_gates: Vec<ApprovalGate>,
}

/// Payload of a terminal event
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Outcome {
    status: PipelineStatus,
    #[serde(default)]
    artifacts: Vec<Artifact>,
    error: Option<PipelineFailure>,
}

/// What was last printed, so unchanged ticks stay quiet
#[derive(Debug, Default, PartialEq)]
struct Seen {
    status: Option<PipelineStatus>,
    current_agent: Option<AgentStage>,
    artifacts: usize,
    gates: usize,
}

async fn watch_pipeline(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let mut events = client
        .stream_pipeline(id)
        .await
        .context("Failed to open event stream")?;

    let mut seen = Seen::default();
    while let Some(event) = events.next().await {
        let event = event.context("Event stream interrupted")?;
        if let Some(outcome) = report_event(&event, &mut seen)? {
            return finish(outcome);
        }
    }

    Ok(())
}

/// Print an event; returns the outcome once the pipeline has finished
fn report_event(event: &StreamEvent, seen: &mut Seen) -> Result<Option<Outcome>> {
    match event.event_type {
        EventType::PipelineStarted => {
            println!(
                "{} Pipeline {} ({})",
                "▸".cyan(),
                event.data["id"].as_str().unwrap_or_default(),
                event.data["mode"].as_str().unwrap_or_default()
            );
        }
        EventType::AgentProgress => {
            let progress: Progress = serde_json::from_value(event.data.clone())
                .context("Malformed progress event")?;
            report_progress(&progress, seen);
        }
        EventType::PipelineCompleted | EventType::PipelineFailed => {
            let outcome: Outcome = serde_json::from_value(event.data.clone())
                .context("Malformed terminal event")?;
            return Ok(Some(outcome));
        }
        EventType::Error => {
            println!(
                "{} {}",
                "⚠".yellow(),
                event.data["message"].as_str().unwrap_or("stream error").yellow()
            );
        }
        other => {
            println!("{} {:?}: {}", "·".dimmed(), other, event.data);
        }
    }
    Ok(None)
}

fn report_progress(progress: &Progress, seen: &mut Seen) {
    let now = Seen {
        status: Some(progress.status),
        current_agent: progress.current_agent,
        artifacts: progress.artifacts.len(),
        gates: progress.approval_gates.len(),
    };
    if now == *seen {
        return;
    }

    for artifact in progress.artifacts.iter().skip(seen.artifacts) {
        println!(
            "  {} artifact: {} ({:?})",
            "+".green(),
            artifact.title,
            artifact.artifact_type
        );
    }

    if let Some(stage) = progress.current_agent {
        if seen.current_agent != Some(stage) {
            println!("{} Running stage {}", "▸".cyan(), stage.to_string().bold());
        }
    }

    if progress.status == PipelineStatus::WaitingApproval && seen.gates != now.gates {
        if let Some(gate) = progress.approval_gates.iter().find(|g| g.is_pending()) {
            println!(
                "{} Approval required: {} output of stage {} (gate {})",
                "?".yellow().bold(),
                gate.gate_type,
                gate.stage,
                gate.id.to_string().cyan()
            );
            println!(
                "{}",
                format!(
                    "  shipyard approval approve {}  |  shipyard approval reject {} --feedback ...",
                    gate.id, gate.id
                )
                .dimmed()
            );
        }
    }

    *seen = now;
}

fn finish(outcome: Outcome) -> Result<()> {
    println!();
    println!(
        "Pipeline {} with {} artifact(s)",
        colorize_status(outcome.status),
        outcome.artifacts.len()
    );

    match outcome.error {
        Some(error) => {
            if let Some(agent) = error.agent {
                println!("  Stage: {}", agent.to_string().red());
            }
            if let Some(gate_id) = error.gate_id {
                println!("  Gate:  {}", gate_id);
            }
            bail!("pipeline failed: {}", error.message)
        }
        None => Ok(()),
    }
}

// =============================================================================
// Display Helpers
// =============================================================================

fn print_pipeline_details(pipeline: &PipelineState) {
    println!("{}", "Pipeline Details:".bold());
    println!("  ID:        {}", pipeline.id.to_string().cyan());
    println!("  Session:   {}", pipeline.session_id.to_string().dimmed());
    println!("  Mode:      {}", pipeline.mode);
    println!("  Status:    {}", colorize_status(pipeline.status));
    if let Some(agent) = pipeline.current_agent {
        println!("  Stage:     {}", agent);
    }
    println!(
        "  Started:   {}",
        pipeline.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(completed) = pipeline.completed_at {
        println!("  Finished:  {}", completed.format("%Y-%m-%d %H:%M:%S"));
        let seconds = completed.signed_duration_since(pipeline.started_at).num_seconds();
        println!("  Duration:  {}s", seconds);
    }

    println!();
    println!("{}", "Stages:".bold());
    for stage in pipeline.mode.active_stages() {
        let line = match pipeline.result_for(*stage) {
            Some(result) => format!("done ({} attempt(s))", result.attempts).green(),
            None if pipeline.current_agent == Some(*stage) => "running".cyan(),
            None => "pending".dimmed(),
        };
        println!("  {:<11} {}", stage.to_string(), line);
    }

    if !pipeline.artifacts.is_empty() {
        println!();
        println!("{}", "Artifacts:".bold());
        for artifact in &pipeline.artifacts {
            println!("  {} {} ({:?})", "▸".cyan(), artifact.title, artifact.artifact_type);
        }
    }

    if !pipeline.approval_gates.is_empty() {
        println!();
        println!("{}", "Approval gates:".bold());
        for gate in &pipeline.approval_gates {
            println!(
                "  {} {} [{}] stage {}",
                gate.id.to_string().dimmed(),
                gate.gate_type,
                colorize_gate_status(gate.status),
                gate.stage
            );
            if let Some(feedback) = &gate.feedback {
                println!("      feedback: {}", feedback);
            }
        }
    }

    if let Some(error) = &pipeline.error {
        println!();
        println!("{} {}", "Error:".red().bold(), error.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_core::domain::Mode;

    #[test]
    fn test_progress_is_reported_once_per_change() {
        let mut state = PipelineState::new(Uuid::new_v4(), Mode::Hackathon);
        state.advance().unwrap();
        let event = StreamEvent::agent_progress(&state, 1);
        let mut seen = Seen::default();

        assert!(report_event(&event, &mut seen).unwrap().is_none());
        assert_eq!(seen.current_agent, Some(AgentStage::Analyze));
        assert_eq!(seen.status, Some(PipelineStatus::Running));

        // Same sample again leaves the record untouched
        assert!(report_event(&event, &mut seen).unwrap().is_none());
        assert_eq!(seen.current_agent, Some(AgentStage::Analyze));
    }

    #[test]
    fn test_terminal_event_yields_outcome() {
        let mut state = PipelineState::new(Uuid::new_v4(), Mode::Refactor);
        state.fail(PipelineFailure::new("network error")).unwrap();
        let event = StreamEvent::terminal(&state, 2).unwrap();

        let outcome = report_event(&event, &mut Seen::default()).unwrap().unwrap();
        assert_eq!(outcome.status, PipelineStatus::Failed);
        assert!(finish(outcome).is_err());
    }
}
