//! CLI module for Parley
//!
//! Provides the demo commands:
//! - `handoff`: customer-support desk where agents pass the conversation on
//! - `group`: planner-led research team taking turns in a group chat
//! - `swarm`: travel desk where the last handoff decides who speaks
//! - `memory`: manage the remembered facts the memory tools use

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use parley_core::{EventStream, RuntimeEvent};
use tracing::{debug, info, warn};

pub mod group;
pub mod handoff;
pub mod memory;
pub mod rules;
pub mod swarm;

/// Parley multi-agent orchestration CLI
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Multi-agent handoff and group chat orchestration")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with the ACME support desk (triage, sales, issues and repairs)
    Handoff {
        /// Place orders without asking
        #[arg(long)]
        confirm_orders: bool,
    },
    /// Run the planner-led research team on a task
    Group {
        /// Task for the team
        task: Option<String>,
        /// Ask for approval after every plan
        #[arg(long)]
        approve: bool,
    },
    /// Chat with the travel desk swarm
    Swarm,
    /// Manage remembered facts
    Memory {
        #[command(subcommand)]
        command: memory::MemoryCommand,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Handoff { confirm_orders }) => handoff::run(&config, confirm_orders).await,
        Some(Commands::Group { task, approve }) => group::run(&config, task, approve).await,
        Some(Commands::Swarm) => swarm::run(&config).await,
        Some(Commands::Memory { command }) => memory::run(&config, command).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Log one session's orchestration events until the runtime goes away
pub(crate) fn spawn_event_logger(mut events: EventStream) {
    tokio::spawn(async move {
        let mut reported = 0;
        while let Some(event) = events.recv().await {
            if events.missed() > reported {
                warn!(missed = events.missed() - reported, "Event logger fell behind");
                reported = events.missed();
            }
            match event {
                RuntimeEvent::HandoffPerformed { from, to, hops, .. } => {
                    info!(from = %from, to = %to, hops, "Handoff");
                }
                RuntimeEvent::SpeakerSelected {
                    speaker,
                    turn,
                    by_override,
                    ..
                } => {
                    info!(speaker = %speaker, turn, by_override, "Speaker selected");
                }
                RuntimeEvent::DeliveryFailed { agent, error, fatal, .. } => {
                    warn!(agent = %agent, error = %error, fatal, "Delivery failed");
                }
                event => debug!(?event, "Runtime event"),
            }
        }
        debug!(session = ?events.session(), missed = events.missed(), "Event logger stopped");
    });
}
