//! Drover — coordinate a swarm of coding agents against an issue tracker.
//!
//! The controller agent runs in a tmux session and dispatches workers as
//! windows; `drover collect` is the controller's eyes (one poll cycle of
//! tracker + process state → suggested actions), and `drover start` runs
//! the health loop that keeps everything alive.

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Result, WrapErr};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;

use drover::daemon;
use drover::state;
use drover::tmux::TmuxRunner;

/// Drover — supervise an agent swarm working an issue tracker.
#[derive(Parser)]
#[command(name = "drover", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the controller and run the health loop in the foreground.
    Start {
        /// Team/project identifier.
        team_id: String,

        /// Controller workspace directory (defaults to current directory).
        #[arg(long)]
        workspace: Option<PathBuf>,
    },

    /// Kill the controller session (and with it every worker window).
    Stop {
        /// Team/project identifier.
        team_id: String,
    },

    /// Show controller and worker status.
    Status {
        /// Team/project identifier.
        team_id: String,
    },

    /// Run one state-collection cycle: read tracker issues as JSON on
    /// stdin, print collected state as JSON on stdout.
    Collect {
        /// Team/project identifier.
        #[arg(long)]
        team_id: String,

        /// Session short id override (defaults to one derived from the
        /// team id).
        #[arg(long)]
        short_id: Option<String>,

        /// Pretty-print the output JSON.
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let runner = TmuxRunner;

    match cli.command {
        Command::Start { team_id, workspace } => {
            let workspace = match workspace {
                Some(w) => w,
                None => std::env::current_dir().wrap_err("failed to get current directory")?,
            };
            daemon::start(&runner, &team_id, &workspace).await
        }
        Command::Stop { team_id } => daemon::stop(&runner, &team_id).await,
        Command::Status { team_id } => daemon::status(&runner, &team_id).await,
        Command::Collect {
            team_id,
            short_id,
            pretty,
        } => cmd_collect(&runner, &team_id, short_id.as_deref(), pretty).await,
    }
}

/// Run one collection cycle over stdin issues.
async fn cmd_collect(
    runner: &TmuxRunner,
    team_id: &str,
    short_id: Option<&str>,
    pretty: bool,
) -> Result<()> {
    daemon::validate_project_id(team_id)?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .wrap_err("failed to read issues from stdin")?;
    let raw: Value = serde_json::from_str(&input).wrap_err("stdin is not valid JSON")?;

    // Accept either a raw array of issues or an {"issues": [...]} wrapper.
    let issues: Vec<Value> = match raw {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("issues") {
            Some(Value::Array(items)) => items,
            _ => bail!("expected a JSON array or an object with an `issues` array"),
        },
        _ => bail!("expected a JSON array or an object with an `issues` array"),
    };

    let short = match short_id {
        Some(s) => s.to_owned(),
        None => daemon::get_short_id(team_id),
    };
    let session = daemon::session_name(&short);

    let collected = state::collect_state(
        runner,
        &issues,
        team_id,
        &session,
        state::fetch::RetryPolicy::default(),
    )
    .await?;

    let json = if pretty {
        serde_json::to_string_pretty(&collected)?
    } else {
        serde_json::to_string(&collected)?
    };
    println!("{json}");

    Ok(())
}
