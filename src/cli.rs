use crate::config::{self, DEFAULT_CONFIG_PATH};
use crate::events::QueryOptions;
use crate::{logging, run};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "eventsproc", version)]
#[command(
    about = "Checkpointed exporter for NetBird activity events",
    long_about = "eventsproc reads activity events from the management database in id order, enriches actor ids with email addresses, writes one JSON line per event to stdout and records a durable checkpoint per consumer identity."
)]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "Examples:
  eventsproc run
  eventsproc --config ./eventsproc.toml run
  EP_POLLING_INTERVAL=60 eventsproc run
  eventsproc count --since 2026-01-01T00:00:00Z
  eventsproc checkpoint show
  eventsproc checkpoint reset --consumer eventsproc-prod-eu --yes
  eventsproc completion zsh > ~/.zsh/completions/_eventsproc
  eventsproc man > eventsproc.1")]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Config file (default: /etc/eventsproc/config.toml when present)"
    )]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Export events until the backlog is drained",
        long_about = "Run one cycle, or one cycle per polling interval when EP_POLLING_INTERVAL is set. Events go to stdout, logs to stderr. Ctrl-C stops after the current batch."
    )]
    Run,
    #[command(about = "Count events matching the given filters")]
    #[command(after_long_help = "Example:
  eventsproc count --account acc-1 --since 2026-01-01T00:00:00Z --activity 2")]
    Count {
        #[arg(long, value_name = "ID", help = "Only events of this account")]
        account: Option<String>,
        #[arg(long, value_name = "RFC3339", value_parser = parse_time, help = "Events at or after this time")]
        since: Option<DateTime<Utc>>,
        #[arg(long, value_name = "RFC3339", value_parser = parse_time, help = "Events at or before this time")]
        until: Option<DateTime<Utc>>,
        #[arg(long, value_name = "CODE", help = "Only events with this activity code")]
        activity: Option<i64>,
        #[arg(long, value_name = "ID", help = "Only events with a larger id")]
        after: Option<i64>,
    },
    #[command(about = "Inspect or reset stored checkpoints")]
    #[command(arg_required_else_help = true)]
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },
    #[command(
        about = "Generate shell completion script",
        long_about = "Generate shell completion script for your shell. Redirect output to your shell completion directory."
    )]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Examples:
  eventsproc completion bash > ~/.local/share/bash-completion/completions/eventsproc
  eventsproc completion zsh > ~/.zsh/completions/_eventsproc
  eventsproc completion fish > ~/.config/fish/completions/eventsproc.fish")]
    Completion {
        #[arg(value_enum, value_name = "SHELL", help = "Target shell")]
        shell: Shell,
    },
    #[command(
        about = "Generate a man page",
        long_about = "Generate a roff man page for eventsproc."
    )]
    Man {
        #[arg(
            long,
            value_name = "PATH",
            help = "Write man page to file (stdout when omitted)"
        )]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum CheckpointCommands {
    #[command(about = "Print the checkpoint of one consumer")]
    Show {
        #[arg(long, value_name = "ID", help = "Consumer identity (default: configured)")]
        consumer: Option<String>,
    },
    #[command(about = "Print all stored checkpoints")]
    List,
    #[command(about = "Delete a checkpoint so the consumer restarts from its lookback window")]
    #[command(arg_required_else_help = true)]
    Reset {
        #[arg(long, value_name = "ID", help = "Consumer identity to reset")]
        consumer: String,
        #[arg(long, help = "Confirm the reset")]
        yes: bool,
    },
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| format!("expected RFC3339 time: {err}"))
}

/// Explicit paths must exist; the default path is optional.
fn config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default = Path::new(DEFAULT_CONFIG_PATH);
        default.exists().then(|| default.to_path_buf())
    })
}

fn load(explicit: Option<PathBuf>) -> Result<config::Config> {
    let path = config_path(explicit);
    let cfg = config::load_config(path.as_deref()).context("load configuration")?;
    logging::init(&cfg.log_level)?;
    Ok(cfg)
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run => {
            let cfg = load(cli.config)?;
            run::execute_run(&cfg)
        }
        Commands::Count {
            account,
            since,
            until,
            activity,
            after,
        } => {
            let cfg = load(cli.config)?;
            let opts = QueryOptions {
                account_id: account,
                start_time: since,
                end_time: until,
                activity,
                min_event_id: after,
                ..QueryOptions::default()
            };
            run::count_events(&cfg, &opts)
        }
        Commands::Checkpoint { command } => {
            let cfg = load(cli.config)?;
            match command {
                CheckpointCommands::Show { consumer } => {
                    run::show_checkpoint(&cfg, consumer.as_deref())
                }
                CheckpointCommands::List => run::list_checkpoints(&cfg),
                CheckpointCommands::Reset { consumer, yes } => {
                    run::reset_checkpoint(&cfg, &consumer, yes)
                }
            }
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Man { output } => {
            let man = clap_mangen::Man::new(Cli::command());
            match output {
                Some(path) => {
                    let mut bytes = Vec::new();
                    man.render(&mut bytes)?;
                    fs::write(path, bytes)?;
                }
                None => {
                    man.render(&mut io::stdout())?;
                }
            }
            Ok(())
        }
    }
}
