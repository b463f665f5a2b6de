//! dirwatch CLI - dw command

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod config;
mod logging;
mod output;

/// dirwatch - Watch a directory tree and print what changes
#[derive(Parser)]
#[command(name = "dw")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and print events until Ctrl-C
    Watch {
        #[command(flatten)]
        args: WatchArgs,

        /// Quiet period for coalescing bursts, in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// Gitignore-syntax pattern to ignore (repeatable)
        #[arg(long = "ignore", value_name = "PATTERN")]
        ignore: Vec<String>,

        /// Re-list the whole tree every N seconds
        #[arg(long = "rescan-secs", value_name = "N")]
        rescan_secs: Option<u64>,

        /// TOML file with watch options; flags take precedence
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List a directory once the watcher is ready
    Ls {
        #[command(flatten)]
        args: WatchArgs,
    },
    /// Configuration helpers
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Arguments shared by commands that start a watcher
#[derive(Args)]
struct WatchArgs {
    /// Directory to watch
    dir: PathBuf,

    /// Sub-directory depth (0 = none, -1 = unlimited)
    #[arg(short = 'd', long = "depth", allow_negative_numbers = true)]
    depth: Option<i32>,

    /// Print one JSON object per line
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print an example configuration file
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Held until exit so buffered log lines reach the file
    let _log_guard = logging::init(cli.verbose, cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Watch {
            args,
            debounce_ms,
            ignore,
            rescan_secs,
            config,
        } => {
            let overrides = config::Overrides {
                recursion_depth: args.depth,
                debounce_ms,
                ignore,
                rescan_interval_secs: rescan_secs,
                json: args.json.then_some(true),
            };
            let settings = config::resolve(config.as_deref(), overrides)?;
            cmd::watch::run(&args.dir, settings).await
        }
        Commands::Ls { args } => {
            cmd::ls::run(&args.dir, args.depth.unwrap_or(0), args.json).await
        }
        Commands::Config(ConfigCommands::Example) => cmd::config::run_example(),
    }
}
