mod cmd_config;
mod cmd_init;
mod cmd_play;
mod cmd_status;
mod cmd_upload;
mod workspace;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "banditlog",
    version,
    about = "Three-armed bandit sessions logged to a spreadsheet"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new .banditlog/ workspace
    Init,
    /// Manage workspace configuration
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
    /// Play one session and append its rounds to the spreadsheet
    Play {
        /// Participant id (default: a fresh p_<ulid>)
        #[arg(long)]
        participant: Option<String>,
        /// Scripted choices, e.g. "AABBC". Remaining rounds are random.
        #[arg(long)]
        choices: Option<String>,
        /// Number of rounds (default: script length, else n_rounds from config)
        #[arg(long)]
        rounds: Option<u32>,
        /// Seed for rewards and random choices
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Upload rows from an exported CSV file
    Upload {
        /// Exported CSV file
        file: std::path::PathBuf,
        /// The file holds summary rows instead of log rows
        #[arg(long)]
        summary: bool,
    },
    /// Show workspace configuration and unsent exports
    Status,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("BANDITLOG_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let repo_root = std::env::current_dir()?;

    match cli.cmd {
        Command::Init => cmd_init::execute(&repo_root),
        Command::Config { cmd } => cmd_config::run(cmd, &repo_root),
        Command::Play {
            participant,
            choices,
            rounds,
            seed,
        } => cmd_play::execute(&cmd_play::PlayParams {
            repo_root: &repo_root,
            participant: participant.as_deref(),
            choices: choices.as_deref(),
            rounds,
            seed,
        }),
        Command::Upload { file, summary } => cmd_upload::execute(&repo_root, &file, summary),
        Command::Status => cmd_status::execute(&repo_root),
    }
}
