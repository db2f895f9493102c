use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use gramkeeper::config::Config;
use gramkeeper::device::replay::ReplayDevice;
use gramkeeper::filter::Filter;
use gramkeeper::interaction::{local_clock, runner, shutdown, BotContext};
use gramkeeper::output::terminal;
use gramkeeper::storage::lists::normalize_handle;
use gramkeeper::storage::Storage;

/// Gramkeeper: session limits and interaction bookkeeping for a driven
/// social-media account.
///
/// Decides which accounts to interact with, enforces per-session limits,
/// and remembers every outcome so no account is bothered twice.
#[derive(Parser)]
#[command(name = "gramkeeper", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run sessions with the configured jobs and limits
    Run {
        /// Drive a replay device from this JSON script
        #[arg(long)]
        replay: PathBuf,
    },

    /// Show account status (store sizes, last session)
    Status,

    /// List past sessions
    History {
        /// Only show the most recent N sessions
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show everything stored about one account
    Lookup {
        /// The handle to look up (e.g. @someone)
        handle: String,
    },

    /// List accounts due for an unfollow
    UnfollowCandidates,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gramkeeper=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    config.require_username()?;

    match cli.command {
        Commands::Run { replay } => {
            let plan = config.run_plan();
            if plan.is_empty() {
                anyhow::bail!(
                    "Nothing to do. Set GRAMKEEPER_SOURCES, GRAMKEEPER_UNFOLLOW or \
                     GRAMKEEPER_REMOVE_MASS_FOLLOWERS in your .env file."
                );
            }

            let storage = Storage::open(&config.data_dir, &config.username)?;
            let mut device = ReplayDevice::load(&replay)?;
            let schedule = config.schedule();
            let limits = schedule.limits.resolve(&mut rand::rng());
            let (trigger, stop) = shutdown::channel();
            shutdown::listen_for_ctrl_c(trigger);
            let mut ctx = BotContext::new(
                storage,
                limits,
                Filter::new(config.filter.clone()),
                config.interaction.clone(),
                config.pacing(),
            )
            .with_shutdown(stop)
            .with_working_hours(config.working_hours.clone(), local_clock());

            info!(
                account = %config.username,
                jobs = plan.jobs().len(),
                replay = %replay.display(),
                "Starting"
            );
            let sessions = runner::run(&mut ctx, &mut device, &plan, &schedule).await?;

            println!(
                "{}",
                format!("Done: {} session(s) recorded.", sessions.len()).bold()
            );
        }

        Commands::Status => {
            let storage = Storage::open(&config.data_dir, &config.username)?;
            gramkeeper::status::show(&storage)?;
        }

        Commands::History { limit } => {
            let storage = Storage::open(&config.data_dir, &config.username)?;
            let sessions = storage.history().load()?;
            let start = sessions.len().saturating_sub(limit);
            terminal::display_history(&sessions[start..]);
        }

        Commands::Lookup { handle } => {
            let storage = Storage::open(&config.data_dir, &config.username)?;
            let handle = normalize_handle(&handle);
            terminal::display_record(
                &handle,
                storage.interaction(&handle),
                storage.filtered(&handle),
                storage.is_in_blacklist(&handle),
                storage.is_in_whitelist(&handle),
            );
        }

        Commands::UnfollowCandidates => {
            let storage = Storage::open(&config.data_dir, &config.username)?;
            let candidates =
                storage.unfollow_candidates(config.interaction.unfollow_delay, Local::now());
            terminal::display_unfollow_candidates(&storage, &candidates);
        }
    }

    Ok(())
}
