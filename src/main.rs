use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use romsync::cli::{Cli, Commands};
use romsync::commands::{handle_copy, handle_fetch, handle_rename, handle_set};
use romsync::config::{self, Config};

/// Warnings go to stderr by default. With `--verbose` everything down to
/// debug is written to `~/.romsync/logs/romsync.log` instead, so log output
/// never tears the progress bar. `RUST_LOG` overrides the level.
fn init_tracing(verbose: bool) -> Option<WorkerGuard> {
    let default_level = if verbose { "romsync=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if verbose {
        if let Ok(dir) = config::logs_dir() {
            let appender = tracing_appender::rolling::never(dir, "romsync.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_writer(writer)
                .try_init();
            return Some(guard);
        }
    }
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
    None
}

fn main() {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.command.verbose());

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "run aborted");
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::init()?;
    match cli.command {
        Commands::Copy { catalog, source, dest, matching, run } => {
            handle_copy(&config, catalog, source, dest, matching, run)
        }
        Commands::Rename { catalog, source, dest, matching, run } => {
            handle_rename(&config, catalog, source, dest, matching, run)
        }
        Commands::Fetch { catalogs, dest, base_url, suffix, timeout_secs, skip, exclude_clones, run } => {
            handle_fetch(&config, catalogs, dest, base_url, suffix, timeout_secs, skip, exclude_clones, run)
        }
        Commands::Set {
            copy_workers,
            download_workers,
            max_attempts,
            backoff_ms,
            timeout_secs,
            extensions,
            skip_keywords,
            user_agent,
            base_url,
        } => handle_set(
            &mut config,
            copy_workers,
            download_workers,
            max_attempts,
            backoff_ms,
            timeout_secs,
            extensions,
            skip_keywords,
            user_agent,
            base_url,
        ),
    }
}
