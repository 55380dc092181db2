use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[clap(
        about = "Copy files whose names match catalog entries exactly (after normalization)",
        name = "copy",
        display_order = 1
    )]
    Copy {
        #[clap(help = "Catalog JSON file ([{\"name\", \"description\", \"cloneof\"}])")]
        catalog: PathBuf,
        #[clap(help = "Directory holding the candidate files")]
        source: PathBuf,
        #[clap(help = "Destination directory (created if absent)")]
        dest: PathBuf,
        #[clap(flatten)]
        matching: MatchOpts,
        #[clap(flatten)]
        run: RunOpts,
    },
    #[clap(
        about = "Copy files whose names contain an entry's description, renamed to the entry name",
        name = "rename",
        display_order = 2
    )]
    Rename {
        catalog: PathBuf,
        source: PathBuf,
        dest: PathBuf,
        #[clap(flatten)]
        matching: MatchOpts,
        #[clap(flatten)]
        run: RunOpts,
    },
    #[clap(
        about = "Download one media file per catalog entry, for one or more catalogs",
        name = "fetch",
        display_order = 3
    )]
    Fetch {
        #[clap(required = true, num_args = 1.., help = "Catalog JSON files, one per platform")]
        catalogs: Vec<PathBuf>,
        #[clap(help = "Destination directory; each catalog gets its own folder")]
        dest: PathBuf,
        #[clap(long = "base-url", help = "Base url; '{catalog}' expands to the catalog file stem")]
        base_url: Option<String>,
        #[clap(long, default_value = ".png", help = "Suffix appended to each entry name")]
        suffix: String,
        #[clap(long = "timeout", help = "Per-request timeout in seconds")]
        timeout_secs: Option<u64>,
        #[clap(long, help = "Skip entries whose name contains one of these keywords (comma separated)")]
        skip: Option<String>,
        #[clap(long = "exclude-clones", help = "Drop clone entries")]
        exclude_clones: bool,
        #[clap(flatten)]
        run: RunOpts,
    },
    #[clap(about = "Change persisted defaults", name = "set", display_order = 4)]
    Set {
        #[clap(long = "copy-workers", help = "Workers for copy/rename (0 = auto)")]
        copy_workers: Option<usize>,
        #[clap(long = "download-workers")]
        download_workers: Option<usize>,
        #[clap(long = "retries", help = "Total attempts per job")]
        max_attempts: Option<u32>,
        #[clap(long = "backoff-ms", help = "Base delay between attempts (multiplied by attempt number)")]
        backoff_ms: Option<u64>,
        #[clap(long = "timeout")]
        timeout_secs: Option<u64>,
        #[clap(long = "ext", help = "Extension allow-list, comma separated; empty string allows all")]
        extensions: Option<String>,
        #[clap(long = "skip", help = "Keywords `copy` skips by default, comma separated")]
        skip_keywords: Option<String>,
        #[clap(long = "user-agent")]
        user_agent: Option<String>,
        #[clap(long = "base-url")]
        base_url: Option<String>,
    },
}

/// Candidate file selection for copy/rename.
#[derive(Args, Debug, Clone, Default)]
pub struct MatchOpts {
    #[clap(long = "ext", help = "Extension allow-list, comma separated (default from config)")]
    pub extensions: Option<String>,
    #[clap(long, help = "Skip entries whose name contains one of these keywords (comma separated)")]
    pub skip: Option<String>,
    #[clap(long = "include-clones", help = "copy: keep clone entries (dropped by default)")]
    pub include_clones: bool,
    #[clap(
        long = "exclude-clones",
        conflicts_with = "include_clones",
        help = "rename: drop clone entries (kept by default)"
    )]
    pub exclude_clones: bool,
    #[clap(short, long, help = "Also look into nested directories of the source")]
    pub recursive: bool,
}

/// Execution flags shared by every transfer command.
#[derive(Args, Debug, Clone, Default)]
pub struct RunOpts {
    #[clap(short = 'w', long = "workers", help = "Number of concurrent workers (max 64)")]
    pub workers: Option<usize>,
    #[clap(long = "retries", help = "Total attempts per job")]
    pub max_attempts: Option<u32>,
    #[clap(long = "no-retry-fatal", help = "Do not retry errors that cannot succeed later")]
    pub no_retry_fatal: bool,
    #[clap(short, long, help = "Overwrite destinations that already exist")]
    pub force: bool,
    #[clap(long, help = "Write straight into the destination instead of a per-catalog folder")]
    pub flat: bool,
    #[clap(long, help = "Print a single-line JSON summary")]
    pub json: bool,
    #[clap(short, long, help = "Do not print outcome lines or the summary")]
    pub quiet: bool,
    #[clap(short, long, help = "Write debug logs to ~/.romsync/logs")]
    pub verbose: bool,
}

impl Commands {
    pub fn verbose(&self) -> bool {
        match self {
            Commands::Copy { run, .. } | Commands::Rename { run, .. } | Commands::Fetch { run, .. } => {
                run.verbose
            }
            Commands::Set { .. } => false,
        }
    }
}
