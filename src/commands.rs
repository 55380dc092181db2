use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::ProgressBar;

use crate::cancel::CancellationToken;
use crate::catalog::{
    CatalogEntry, CatalogFilter, KeySource, build_entries, catalog_stem, discover_sources,
    load_catalog, parse_extensions, parse_keywords,
};
use crate::cli::{MatchOpts, RunOpts};
use crate::concurrency::{WorkloadKind, available_cores, choose_workers};
use crate::config::Config;
use crate::engine::{Engine, RunConfig, RunObserver, RunResult};
use crate::error::EngineError;
use crate::job::Outcome;
use crate::matching::{MatchIndex, MatchMode};
use crate::progress::{Progress, format_eta};
use crate::report::{self, RunLog};
use crate::transport::{HttpDownload, LocalCopy, SourceRef, Transport};

/// Which local tool is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalTool {
    /// exact name match, destination keeps the source file name
    Copy,
    /// description containment, destination is `<identifier><source ext>`
    Rename,
}

pub fn handle_copy(
    config: &Config,
    catalog: PathBuf,
    source: PathBuf,
    dest: PathBuf,
    matching: MatchOpts,
    run: RunOpts,
) -> Result<()> {
    handle_local(config, LocalTool::Copy, &catalog, &source, &dest, &matching, &run)
}

pub fn handle_rename(
    config: &Config,
    catalog: PathBuf,
    source: PathBuf,
    dest: PathBuf,
    matching: MatchOpts,
    run: RunOpts,
) -> Result<()> {
    handle_local(config, LocalTool::Rename, &catalog, &source, &dest, &matching, &run)
}

fn handle_local(
    config: &Config,
    tool: LocalTool,
    catalog: &Path,
    source: &Path,
    dest: &Path,
    matching: &MatchOpts,
    run: &RunOpts,
) -> Result<()> {
    let records = load_catalog(catalog)?;
    let filter = entry_filter(
        config,
        tool == LocalTool::Copy,
        matching.skip.as_deref(),
        matching.include_clones,
        matching.exclude_clones,
    );
    let (key, mode) = match tool {
        LocalTool::Copy => (KeySource::Name, MatchMode::Exact),
        LocalTool::Rename => (KeySource::Description, MatchMode::Containment),
    };
    let entries = build_entries(&records, &filter, key);
    if entries.is_empty() {
        return Err(EngineError::EmptyCatalog.into());
    }
    let files = discover_sources(source, matching.recursive)?;
    let extensions = match matching.extensions.as_deref() {
        Some(list) => parse_extensions(&[list]),
        None => parse_extensions(&config.extensions),
    };
    let index = MatchIndex::build(mode, &files, extensions.as_ref());
    tracing::info!(files = files.len(), indexed = index.len(), mode = ?mode, "source indexed");

    let dest_root = destination_root(dest, catalog, run.flat);
    let workers = choose_workers(
        WorkloadKind::LocalCopy,
        run.workers.unwrap_or(config.copy_workers),
        entries.len(),
        available_cores(),
    );
    let run_config = run_config(config, run, workers);
    let resolve = |e: &CatalogEntry| index.resolve(e).map(|f| SourceRef::Local(f.path.clone()));
    let destination_for = |e: &CatalogEntry, s: &SourceRef| local_destination(tool, &dest_root, e, s);

    let title = format!("{} {}", tool_name(tool), catalog_stem(catalog));
    execute(&LocalCopy, &entries, &dest_root, resolve, destination_for, &run_config, run, &title)
}

#[allow(clippy::too_many_arguments)]
pub fn handle_fetch(
    config: &Config,
    catalogs: Vec<PathBuf>,
    dest: PathBuf,
    base_url: Option<String>,
    suffix: String,
    timeout_secs: Option<u64>,
    skip: Option<String>,
    exclude_clones: bool,
    run: RunOpts,
) -> Result<()> {
    let filter = entry_filter(config, false, skip.as_deref(), false, exclude_clones);
    let template = base_url.as_deref().unwrap_or(&config.media_base_url);
    let plan = FetchPlan::load(&catalogs, &dest, template, &suffix, &filter, run.flat)?;
    if plan.entries.is_empty() {
        return Err(EngineError::EmptyCatalog.into());
    }
    plan.prepare()?;
    let timeout = Duration::from_secs(timeout_secs.unwrap_or(config.timeout_secs).max(1));
    let transport = HttpDownload::new(timeout, &config.user_agent)?;

    let workers = choose_workers(
        WorkloadKind::Download,
        run.workers.unwrap_or(config.download_workers),
        plan.entries.len(),
        available_cores(),
    );
    let run_config = run_config(config, &run, workers);
    let title = format!("fetch {}", plan.stems().join(","));
    execute(
        &transport,
        &plan.entries,
        &dest,
        |e| plan.source_for(e),
        |e, _| plan.destination_for(e),
        &run_config,
        &run,
        &title,
    )
}

/// Download jobs for one or more catalogs, run as a single pool. Each
/// catalog's media go to `<dest>/<stem>/` (straight into `<dest>` when
/// `flat`) and are fetched from the base url expanded for that stem.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub entries: Vec<CatalogEntry>,
    /// (catalog stem, expanded base url), in command-line order
    catalogs: Vec<(String, String)>,
    dest: PathBuf,
    suffix: String,
    flat: bool,
}

impl FetchPlan {
    pub fn load(
        catalogs: &[PathBuf],
        dest: &Path,
        template: &str,
        suffix: &str,
        filter: &CatalogFilter,
        flat: bool,
    ) -> Result<Self, EngineError> {
        let mut entries = Vec::new();
        let mut bases = Vec::with_capacity(catalogs.len());
        for path in catalogs {
            let stem = catalog_stem(path);
            let base = expand_base_url(template, &stem)?;
            let records = load_catalog(path)?;
            let before = entries.len();
            entries.extend(
                build_entries(&records, filter, KeySource::Name)
                    .into_iter()
                    .map(|e| e.in_catalog(stem.clone())),
            );
            tracing::info!(catalog = %stem, entries = entries.len() - before, "catalog loaded");
            bases.push((stem, base));
        }
        Ok(Self {
            entries,
            catalogs: bases,
            dest: dest.to_path_buf(),
            suffix: suffix.to_string(),
            flat,
        })
    }

    pub fn stems(&self) -> Vec<&str> {
        self.catalogs.iter().map(|(stem, _)| stem.as_str()).collect()
    }

    pub fn folder(&self, stem: &str) -> PathBuf {
        if self.flat || stem.is_empty() { self.dest.clone() } else { self.dest.join(stem) }
    }

    /// Create the destination folder of every catalog.
    pub fn prepare(&self) -> Result<(), EngineError> {
        for (stem, _) in &self.catalogs {
            let dir = self.folder(stem);
            std::fs::create_dir_all(&dir)
                .map_err(|e| EngineError::CreateDestinationFailed(dir.clone(), e.to_string()))?;
        }
        Ok(())
    }

    pub fn source_for(&self, entry: &CatalogEntry) -> Option<SourceRef> {
        self.catalogs
            .iter()
            .find(|(stem, _)| *stem == entry.catalog)
            .map(|(_, base)| SourceRef::Url(media_url(base, &entry.identifier, &self.suffix)))
    }

    pub fn destination_for(&self, entry: &CatalogEntry) -> PathBuf {
        self.folder(&entry.catalog).join(format!("{}{}", entry.identifier, self.suffix))
    }
}

#[allow(clippy::too_many_arguments)]
pub fn handle_set(
    config: &mut Config,
    copy_workers: Option<usize>,
    download_workers: Option<usize>,
    max_attempts: Option<u32>,
    backoff_ms: Option<u64>,
    timeout_secs: Option<u64>,
    extensions: Option<String>,
    skip_keywords: Option<String>,
    user_agent: Option<String>,
    base_url: Option<String>,
) -> Result<()> {
    if let Some(v) = copy_workers {
        config.copy_workers = v.min(crate::concurrency::MAX_WORKERS);
    }
    if let Some(v) = download_workers {
        config.download_workers = v.clamp(1, crate::concurrency::MAX_WORKERS);
    }
    if let Some(v) = max_attempts {
        config.max_attempts = v.max(1);
    }
    if let Some(v) = backoff_ms {
        config.backoff_ms = v;
    }
    if let Some(v) = timeout_secs {
        config.timeout_secs = v.max(1);
    }
    if let Some(v) = extensions {
        config.extensions = parse_extensions(&[v.as_str()]).map(|s| s.into_iter().collect()).unwrap_or_default();
    }
    if let Some(v) = skip_keywords {
        config.skip_keywords = parse_keywords(&v);
    }
    if let Some(v) = user_agent {
        config.user_agent = v;
    }
    if let Some(v) = base_url {
        expand_base_url(&v, "probe")?;
        config.media_base_url = v;
    }
    config.save()?;
    println!("{}", serde_json::to_string_pretty(config).context("serialize failed")?);
    Ok(())
}

/// `<dest>/<catalog stem>` unless `flat`.
pub fn destination_root(dest: &Path, catalog: &Path, flat: bool) -> PathBuf {
    let stem = catalog_stem(catalog);
    if flat || stem.is_empty() { dest.to_path_buf() } else { dest.join(stem) }
}

/// Destination path of a resolved local entry.
pub fn local_destination(
    tool: LocalTool,
    dest_root: &Path,
    entry: &CatalogEntry,
    source: &SourceRef,
) -> PathBuf {
    match tool {
        LocalTool::Copy => dest_root.join(source.subject()),
        LocalTool::Rename => {
            let ext = match source {
                SourceRef::Local(p) => p
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default(),
                SourceRef::Url(_) => String::new(),
            };
            dest_root.join(format!("{}{}", entry.identifier, ext))
        }
    }
}

/// Substitute `{catalog}` and make sure the result is an http(s) url ending
/// in '/'.
pub fn expand_base_url(template: &str, catalog: &str) -> Result<String, EngineError> {
    let url = template.trim().replace("{catalog}", catalog);
    let lower = url.to_lowercase();
    let rest = lower
        .strip_prefix("http://")
        .or_else(|| lower.strip_prefix("https://"))
        .ok_or_else(|| EngineError::InvalidUrlTemplate(template.to_string()))?;
    if rest.is_empty() || rest.starts_with('/') || url.contains(char::is_whitespace) {
        return Err(EngineError::InvalidUrlTemplate(template.to_string()));
    }
    Ok(if url.ends_with('/') { url } else { format!("{}/", url) })
}

pub fn media_url(base: &str, identifier: &str, suffix: &str) -> String {
    format!("{}{}{}", base, identifier, suffix)
}

fn tool_name(tool: LocalTool) -> &'static str {
    match tool {
        LocalTool::Copy => "copy",
        LocalTool::Rename => "rename",
    }
}

/// Record filter for a tool. `curated` tools (copy) drop clones and the
/// configured skip keywords unless told otherwise; the others keep every
/// record unless `--skip` or `--exclude-clones` is given.
pub fn entry_filter(
    config: &Config,
    curated: bool,
    skip: Option<&str>,
    include_clones: bool,
    exclude_clones: bool,
) -> CatalogFilter {
    let skip_keywords = match skip {
        Some(list) => parse_keywords(list),
        None if curated => config.skip_keywords.iter().map(|k| k.to_lowercase()).collect(),
        None => Vec::new(),
    };
    let include_clones = if curated { include_clones } else { !exclude_clones };
    CatalogFilter { include_clones, skip_keywords }
}

fn run_config(config: &Config, run: &RunOpts, workers: usize) -> RunConfig {
    let retry = crate::scheduler::RetryPolicy::linear(
        run.max_attempts.unwrap_or(config.max_attempts),
        Duration::from_millis(config.backoff_ms),
    )
    .retry_non_transient(!run.no_retry_fatal);
    RunConfig { workers, retry, skip_if_exists: !run.force }
}

/// Route Ctrl-C to the run's cancellation token. Only the first handler of a
/// process can be installed; later failures are logged and ignored.
fn install_ctrlc(cancel: &CancellationToken) {
    let token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        tracing::debug!(error = %e, "ctrl-c handler not installed");
    }
}

/// Terminal observer: progress bar with ETA, colored outcome lines and the
/// append-only run log.
struct CliObserver {
    pb: ProgressBar,
    log: RunLog,
    print_lines: bool,
    color: bool,
}

impl RunObserver for CliObserver {
    fn on_progress(&mut self, progress: &Progress) {
        self.pb.set_position(progress.completed as u64);
        self.pb.set_message(format_eta(progress.eta()));
    }

    fn on_outcome(&mut self, outcome: &Outcome) {
        let line = outcome.line();
        self.log.write_line(&line);
        if self.print_lines {
            let shown = if self.color { report::colorize_line(&line) } else { line };
            if self.pb.is_hidden() {
                println!("{}", shown);
            } else {
                self.pb.println(shown);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn execute<R, D>(
    transport: &dyn Transport,
    entries: &[CatalogEntry],
    dest_root: &Path,
    resolve: R,
    destination_for: D,
    run_config: &RunConfig,
    run: &RunOpts,
    title: &str,
) -> Result<()>
where
    R: Fn(&CatalogEntry) -> Option<SourceRef>,
    D: Fn(&CatalogEntry, &SourceRef) -> PathBuf,
{
    let cancel = CancellationToken::new();
    install_ctrlc(&cancel);
    let engine = Engine::new(transport, cancel);

    // The log lives in the destination root, which must exist first.
    std::fs::create_dir_all(dest_root).map_err(|e| {
        EngineError::CreateDestinationFailed(dest_root.to_path_buf(), e.to_string())
    })?;
    let hide_bar = run.quiet || run.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());
    let mut observer = CliObserver {
        pb: report::init_progress(entries.len() as u64, hide_bar)?,
        log: RunLog::open(dest_root, title),
        print_lines: !run.quiet && !run.json,
        color: report::use_color(),
    };
    tracing::info!(
        title,
        dest = %dest_root.display(),
        workers = run_config.workers,
        attempts = run_config.retry.max_attempts,
        "starting run"
    );

    let result: RunResult =
        engine.run(entries, dest_root, resolve, destination_for, run_config, &mut observer)?;

    let CliObserver { pb, log, .. } = observer;
    pb.finish_and_clear();
    let summary = report::summary_line(&result);
    let log_path = log.path().to_path_buf();
    log.finish(&summary);

    if run.json {
        println!("{}", report::summary_json(&result, Some(&log_path)));
    } else if !run.quiet {
        println!("{}", summary);
        println!("log: {}", log_path.display());
    }
    Ok(())
}
