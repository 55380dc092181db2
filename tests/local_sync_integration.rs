use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use romsync::catalog::discover_sources;
use romsync::engine::FnObserver;
use romsync::transport::LocalCopy;
use romsync::{
    CancellationToken, CatalogEntry, Engine, JobError, MatchIndex, MatchMode, RetryPolicy,
    RunConfig, RunResult, SourceRef, Transport,
};

fn write(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, body).expect("write fixture");
    p
}

fn fast_config(workers: usize) -> RunConfig {
    RunConfig {
        workers,
        retry: RetryPolicy::linear(3, Duration::ZERO),
        skip_if_exists: true,
    }
}

fn run_local(
    entries: &[CatalogEntry],
    src: &Path,
    dest: &Path,
    mode: MatchMode,
    rename: bool,
    config: &RunConfig,
) -> RunResult {
    let files = discover_sources(src, false).expect("discover");
    let index = MatchIndex::build(mode, &files, None);
    let engine = Engine::new(&LocalCopy, CancellationToken::new());
    engine
        .run(
            entries,
            dest,
            |e| index.resolve(e).map(|f| SourceRef::Local(f.path.clone())),
            |e, s| {
                if rename {
                    let SourceRef::Local(p) = s else { unreachable!() };
                    let ext = p.extension().map(|x| format!(".{}", x.to_string_lossy())).unwrap_or_default();
                    dest.join(format!("{}{}", e.identifier, ext))
                } else {
                    dest.join(s.subject())
                }
            },
            config,
            &mut (),
        )
        .expect("run")
}

#[test]
fn exact_copy_then_second_run_skips_everything() {
    let src = tempfile::tempdir().expect("src");
    let dst = tempfile::tempdir().expect("dst");
    write(src.path(), "Foo_Bar.zip", b"foo");
    write(src.path(), "other.zip", b"other");

    let entries = vec![CatalogEntry::named("foo bar"), CatalogEntry::named("missing")];
    let first = run_local(&entries, src.path(), dst.path(), MatchMode::Exact, false, &fast_config(4));
    assert_eq!(first.total, 2);
    assert_eq!(first.succeeded, 1);
    assert_eq!(first.missing, 1);
    assert_eq!(first.outcomes.len(), 2);
    let mut lines = first.lines();
    lines.sort();
    assert_eq!(lines, vec!["[MISS] missing", "[OK] Foo_Bar.zip"]);
    assert_eq!(fs::read(dst.path().join("Foo_Bar.zip")).expect("copied"), b"foo");

    // A changed source must not be rewritten when the destination exists.
    write(src.path(), "Foo_Bar.zip", b"changed");
    let second = run_local(&entries, src.path(), dst.path(), MatchMode::Exact, false, &fast_config(4));
    assert_eq!(second.succeeded, 0);
    assert_eq!(second.skipped, 1);
    assert!(second.lines().contains(&"[SKIP] Foo_Bar.zip".to_string()));
    assert_eq!(fs::read(dst.path().join("Foo_Bar.zip")).expect("kept"), b"foo");
}

#[test]
fn forced_copy_replaces_existing_destination() {
    let src = tempfile::tempdir().expect("src");
    let dst = tempfile::tempdir().expect("dst");
    write(src.path(), "Foo_Bar.zip", b"fresh");
    write(dst.path(), "Foo_Bar.zip", b"stale");

    let entries = vec![CatalogEntry::named("foo bar")];
    let config = RunConfig { skip_if_exists: false, ..fast_config(2) };
    let res = run_local(&entries, src.path(), dst.path(), MatchMode::Exact, false, &config);
    assert_eq!(res.succeeded, 1);
    assert_eq!(res.skipped, 0);
    assert_eq!(res.lines(), vec!["[OK] Foo_Bar.zip"]);
    assert_eq!(res.bytes, 5);
    assert_eq!(fs::read(dst.path().join("Foo_Bar.zip")).expect("replaced"), b"fresh");
    let leftovers = fs::read_dir(dst.path()).expect("list").count();
    assert_eq!(leftovers, 1);
}

#[test]
fn containment_rename_uses_identifier_and_source_extension() {
    let src = tempfile::tempdir().expect("src");
    let dst = tempfile::tempdir().expect("dst");
    write(src.path(), "Super Mario Bros (World).nes", b"smb");

    let entries = vec![CatalogEntry::new("smb", "Super Mario Bros")];
    let res = run_local(&entries, src.path(), dst.path(), MatchMode::Containment, true, &fast_config(2));
    assert_eq!(res.succeeded, 1);
    assert_eq!(res.lines(), vec!["[OK] Super Mario Bros (World).nes -> smb.nes"]);
    assert!(dst.path().join("smb.nes").is_file());
    assert!(src.path().join("Super Mario Bros (World).nes").is_file());
}

#[test]
fn distinct_entries_never_share_a_destination() {
    let src = tempfile::tempdir().expect("src");
    let dst = tempfile::tempdir().expect("dst");
    write(src.path(), "Street Fighter II.zip", b"sf2");

    // Both descriptions are contained in the same file name.
    let entries = vec![
        CatalogEntry::new("sf2", "Street Fighter"),
        CatalogEntry::new("sf2", "Street Fighter II"),
    ];
    let res = run_local(&entries, src.path(), dst.path(), MatchMode::Containment, true, &fast_config(4));
    assert_eq!(res.succeeded, 1);
    assert_eq!(res.skipped, 1);
    assert_eq!(res.outcomes.len(), 2);
}

#[test]
fn progress_reaches_total_exactly_once_per_entry() {
    let src = tempfile::tempdir().expect("src");
    let dst = tempfile::tempdir().expect("dst");
    let mut entries = Vec::new();
    for i in 0..20 {
        write(src.path(), &format!("game{}.zip", i), b"x");
        entries.push(CatalogEntry::named(format!("game{}", i)));
    }
    entries.push(CatalogEntry::named("nowhere"));

    let files = discover_sources(src.path(), false).expect("discover");
    let index = MatchIndex::build(MatchMode::Exact, &files, None);
    let engine = Engine::new(&LocalCopy, CancellationToken::new());
    let mut seen = Vec::new();
    let mut lines = Vec::new();
    let mut observer = FnObserver {
        on_progress: |done: usize, total: usize| seen.push((done, total)),
        on_outcome: |line: &str| lines.push(line.to_string()),
    };
    let res = engine
        .run(
            &entries,
            dst.path(),
            |e| index.resolve(e).map(|f| SourceRef::Local(f.path.clone())),
            |_, s| dst.path().join(s.subject()),
            &fast_config(8),
            &mut observer,
        )
        .expect("run");
    assert_eq!(res.succeeded, 20);
    assert_eq!(lines.len(), 21);
    let counts: Vec<usize> = seen.iter().map(|(d, _)| *d).collect();
    assert_eq!(counts, (1..=21).collect::<Vec<_>>());
    assert!(seen.iter().all(|(_, t)| *t == 21));
}

/// Transport that tracks how many transfers run at the same time.
#[derive(Default)]
struct GaugeTransport {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl Transport for GaugeTransport {
    fn transfer(&self, _source: &SourceRef, dest: &Path) -> Result<u64, JobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        fs::write(dest, b"ok").map_err(JobError::from)?;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(2)
    }
}

fn url_entries(n: usize) -> Vec<CatalogEntry> {
    (0..n).map(|i| CatalogEntry::named(format!("item{}", i))).collect()
}

#[test]
fn parallelism_never_exceeds_worker_count() {
    let dst = tempfile::tempdir().expect("dst");
    let transport = GaugeTransport::default();
    let engine = Engine::new(&transport, CancellationToken::new());
    let res = engine
        .run(
            &url_entries(24),
            dst.path(),
            |e| Some(SourceRef::Url(format!("http://h/{}", e.identifier))),
            |e, _| dst.path().join(&e.identifier),
            &fast_config(3),
            &mut (),
        )
        .expect("run");
    assert_eq!(res.succeeded, 24);
    assert_eq!(res.bytes, 48);
    let peak = transport.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 3, "peak {}", peak);
}

/// Fails the first `failures` calls per destination, then succeeds.
struct FlakyTransport {
    failures: usize,
    calls: Mutex<Vec<PathBuf>>,
}

impl Transport for FlakyTransport {
    fn transfer(&self, _source: &SourceRef, dest: &Path) -> Result<u64, JobError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(dest.to_path_buf());
        let seen = calls.iter().filter(|p| p.as_path() == dest).count();
        drop(calls);
        if seen <= self.failures {
            return Err(JobError::Timeout("slow".into()));
        }
        fs::write(dest, b"ok").map_err(JobError::from)?;
        Ok(2)
    }
}

#[test]
fn retries_until_success_within_attempt_budget() {
    let dst = tempfile::tempdir().expect("dst");
    let transport = FlakyTransport { failures: 2, calls: Mutex::new(Vec::new()) };
    let engine = Engine::new(&transport, CancellationToken::new());
    let res = engine
        .run(
            &url_entries(2),
            dst.path(),
            |e| Some(SourceRef::Url(format!("http://h/{}", e.identifier))),
            |e, _| dst.path().join(&e.identifier),
            &fast_config(2),
            &mut (),
        )
        .expect("run");
    assert_eq!(res.succeeded, 2);
    assert!(res.outcomes.iter().all(|o| o.attempts == 3));
    assert_eq!(transport.calls.lock().unwrap().len(), 6);
}

#[test]
fn exhausted_attempts_produce_error_outcome() {
    let dst = tempfile::tempdir().expect("dst");
    let transport = FlakyTransport { failures: 10, calls: Mutex::new(Vec::new()) };
    let engine = Engine::new(&transport, CancellationToken::new());
    let res = engine
        .run(
            &url_entries(1),
            dst.path(),
            |e| Some(SourceRef::Url(format!("http://h/{}", e.identifier))),
            |e, _| dst.path().join(&e.identifier),
            &fast_config(1),
            &mut (),
        )
        .expect("run");
    assert_eq!(res.succeeded, 0);
    assert_eq!(res.failed, 1);
    assert_eq!(res.lines(), vec!["[ERR] item0: timed out: slow"]);
    assert_eq!(transport.calls.lock().unwrap().len(), 3);
}

/// Requests cancellation during its first transfer.
struct CancellingTransport {
    token: CancellationToken,
    calls: AtomicUsize,
}

impl Transport for CancellingTransport {
    fn transfer(&self, _source: &SourceRef, dest: &Path) -> Result<u64, JobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        fs::write(dest, b"ok").map_err(JobError::from)?;
        Ok(2)
    }
}

#[test]
fn cancellation_stops_pending_jobs() {
    let dst = tempfile::tempdir().expect("dst");
    let token = CancellationToken::new();
    let transport = CancellingTransport { token: token.clone(), calls: AtomicUsize::new(0) };
    let engine = Engine::new(&transport, token);
    let res = engine
        .run(
            &url_entries(5),
            dst.path(),
            |e| Some(SourceRef::Url(format!("http://h/{}", e.identifier))),
            |e, _| dst.path().join(&e.identifier),
            &fast_config(1),
            &mut (),
        )
        .expect("run");
    assert!(res.was_cancelled);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert_eq!(res.succeeded, 1);
    assert_eq!(res.cancelled, 4);
    assert_eq!(res.outcomes.len(), 5);
    assert!(res.lines().iter().filter(|l| l.starts_with("[CANCEL]")).count() == 4);
}
