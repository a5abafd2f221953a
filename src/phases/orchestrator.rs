//! Orchestrator for a complete generation run
//!
//! This module coordinates all phases to provide a clean API for a complete
//! run: from a root generator to reconciled files on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use rayon::ThreadPoolBuilder;

use super::reconcile::{FormatterRule, ReconcileContext, Reconciliation};
use super::{phase1, phase2, phase3, phase4, phase5};
use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::merge::Formatter;
use crate::report::RunReport;
use crate::snapshot::SnapshotStore;

/// Settings for one run
#[derive(Clone)]
pub struct RunOptions {
    root: PathBuf,
    config: Config,
    cancel: CancellationToken,
    dry_run: bool,
    formatters: Vec<(String, Arc<dyn Formatter>)>,
}

impl RunOptions {
    /// Run against `root` with the default configuration. A relative
    /// `output_root` in the configuration is resolved against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: Config::default(),
            cancel: CancellationToken::new(),
            dry_run: false,
            formatters: Vec::new(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Token the run polls between phases and instances.
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Evaluate everything but commit nothing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run `formatter` over cleanly merged files matching `pattern`.
    pub fn formatter(mut self, pattern: impl Into<String>, formatter: Arc<dyn Formatter>) -> Self {
        self.formatters.push((pattern.into(), formatter));
        self
    }

    /// The managed root this run reconciles.
    pub fn output_root(&self) -> PathBuf {
        self.config.resolve_root(&self.root)
    }

    pub fn snapshot_store(&self) -> SnapshotStore {
        SnapshotStore::new(self.config.snapshot_file(&self.output_root()))
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("dry_run", &self.dry_run)
            .field("formatters", &self.formatters.len())
            .finish_non_exhaustive()
    }
}

/// Execute a complete run (Phases 1-5)
///
/// This orchestrates the whole pipeline:
/// 1. Instantiate the generator tree and resolve dependencies
/// 2. Reject cycles and compute the execution order
/// 3. Build every instance on a worker pool
/// 4. Reconcile the output tree against the baseline and the disk
/// 5. Commit staged writes and the new baseline (skipped for dry runs)
///
/// Graph errors, output path collisions and cancellation are returned as
/// `Err` with nothing written. Instance build failures are not: the run still
/// commits what independent instances produced, freezes the paths owned by
/// failed instances, and lists the failures on the report.
pub fn execute_run(
    root_name: &str,
    root: Arc<dyn Generator>,
    options: &RunOptions,
) -> Result<RunReport> {
    let config = &options.config;
    config.validate()?;
    let formatters = options
        .formatters
        .iter()
        .map(|(pattern, formatter)| FormatterRule::new(pattern, Arc::clone(formatter)))
        .collect::<Result<Vec<_>>>()?;
    let cancel = &options.cancel;
    cancel.check()?;

    // Phase 1: Discovery
    let graph = phase1::execute(root_name, root)?;
    info!(
        "Discovered {} generator instance(s) with {} dependency edge(s)",
        graph.len(),
        graph.edges.len()
    );

    // Phase 2: Ordering
    let order = phase2::execute(&graph)?;

    // Phase 3: Execution
    let workers = config.workers.effective();
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("gensync-worker-{}", i))
        .build()
        .map_err(|e| Error::WorkerPool {
            message: e.to_string(),
        })?;
    info!("Building on {} worker(s)", workers);
    let built = phase3::execute(&graph, &order, &pool, cancel)?;
    cancel.check()?;

    // Phase 4: Reconciliation
    let output_root = options.output_root();
    let store = options.snapshot_store();
    let (baseline, snapshot_issue) = store.load_or_degrade();
    let unbuilt: HashSet<String> = built.unbuilt().map(str::to_string).collect();
    let ctx = ReconcileContext {
        root: &output_root,
        config,
        baseline: baseline.as_ref(),
        unbuilt: &unbuilt,
        formatters: &formatters,
    };
    let reconciliation = pool.install(|| phase4::execute(&ctx, &built.tree, cancel))?;
    cancel.check()?;

    let mut report = RunReport {
        files: Vec::new(),
        instances: built.instances,
        failures: built.failures,
        warnings: snapshot_issue.into_iter().collect(),
        committed: false,
    };

    // Phase 5: Write
    if options.dry_run {
        info!("Dry run: {} staged write(s) not committed", reconciliation.staged.len());
    } else {
        commit(&reconciliation, &output_root, &store, cancel)?;
        report.committed = true;
    }

    report.files = reconciliation.files;
    info!("Run finished: {}", report.summary());
    Ok(report)
}

fn commit(
    reconciliation: &Reconciliation,
    root: &Path,
    store: &SnapshotStore,
    cancel: &CancellationToken,
) -> Result<()> {
    phase5::execute(reconciliation, root, store, cancel).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::FnGenerator;
    use crate::generator::OutputFile;
    use crate::report::FileStatus;
    use std::fs;
    use tempfile::TempDir;

    fn single_file(path: &'static str, content: &'static str) -> Arc<dyn Generator> {
        Arc::new(FnGenerator::new(
            |_| {},
            move |ctx| ctx.add_file(OutputFile::text(path, content)),
        ))
    }

    #[test]
    fn test_run_writes_files_and_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let options = RunOptions::new(temp_dir.path());

        let report = execute_run("app", single_file("hello.txt", "hi\n"), &options).unwrap();
        assert!(report.committed);
        assert_eq!(report.status_of("hello.txt"), Some(FileStatus::New));
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("hello.txt")).unwrap(),
            "hi\n"
        );
        let snapshot = options.snapshot_store().load().unwrap().unwrap();
        assert_eq!(snapshot.get("hello.txt").unwrap().generator, "app");
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let options = RunOptions::new(temp_dir.path());

        execute_run("app", single_file("hello.txt", "hi\n"), &options).unwrap();
        let report = execute_run("app", single_file("hello.txt", "hi\n"), &options).unwrap();
        assert_eq!(report.status_of("hello.txt"), Some(FileStatus::Unchanged));
        assert_eq!(report.summary(), "1 unchanged");
    }

    #[test]
    fn test_dry_run_commits_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let options = RunOptions::new(temp_dir.path()).dry_run(true);

        let report = execute_run("app", single_file("hello.txt", "hi\n"), &options).unwrap();
        assert!(!report.committed);
        assert_eq!(report.status_of("hello.txt"), Some(FileStatus::New));
        assert!(!temp_dir.path().join("hello.txt").exists());
        assert!(options.snapshot_store().load().unwrap().is_none());
    }

    #[test]
    fn test_output_root_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = crate::config::parse("output_root: out\n").unwrap();
        let options = RunOptions::new(temp_dir.path()).config(config);

        execute_run("app", single_file("a.txt", "a\n"), &options).unwrap();
        assert!(temp_dir.path().join("out/a.txt").is_file());
        assert!(temp_dir.path().join("out/.gensync/snapshot.json").is_file());
    }

    #[test]
    fn test_invalid_formatter_pattern_is_rejected() {
        struct Noop;
        impl Formatter for Noop {
            fn format(
                &self,
                _path: &str,
                content: &str,
            ) -> std::result::Result<String, crate::error::BuildError> {
                Ok(content.to_string())
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let options = RunOptions::new(temp_dir.path()).formatter("[", Arc::new(Noop));
        let err = execute_run("app", single_file("a.txt", "a\n"), &options).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(!temp_dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_cancelled_run_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = RunOptions::new(temp_dir.path()).cancel_token(cancel);

        let err = execute_run("app", single_file("a.txt", "a\n"), &options).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
