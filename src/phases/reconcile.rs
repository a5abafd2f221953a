//! Phase 4: Reconciliation
//!
//! This is the fourth phase of the gensync execution pipeline. For every path
//! in the new output tree or the baseline snapshot it decides what the file on
//! disk should become, using three inputs: the baseline (what was generated
//! last time), the current file on disk, and the newly generated content.
//!
//! ## Decisions
//!
//! | generated | baseline | on disk                   | result                          |
//! |-----------|----------|---------------------------|---------------------------------|
//! | yes       | no       | absent                    | write, `new`                    |
//! | yes       | no       | same as generated         | `unchanged`                     |
//! | yes       | no       | different                 | untouched, `conflicted` (first run) |
//! | yes       | yes      | absent                    | respected deletion, `deleted`   |
//! | yes       | yes      | same as baseline          | write, `clean` / `unchanged`    |
//! | yes       | yes      | edited, generator same    | untouched, `unchanged`          |
//! | yes       | yes      | edited, generator changed | three-way merge                 |
//! | no        | yes      | same as baseline          | delete, `deleted`               |
//! | no        | yes      | edited                    | untouched, orphaned, `unchanged`|
//!
//! Per-file options and operator resolutions refine the table: an
//! `always_regenerate` file is recreated after a user deletion, a
//! `never_overwrite` file is only ever created, and a configured resolution
//! settles a first-run conflict. Paths owned by an instance that failed or was
//! skipped this run are frozen: left on disk as they are, with their baseline
//! entry carried forward.
//!
//! Unmanaged files on disk (in neither the tree nor the baseline) are never
//! looked at.
//!
//! The snapshot file belongs to the store: a generated path equal to it, or
//! to one of its parent directories, fails the run before any decision.
//!
//! Nothing is written here. Writes and deletions are staged and the new
//! snapshot is assembled; Phase 5 commits them.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use glob::Pattern;
use log::{debug, warn};
use rayon::prelude::*;

use super::{GeneratedFile, OutputTree};
use crate::cancel::CancellationToken;
use crate::config::{Config, ResolutionAction};
use crate::error::{Error, Result};
use crate::filesystem::{read_optional, MemoryFS};
use crate::merge::text::has_conflict_markers;
use crate::merge::{self, Formatter};
use crate::path::normalize_output_path;
use crate::report::{FileReport, FileStatus, Issue};
use crate::snapshot::{Snapshot, SnapshotEntry};

/// A formatter applied to merged files matching a glob
#[derive(Clone)]
pub struct FormatterRule {
    pattern: Pattern,
    formatter: Arc<dyn Formatter>,
}

impl FormatterRule {
    pub fn new(pattern: &str, formatter: Arc<dyn Formatter>) -> Result<Self> {
        let pattern = Pattern::new(pattern).map_err(|e| Error::Config {
            message: format!("Invalid formatter pattern '{}': {}", pattern, e),
            hint: Some("Patterns use glob syntax, e.g. \"**/*.rs\"".to_string()),
        })?;
        Ok(Self { pattern, formatter })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }
}

impl std::fmt::Debug for FormatterRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatterRule")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Inputs shared by every path
pub struct ReconcileContext<'a> {
    /// Managed root on disk.
    pub root: &'a Path,
    pub config: &'a Config,
    pub baseline: Option<&'a Snapshot>,
    /// Identities of instances that failed or were skipped.
    pub unbuilt: &'a HashSet<String>,
    pub formatters: &'a [FormatterRule],
}

/// Staged outcome of Phase 4
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub staged: MemoryFS,
    pub deletes: Vec<String>,
    /// The baseline to save if the run commits.
    pub snapshot: Snapshot,
    /// One report per considered path, sorted by path.
    pub files: Vec<FileReport>,
}

impl Reconciliation {
    /// Whether committing would touch any file.
    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty() || !self.deletes.is_empty()
    }
}

/// What to do with one path.
#[derive(Debug)]
struct Decision {
    report: FileReport,
    write: Option<String>,
    delete: bool,
    entry: Option<SnapshotEntry>,
}

impl Decision {
    fn new(path: &str, status: FileStatus) -> Self {
        Self {
            report: FileReport::new(path, status),
            write: None,
            delete: false,
            entry: None,
        }
    }

    fn write(mut self, content: impl Into<String>) -> Self {
        self.write = Some(content.into());
        self
    }

    fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    fn record(mut self, entry: SnapshotEntry) -> Self {
        self.entry = Some(entry);
        self
    }

    fn issue(mut self, issue: Issue) -> Self {
        self.report.issues.push(issue);
        self
    }
}

/// Execute Phase 4: decide every path and stage the results
pub fn execute(
    ctx: &ReconcileContext<'_>,
    tree: &OutputTree,
    cancel: &CancellationToken,
) -> Result<Reconciliation> {
    reject_snapshot_path(ctx.config, tree)?;

    let mut paths: BTreeSet<&String> = tree.paths().collect();
    if let Some(baseline) = ctx.baseline {
        paths.extend(baseline.paths());
    }
    let paths: Vec<&String> = paths.into_iter().collect();

    let decisions: Vec<Decision> = paths
        .par_iter()
        .map(|path| {
            cancel.check()?;
            let base = ctx.baseline.and_then(|b| b.get(path));
            decide(ctx, path, tree.get(path), base)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut result = Reconciliation::default();
    for decision in decisions {
        let path = decision.report.path.clone();
        debug!("{}: {}", path, decision.report.status);
        if let Some(content) = &decision.write {
            result.staged.add_file_string(path.clone(), content);
        }
        if decision.delete {
            result.deletes.push(path.clone());
        }
        if let Some(entry) = decision.entry {
            result.snapshot.insert(path, entry);
        }
        result.files.push(decision.report);
    }
    Ok(result)
}

fn reject_snapshot_path(config: &Config, tree: &OutputTree) -> Result<()> {
    let snapshot = normalize_output_path(&config.snapshot_path)?;
    for reserved in Path::new(&snapshot).ancestors() {
        let reserved = reserved.to_string_lossy();
        if let Some(file) = tree.get(&reserved) {
            return Err(Error::ReservedPath {
                path: file.path.clone(),
                instance: file.generator.clone(),
                snapshot: snapshot.clone(),
            });
        }
    }
    Ok(())
}

fn entry_for(generated: &GeneratedFile) -> SnapshotEntry {
    SnapshotEntry::new(generated.content.clone(), generated.generator.clone())
}

fn decide(
    ctx: &ReconcileContext<'_>,
    path: &str,
    generated: Option<&GeneratedFile>,
    base: Option<&SnapshotEntry>,
) -> Result<Decision> {
    let disk = read_optional(ctx.root, path)?;

    let (generated, base) = match (generated, base) {
        (None, None) => return Ok(Decision::new(path, FileStatus::Unchanged)),
        (None, Some(base)) => return Ok(retire(ctx, path, base, disk)),
        (Some(generated), None) => return Ok(first_run(ctx, path, generated, disk)),
        (Some(generated), Some(base)) => (generated, base),
    };

    let current = match disk {
        None if generated.options.always_regenerate => {
            return Ok(Decision::new(path, FileStatus::New)
                .write(generated.content.clone())
                .record(entry_for(generated)))
        }
        None => {
            debug!("{}: deleted by the user, not recreating", path);
            return Ok(Decision::new(path, FileStatus::Deleted).record(entry_for(generated)));
        }
        Some(current) => current,
    };

    let generated_bytes = generated.content.as_bytes();
    if generated.options.never_overwrite || current == generated_bytes {
        return Ok(Decision::new(path, FileStatus::Unchanged).record(entry_for(generated)));
    }
    if base.matches(&current) {
        return Ok(Decision::new(path, FileStatus::Clean)
            .write(generated.content.clone())
            .record(entry_for(generated)));
    }
    if base.content == generated.content {
        let decision = Decision::new(path, FileStatus::Unchanged).record(entry_for(generated));
        return Ok(flag_markers(path, &current, decision));
    }

    merge_path(ctx, path, generated, base, current)
}

/// Both sides changed: run the strategy's three-way merge.
fn merge_path(
    ctx: &ReconcileContext<'_>,
    path: &str,
    generated: &GeneratedFile,
    base: &SnapshotEntry,
    current: Vec<u8>,
) -> Result<Decision> {
    let current = match String::from_utf8(current) {
        Ok(current) => current,
        Err(_) => {
            warn!("{}: not valid UTF-8, left untouched", path);
            return Ok(Decision::new(path, FileStatus::Conflicted)
                .issue(Issue::MergeConflict {
                    regions: vec!["on-disk content is not valid UTF-8".to_string()],
                })
                .record(base.clone()));
        }
    };

    let strategy = ctx.config.strategy_for(path, generated.strategy);
    let outcome = merge::three_way(
        strategy,
        &base.content,
        &current,
        &generated.content,
        ctx.config.conflict_style,
    );
    let mut decision = flag_markers(
        path,
        current.as_bytes(),
        Decision::new(path, FileStatus::AutoMerged).record(entry_for(generated)),
    );

    if !outcome.is_clean() {
        warn!(
            "{}: {} conflicting region(s) marked for manual resolution",
            path,
            outcome.conflicts.len()
        );
        decision.report.status = FileStatus::Conflicted;
        return Ok(decision
            .issue(Issue::MergeConflict {
                regions: outcome.conflicts,
            })
            .write(outcome.content));
    }

    let mut content = outcome.content;
    if let Some(rule) = ctx.formatters.iter().find(|rule| rule.matches(path)) {
        match rule.formatter.format(path, &content) {
            Ok(formatted) => content = formatted,
            Err(e) => {
                warn!("{}: formatter failed, keeping merged text: {}", path, e);
                decision = decision.issue(Issue::FormatterFailed {
                    message: e.to_string(),
                });
            }
        }
    }

    if content == current {
        decision.report.status = FileStatus::Unchanged;
        Ok(decision)
    } else {
        Ok(decision.write(content))
    }
}

/// The generator no longer produces `path`.
fn retire(
    ctx: &ReconcileContext<'_>,
    path: &str,
    base: &SnapshotEntry,
    disk: Option<Vec<u8>>,
) -> Decision {
    if ctx.unbuilt.contains(&base.generator) {
        debug!("{}: owner '{}' did not build, frozen", path, base.generator);
        return Decision::new(path, FileStatus::Unchanged)
            .issue(Issue::FrozenByFailure {
                instance: base.generator.clone(),
            })
            .record(base.clone());
    }

    match disk {
        None => Decision::new(path, FileStatus::Deleted),
        Some(current) if base.matches(&current) => {
            Decision::new(path, FileStatus::Deleted).delete()
        }
        Some(_) => {
            warn!(
                "{}: no longer generated but modified locally, leaving it in place",
                path
            );
            Decision::new(path, FileStatus::Unchanged).issue(Issue::OrphanedFile)
        }
    }
}

/// No baseline for `path`: never guess over existing content.
fn first_run(
    ctx: &ReconcileContext<'_>,
    path: &str,
    generated: &GeneratedFile,
    disk: Option<Vec<u8>>,
) -> Decision {
    let current = match disk {
        None => {
            return Decision::new(path, FileStatus::New)
                .write(generated.content.clone())
                .record(entry_for(generated))
        }
        Some(current) => current,
    };

    if generated.options.never_overwrite || current == generated.content.as_bytes() {
        return Decision::new(path, FileStatus::Unchanged).record(entry_for(generated));
    }

    match ctx.config.resolution_for(path) {
        Some(ResolutionAction::AcceptGenerated) => Decision::new(path, FileStatus::Clean)
            .write(generated.content.clone())
            .record(entry_for(generated)),
        Some(ResolutionAction::KeepCurrent) => {
            Decision::new(path, FileStatus::Unchanged).record(entry_for(generated))
        }
        None => {
            warn!(
                "{}: exists and differs from generated content with no baseline; left untouched",
                path
            );
            Decision::new(path, FileStatus::Conflicted).issue(Issue::UnreconciledFirstRun)
        }
    }
}

fn flag_markers(path: &str, current: &[u8], decision: Decision) -> Decision {
    match std::str::from_utf8(current) {
        Ok(text) if has_conflict_markers(text) => {
            warn!("{}: still contains conflict markers from an earlier run", path);
            decision.issue(Issue::UnresolvedMarkers)
        }
        _ => decision,
    }
}
