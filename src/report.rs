//! Run report
//!
//! The report is what a run hands back to its caller: the final status of
//! every path it considered, the non-fatal issues found along the way, and
//! the generator instances that failed or were skipped. It is plain data;
//! rendering it for a terminal is left to the CLI layer.

use std::fmt;

use crate::error::{BuildFailure, Error, Result};

/// Final status of one output path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// Overwritten with new generated content; the user had not edited it.
    Clean,
    /// User edits and generator changes were combined without conflict.
    AutoMerged,
    /// Holds inline conflict markers, or was left untouched pending an
    /// operator decision.
    Conflicted,
    /// Left as it is on disk.
    Unchanged,
    /// Created from generated content.
    New,
    /// Absent after the run: removed, or a user deletion that was respected.
    Deleted,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileStatus::Clean => "clean",
            FileStatus::AutoMerged => "auto-merged",
            FileStatus::Conflicted => "conflicted",
            FileStatus::Unchanged => "unchanged",
            FileStatus::New => "new",
            FileStatus::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Non-fatal finding attached to a path or to the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// Both sides changed the same region; one entry per region or key.
    MergeConflict { regions: Vec<String> },
    /// The generator retired a file the user had modified; it was kept.
    OrphanedFile,
    /// No baseline exists and the file on disk differs from the generated
    /// content; nothing was written.
    UnreconciledFirstRun,
    /// The file on disk still holds conflict markers from an earlier run.
    UnresolvedMarkers,
    /// The baseline snapshot was unreadable and the run proceeded without it.
    SnapshotCorrupt { message: String },
    /// The instance that owns this path did not build; the path was left
    /// as it was.
    FrozenByFailure { instance: String },
    /// The post-merge formatter failed; the unformatted result was kept.
    FormatterFailed { message: String },
}

impl Issue {
    /// Whether this issue needs a human before the path is settled.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Issue::MergeConflict { .. } | Issue::UnreconciledFirstRun)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::MergeConflict { regions } => {
                write!(f, "merge conflict in {}", regions.join("; "))
            }
            Issue::OrphanedFile => write!(
                f,
                "no longer generated but modified locally; left in place"
            ),
            Issue::UnreconciledFirstRun => write!(
                f,
                "differs from generated content and no baseline exists; \
                 add a resolution (accept-generated or keep-current)"
            ),
            Issue::UnresolvedMarkers => {
                write!(f, "still contains conflict markers from an earlier run")
            }
            Issue::SnapshotCorrupt { message } => {
                write!(f, "baseline snapshot ignored: {}", message)
            }
            Issue::FrozenByFailure { instance } => {
                write!(f, "left untouched because '{}' did not build", instance)
            }
            Issue::FormatterFailed { message } => {
                write!(f, "formatter failed, kept unformatted result: {}", message)
            }
        }
    }
}

/// Outcome for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: String,
    pub status: FileStatus,
    pub issues: Vec<Issue>,
}

impl FileReport {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
            issues: Vec::new(),
        }
    }

    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    pub fn has_issue(&self, predicate: impl Fn(&Issue) -> bool) -> bool {
        self.issues.iter().any(predicate)
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>11}  {}", self.status.to_string(), self.path)?;
        for issue in &self.issues {
            write!(f, "\n             {}", issue)?;
        }
        Ok(())
    }
}

/// Build status of a generator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Built,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceReport {
    pub identity: String,
    pub status: InstanceStatus,
}

/// Worst outcome observed in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Outcome {
    Clean,
    Conflicts,
    Failed,
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Clean => 0,
            Outcome::Conflicts => 1,
            Outcome::Failed => 2,
        }
    }
}

/// Everything a run produced besides the files themselves
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One entry per considered path, sorted by path.
    pub files: Vec<FileReport>,
    /// Instances in execution order.
    pub instances: Vec<InstanceReport>,
    pub failures: Vec<BuildFailure>,
    /// Issues not tied to a single path.
    pub warnings: Vec<Issue>,
    /// False for dry runs.
    pub committed: bool,
}

impl RunReport {
    pub fn file(&self, path: &str) -> Option<&FileReport> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn status_of(&self, path: &str) -> Option<FileStatus> {
        self.file(path).map(|f| f.status)
    }

    pub fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }

    /// Paths that need a human.
    pub fn conflicted_paths(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Conflicted)
            .map(|f| f.path.as_str())
            .collect()
    }

    pub fn outcome(&self) -> Outcome {
        if !self.failures.is_empty() {
            Outcome::Failed
        } else if self.files.iter().any(|f| f.status == FileStatus::Conflicted) {
            Outcome::Conflicts
        } else {
            Outcome::Clean
        }
    }

    /// Turn build failures into `Error::BuildFailed`.
    pub fn ensure_success(&self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(Error::BuildFailed {
                failures: self.failures.clone(),
            })
        }
    }

    /// One-line count of paths per status.
    pub fn summary(&self) -> String {
        let statuses = [
            FileStatus::New,
            FileStatus::Clean,
            FileStatus::AutoMerged,
            FileStatus::Conflicted,
            FileStatus::Deleted,
            FileStatus::Unchanged,
        ];
        let parts: Vec<String> = statuses
            .iter()
            .map(|s| (s, self.count(*s)))
            .filter(|(_, n)| *n > 0)
            .map(|(s, n)| format!("{} {}", n, s))
            .collect();
        if parts.is_empty() {
            "no files".to_string()
        } else {
            parts.join(", ")
        }
    }
}
