//! Phase 5: Writing to Disk
//!
//! This is the final phase of the gensync execution pipeline. Its main
//! responsibility is to commit what Phase 4 staged, and only that.
//!
//! ## Process
//!
//! 0.  **Preflight**: The cancellation token is checked one last time, and
//!     every write target is checked against the disk and against the other
//!     staged paths. A target that could not be replaced by a file fails the
//!     run here, before anything is touched. Past this point the commit is not
//!     interruptible.
//!
//! 1.  **Write Files**: Every staged file is written through a temporary file
//!     in the target directory and renamed into place, creating parent
//!     directories as needed. A reader never observes a half-written file.
//!
//! 2.  **Delete Files**: Retired files that still matched their baseline are
//!     removed. A file that has already disappeared is not an error.
//!
//! 3.  **Save Snapshot**: The new baseline is saved last, so an interrupted
//!     commit leaves the previous baseline in place and the next run
//!     reconciles against it again.

use std::path::Path;

use log::{debug, info};

use super::reconcile::Reconciliation;
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::filesystem::{check_writable, remove_if_exists, write_atomic};
use crate::snapshot::SnapshotStore;

/// What a commit changed on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Commit {
    pub written: usize,
    pub deleted: usize,
}

/// Execute Phase 5: commit staged writes and deletions, then the snapshot
pub fn execute(
    reconciliation: &Reconciliation,
    root: &Path,
    store: &SnapshotStore,
    cancel: &CancellationToken,
) -> Result<Commit> {
    cancel.check()?;
    preflight(reconciliation, root)?;

    let mut commit = Commit::default();

    for (relative_path, file) in reconciliation.staged.files() {
        let full_path = root.join(relative_path);
        debug!("Writing {}", full_path.display());
        write_atomic(&full_path, &file.content)?;
        commit.written += 1;
    }

    for relative_path in &reconciliation.deletes {
        debug!("Deleting {}", relative_path);
        remove_if_exists(root, relative_path)?;
        commit.deleted += 1;
    }

    store.save(&reconciliation.snapshot)?;

    info!(
        "Committed {} write(s) and {} deletion(s)",
        commit.written, commit.deleted
    );
    Ok(commit)
}

/// Reject staged writes that would fail halfway through the commit.
fn preflight(reconciliation: &Reconciliation, root: &Path) -> Result<()> {
    for relative_path in reconciliation.staged.list_files() {
        for ancestor in Path::new(&relative_path).ancestors().skip(1) {
            let ancestor = ancestor.to_string_lossy();
            if !ancestor.is_empty() && reconciliation.staged.exists(&ancestor) {
                return Err(Error::Filesystem {
                    message: format!(
                        "Cannot write both '{}' and '{}': one is a directory of the other",
                        ancestor, relative_path
                    ),
                });
            }
        }
        check_writable(root, &relative_path)?;
    }
    Ok(())
}
