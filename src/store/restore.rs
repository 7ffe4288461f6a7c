//! Restore engine.
//!
//! Swaps the live save directory for a snapshot's contents:
//! 1. remove a stale staging directory left by an interrupted restore
//! 2. rename the live directory to the staging path
//! 3. copy the snapshot into the vacant live path
//! 4. remove the staging directory
//!
//! Staging is only removed after step 3 succeeds. When the copy fails the
//! partial live directory is discarded and staging is renamed back; if that
//! rollback fails too, staging is left in place and named in the error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::snapshot::assert_source_available;
use super::tags::TagIndex;
use super::{Layout, META_FILE};
use crate::error::{BackupError, Result};
use crate::fsutil;

#[derive(Debug, Clone)]
pub struct Restored {
    pub id: String,
    /// Set when the old live data could not be removed after a successful copy.
    pub leftover_staging: Option<PathBuf>,
}

pub fn restore(layout: &Layout, id: &str) -> Result<Restored> {
    restore_with(layout, id, copy_payload)
}

/// Restores the most recent snapshot carrying `tag`. Ids whose snapshot
/// directory is gone are skipped.
pub fn restore_by_tag(layout: &Layout, tag: &str) -> Result<Restored> {
    let members = TagIndex::new(layout).existing_members_of(tag)?;
    let Some(latest) = latest_member(&members) else {
        return Err(BackupError::NotFound(format!("No snapshots for tag '{tag}'")));
    };
    restore(layout, latest)
}

/// The member whose id sorts highest, which is the newest snapshot.
pub fn latest_member(members: &[String]) -> Option<&str> {
    members.iter().max().map(String::as_str)
}

/// The metadata side-file stays with the snapshot.
fn copy_payload(src: &Path, dst: &Path) -> Result<()> {
    fsutil::copy_dir(src, dst, |relative| relative == Path::new(META_FILE))
}

/// [`restore`] with the copy step supplied by the caller.
pub fn restore_with<F>(layout: &Layout, id: &str, copy: F) -> Result<Restored>
where
    F: FnOnce(&Path, &Path) -> Result<()>,
{
    assert_source_available(layout)?;
    let snapshot = layout.resolve_snapshot(id)?;

    let live = layout.save_dir();
    let staging = layout.staging_dir();

    if staging.exists() {
        remove_path(&staging).map_err(|e| {
            BackupError::io(format!("failed to clear stale {}", staging.display()), e)
        })?;
    }

    if let Err(e) = fs::rename(live, &staging) {
        return Err(if e.kind() == ErrorKind::NotFound {
            BackupError::SourceUnavailable(live.to_path_buf())
        } else {
            BackupError::io(format!("failed to move {} aside", live.display()), e)
        });
    }

    if let Err(e) = copy(&snapshot, live) {
        return Err(roll_back(live, &staging, e));
    }

    let leftover_staging = match fs::remove_dir_all(&staging) {
        Ok(()) => None,
        Err(e) => {
            log::warn!("could not remove {}: {e}", staging.display());
            Some(staging)
        }
    };

    Ok(Restored {
        id: id.to_string(),
        leftover_staging,
    })
}

fn roll_back(live: &Path, staging: &Path, cause: BackupError) -> BackupError {
    let rolled_back = (|| -> std::io::Result<()> {
        if live.exists() {
            remove_path(live)?;
        }
        fs::rename(staging, live)
    })();

    let note = match rolled_back {
        Ok(()) => "original save data put back".to_string(),
        Err(e) => format!(
            "original save data kept at {} (rollback failed: {e})",
            staging.display()
        ),
    };

    match cause {
        BackupError::Io { context, source } => BackupError::Io {
            context: format!("{context}; {note}"),
            source,
        },
        other => BackupError::io(
            format!("copy failed; {note}"),
            std::io::Error::other(other.to_string()),
        ),
    }
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
