//! Snapshot and tag storage.
//!
//! Layout under the backup root:
//! - `<id>/` one directory per snapshot, a full copy of the save directory
//! - `<id>/.hades-meta.json` created_at, tags and note for that snapshot
//! - `tags/<tag>.json` sorted list of snapshot ids carrying the tag
//! - `config.json`, `hades.log` process-wide state, never listed as snapshots
//!
//! Engine functions return [`Result`]. [`BackupStore`] wraps them for callers
//! that only want a success flag and a message, and logs every mutation.

pub mod meta;
pub mod restore;
pub mod snapshot;
pub mod tags;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::activity::Logger;
use crate::error::{BackupError, Result};
use meta::Metadata;
use snapshot::SnapshotInfo;
use tags::TagIndex;

pub const TAGS_DIR: &str = "tags";
/// Dot-prefixed so it cannot collide with a file from the save directory.
pub const META_FILE: &str = ".hades-meta.json";
pub const STATE_FILE: &str = "config.json";
pub const LOG_FILE: &str = "hades.log";

/// Names under the backup root that are not snapshots.
pub const RESERVED_NAMES: &[&str] = &[TAGS_DIR, STATE_FILE, LOG_FILE];

/// Where the live save data and the backups live.
#[derive(Debug, Clone)]
pub struct Layout {
    save_dir: PathBuf,
    root: PathBuf,
}

impl Layout {
    pub fn new(save_dir: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Layout {
            save_dir: save_dir.into(),
            root: root.into(),
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tags_dir(&self) -> PathBuf {
        self.root.join(TAGS_DIR)
    }

    pub fn tag_file(&self, tag: &str) -> PathBuf {
        self.tags_dir().join(format!("{tag}.json"))
    }

    pub fn snapshot_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    /// Holds the previous live save data while a restore is in progress.
    /// Sibling of the save directory with `.tmp` appended to its name.
    pub fn staging_dir(&self) -> PathBuf {
        let mut name = self
            .save_dir
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.save_dir.with_file_name(name)
    }

    /// Returns the directory of an existing snapshot.
    pub fn resolve_snapshot(&self, id: &str) -> Result<PathBuf> {
        if !is_plain_name(id) || RESERVED_NAMES.contains(&id) {
            return Err(BackupError::NotFound(format!("Snapshot '{id}' does not exist")));
        }

        let dir = self.snapshot_dir(id);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(BackupError::NotFound(format!("Snapshot '{id}' does not exist")))
        }
    }
}

/// Tag names double as file names under `tags/`.
pub fn validate_tag_name(tag: &str) -> Result<()> {
    if tag.trim().is_empty() {
        return Err(BackupError::InvalidArgument("Tag name cannot be empty".to_string()));
    }

    if !is_plain_name(tag) {
        return Err(BackupError::InvalidArgument(format!(
            "Tag name '{tag}' must not contain path separators or start with '.'"
        )));
    }

    Ok(())
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

/// Result of a mutating operation as seen by the command line or a dashboard.
#[derive(Debug, Clone)]
pub struct Outcome<T = ()> {
    pub value: Option<T>,
    pub message: String,
}

impl<T> Outcome<T> {
    pub fn success(&self) -> bool {
        self.value.is_some()
    }

    pub fn into_parts(self) -> (bool, String) {
        (self.value.is_some(), self.message)
    }
}

/// Engine facade: every mutation returns an [`Outcome`] and is logged.
pub struct BackupStore {
    layout: Layout,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl BackupStore {
    pub fn new(layout: Layout, logger: Arc<dyn Logger + Send + Sync>) -> Self {
        BackupStore { layout, logger }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn tags(&self) -> TagIndex<'_> {
        TagIndex::new(&self.layout)
    }

    /// Snapshot ids, newest first. Empty when the backup root is unreadable.
    pub fn list_snapshots(&self) -> Vec<String> {
        snapshot::list(&self.layout).unwrap_or_else(|e| {
            self.logger.warning(&format!("Failed to list snapshots: {e}"));
            Vec::new()
        })
    }

    pub fn list_tags(&self) -> Vec<String> {
        self.tags().list_tags().unwrap_or_else(|e| {
            self.logger.warning(&format!("Failed to list tags: {e}"));
            Vec::new()
        })
    }

    pub fn members_of(&self, tag: &str) -> Vec<String> {
        self.tags().members_of(tag).unwrap_or_else(|e| {
            self.logger.warning(&format!("Failed to read tag '{tag}': {e}"));
            Vec::new()
        })
    }

    /// Members of `tag` that still have a snapshot directory.
    pub fn existing_members_of(&self, tag: &str) -> Vec<String> {
        self.tags().existing_members_of(tag).unwrap_or_else(|e| {
            self.logger.warning(&format!("Failed to read tag '{tag}': {e}"));
            Vec::new()
        })
    }

    pub fn count_of(&self, tag: &str) -> usize {
        self.members_of(tag).len()
    }

    pub fn read_meta(&self, id: &str) -> Metadata {
        meta::read(&self.layout.snapshot_dir(id))
    }

    pub fn info(&self, id: &str) -> Result<SnapshotInfo> {
        snapshot::info(&self.layout, id)
    }

    pub fn create(&self, tags: &[String], note: Option<&str>) -> Outcome<String> {
        let result = snapshot::create(&self.layout, tags, note);
        self.finish(result, "Failed to create snapshot", |created| {
            (created.summary(), created.id.clone())
        })
    }

    pub fn delete_snapshot(&self, id: &str) -> Outcome {
        let result = snapshot::delete(&self.layout, id);
        if let Ok(deleted) = &result {
            for warning in &deleted.warnings {
                self.logger.warning(warning);
            }
        }
        self.finish(result, "Failed to delete snapshot", |deleted| {
            (format!("Deleted snapshot {}", deleted.id), ())
        })
    }

    pub fn restore(&self, id: &str) -> Outcome {
        let result = restore::restore(&self.layout, id);
        self.finish_restore(result, "Failed to restore snapshot")
    }

    pub fn restore_by_tag(&self, tag: &str) -> Outcome {
        let result = restore::restore_by_tag(&self.layout, tag);
        self.finish_restore(result, "Failed to restore by tag")
    }

    pub fn create_tag(&self, tag: &str) -> Outcome {
        let result = self.tags().create(tag);
        self.finish(result, "Failed to create tag", |_| (format!("Created tag '{tag}'"), ()))
    }

    pub fn rename_tag(&self, old: &str, new: &str) -> Outcome<usize> {
        let result = self.tags().rename(old, new);
        self.finish(result, "Failed to rename tag", |count| {
            (
                format!("Renamed tag '{old}' to '{new}' (updated {count} snapshots)"),
                *count,
            )
        })
    }

    pub fn delete_tag(&self, tag: &str) -> Outcome<usize> {
        let result = self.tags().delete(tag);
        self.finish(result, "Failed to delete tag", |count| {
            (
                format!("Deleted tag '{tag}' (removed from {count} snapshots)"),
                *count,
            )
        })
    }

    pub fn merge_tags(&self, source: &str, target: &str) -> Outcome<usize> {
        let result = self.tags().merge(source, target);
        self.finish(result, "Failed to merge tags", |count| {
            (
                format!("Merged tag '{source}' into '{target}' (updated {count} snapshots)"),
                *count,
            )
        })
    }

    fn finish_restore(&self, result: Result<restore::Restored>, failure: &str) -> Outcome {
        if let Ok(restored) = &result {
            if let Some(staging) = &restored.leftover_staging {
                self.logger.warning(&format!(
                    "Restored {} but could not remove {}",
                    restored.id,
                    staging.display()
                ));
            }
        }
        self.finish(result, failure, |restored| {
            (format!("Restored snapshot {}", restored.id), ())
        })
    }

    fn finish<T, U, F>(&self, result: Result<T>, failure: &str, on_success: F) -> Outcome<U>
    where
        F: FnOnce(&T) -> (String, U),
    {
        match result {
            Ok(value) => {
                let (message, value) = on_success(&value);
                self.logger.success(&message);
                Outcome {
                    value: Some(value),
                    message,
                }
            }
            Err(e) => {
                let message = format!("{failure}: {e}");
                self.logger.error(&message);
                Outcome {
                    value: None,
                    message,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityLog, Level};
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, BackupStore, Arc<ActivityLog>) {
        let dir = TempDir::new().unwrap();
        let save = dir.path().join("Hades");
        fs::create_dir_all(&save).unwrap();
        fs::write(save.join("Profile1.sav"), "X").unwrap();

        let log = Arc::new(ActivityLog::in_memory());
        let store = BackupStore::new(Layout::new(&save, dir.path().join("backups")), log.clone());
        (dir, store, log)
    }

    #[test]
    fn staging_dir_is_sibling_with_tmp_suffix() {
        let layout = Layout::new("/games/Saved Games/Hades", "/backups");
        assert_eq!(layout.staging_dir(), PathBuf::from("/games/Saved Games/Hades.tmp"));
    }

    #[test]
    fn reserved_and_unsafe_ids_do_not_resolve() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path().join("save"), dir.path());
        fs::create_dir_all(layout.tags_dir()).unwrap();

        for id in ["tags", "../save", "", ".hidden", "a/b"] {
            assert!(matches!(layout.resolve_snapshot(id), Err(BackupError::NotFound(_))), "{id}");
        }
    }

    #[test]
    fn tag_name_validation() {
        assert!(validate_tag_name("boss").is_ok());
        assert!(validate_tag_name("Act 2 - Elysium").is_ok());
        for bad in ["", "   ", "a/b", "a\\b", ".hidden", ".."] {
            assert!(matches!(validate_tag_name(bad), Err(BackupError::InvalidArgument(_))), "{bad:?}");
        }
    }

    #[test]
    fn failures_become_outcomes_and_are_logged() {
        let (_dir, store, log) = fixture();

        let outcome = store.rename_tag("missing", "other");
        assert!(!outcome.success());
        assert_eq!(outcome.message, "Failed to rename tag: Tag 'missing' does not exist");

        let last = log.recent(1);
        assert_eq!(last[0].level, Level::Error);
        assert_eq!(last[0].message, outcome.message);
    }

    #[test]
    fn create_outcome_carries_id_and_summary() {
        let (_dir, store, log) = fixture();

        let outcome = store.create(&["boss".to_string()], Some("before Hades"));
        let id = outcome.value.clone().unwrap();
        assert!(outcome.message.starts_with(&format!("Created snapshot {id}")));
        assert!(id.ends_with("_before Hades"));
        assert_eq!(store.members_of("boss"), vec![id.clone()]);
        assert_eq!(store.count_of("boss"), 1);
        assert_eq!(log.recent(1)[0].level, Level::Success);

        let (ok, message) = store.delete_snapshot(&id).into_parts();
        assert!(ok, "{message}");
        assert!(store.list_snapshots().is_empty());
    }

    #[test]
    fn existing_members_leave_out_deleted_snapshots() {
        let (_dir, store, _log) = fixture();
        snapshot::create_named(store.layout(), "s1", &["boss".to_string()], None).unwrap();
        store.tags().add_member("boss", "s0").unwrap();

        assert_eq!(store.members_of("boss"), vec!["s0", "s1"]);
        assert_eq!(store.existing_members_of("boss"), vec!["s1"]);
    }

    #[test]
    fn queries_on_empty_root_are_empty() {
        let (_dir, store, _log) = fixture();
        assert!(store.list_snapshots().is_empty());
        assert!(store.list_tags().is_empty());
        assert!(store.members_of("anything").is_empty());
        assert_eq!(store.read_meta("nope").tags.len(), 0);
    }
}
