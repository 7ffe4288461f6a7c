//! Tag index.
//!
//! Each tag is a JSON file under `tags/` holding the sorted ids of the
//! snapshots that carry it. Snapshot metadata mirrors the same membership;
//! every operation here that changes membership rewrites both.
//!
//! Membership is always re-read from disk right before it is rewritten.
//! A tag emptied by [`TagIndex::remove_member`] is deleted, unless the
//! caller asks to keep it.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;

use super::{meta, validate_tag_name, Layout};
use crate::error::{BackupError, IoContext, Result};
use crate::fsutil;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyTag {
    Delete,
    Keep,
}

pub struct TagIndex<'a> {
    layout: &'a Layout,
}

impl<'a> TagIndex<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        TagIndex { layout }
    }

    pub fn exists(&self, tag: &str) -> bool {
        validate_tag_name(tag).is_ok() && self.layout.tag_file(tag).is_file()
    }

    /// Sorted member ids. Unknown tags have no members.
    pub fn members_of(&self, tag: &str) -> Result<Vec<String>> {
        Ok(self.read_members(tag)?.into_iter().collect())
    }

    /// Like [`members_of`](Self::members_of), without ids whose snapshot
    /// directory is gone.
    pub fn existing_members_of(&self, tag: &str) -> Result<Vec<String>> {
        Ok(self
            .read_members(tag)?
            .into_iter()
            .filter(|id| self.layout.snapshot_dir(id).is_dir())
            .collect())
    }

    pub fn count_of(&self, tag: &str) -> Result<usize> {
        Ok(self.read_members(tag)?.len())
    }

    pub fn list_tags(&self) -> Result<Vec<String>> {
        let tags_dir = self.layout.tags_dir();
        let entries = match fs::read_dir(&tags_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(BackupError::io(
                    format!("failed to read {}", tags_dir.display()),
                    e,
                ))
            }
        };

        let mut tags: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                let tag = name.strip_suffix(".json")?;
                (validate_tag_name(tag).is_ok()).then(|| tag.to_string())
            })
            .collect();

        tags.sort();
        Ok(tags)
    }

    /// Creates an empty tag.
    pub fn create(&self, tag: &str) -> Result<()> {
        validate_tag_name(tag)?;
        if self.exists(tag) {
            return Err(BackupError::AlreadyExists(format!("Tag '{tag}' already exists")));
        }
        self.write_members(tag, &BTreeSet::new())
    }

    /// Adds `id` to `tag`, creating the tag when needed.
    pub fn add_member(&self, tag: &str, id: &str) -> Result<()> {
        validate_tag_name(tag)?;
        let mut members = self.read_members(tag)?;
        members.insert(id.to_string());
        self.write_members(tag, &members)
    }

    /// Removes `id` from `tag`. Returns whether it was a member.
    ///
    /// Ids whose snapshot directory is gone are dropped in the same rewrite.
    pub fn remove_member(&self, tag: &str, id: &str, empty: EmptyTag) -> Result<bool> {
        if !self.exists(tag) {
            return Ok(false);
        }

        let mut members = self.read_members(tag)?;
        let was_member = members.remove(id);
        self.retain_existing(&mut members);

        if members.is_empty() && empty == EmptyTag::Delete {
            self.remove_file(tag)?;
        } else {
            self.write_members(tag, &members)?;
        }

        Ok(was_member)
    }

    /// Renames `old` to `new`. Returns the number of snapshots whose metadata was rewritten.
    pub fn rename(&self, old: &str, new: &str) -> Result<usize> {
        if old == new {
            return Err(BackupError::InvalidArgument(
                "New tag name is the same as old name".to_string(),
            ));
        }
        validate_tag_name(new)?;

        if !self.exists(old) {
            return Err(BackupError::NotFound(format!("Tag '{old}' does not exist")));
        }
        if self.exists(new) {
            return Err(BackupError::AlreadyExists(format!("Tag '{new}' already exists")));
        }

        let members = self.read_members(old)?;

        let old_file = self.layout.tag_file(old);
        let new_file = self.layout.tag_file(new);
        fs::rename(&old_file, &new_file)
            .context(|| format!("failed to rename {}", old_file.display()))?;

        let mut updated = 0;
        for id in &members {
            let dir = self.layout.snapshot_dir(id);
            if !dir.is_dir() {
                continue;
            }

            let mut record = meta::read(&dir);
            record.tags.remove(old);
            record.tags.insert(new.to_string());
            meta::write(&dir, record.tags, record.note.as_deref())?;
            updated += 1;
        }

        Ok(updated)
    }

    /// Deletes `tag` and strips it from its members' metadata.
    /// Returns the number of snapshots whose metadata changed.
    pub fn delete(&self, tag: &str) -> Result<usize> {
        if !self.exists(tag) {
            return Err(BackupError::NotFound(format!("Tag '{tag}' does not exist")));
        }

        let members = self.read_members(tag)?;

        let mut updated = 0;
        for id in &members {
            let dir = self.layout.snapshot_dir(id);
            if !dir.is_dir() {
                continue;
            }

            let mut record = meta::read(&dir);
            if record.tags.remove(tag) {
                meta::write(&dir, record.tags, record.note.as_deref())?;
                updated += 1;
            }
        }

        self.remove_file(tag)?;
        Ok(updated)
    }

    /// Moves every member of `source` into `target` and deletes `source`.
    /// `target` is created when it does not exist.
    /// Returns the number of snapshots whose metadata was rewritten.
    pub fn merge(&self, source: &str, target: &str) -> Result<usize> {
        if source == target {
            return Err(BackupError::InvalidArgument(
                "Cannot merge tag into itself".to_string(),
            ));
        }
        validate_tag_name(target)?;

        if !self.exists(source) {
            return Err(BackupError::NotFound(format!(
                "Source tag '{source}' does not exist"
            )));
        }

        let mut members = self.read_members(source)?;
        members.extend(self.read_members(target)?);
        self.retain_existing(&mut members);

        self.write_members(target, &members)?;

        let mut updated = 0;
        for id in &members {
            let dir = self.layout.snapshot_dir(id);
            let mut record = meta::read(&dir);
            record.tags.remove(source);
            record.tags.insert(target.to_string());
            meta::write(&dir, record.tags, record.note.as_deref())?;
            updated += 1;
        }

        self.remove_file(source)?;
        Ok(updated)
    }

    fn read_members(&self, tag: &str) -> Result<BTreeSet<String>> {
        if validate_tag_name(tag).is_err() {
            return Ok(BTreeSet::new());
        }

        let path = self.layout.tag_file(tag);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => {
                return Err(BackupError::io(
                    format!("failed to read {}", path.display()),
                    e,
                ))
            }
        };

        let members: Vec<String> = serde_json::from_str(&content)?;
        Ok(members.into_iter().collect())
    }

    fn write_members(&self, tag: &str, members: &BTreeSet<String>) -> Result<()> {
        let tags_dir = self.layout.tags_dir();
        fs::create_dir_all(&tags_dir)
            .context(|| format!("failed to create {}", tags_dir.display()))?;

        fsutil::write_json_atomic(&self.layout.tag_file(tag), members)
    }

    fn remove_file(&self, tag: &str) -> Result<()> {
        let path = self.layout.tag_file(tag);
        fs::remove_file(&path).context(|| format!("failed to remove {}", path.display()))
    }

    fn retain_existing(&self, members: &mut BTreeSet<String>) {
        members.retain(|id| self.layout.snapshot_dir(id).is_dir());
    }
}
