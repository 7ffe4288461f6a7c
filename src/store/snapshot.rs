use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;

use chrono::{Local, NaiveDateTime};

use super::tags::{EmptyTag, TagIndex};
use super::{meta, validate_tag_name, Layout, RESERVED_NAMES};
use crate::error::{BackupError, IoContext, Result};
use crate::fsutil;
use meta::Metadata;

/// Sorts lexically in creation order.
pub const ID_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Separates the timestamp from the sanitized note in a snapshot id.
pub const NOTE_DELIMITER: char = '_';

#[derive(Debug, Clone)]
pub struct Created {
    pub id: String,
    pub tags: Vec<String>,
    pub note: Option<String>,
}

impl Created {
    pub fn summary(&self) -> String {
        let mut summary = format!("Created snapshot {}", self.id);
        if !self.tags.is_empty() {
            summary.push_str(&format!(" with tags [{}]", self.tags.join(", ")));
        }
        if let Some(note) = &self.note {
            summary.push_str(&format!(" (note: {note})"));
        }
        summary
    }
}

#[derive(Debug, Clone)]
pub struct Deleted {
    pub id: String,
    /// Tags the snapshot was removed from.
    pub tags: Vec<String>,
    /// Stale or unreadable tag references that were skipped.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub id: String,
    pub metadata: Metadata,
    pub size_bytes: u64,
}

pub fn assert_source_available(layout: &Layout) -> Result<()> {
    if layout.save_dir().is_dir() {
        Ok(())
    } else {
        Err(BackupError::SourceUnavailable(layout.save_dir().to_path_buf()))
    }
}

/// Keeps alphanumerics, space, hyphen, underscore and period, then trims trailing whitespace.
pub fn sanitize_note(note: &str) -> String {
    let kept: String = note
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect();
    kept.trim_end().to_string()
}

pub fn generate_id(note: Option<&str>) -> String {
    generate_id_at(Local::now().naive_local(), note)
}

pub fn generate_id_at(time: NaiveDateTime, note: Option<&str>) -> String {
    let timestamp = time.format(ID_FORMAT).to_string();

    match note.map(sanitize_note) {
        Some(clean) if !clean.is_empty() => format!("{timestamp}{NOTE_DELIMITER}{clean}"),
        _ => timestamp,
    }
}

/// Copies the live save directory into a new snapshot and registers its tags.
pub fn create(layout: &Layout, tags: &[String], note: Option<&str>) -> Result<Created> {
    assert_source_available(layout)?;
    create_named(layout, &generate_id(note), tags, note)
}

/// Same as [`create`] with a caller-chosen id.
///
/// On failure nothing stays registered and the partial copy is removed.
pub fn create_named(
    layout: &Layout,
    id: &str,
    tags: &[String],
    note: Option<&str>,
) -> Result<Created> {
    assert_source_available(layout)?;

    let tags: BTreeSet<&str> = tags.iter().map(String::as_str).collect();
    for tag in &tags {
        validate_tag_name(tag)?;
    }
    let note = note.filter(|n| !n.trim().is_empty());

    let root = layout.root();
    fs::create_dir_all(root).context(|| format!("failed to create {}", root.display()))?;

    let dest = layout.snapshot_dir(id);
    if dest.exists() {
        return Err(BackupError::AlreadyExists(format!("Snapshot '{id}' already exists")));
    }

    let result = (|| -> Result<()> {
        fsutil::copy_dir(layout.save_dir(), &dest, |_| false)?;
        meta::write(&dest, tags.iter().copied(), note)?;

        let index = TagIndex::new(layout);
        let mut registered = Vec::new();
        for tag in &tags {
            let existed = index.exists(tag);
            if let Err(e) = index.add_member(tag, id) {
                unregister(&index, id, &registered);
                return Err(e);
            }
            registered.push((*tag, existed));
        }
        Ok(())
    })();

    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_dir_all(&dest) {
            log::warn!("left partial snapshot {}: {cleanup}", dest.display());
        }
        return Err(e);
    }

    Ok(Created {
        id: id.to_string(),
        tags: tags.into_iter().map(str::to_string).collect(),
        note: note.map(str::to_string),
    })
}

fn unregister(index: &TagIndex<'_>, id: &str, registered: &[(&str, bool)]) {
    for (tag, existed) in registered {
        let empty = if *existed { EmptyTag::Keep } else { EmptyTag::Delete };
        if let Err(e) = index.remove_member(tag, id, empty) {
            log::warn!("failed to unregister {id} from '{tag}': {e}");
        }
    }
}

/// Snapshot ids, newest first.
pub fn list(layout: &Layout) -> Result<Vec<String>> {
    let root = layout.root();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BackupError::io(format!("failed to read {}", root.display()), e)),
    };

    let mut ids: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.') && !RESERVED_NAMES.contains(&name.as_str()))
        .collect();

    ids.sort_by(|a, b| b.cmp(a));
    Ok(ids)
}

/// Removes the snapshot from every tag that lists it, then deletes its directory.
pub fn delete(layout: &Layout, id: &str) -> Result<Deleted> {
    let dir = layout.resolve_snapshot(id)?;
    let record = meta::read(&dir);
    let index = TagIndex::new(layout);

    let mut candidates: BTreeSet<String> = record.tags.clone();
    let mut warnings = Vec::new();
    match index.list_tags() {
        Ok(all) => {
            for tag in all {
                match index.members_of(&tag) {
                    Ok(members) if members.iter().any(|m| m == id) => {
                        candidates.insert(tag);
                    }
                    Ok(_) => {}
                    Err(e) => warnings.push(format!("skipped tag '{tag}': {e}")),
                }
            }
        }
        Err(e) => warnings.push(format!("could not scan tags: {e}")),
    }

    let mut removed = Vec::new();
    for tag in candidates {
        match index.remove_member(&tag, id, EmptyTag::Delete) {
            Ok(true) => removed.push(tag),
            Ok(false) => {}
            Err(e) => warnings.push(format!("skipped tag '{tag}': {e}")),
        }
    }

    if !record.tags.is_empty() {
        meta::write(&dir, Vec::<String>::new(), record.note.as_deref())?;
    }

    fs::remove_dir_all(&dir).context(|| format!("failed to remove {}", dir.display()))?;

    Ok(Deleted {
        id: id.to_string(),
        tags: removed,
        warnings,
    })
}

pub fn info(layout: &Layout, id: &str) -> Result<SnapshotInfo> {
    let dir = layout.resolve_snapshot(id)?;
    Ok(SnapshotInfo {
        id: id.to_string(),
        metadata: meta::read(&dir),
        size_bytes: fsutil::dir_size(&dir),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::META_FILE;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn layout() -> (TempDir, Layout) {
        let dir = TempDir::new().unwrap();
        let save = dir.path().join("Hades");
        fs::create_dir_all(&save).unwrap();
        fs::write(save.join("Profile1.sav"), "X").unwrap();
        let layout = Layout::new(save, dir.path().join("backups"));
        (dir, layout)
    }

    fn time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(9, 3, 7)
            .unwrap()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn id_is_zero_padded_timestamp() {
        assert_eq!(generate_id_at(time(), None), "2024-01-05T09-03-07");
    }

    #[test]
    fn id_appends_sanitized_note() {
        assert_eq!(
            generate_id_at(time(), Some("beat Meg! (heat 4)  ")),
            "2024-01-05T09-03-07_beat Meg heat 4"
        );
        assert_eq!(
            generate_id_at(time(), Some("v1.2_run-3")),
            "2024-01-05T09-03-07_v1.2_run-3"
        );
    }

    #[test]
    fn id_ignores_note_that_sanitizes_to_nothing() {
        assert_eq!(generate_id_at(time(), Some("!!/??")), "2024-01-05T09-03-07");
        assert_eq!(generate_id_at(time(), Some("   ")), "2024-01-05T09-03-07");
    }

    #[test]
    fn sanitize_strips_path_characters() {
        assert_eq!(sanitize_note("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_note("a/b\\c:d"), "abcd");
    }

    #[test]
    fn create_without_tags_copies_contents() {
        let (_dir, layout) = layout();

        let created = create(&layout, &[], Some("checkpoint")).unwrap();

        let snap = layout.snapshot_dir(&created.id);
        assert_eq!(fs::read_to_string(snap.join("Profile1.sav")).unwrap(), "X");
        assert!(created.id.ends_with("_checkpoint"));
        assert_eq!(list(&layout).unwrap(), vec![created.id.clone()]);
        assert!(TagIndex::new(&layout).list_tags().unwrap().is_empty());

        let record = meta::read(&snap);
        assert!(record.tags.is_empty());
        assert_eq!(record.note.as_deref(), Some("checkpoint"));
        assert_eq!(record.created_at, created.id);
    }

    #[test]
    fn create_registers_deduplicated_tags() {
        let (_dir, layout) = layout();

        let created = create_named(&layout, "s1", &strings(&["boss", "act1", "boss"]), None).unwrap();
        assert_eq!(created.tags, vec!["act1", "boss"]);

        let index = TagIndex::new(&layout);
        assert_eq!(index.members_of("boss").unwrap(), vec!["s1"]);
        assert_eq!(index.members_of("act1").unwrap(), vec!["s1"]);
        assert_eq!(
            meta::read(&layout.snapshot_dir("s1")).tags.into_iter().collect::<Vec<_>>(),
            vec!["act1", "boss"]
        );
    }

    #[test]
    fn create_fails_without_source() {
        let (_dir, layout) = layout();
        fs::remove_dir_all(layout.save_dir()).unwrap();

        let err = create(&layout, &strings(&["boss"]), None).unwrap_err();
        assert!(matches!(err, BackupError::SourceUnavailable(_)));
        assert!(list(&layout).unwrap().is_empty());
        assert!(TagIndex::new(&layout).list_tags().unwrap().is_empty());
    }

    #[test]
    fn create_rejects_invalid_tag_before_copying() {
        let (_dir, layout) = layout();

        let err = create_named(&layout, "s1", &strings(&["ok", "bad/tag"]), None).unwrap_err();
        assert!(matches!(err, BackupError::InvalidArgument(_)));
        assert!(!layout.snapshot_dir("s1").exists());
        assert!(TagIndex::new(&layout).list_tags().unwrap().is_empty());
    }

    #[test]
    fn create_refuses_existing_id() {
        let (_dir, layout) = layout();
        create_named(&layout, "s1", &[], None).unwrap();

        let err = create_named(&layout, "s1", &strings(&["boss"]), None).unwrap_err();
        assert!(matches!(err, BackupError::AlreadyExists(_)));
        // the original snapshot is untouched
        assert!(layout.snapshot_dir("s1").join("Profile1.sav").exists());
        assert!(TagIndex::new(&layout).members_of("boss").unwrap().is_empty());
    }

    #[test]
    fn failed_tag_registration_rolls_back() {
        let (_dir, layout) = layout();
        let index = TagIndex::new(&layout);
        index.create("existing").unwrap();
        // an unreadable tag file makes registration fail for "zzz"
        fs::write(layout.tag_file("zzz"), "not json").unwrap();

        let err = create_named(&layout, "s1", &strings(&["existing", "fresh", "zzz"]), None).unwrap_err();
        assert!(matches!(err, BackupError::Json(_)));

        assert!(!layout.snapshot_dir("s1").exists());
        assert!(index.exists("existing"));
        assert_eq!(index.count_of("existing").unwrap(), 0);
        assert!(!index.exists("fresh"));
    }

    #[test]
    fn list_is_newest_first_and_skips_reserved_names() {
        let (_dir, layout) = layout();
        for id in ["2024-01-01T00-00-00", "2024-03-01T00-00-00", "2024-02-01T00-00-00_note"] {
            fs::create_dir_all(layout.snapshot_dir(id)).unwrap();
        }
        fs::create_dir_all(layout.tags_dir()).unwrap();
        fs::write(layout.state_file(), "{}").unwrap();
        fs::write(layout.log_file(), "").unwrap();

        assert_eq!(
            list(&layout).unwrap(),
            vec!["2024-03-01T00-00-00", "2024-02-01T00-00-00_note", "2024-01-01T00-00-00"]
        );
    }

    #[test]
    fn list_of_missing_root_is_empty() {
        let (_dir, layout) = layout();
        assert!(list(&layout).unwrap().is_empty());
    }

    #[test]
    fn delete_cleans_up_tags() {
        let (_dir, layout) = layout();
        create_named(&layout, "s1", &strings(&["a", "b"]), None).unwrap();
        create_named(&layout, "s2", &strings(&["b"]), None).unwrap();

        let deleted = delete(&layout, "s1").unwrap();
        assert_eq!(deleted.tags, vec!["a", "b"]);
        assert!(deleted.warnings.is_empty());

        let index = TagIndex::new(&layout);
        assert!(!index.exists("a"));
        assert_eq!(index.members_of("b").unwrap(), vec!["s2"]);
        assert!(!layout.snapshot_dir("s1").exists());
    }

    #[test]
    fn delete_finds_tags_missing_from_metadata() {
        let (_dir, layout) = layout();
        create_named(&layout, "s1", &[], None).unwrap();
        create_named(&layout, "s2", &strings(&["a"]), None).unwrap();
        TagIndex::new(&layout).add_member("a", "s1").unwrap();

        let deleted = delete(&layout, "s1").unwrap();
        assert_eq!(deleted.tags, vec!["a"]);
        assert_eq!(TagIndex::new(&layout).members_of("a").unwrap(), vec!["s2"]);
    }

    #[test]
    fn delete_tolerates_stale_tag_references() {
        let (_dir, layout) = layout();
        create_named(&layout, "s1", &strings(&["a"]), None).unwrap();
        // metadata claims a tag whose index file is gone
        meta::write(&layout.snapshot_dir("s1"), ["a", "ghost"], None).unwrap();

        let deleted = delete(&layout, "s1").unwrap();
        assert_eq!(deleted.tags, vec!["a"]);
    }

    #[test]
    fn delete_missing_snapshot_is_not_found() {
        let (_dir, layout) = layout();
        assert!(matches!(delete(&layout, "nope"), Err(BackupError::NotFound(_))));
        assert!(matches!(delete(&layout, "tags"), Err(BackupError::NotFound(_))));
    }

    #[test]
    fn info_reports_size_and_metadata() {
        let (_dir, layout) = layout();
        create_named(&layout, "s1", &strings(&["boss"]), Some("hi")).unwrap();

        let info = info(&layout, "s1").unwrap();
        let meta_len = fs::metadata(layout.snapshot_dir("s1").join(META_FILE)).unwrap().len();
        assert_eq!(info.size_bytes, 1 + meta_len);
        assert_eq!(info.metadata.note.as_deref(), Some("hi"));
        assert!(info.metadata.tags.contains("boss"));
    }
}
