//! Per-snapshot metadata side-file (`.hades-meta.json`).

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::META_FILE;
use crate::error::Result;
use crate::fsutil;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub created_at: String,
    /// Serialized as a sorted, deduplicated array.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Metadata {
    pub fn empty(id: &str) -> Self {
        Metadata {
            created_at: id.to_string(),
            tags: BTreeSet::new(),
            note: None,
        }
    }
}

fn snapshot_id(snapshot_dir: &Path) -> String {
    snapshot_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Overwrites the side-file of `snapshot_dir`. `created_at` is always the snapshot id.
pub fn write<I, S>(snapshot_dir: &Path, tags: I, note: Option<&str>) -> Result<Metadata>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let meta = Metadata {
        created_at: snapshot_id(snapshot_dir),
        tags: tags.into_iter().map(Into::into).collect(),
        note: note.map(str::to_string),
    };

    fsutil::write_json_atomic(&snapshot_dir.join(META_FILE), &meta)?;
    Ok(meta)
}

/// Reads the side-file, falling back to an empty record when it is missing or malformed.
pub fn read(snapshot_dir: &Path) -> Metadata {
    let id = snapshot_id(snapshot_dir);

    let Ok(content) = fs::read_to_string(snapshot_dir.join(META_FILE)) else {
        return Metadata::empty(&id);
    };

    match serde_json::from_str::<Metadata>(&content) {
        Ok(mut meta) => {
            if meta.created_at.is_empty() {
                meta.created_at = id;
            }
            meta
        }
        Err(e) => {
            log::debug!("ignoring malformed {}: {e}", snapshot_dir.join(META_FILE).display());
            Metadata::empty(&id)
        }
    }
}
