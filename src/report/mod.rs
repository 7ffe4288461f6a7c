//! Listing output for the command line: plain tables or JSON.

pub mod json;
pub mod table;

use serde::Serialize;

use crate::store::BackupStore;

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    pub id: String,
    pub tags: Vec<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagRow {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Ids for `list`, newest first. With a tag, only its members that still exist.
pub fn listed_ids(store: &BackupStore, tag: Option<&str>) -> Vec<String> {
    match tag {
        Some(tag) => {
            let mut members = store.existing_members_of(tag);
            members.reverse();
            members
        }
        None => store.list_snapshots(),
    }
}

pub fn snapshot_rows(store: &BackupStore, ids: &[String]) -> Vec<SnapshotRow> {
    ids.iter()
        .map(|id| {
            let meta = store.read_meta(id);
            SnapshotRow {
                id: id.clone(),
                tags: meta.tags.into_iter().collect(),
                note: meta.note,
            }
        })
        .collect()
}

pub fn tag_rows(store: &BackupStore, counts: bool) -> Vec<TagRow> {
    store
        .list_tags()
        .into_iter()
        .map(|name| {
            let count = counts.then(|| store.count_of(&name));
            TagRow { name, count }
        })
        .collect()
}
