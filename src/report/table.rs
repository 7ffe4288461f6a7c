//! Plain text rendering for snapshot and tag listings.

use super::{SnapshotRow, TagRow};
use crate::store::snapshot::SnapshotInfo;
use crate::util::format_bytes;

pub fn render_snapshots(rows: &[SnapshotRow], with_meta: bool) -> String {
    if rows.is_empty() {
        return String::from("No snapshots found. Run 'hades-backup backup' to create one.\n");
    }

    let mut output = String::new();

    if !with_meta {
        for row in rows {
            output.push_str(&row.id);
            output.push('\n');
        }
        return output;
    }

    let width = rows.iter().map(|r| r.id.chars().count()).max().unwrap_or(0).min(48);

    output.push_str(&format!("{:width$}  {:24}  {}\n", "ID", "TAGS", "NOTE"));
    output.push_str(&"-".repeat(width + 34));
    output.push('\n');

    for row in rows {
        output.push_str(&format!(
            "{:width$}  {:24}  {}\n",
            truncate(&row.id, width),
            truncate(&row.tags.join(","), 24),
            row.note.as_deref().unwrap_or("")
        ));
    }

    output
}

pub fn render_tags(rows: &[TagRow]) -> String {
    if rows.is_empty() {
        return String::from("No tags found.\n");
    }

    let mut output = String::new();
    for row in rows {
        match row.count {
            Some(count) => output.push_str(&format!("{:30} {:>5}\n", truncate(&row.name, 30), count)),
            None => {
                output.push_str(&row.name);
                output.push('\n');
            }
        }
    }
    output
}

pub fn render_info(info: &SnapshotInfo) -> String {
    let tags: Vec<&str> = info.metadata.tags.iter().map(String::as_str).collect();

    let mut output = String::new();
    output.push_str(&format!("snapshot:   {}\n", info.id));
    output.push_str(&format!("created at: {}\n", info.metadata.created_at));
    output.push_str(&format!("tags:       {}\n", tags.join(", ")));
    output.push_str(&format!(
        "note:       {}\n",
        info.metadata.note.as_deref().unwrap_or("")
    ));
    output.push_str(&format!("size:       {}\n", format_bytes(info.size_bytes)));
    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
