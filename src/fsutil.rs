//! Filesystem helpers shared by the snapshot and restore paths.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{BackupError, IoContext, Result};

/// Recursively copies `src` into `dst`, which must not exist yet.
///
/// `skip` receives paths relative to `src`; matching entries (and everything
/// below a matching directory) are left out.
pub fn copy_dir<F>(src: &Path, dst: &Path, skip: F) -> Result<()>
where
    F: Fn(&Path) -> bool,
{
    if dst.exists() {
        return Err(BackupError::AlreadyExists(format!(
            "destination already exists: {}",
            dst.display()
        )));
    }

    let mut walker = WalkDir::new(src).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
            BackupError::io(format!("failed to read {path}"), e.into())
        })?;

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| BackupError::InvalidArgument(format!("{} escapes source", entry.path().display())))?;

        if !relative.as_os_str().is_empty() && skip(relative) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .context(|| format!("failed to create {}", target.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .context(|| format!("failed to copy {}", entry.path().display()))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src).context(|| format!("failed to read link {}", src.display()))?;
    std::os::unix::fs::symlink(&link, dst)
        .context(|| format!("failed to create link {}", dst.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        copy_dir(src, dst, |_| false)
    } else {
        fs::copy(src, dst)
            .map(|_| ())
            .context(|| format!("failed to copy {}", src.display()))
    }
}

/// Total size in bytes of regular files under `path`. Unreadable entries are skipped.
pub fn dir_size(path: &Path) -> u64 {
    let mut total = 0u64;

    for entry in WalkDir::new(path).follow_links(false).into_iter().flatten() {
        if entry.file_type().is_file() {
            if let Ok(metadata) = entry.metadata() {
                total = total.saturating_add(metadata.len());
            }
        }
    }

    total
}

/// Serializes `value` as pretty JSON into `path` via a sibling temp file and rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()
    })();

    match result {
        Ok(()) => fs::rename(&tmp_path, path)
            .context(|| format!("failed to write {}", path.display())),
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(BackupError::io(format!("failed to write {}", path.display()), e))
        }
    }
}
