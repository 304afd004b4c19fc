//! Path resolution under a fixed root. Anything that escapes the root (via
//! dot segments or symlinks) resolves to nothing.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::Serialize;
use walkdir::WalkDir;

/// Canonicalizes `base`/`rel` and returns it only when the result stays
/// under `base`. Nonexistent targets resolve to `None`.
pub fn resolve_under(base: &Path, rel: &str) -> Option<PathBuf> {
    let base = base.canonicalize().ok()?;
    let target = base.join(rel.trim_start_matches('/')).canonicalize().ok()?;
    target.starts_with(&base).then_some(target)
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub bytes: u64,
    pub mtime: i64,
}

/// Every regular file under `root`, paths relative to `base`.
pub fn list_tree(base: &Path, root: &Path) -> Vec<TreeEntry> {
    let Ok(base) = base.canonicalize() else {
        return Vec::new();
    };
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(&base) else {
            continue;
        };
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let mtime = meta
            .modified()
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map(|age| age.as_secs() as i64)
            .unwrap_or(0);
        entries.push(TreeEntry {
            path: rel.to_string_lossy().replace('\\', "/"),
            bytes: meta.len(),
            mtime,
        });
    }
    entries
}
