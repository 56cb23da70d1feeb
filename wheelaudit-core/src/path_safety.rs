use crate::backing::BackingError;
use std::path::{Component, Path, PathBuf};

/// How a directory backing treats symbolic links.
#[derive(Clone, Copy, Debug)]
pub struct PathPolicy {
    pub follow_symlinks: bool,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self { follow_symlinks: true }
    }
}

/// Map a RECORD-style relative path onto `root`: no absolute paths, no `..`.
/// An empty path is the root itself.
pub fn validate_path(root: &Path, rel: &str) -> Result<PathBuf, BackingError> {
    let rel_path = Path::new(rel);
    if rel.starts_with('/') || rel_path.is_absolute() {
        return Err(BackingError::InvalidPath(rel.to_string()));
    }
    let mut candidate = root.to_path_buf();
    for comp in rel_path.components() {
        match comp {
            Component::Normal(seg) => candidate.push(seg),
            Component::CurDir => {}
            _ => return Err(BackingError::InvalidPath(rel.to_string())),
        }
    }
    Ok(candidate)
}

/// True if some directory between `root` and `path` (exclusive of both) is a
/// symlink.
pub fn crosses_symlink(root: &Path, path: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    let mut cur = root.to_path_buf();
    let mut comps = rel.components().peekable();
    while let Some(comp) = comps.next() {
        if comps.peek().is_none() {
            break;
        }
        cur.push(comp);
        if let Ok(m) = std::fs::symlink_metadata(&cur) {
            if m.file_type().is_symlink() {
                return true;
            }
        }
    }
    false
}
