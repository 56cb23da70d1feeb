use super::{BackingError, FileProvider};
use crate::path::PathType;
use crate::path_safety::{crosses_symlink, validate_path, PathPolicy};
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// An unpacked wheel on the local filesystem.
#[derive(Clone, Debug)]
pub struct DirBacking {
    root: PathBuf,
    policy: PathPolicy,
}

impl DirBacking {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_policy(root, PathPolicy::default())
    }

    pub fn with_policy(root: impl Into<PathBuf>, policy: PathPolicy) -> Self {
        Self { root: root.into(), policy }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metadata(&self, p: &Path) -> io::Result<Metadata> {
        if self.policy.follow_symlinks {
            fs::metadata(p)
        } else {
            fs::symlink_metadata(p)
        }
    }

    fn stat(&self, path: &str) -> Result<Option<(PathBuf, Metadata)>, BackingError> {
        let p = validate_path(&self.root, path)?;
        if !self.policy.follow_symlinks && crosses_symlink(&self.root, &p) {
            return Ok(None);
        }
        match self.metadata(&p) {
            Ok(m) => Ok(Some((p, m))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                // "a/b" where "a" is a regular file
                for anc in p.ancestors().skip(1) {
                    if !anc.starts_with(&self.root) {
                        break;
                    }
                    if let Ok(m) = fs::metadata(anc) {
                        if !m.is_dir() {
                            return Ok(None);
                        }
                        break;
                    }
                }
                Err(BackingError::io(path, e))
            }
        }
    }
}

fn path_type(m: &Metadata) -> PathType {
    if m.is_dir() {
        PathType::Directory
    } else if m.is_file() {
        PathType::File
    } else {
        PathType::Other
    }
}

fn to_record_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl FileProvider for DirBacking {
    fn list_files(&self) -> Result<Vec<String>, BackingError> {
        let mut out = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(self.policy.follow_symlinks)
            .sort_by_file_name();
        for ent in walker {
            let ent = match ent {
                Ok(ent) => ent,
                // dangling symlink under follow_symlinks
                Err(e) if e.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => {
                    debug!(path = ?e.path(), "skipping unresolvable entry");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if !ent.file_type().is_file() {
                continue;
            }
            let rel = pathdiff::diff_paths(ent.path(), &self.root)
                .unwrap_or_else(|| ent.file_name().into());
            out.push(to_record_path(&rel));
        }
        out.sort();
        debug!(root = %self.root.display(), files = out.len(), "listed directory");
        Ok(out)
    }

    fn list_top_level_dirs(&self) -> Result<Vec<String>, BackingError> {
        let root = self.root.display().to_string();
        let mut out = Vec::new();
        for ent in fs::read_dir(&self.root).map_err(|e| BackingError::io(&root, e))? {
            let ent = ent.map_err(|e| BackingError::io(&root, e))?;
            let Ok(m) = self.metadata(&ent.path()) else {
                continue;
            };
            if m.is_dir() {
                out.push(ent.file_name().to_string_lossy().into_owned());
            }
        }
        out.sort();
        Ok(out)
    }

    fn classify(&self, path: &str) -> Result<Option<PathType>, BackingError> {
        Ok(self.stat(path)?.map(|(_, m)| path_type(&m)))
    }

    fn file_size(&self, path: &str) -> Result<u64, BackingError> {
        match self.stat(path)? {
            Some((_, m)) if m.is_file() => Ok(m.len()),
            Some(_) => Err(BackingError::NotAFile(path.to_string())),
            None => Err(BackingError::NotFound(path.to_string())),
        }
    }

    fn open(&mut self, path: &str) -> Result<Box<dyn Read + '_>, BackingError> {
        match self.stat(path)? {
            Some((p, m)) if m.is_file() => {
                let f = File::open(&p).map_err(|e| BackingError::io(path, e))?;
                Ok(Box::new(f))
            }
            Some(_) => Err(BackingError::NotAFile(path.to_string())),
            None => Err(BackingError::NotFound(path.to_string())),
        }
    }
}
