use super::{BackingError, FileProvider};
use crate::path::PathType;
use memmap2::Mmap;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// A zip archive read through a memory map.
pub type MappedZip = ZipBacking<Cursor<Mmap>>;

#[derive(Clone, Copy, Debug)]
struct Entry {
    index: usize,
    size: u64,
}

/// Zip archive backing. Directories are implied by entry name prefixes.
pub struct ZipBacking<R> {
    archive: ZipArchive<R>,
    files: BTreeMap<String, Entry>,
    names: Vec<String>,
}

impl MappedZip {
    pub fn from_path(path: &Path) -> Result<Self, BackingError> {
        let display = path.display().to_string();
        let f = File::open(path).map_err(|e| BackingError::io(&display, e))?;
        // SAFETY: mapped read-only; the file is not expected to change for
        // the lifetime of one inspection.
        let mmap = unsafe { Mmap::map(&f) }.map_err(|e| BackingError::io(&display, e))?;
        Self::from_reader(Cursor::new(mmap))
    }
}

impl<R: Read + Seek> ZipBacking<R> {
    pub fn from_reader(reader: R) -> Result<Self, BackingError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut files = BTreeMap::new();
        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let zf = archive.by_index_raw(index)?;
            let name = zf.name().to_string();
            if !zf.is_dir() {
                files.insert(name.clone(), Entry { index, size: zf.size() });
            }
            names.push(name);
        }
        debug!(entries = names.len(), files = files.len(), "indexed zip archive");
        Ok(Self { archive, files, names })
    }

    fn has_implied_dir(&self, path: &str) -> bool {
        let dir = path.trim_end_matches('/');
        if dir.is_empty() {
            return true;
        }
        let prefix = format!("{dir}/");
        self.names.iter().any(|n| n.starts_with(&prefix))
    }
}

impl<R: Read + Seek> FileProvider for ZipBacking<R> {
    fn list_files(&self) -> Result<Vec<String>, BackingError> {
        Ok(self.files.keys().cloned().collect())
    }

    fn list_top_level_dirs(&self) -> Result<Vec<String>, BackingError> {
        let dirs: BTreeSet<&str> = self
            .names
            .iter()
            .filter_map(|n| n.trim_start_matches('/').split_once('/'))
            .map(|(top, _)| top)
            .filter(|top| !top.is_empty())
            .collect();
        Ok(dirs.into_iter().map(str::to_string).collect())
    }

    fn classify(&self, path: &str) -> Result<Option<PathType>, BackingError> {
        if self.files.contains_key(path) {
            Ok(Some(PathType::File))
        } else if self.has_implied_dir(path) {
            Ok(Some(PathType::Directory))
        } else {
            Ok(None)
        }
    }

    fn file_size(&self, path: &str) -> Result<u64, BackingError> {
        match self.files.get(path) {
            Some(e) => Ok(e.size),
            None if self.has_implied_dir(path) => Err(BackingError::NotAFile(path.to_string())),
            None => Err(BackingError::NotFound(path.to_string())),
        }
    }

    fn open(&mut self, path: &str) -> Result<Box<dyn Read + '_>, BackingError> {
        let index = match self.files.get(path) {
            Some(e) => e.index,
            None if self.has_implied_dir(path) => {
                return Err(BackingError::NotAFile(path.to_string()))
            }
            None => return Err(BackingError::NotFound(path.to_string())),
        };
        Ok(Box::new(self.archive.by_index(index)?))
    }
}
