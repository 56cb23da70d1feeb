//! Real data sources a manifest is checked against.

mod dir;
mod archive;

pub use self::dir::DirBacking;
pub use self::archive::{MappedZip, ZipBacking};

use crate::digest::{digest_reader, Algorithm};
use crate::path::PathType;
use std::io::{self, Read};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackingError {
    #[error("no such path: {0:?}")]
    NotFound(String),
    #[error("not a regular file: {0:?}")]
    NotAFile(String),
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("I/O error on {path:?}: {source}")]
    Io { path: String, source: io::Error },
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

impl BackingError {
    pub(crate) fn io(path: impl Into<String>, source: io::Error) -> Self {
        BackingError::Io { path: path.into(), source }
    }
}

/// Capability contract shared by archive and directory backings.
///
/// Paths are relative and `/`-separated, as in RECORD. The empty path is
/// the root, which is always a directory.
pub trait FileProvider {
    /// Every regular file, sorted.
    fn list_files(&self) -> Result<Vec<String>, BackingError>;

    /// Names of the directories directly under the root, without slashes.
    fn list_top_level_dirs(&self) -> Result<Vec<String>, BackingError>;

    /// `None` when nothing exists at `path`.
    fn classify(&self, path: &str) -> Result<Option<PathType>, BackingError>;

    fn file_size(&self, path: &str) -> Result<u64, BackingError>;

    fn open(&mut self, path: &str) -> Result<Box<dyn Read + '_>, BackingError>;

    fn has_file(&self, path: &str) -> Result<bool, BackingError> {
        Ok(self.classify(path)? == Some(PathType::File))
    }

    fn has_directory(&self, path: &str) -> Result<bool, BackingError> {
        Ok(self.classify(path)? == Some(PathType::Directory))
    }

    /// Lower-case hex digest of the file, streamed in fixed-size chunks.
    fn digest(&mut self, path: &str, algorithm: Algorithm) -> Result<String, BackingError> {
        let mut reader = self.open(path)?;
        let (hex, _) = digest_reader(algorithm, &mut reader).map_err(|e| BackingError::io(path, e))?;
        Ok(hex)
    }

    fn read_to_end(&mut self, path: &str) -> Result<Vec<u8>, BackingError> {
        let mut buf = Vec::new();
        self.open(path)?.read_to_end(&mut buf).map_err(|e| BackingError::io(path, e))?;
        Ok(buf)
    }
}
