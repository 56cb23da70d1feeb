//! RECORD row format: `path,algorithm=digest,size`, CSV-quoted.

use crate::digest::{urlsafe_b64decode_nopad, urlsafe_b64encode_nopad, Algorithm, WEAK_ALGORITHMS};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Size and digest declared for one file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFileRecord")]
pub struct FileRecord {
    algorithm: Algorithm,
    digest: String,
    size: u64,
}

#[derive(Deserialize)]
struct RawFileRecord {
    algorithm: Algorithm,
    digest: String,
    size: u64,
}

impl TryFrom<RawFileRecord> for FileRecord {
    type Error = String;

    fn try_from(raw: RawFileRecord) -> Result<Self, Self::Error> {
        FileRecord::new(raw.algorithm, raw.digest.clone(), raw.size)
            .ok_or_else(|| format!("invalid {} digest: {:?}", raw.algorithm, raw.digest))
    }
}

impl FileRecord {
    /// `digest` must be unpadded URL-safe base64 of the algorithm's output size.
    pub fn new(algorithm: Algorithm, digest: impl Into<String>, size: u64) -> Option<Self> {
        let digest = digest.into();
        algorithm.accepts_digest(&digest).then_some(Self { algorithm, digest, size })
    }

    pub fn from_bytes(algorithm: Algorithm, digest: &[u8], size: u64) -> Option<Self> {
        if digest.len() != algorithm.digest_size() {
            return None;
        }
        Some(Self { algorithm, digest: urlsafe_b64encode_nopad(digest), size })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// The digest as written in RECORD.
    pub fn b64_digest(&self) -> &str {
        &self.digest
    }

    pub fn bytes_digest(&self) -> Vec<u8> {
        // validated at construction
        urlsafe_b64decode_nopad(&self.digest).unwrap_or_default()
    }

    pub fn hex_digest(&self) -> String {
        hex::encode(self.bytes_digest())
    }

    /// The middle RECORD field, `algorithm=digest`.
    pub fn digest_field(&self) -> String {
        format!("{}={}", self.algorithm, self.digest)
    }
}

/// A RECORD that cannot be parsed. Always terminal for that RECORD.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{}", describe_row_length(.path.as_deref(), *.length))]
    RowLength { path: Option<String>, length: usize },
    #[error("RECORD entry has an empty path")]
    EmptyPath,
    #[error("RECORD entry has a non-normalized path: {0:?}")]
    NonNormalizedPath(String),
    #[error("RECORD entry has an absolute path: {0:?}")]
    AbsolutePath(String),
    #[error("RECORD entry for {path:?} uses an unknown digest algorithm: {algorithm:?}")]
    UnknownAlgorithm { path: String, algorithm: String },
    #[error("RECORD entry for {path:?} uses a weak digest algorithm: {algorithm:?}")]
    WeakAlgorithm { path: String, algorithm: String },
    #[error("RECORD contains invalid {algorithm} base64 nopad digest for {path:?}: {digest:?}")]
    MalformedDigest { path: String, algorithm: String, digest: String },
    #[error("RECORD contains invalid size for {path:?}: {size:?}")]
    MalformedSize { path: String, size: String },
    #[error("RECORD entry for {0:?} has a size but no digest")]
    EmptyDigest(String),
    #[error("RECORD entry for {0:?} has a digest but no size")]
    EmptySize(String),
    #[error("RECORD entry for {0:?} lacks both digest and size")]
    NullEntry(String),
    #[error("RECORD contains multiple conflicting entries for {0:?}")]
    Conflict(String),
    #[error("RECORD is not valid CSV: {0}")]
    Csv(#[from] csv::Error),
}

fn describe_row_length(path: Option<&str>, length: usize) -> String {
    match path {
        None => "Empty RECORD entry (blank line)".to_string(),
        Some(p) => format!("RECORD entry for {p:?} has {length} fields; expected 3"),
    }
}

impl RecordError {
    /// Stable tag for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::RowLength { .. } => "RowLength",
            RecordError::EmptyPath => "EmptyPath",
            RecordError::NonNormalizedPath(_) => "NonNormalizedPath",
            RecordError::AbsolutePath(_) => "AbsolutePath",
            RecordError::UnknownAlgorithm { .. } => "UnknownAlgorithm",
            RecordError::WeakAlgorithm { .. } => "WeakAlgorithm",
            RecordError::MalformedDigest { .. } => "MalformedDigest",
            RecordError::MalformedSize { .. } => "MalformedSize",
            RecordError::EmptyDigest(_) => "EmptyDigest",
            RecordError::EmptySize(_) => "EmptySize",
            RecordError::NullEntry(_) => "NullEntry",
            RecordError::Conflict(_) => "Conflict",
            RecordError::Csv(_) => "Csv",
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            RecordError::RowLength { path, .. } => path.as_deref(),
            RecordError::EmptyPath | RecordError::Csv(_) => None,
            RecordError::NonNormalizedPath(p)
            | RecordError::AbsolutePath(p)
            | RecordError::EmptyDigest(p)
            | RecordError::EmptySize(p)
            | RecordError::NullEntry(p)
            | RecordError::Conflict(p) => Some(p),
            RecordError::UnknownAlgorithm { path, .. }
            | RecordError::WeakAlgorithm { path, .. }
            | RecordError::MalformedDigest { path, .. }
            | RecordError::MalformedSize { path, .. } => Some(path),
        }
    }
}

/// Validate one row's three fields. Null-entry policy is applied by the caller,
/// which knows whether the path is the RECORD's own entry.
pub fn parse_row<S: AsRef<str>>(fields: &[S]) -> Result<(String, Option<FileRecord>), RecordError> {
    let [path, alg_digest, size] = fields else {
        return Err(RecordError::RowLength {
            path: fields.first().map(|f| f.as_ref().to_string()),
            length: fields.len(),
        });
    };
    let (path, alg_digest, size) = (path.as_ref(), alg_digest.as_ref(), size.as_ref());
    check_path(path)?;

    let digest = if alg_digest.is_empty() { None } else { Some(parse_digest(alg_digest, path)?) };

    let size = if size.is_empty() {
        None
    } else {
        let n = size
            .parse::<u64>()
            .map_err(|_| RecordError::MalformedSize { path: path.to_string(), size: size.to_string() })?;
        Some(n)
    };

    match (digest, size) {
        (None, None) => Ok((path.to_string(), None)),
        (None, Some(_)) => Err(RecordError::EmptyDigest(path.to_string())),
        (Some(_), None) => Err(RecordError::EmptySize(path.to_string())),
        (Some((algorithm, digest)), Some(size)) => {
            Ok((path.to_string(), Some(FileRecord { algorithm, digest, size })))
        }
    }
}

fn check_path(path: &str) -> Result<(), RecordError> {
    if path.is_empty() {
        return Err(RecordError::EmptyPath);
    }
    if path.contains("//") || path.split('/').any(|seg| seg == "." || seg == "..") {
        return Err(RecordError::NonNormalizedPath(path.to_string()));
    }
    if path.starts_with('/') {
        return Err(RecordError::AbsolutePath(path.to_string()));
    }
    Ok(())
}

/// Split `algorithm=digest` and validate both halves.
pub fn parse_digest(field: &str, path: &str) -> Result<(Algorithm, String), RecordError> {
    let Some((algorithm, digest)) = field.split_once('=') else {
        return Err(RecordError::MalformedDigest {
            path: path.to_string(),
            algorithm: field.to_ascii_lowercase(),
            digest: String::new(),
        });
    };
    let lower = algorithm.to_ascii_lowercase();
    if WEAK_ALGORITHMS.contains(&lower.as_str()) {
        return Err(RecordError::WeakAlgorithm { path: path.to_string(), algorithm: lower });
    }
    let algorithm: Algorithm = lower
        .parse()
        .map_err(|_| RecordError::UnknownAlgorithm { path: path.to_string(), algorithm: lower.clone() })?;
    if !algorithm.accepts_digest(digest) {
        return Err(RecordError::MalformedDigest {
            path: path.to_string(),
            algorithm: lower,
            digest: digest.to_string(),
        });
    }
    Ok((algorithm, digest.to_string()))
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.digest_field(), self.size)
    }
}
