use crate::backing::{BackingError, FileProvider};
use crate::digest::Algorithm;
use crate::layout::{filedata_is_optional, is_signature_file};
use crate::manifest::Manifest;
use crate::path::{PathType, PurePath};
use crate::progress::Progress;
use crate::tree::RecordPath;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, instrument, trace, warn};

#[derive(Clone, Debug)]
pub struct VerifyOptions {
    /// Compare digests as well as sizes.
    pub digests: bool,
    /// Stop at the first discrepancy instead of collecting all of them.
    pub fail_fast: bool,
    pub progress: Progress,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self { digests: true, fail_fast: true, progress: Progress::default() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum Discrepancy {
    Missing {
        path: String,
    },
    TypeMismatch {
        path: String,
        record_type: PathType,
        actual_type: PathType,
    },
    SizeMismatch {
        path: String,
        record_size: u64,
        actual_size: u64,
    },
    DigestMismatch {
        path: String,
        algorithm: Algorithm,
        record_digest: String,
        actual_digest: String,
    },
    UndeclaredPath {
        path: String,
    },
    /// A file present in the backing whose RECORD row has no digest or size.
    NullEntry {
        path: String,
    },
}

impl Discrepancy {
    pub fn kind(&self) -> &'static str {
        match self {
            Discrepancy::Missing { .. } => "Missing",
            Discrepancy::TypeMismatch { .. } => "TypeMismatch",
            Discrepancy::SizeMismatch { .. } => "SizeMismatch",
            Discrepancy::DigestMismatch { .. } => "DigestMismatch",
            Discrepancy::UndeclaredPath { .. } => "UndeclaredPath",
            Discrepancy::NullEntry { .. } => "NullEntry",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Discrepancy::Missing { path }
            | Discrepancy::TypeMismatch { path, .. }
            | Discrepancy::SizeMismatch { path, .. }
            | Discrepancy::DigestMismatch { path, .. }
            | Discrepancy::UndeclaredPath { path }
            | Discrepancy::NullEntry { path } => path,
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::Missing { path } => {
                write!(f, "File declared in RECORD not found in archive: {path:?}")
            }
            Discrepancy::TypeMismatch { path, record_type, actual_type } => write!(
                f,
                "Path {path:?} is a {record_type} in RECORD but a {actual_type} in archive"
            ),
            Discrepancy::SizeMismatch { path, record_size, actual_size } => write!(
                f,
                "Size of file {path:?} listed as {record_size} in RECORD, actually {actual_size}"
            ),
            Discrepancy::DigestMismatch { path, algorithm, record_digest, actual_digest } => {
                write!(
                    f,
                    "{algorithm} digest of file {path:?} listed as {record_digest} in RECORD, actually {actual_digest}"
                )
            }
            Discrepancy::UndeclaredPath { path } => {
                write!(f, "File not declared in RECORD: {path:?}")
            }
            Discrepancy::NullEntry { path } => {
                write!(f, "RECORD entry for {path:?} lacks both digest and size")
            }
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyReport {
    pub files_checked: usize,
    pub bytes_digested: u64,
    pub discrepancies: Vec<Discrepancy>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn first(&self) -> Option<&Discrepancy> {
        self.discrepancies.first()
    }
}

/// RECORD entries in file order, then undeclared backing files in sorted order.
#[instrument(skip_all, fields(entries = manifest.len(), digests = opts.digests))]
pub fn verify_record<P: FileProvider + ?Sized>(
    backing: &mut P,
    manifest: &Manifest,
    opts: &VerifyOptions,
) -> Result<VerifyReport, BackingError> {
    let progress = &opts.progress;
    progress.set_stage("verify");
    progress.set_files_total(manifest.len());
    progress.start();
    let result = run(backing, manifest, opts);
    progress.stop();
    let report = result?;
    info!(
        files = report.files_checked,
        bytes = report.bytes_digested,
        discrepancies = report.discrepancies.len(),
        "verification finished"
    );
    Ok(report)
}

fn run<P: FileProvider + ?Sized>(
    backing: &mut P,
    manifest: &Manifest,
    opts: &VerifyOptions,
) -> Result<VerifyReport, BackingError> {
    let mut remaining: BTreeSet<String> = backing.list_files()?.into_iter().collect();
    let mut report = VerifyReport::default();

    for (path, _) in manifest.iter() {
        let rpath = manifest
            .record_path(path)
            .map_err(|_| BackingError::InvalidPath(path.to_string()))?;
        let found = check(backing, &rpath, opts, &mut report.bytes_digested)?;
        report.files_checked += 1;
        opts.progress.inc_file();
        remaining.remove(path);
        if let Some(d) = found {
            warn!(path = d.path(), kind = d.kind(), "discrepancy");
            report.discrepancies.push(d);
            if opts.fail_fast {
                return Ok(report);
            }
        }
    }

    for path in remaining {
        if is_signature_file(&path) {
            continue;
        }
        warn!(path = %path, kind = "UndeclaredPath", "discrepancy");
        report.discrepancies.push(Discrepancy::UndeclaredPath { path });
        if opts.fail_fast {
            break;
        }
    }
    Ok(report)
}

/// An undeclared path passes if the backing lacks it, has a directory there,
/// or it is a signature file.
pub fn verify_file<P: FileProvider + ?Sized>(
    backing: &mut P,
    rpath: &RecordPath<'_>,
    opts: &VerifyOptions,
) -> Result<Option<Discrepancy>, BackingError> {
    let mut digested = 0;
    check(backing, rpath, opts, &mut digested)
}

fn check<P: FileProvider + ?Sized>(
    backing: &mut P,
    rpath: &RecordPath<'_>,
    opts: &VerifyOptions,
    digested: &mut u64,
) -> Result<Option<Discrepancy>, BackingError> {
    let spath = rpath.as_posix();
    trace!(path = %spath, "checking");

    if !rpath.exists() {
        if is_signature_file(&spath) {
            return Ok(None);
        }
        return Ok(match backing.classify(&spath)? {
            None | Some(PathType::Directory) => None,
            Some(_) => Some(Discrepancy::UndeclaredPath { path: spath }),
        });
    }

    if rpath.is_dir() {
        return Ok(match backing.classify(&spath)? {
            None => Some(Discrepancy::Missing { path: format!("{spath}/") }),
            Some(PathType::Directory) => None,
            Some(actual_type) => Some(Discrepancy::TypeMismatch {
                path: spath,
                record_type: PathType::Directory,
                actual_type,
            }),
        });
    }

    match backing.classify(&spath)? {
        None => return Ok(Some(Discrepancy::Missing { path: spath })),
        Some(PathType::File) => {}
        Some(actual_type) => {
            return Ok(Some(Discrepancy::TypeMismatch {
                path: spath,
                record_type: PathType::File,
                actual_type,
            }))
        }
    }

    let Some(record) = rpath.filedata() else {
        return Ok(if filedata_is_optional(&spath) {
            None
        } else {
            Some(Discrepancy::NullEntry { path: spath })
        });
    };

    let actual_size = backing.file_size(&spath)?;
    if actual_size != record.size() {
        return Ok(Some(Discrepancy::SizeMismatch {
            path: spath,
            record_size: record.size(),
            actual_size,
        }));
    }

    if opts.digests {
        let actual_digest = backing.digest(&spath, record.algorithm())?;
        *digested += actual_size;
        opts.progress.add_bytes(actual_size);
        let record_digest = record.hex_digest();
        if actual_digest != record_digest {
            return Ok(Some(Discrepancy::DigestMismatch {
                path: spath,
                algorithm: record.algorithm(),
                record_digest,
                actual_digest,
            }));
        }
    }
    Ok(None)
}
