use crate::backing::{BackingError, DirBacking, FileProvider, MappedZip};
use crate::filetree::Filetrees;
use crate::layout::{find_special_dir, InvalidWheelName, SpecialDir, SpecialDirError, WheelName};
use crate::manifest::Manifest;
use crate::path::PathError;
use crate::path_safety::PathPolicy;
use crate::record::RecordError;
use crate::verify::{verify_file, verify_record, Discrepancy, VerifyOptions, VerifyReport};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

/// Anything that stops an inspection run before or during verification.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Backing(#[from] BackingError),
    #[error(transparent)]
    SpecialDir(#[from] SpecialDirError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    WheelName(#[from] InvalidWheelName),
    #[error("File not found in *.dist-info directory: {0:?}")]
    MissingDistInfoFile(String),
    #[error("invalid WHEEL file: {0}")]
    WheelInfo(String),
}

impl InspectError {
    /// Stable tag: the RECORD error kind for malformed manifests, otherwise
    /// the variant name.
    pub fn code(&self) -> &'static str {
        match self {
            InspectError::Record(e) => e.kind(),
            InspectError::Backing(_) => "Backing",
            InspectError::SpecialDir(_) => "SpecialDir",
            InspectError::Path(_) => "Path",
            InspectError::WheelName(_) => "WheelName",
            InspectError::MissingDistInfoFile(_) => "MissingDistInfoFile",
            InspectError::WheelInfo(_) => "WheelInfo",
        }
    }
}

/// Read access to the files of one `*.dist-info` directory.
pub trait DistInfoProvider {
    fn open_dist_info_file(&mut self, name: &str) -> Result<Box<dyn Read + '_>, InspectError>;

    fn has_dist_info_file(&mut self, name: &str) -> Result<bool, InspectError>;

    /// The parsed `RECORD`, loaded once.
    fn manifest(&mut self) -> Result<&Manifest, InspectError>;

    fn read_dist_info_file(&mut self, name: &str) -> Result<Vec<u8>, InspectError> {
        let mut buf = Vec::new();
        self.open_dist_info_file(name)?
            .read_to_end(&mut buf)
            .map_err(|e| BackingError::io(name, e))?;
        Ok(buf)
    }
}

fn missing_as_absent(name: &str, e: BackingError) -> InspectError {
    match e {
        BackingError::NotFound(_) | BackingError::NotAFile(_) => {
            InspectError::MissingDistInfoFile(name.to_string())
        }
        other => other.into(),
    }
}

/// One wheel (archive or unpacked tree) held open for an inspection run.
/// Derived facts are computed on first use and kept.
pub struct BackedDistInfo<P> {
    backing: P,
    wheel_name: Option<WheelName>,
    dist_info: Option<String>,
    manifest: Option<Manifest>,
    root_is_purelib: Option<bool>,
}

pub type WheelFile = BackedDistInfo<MappedZip>;
pub type UnpackedWheel = BackedDistInfo<DirBacking>;

impl WheelFile {
    /// Open a `.whl`. The project and version in the filename, when it
    /// parses, must agree with the dist-info directory.
    pub fn from_path(path: &Path) -> Result<Self, InspectError> {
        let wheel_name = match WheelName::from_path(path) {
            Ok(n) => Some(n),
            Err(e) => {
                debug!(error = %e, "not checking dist-info name against filename");
                None
            }
        };
        Ok(Self::new(MappedZip::from_path(path)?, wheel_name))
    }
}

impl UnpackedWheel {
    pub fn from_path(path: &Path, wheel_name: Option<WheelName>, policy: PathPolicy) -> Self {
        Self::new(DirBacking::with_policy(path, policy), wheel_name)
    }
}

impl<P: FileProvider> BackedDistInfo<P> {
    pub fn new(backing: P, wheel_name: Option<WheelName>) -> Self {
        Self { backing, wheel_name, dist_info: None, manifest: None, root_is_purelib: None }
    }

    pub fn with_wheel_name(mut self, wheel_name: WheelName) -> Self {
        self.wheel_name = Some(wheel_name);
        self.dist_info = None;
        self
    }

    pub fn wheel_name(&self) -> Option<&WheelName> {
        self.wheel_name.as_ref()
    }

    pub fn backing(&self) -> &P {
        &self.backing
    }

    pub fn backing_mut(&mut self) -> &mut P {
        &mut self.backing
    }

    pub fn into_backing(self) -> P {
        self.backing
    }

    /// Found among the backing's top-level directories, not in RECORD.
    pub fn dist_info_dirname(&mut self) -> Result<String, InspectError> {
        if let Some(d) = &self.dist_info {
            return Ok(d.clone());
        }
        let dirs = self.backing.list_top_level_dirs()?;
        let found = find_special_dir(SpecialDir::DistInfo, dirs, self.wheel_name.as_ref(), true)?
            .unwrap_or_default();
        self.dist_info = Some(found.clone());
        Ok(found)
    }

    pub fn data_dirname(&mut self) -> Result<Option<String>, InspectError> {
        Ok(self.manifest()?.data_dirname()?.map(str::to_string))
    }

    fn take_manifest(&mut self) -> Result<Manifest, InspectError> {
        if let Some(m) = self.manifest.take() {
            return Ok(m);
        }
        let bytes = self.read_dist_info_file("RECORD")?;
        Ok(Manifest::parse(bytes.as_slice())?)
    }

    /// `Root-Is-Purelib` from the WHEEL file.
    pub fn root_is_purelib(&mut self) -> Result<bool, InspectError> {
        if let Some(b) = self.root_is_purelib {
            return Ok(b);
        }
        let bytes = self.read_dist_info_file("WHEEL")?;
        let b = parse_root_is_purelib(&String::from_utf8_lossy(&bytes))?;
        self.root_is_purelib = Some(b);
        Ok(b)
    }

    pub fn filetrees(&mut self) -> Result<Filetrees<'_>, InspectError> {
        Ok(self.filetrees_mut()?.0)
    }

    /// The sub-trees together with the backing, for checking tree paths.
    pub fn filetrees_mut(&mut self) -> Result<(Filetrees<'_>, &mut P), InspectError> {
        let purelib = self.root_is_purelib()?;
        self.manifest()?;
        let manifest = self
            .manifest
            .as_ref()
            .ok_or_else(|| InspectError::MissingDistInfoFile("RECORD".to_string()))?;
        Ok((Filetrees::new(manifest, purelib), &mut self.backing))
    }

    /// Resolve the special directories and parse RECORD.
    pub fn validate(&mut self) -> Result<(), InspectError> {
        self.dist_info_dirname()?;
        self.manifest()?;
        self.data_dirname()?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub fn verify(&mut self, opts: &VerifyOptions) -> Result<VerifyReport, InspectError> {
        let manifest = self.take_manifest()?;
        let result = verify_record(&mut self.backing, &manifest, opts);
        self.manifest = Some(manifest);
        Ok(result?)
    }

    /// Check a single path as named in RECORD.
    pub fn verify_path(
        &mut self,
        path: &str,
        opts: &VerifyOptions,
    ) -> Result<Option<Discrepancy>, InspectError> {
        let manifest = self.take_manifest()?;
        let result = match manifest.record_path(path) {
            Ok(rp) => verify_file(&mut self.backing, &rp, opts).map_err(InspectError::from),
            Err(e) => Err(e.into()),
        };
        self.manifest = Some(manifest);
        result
    }
}

impl<P: FileProvider> DistInfoProvider for BackedDistInfo<P> {
    fn open_dist_info_file(&mut self, name: &str) -> Result<Box<dyn Read + '_>, InspectError> {
        let path = format!("{}/{name}", self.dist_info_dirname()?);
        self.backing.open(&path).map_err(|e| missing_as_absent(name, e))
    }

    fn has_dist_info_file(&mut self, name: &str) -> Result<bool, InspectError> {
        let path = format!("{}/{name}", self.dist_info_dirname()?);
        Ok(self.backing.has_file(&path)?)
    }

    fn manifest(&mut self) -> Result<&Manifest, InspectError> {
        let m = self.take_manifest()?;
        Ok(self.manifest.insert(m))
    }
}

/// A bare `*.dist-info` directory with no wheel around it. RECORD paths
/// are relative to a root this type does not have, so it cannot verify.
pub struct DistInfoDir {
    backing: DirBacking,
    manifest: Option<Manifest>,
}

impl DistInfoDir {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, InspectError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(BackingError::NotFound(path.display().to_string()).into());
        }
        Ok(Self { backing: DirBacking::new(path), manifest: None })
    }

    pub fn path(&self) -> &Path {
        self.backing.root()
    }
}

impl DistInfoProvider for DistInfoDir {
    fn open_dist_info_file(&mut self, name: &str) -> Result<Box<dyn Read + '_>, InspectError> {
        self.backing.open(name).map_err(|e| missing_as_absent(name, e))
    }

    fn has_dist_info_file(&mut self, name: &str) -> Result<bool, InspectError> {
        Ok(self.backing.has_file(name)?)
    }

    fn manifest(&mut self) -> Result<&Manifest, InspectError> {
        let m = match self.manifest.take() {
            Some(m) => m,
            None => Manifest::parse(self.read_dist_info_file("RECORD")?.as_slice())?,
        };
        Ok(self.manifest.insert(m))
    }
}

/// Find `Root-Is-Purelib` among the `Key: Value` headers of a WHEEL file.
pub fn parse_root_is_purelib(wheel: &str) -> Result<bool, InspectError> {
    for line in wheel.lines() {
        if line.trim().is_empty() {
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("Root-Is-Purelib") {
            return match value.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(InspectError::WheelInfo(format!(
                    "Root-Is-Purelib must be 'true' or 'false', got {other:?}"
                ))),
            };
        }
    }
    Err(InspectError::WheelInfo("Root-Is-Purelib header is missing".to_string()))
}
