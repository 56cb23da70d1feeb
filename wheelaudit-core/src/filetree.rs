use crate::backing::FileProvider;
use crate::dist_info::InspectError;
use crate::manifest::Manifest;
use crate::path::{PathError, PathType, PurePath};
use crate::record::FileRecord;
use crate::tree::RecordPath;
use crate::verify::{verify_file, Discrepancy, VerifyOptions};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TreeId {
    All,
    /// Whichever of purelib/platlib the wheel installs at its root.
    Root,
    Purelib,
    Platlib,
    DistInfo,
    Data,
    /// A directory under `.data`.
    Named(String),
}

impl TreeId {
    fn lib_name(&self) -> Option<&str> {
        match self {
            TreeId::Purelib => Some("purelib"),
            TreeId::Platlib => Some("platlib"),
            _ => None,
        }
    }
}

impl FromStr for TreeId {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ALL" => TreeId::All,
            "ROOT" => TreeId::Root,
            "PURELIB" => TreeId::Purelib,
            "PLATLIB" => TreeId::Platlib,
            "DIST_INFO" => TreeId::DistInfo,
            "DATA" => TreeId::Data,
            "" | "." | ".." => return Err(PathError::InvalidName(s.to_string())),
            n if n.contains('/') => return Err(PathError::InvalidName(s.to_string())),
            n => TreeId::Named(n.to_string()),
        })
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TreeId::All => "ALL",
            TreeId::Root => "ROOT",
            TreeId::Purelib => "PURELIB",
            TreeId::Platlib => "PLATLIB",
            TreeId::DistInfo => "DIST_INFO",
            TreeId::Data => "DATA",
            TreeId::Named(n) => n,
        })
    }
}

/// A path inside one named sub-tree. `parts` are still measured from the
/// archive root; `parent` and `is_root` stop at the sub-tree root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreePath<'a> {
    record_path: RecordPath<'a>,
    tree_id: TreeId,
    root_depth: usize,
    pruned: Vec<String>,
}

impl<'a> TreePath<'a> {
    pub fn tree_id(&self) -> &TreeId {
        &self.tree_id
    }

    pub fn record_path(&self) -> &RecordPath<'a> {
        &self.record_path
    }

    pub fn relative_parts(&self) -> &[String] {
        &self.parts()[self.root_depth..]
    }

    pub fn relative_path(&self) -> String {
        self.relative_parts().join("/")
    }

    pub fn filedata(&self) -> Option<&'a FileRecord> {
        self.record_path.filedata()
    }

    pub fn exists(&self) -> bool {
        self.record_path.exists()
    }

    pub fn is_file(&self) -> bool {
        self.record_path.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.record_path.is_dir()
    }

    pub fn path_type(&self) -> Result<PathType, PathError> {
        self.record_path.path_type()
    }

    pub fn iterdir(&self) -> Result<Vec<TreePath<'a>>, PathError> {
        let at_root = self.is_root();
        Ok(self
            .record_path
            .iterdir()?
            .into_iter()
            .filter(|c| !(at_root && self.pruned.iter().any(|p| p == c.name())))
            .map(|c| self.with_record_path(c))
            .collect())
    }

    pub fn walk_files(&self) -> Vec<TreePath<'a>> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(p) = stack.pop() {
            if p.is_file() {
                out.push(p);
            } else if let Ok(children) = p.iterdir() {
                stack.extend(children.into_iter().rev());
            }
        }
        out
    }

    /// Check this path against `backing`. The path must be declared.
    pub fn verify<P: FileProvider + ?Sized>(
        &self,
        backing: &mut P,
        opts: &VerifyOptions,
    ) -> Result<Option<Discrepancy>, InspectError> {
        if !self.exists() {
            return Err(PathError::NoSuchPath(self.as_posix()).into());
        }
        Ok(verify_file(backing, &self.record_path, opts)?)
    }

    fn with_record_path(&self, record_path: RecordPath<'a>) -> Self {
        TreePath {
            record_path,
            tree_id: self.tree_id.clone(),
            root_depth: self.root_depth,
            pruned: self.pruned.clone(),
        }
    }
}

impl<'a> PurePath for TreePath<'a> {
    fn parts(&self) -> &[String] {
        self.record_path.parts()
    }

    fn is_root(&self) -> bool {
        self.parts().len() == self.root_depth
    }

    fn parent(&self) -> Self {
        if self.is_root() {
            self.clone()
        } else {
            self.with_record_path(self.record_path.parent())
        }
    }

    fn get_subpath(&self, name: &str) -> Result<Self, PathError> {
        if name.is_empty() || name.contains('/') {
            return Err(PathError::InvalidName(name.to_string()));
        }
        if self.is_file() {
            return Err(PathError::NotDirectory(self.as_posix()));
        }
        match name {
            "." => Ok(self.clone()),
            ".." => Ok(self.parent()),
            n if self.is_root() && self.pruned.iter().any(|p| p == n) => {
                Ok(self.with_record_path(self.record_path.virtual_child(n)))
            }
            n => Ok(self.with_record_path(self.record_path.get_subpath(n)?)),
        }
    }
}

impl fmt::Display for TreePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_posix())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Filetrees<'m> {
    manifest: &'m Manifest,
    root_is_purelib: bool,
}

impl<'m> Filetrees<'m> {
    pub fn new(manifest: &'m Manifest, root_is_purelib: bool) -> Self {
        Self { manifest, root_is_purelib }
    }

    fn root_lib(&self) -> TreeId {
        if self.root_is_purelib {
            TreeId::Purelib
        } else {
            TreeId::Platlib
        }
    }

    fn other_lib(&self) -> TreeId {
        if self.root_is_purelib {
            TreeId::Platlib
        } else {
            TreeId::Purelib
        }
    }

    /// `Root` becomes the concrete library tree; everything else is unchanged.
    pub fn resolve(&self, id: &TreeId) -> TreeId {
        match id {
            TreeId::Root => self.root_lib(),
            other => other.clone(),
        }
    }

    /// `None` when the wheel has no such tree.
    pub fn get(&self, id: &TreeId) -> Result<Option<TreePath<'m>>, InspectError> {
        let id = self.resolve(id);
        let root = self.manifest.filetree().root();
        let mut pruned = Vec::new();
        let rp = match &id {
            TreeId::All => root,
            lib if *lib == self.root_lib() => {
                pruned.push(self.manifest.dist_info_dirname()?.to_string());
                if let Some(data) = self.manifest.data_dirname()? {
                    pruned.push(data.to_string());
                }
                root
            }
            TreeId::DistInfo => root.get_subpath(self.manifest.dist_info_dirname()?)?,
            TreeId::Data => match self.manifest.data_dirname()? {
                Some(data) => root.get_subpath(data)?,
                None => return Ok(None),
            },
            TreeId::Root => return Ok(None),
            category => {
                let Some(data) = self.manifest.data_dirname()? else {
                    return Ok(None);
                };
                let name = match category {
                    TreeId::Named(n) => n.as_str(),
                    lib => lib.lib_name().unwrap_or_default(),
                };
                let p = root.get_subpath(data)?.get_subpath(name)?;
                if !p.is_dir() {
                    return Ok(None);
                }
                p
            }
        };
        let root_depth = rp.parts().len();
        Ok(Some(TreePath { record_path: rp, tree_id: id, root_depth, pruned }))
    }

    pub fn keys(&self) -> Result<Vec<TreeId>, InspectError> {
        let mut keys = vec![TreeId::All, self.root_lib(), TreeId::DistInfo];
        if let Some(data) = self.manifest.data_dirname()? {
            keys.push(TreeId::Data);
            let data_dir = self.manifest.filetree().root().get_subpath(data)?;
            let other = self.other_lib();
            if let Some(name) = other.lib_name() {
                if data_dir.get_subpath(name)?.is_dir() {
                    keys.push(other);
                }
            }
            for child in data_dir.iterdir()? {
                if child.is_dir() && !matches!(child.name(), "purelib" | "platlib") {
                    keys.push(TreeId::Named(child.name().to_string()));
                }
            }
        }
        Ok(keys)
    }
}
