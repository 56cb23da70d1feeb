//! Arena-backed directory tree built from RECORD rows.

use crate::path::{PathError, PathType, PurePath};
use crate::record::{FileRecord, RecordError};
use std::collections::BTreeMap;
use std::fmt;

pub type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone)]
enum NodeKind {
    File(Option<FileRecord>),
    Directory(BTreeMap<String, NodeId>),
}

#[derive(Debug, Clone)]
struct Node {
    parts: Vec<String>,
    parent: NodeId,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
pub struct ManifestTree {
    nodes: Vec<Node>,
}

impl Default for ManifestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parts: Vec::new(),
                parent: ROOT,
                kind: NodeKind::Directory(BTreeMap::new()),
            }],
        }
    }

    /// Declare `path` (a trailing `/` marks a directory). Re-declaring an
    /// identical entry is a no-op.
    pub fn insert(&mut self, path: &str, record: Option<FileRecord>) -> Result<(), RecordError> {
        let is_dir = path.ends_with('/');
        let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((name, dirs)) = segs.split_last() else {
            return Err(RecordError::EmptyPath);
        };
        let mut cur = ROOT;
        for seg in dirs {
            cur = self.mkdir(cur, seg)?;
        }
        match self.child(cur, name) {
            Some(id) => {
                let same = match &self.nodes[id].kind {
                    NodeKind::File(existing) => !is_dir && *existing == record,
                    NodeKind::Directory(_) => is_dir,
                };
                if same {
                    Ok(())
                } else {
                    Err(RecordError::Conflict(path.to_string()))
                }
            }
            None => {
                let kind = if is_dir {
                    NodeKind::Directory(BTreeMap::new())
                } else {
                    NodeKind::File(record)
                };
                self.push(cur, name, kind);
                Ok(())
            }
        }
    }

    fn mkdir(&mut self, parent: NodeId, name: &str) -> Result<NodeId, RecordError> {
        match self.child(parent, name) {
            Some(id) => match self.nodes[id].kind {
                NodeKind::Directory(_) => Ok(id),
                NodeKind::File(_) => Err(RecordError::Conflict(self.nodes[id].parts.join("/"))),
            },
            None => Ok(self.push(parent, name, NodeKind::Directory(BTreeMap::new()))),
        }
    }

    fn push(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        let mut parts = self.nodes[parent].parts.clone();
        parts.push(name.to_string());
        self.nodes.push(Node { parts, parent, kind });
        if let NodeKind::Directory(children) = &mut self.nodes[parent].kind {
            children.insert(name.to_string(), id);
        }
        id
    }

    fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        match &self.nodes[id].kind {
            NodeKind::Directory(children) => children.get(name).copied(),
            NodeKind::File(_) => None,
        }
    }

    fn lookup(&self, parts: &[String]) -> Option<NodeId> {
        parts.iter().try_fold(ROOT, |id, name| self.child(id, name))
    }

    pub fn root(&self) -> RecordPath<'_> {
        RecordPath { tree: self, parts: Vec::new(), node: Some(ROOT) }
    }

    pub fn top_level_dirs(&self) -> Vec<&str> {
        match &self.nodes[ROOT].kind {
            NodeKind::Directory(children) => children
                .iter()
                .filter(|(_, id)| matches!(self.nodes[**id].kind, NodeKind::Directory(_)))
                .map(|(name, _)| name.as_str())
                .collect(),
            NodeKind::File(_) => Vec::new(),
        }
    }

    /// Number of declared or implied nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// A position in a [`ManifestTree`], declared or virtual.
#[derive(Clone)]
pub struct RecordPath<'a> {
    tree: &'a ManifestTree,
    parts: Vec<String>,
    node: Option<NodeId>,
}

impl<'a> RecordPath<'a> {
    pub(crate) fn virtual_child(&self, name: &str) -> Self {
        let mut parts = self.parts.clone();
        parts.push(name.to_string());
        RecordPath { tree: self.tree, parts, node: None }
    }

    fn from_node(tree: &'a ManifestTree, id: NodeId) -> Self {
        RecordPath { tree, parts: tree.nodes[id].parts.clone(), node: Some(id) }
    }

    pub fn exists(&self) -> bool {
        self.node.is_some()
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind(), Some(NodeKind::File(_)))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind(), Some(NodeKind::Directory(_)))
    }

    pub fn path_type(&self) -> Result<PathType, PathError> {
        match self.kind() {
            Some(NodeKind::File(_)) => Ok(PathType::File),
            Some(NodeKind::Directory(_)) => Ok(PathType::Directory),
            None => Err(PathError::NoSuchPath(self.as_posix())),
        }
    }

    /// `None` for directories, virtual paths and null entries.
    pub fn filedata(&self) -> Option<&'a FileRecord> {
        match self.node.map(|id| &self.tree.nodes[id].kind) {
            Some(NodeKind::File(record)) => record.as_ref(),
            _ => None,
        }
    }

    pub fn iterdir(&self) -> Result<Vec<RecordPath<'a>>, PathError> {
        match self.kind() {
            Some(NodeKind::Directory(children)) => {
                Ok(children.values().map(|&id| RecordPath::from_node(self.tree, id)).collect())
            }
            Some(NodeKind::File(_)) => Err(PathError::NotDirectory(self.as_posix())),
            None => Err(PathError::NoSuchPath(self.as_posix())),
        }
    }

    pub fn walk_files(&self) -> Vec<RecordPath<'a>> {
        let mut out = Vec::new();
        let mut stack: Vec<RecordPath<'a>> = vec![self.clone()];
        while let Some(p) = stack.pop() {
            if p.is_file() {
                out.push(p);
            } else if let Ok(children) = p.iterdir() {
                stack.extend(children.into_iter().rev());
            }
        }
        out
    }

    pub fn tree(&self) -> &'a ManifestTree {
        self.tree
    }

    fn kind(&self) -> Option<&'a NodeKind> {
        self.node.map(|id| &self.tree.nodes[id].kind)
    }
}

impl<'a> PurePath for RecordPath<'a> {
    fn parts(&self) -> &[String] {
        &self.parts
    }

    fn parent(&self) -> Self {
        match self.node {
            Some(id) => RecordPath::from_node(self.tree, self.tree.nodes[id].parent),
            None => {
                let parts = self.parts[..self.parts.len().saturating_sub(1)].to_vec();
                let node = self.tree.lookup(&parts);
                RecordPath { tree: self.tree, parts, node }
            }
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
            _ => Ok(match self.node.and_then(|id| self.tree.child(id, name)) {
                Some(id) => RecordPath::from_node(self.tree, id),
                None => self.virtual_child(name),
            }),
        }
    }
}

impl PartialEq for RecordPath<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.parts == other.parts
    }
}

impl Eq for RecordPath<'_> {}

impl fmt::Debug for RecordPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordPath")
            .field("path", &self.as_posix())
            .field("exists", &self.exists())
            .finish()
    }
}

impl fmt::Display for RecordPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_posix())
    }
}
