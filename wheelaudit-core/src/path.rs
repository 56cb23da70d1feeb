//! Path algebra shared by every path-bearing type.

use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("absolute paths not allowed: {0:?}")]
    AbsolutePath(String),
    #[error("empty pattern")]
    EmptyPattern,
    #[error("invalid glob pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("invalid suffix: {0:?}")]
    InvalidSuffix(String),
    #[error("path has an empty name")]
    EmptyName,
    #[error("invalid filename: {0:?}")]
    InvalidName(String),
    #[error("not a directory: {0:?}")]
    NotDirectory(String),
    #[error("no such path: {0:?}")]
    NoSuchPath(String),
}

/// What a path resolves to, either in a manifest or in a backing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    File,
    Directory,
    /// Symlinks that are not followed, devices, sockets, ...
    Other,
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PathType::File => "file",
            PathType::Directory => "directory",
            PathType::Other => "other",
        })
    }
}

/// Split a relative `/`-separated path into its non-empty segments.
pub fn split_path(path: &str) -> Result<Vec<&str>, PathError> {
    if path.starts_with('/') {
        return Err(PathError::AbsolutePath(path.to_string()));
    }
    Ok(path.split('/').filter(|s| !s.is_empty()).collect())
}

/// Rewrite one fnmatch segment into globset syntax. Braces are literal and an
/// unclosed `[` matches itself.
fn fnmatch_to_glob(seg: &str) -> String {
    let chars: Vec<char> = seg.chars().collect();
    let mut out = String::with_capacity(seg.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
                out.push('*');
            }
            '[' => {
                let mut j = i + 1;
                if chars.get(j) == Some(&'!') {
                    j += 1;
                }
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                match chars[j.min(chars.len())..].iter().position(|&c| c == ']') {
                    Some(off) => {
                        let end = j + off;
                        out.extend(&chars[i..=end]);
                        i = end;
                    }
                    None => out.push_str("[[]"),
                }
            }
            c @ ('{' | '}' | ']') => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            c => out.push(c),
        }
        i += 1;
    }
    out
}

/// Shared path algebra. `parent` of a root is the root itself.
pub trait PurePath: Sized + Clone {
    /// Measured from the root of the whole tree.
    fn parts(&self) -> &[String];

    fn parent(&self) -> Self;

    fn get_subpath(&self, name: &str) -> Result<Self, PathError>;

    fn is_root(&self) -> bool {
        self.parts().is_empty()
    }

    fn name(&self) -> &str {
        self.parts().last().map(String::as_str).unwrap_or("")
    }

    fn as_posix(&self) -> String {
        self.parts().join("/")
    }

    fn join(&self, path: &str) -> Result<Self, PathError> {
        let mut p = self.clone();
        for seg in split_path(path)? {
            p = p.get_subpath(seg)?;
        }
        Ok(p)
    }

    fn join_all<'s, I>(&self, paths: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut p = self.clone();
        for q in paths {
            p = p.join(q)?;
        }
        Ok(p)
    }

    /// Ancestors, nearest first, ending at the root. Empty for the root.
    fn parents(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut p = self.clone();
        while !p.is_root() {
            p = p.parent();
            out.push(p.clone());
        }
        out
    }

    fn root_path(&self) -> Self {
        let mut p = self.clone();
        while !p.is_root() {
            p = p.parent();
        }
        p
    }

    fn suffix(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(i) if i > 0 && i < name.len() - 1 => &name[i..],
            _ => "",
        }
    }

    fn suffixes(&self) -> Vec<String> {
        let name = self.name();
        if name.ends_with('.') {
            return Vec::new();
        }
        name.trim_start_matches('.').split('.').skip(1).map(|s| format!(".{s}")).collect()
    }

    fn stem(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(i) if i > 0 && i < name.len() - 1 => &name[..i],
            _ => name,
        }
    }

    fn with_name(&self, name: &str) -> Result<Self, PathError> {
        self.parent().join(name)
    }

    fn with_stem(&self, stem: &str) -> Result<Self, PathError> {
        let name = format!("{stem}{}", self.suffix());
        self.with_name(&name)
    }

    fn with_suffix(&self, suffix: &str) -> Result<Self, PathError> {
        if suffix.contains('/') || (!suffix.is_empty() && !suffix.starts_with('.')) || suffix == "."
        {
            return Err(PathError::InvalidSuffix(suffix.to_string()));
        }
        let name = self.name();
        if name.is_empty() {
            return Err(PathError::EmptyName);
        }
        let old = self.suffix();
        let new_name = format!("{}{suffix}", &name[..name.len() - old.len()]);
        self.with_name(&new_name)
    }

    /// Right-aligned, per-segment shell-style glob match.
    fn match_glob(&self, pattern: &str) -> Result<bool, PathError> {
        let pats = split_path(pattern)?;
        if pats.is_empty() {
            return Err(PathError::EmptyPattern);
        }
        let matchers = pats
            .iter()
            .map(|pat| {
                GlobBuilder::new(&fnmatch_to_glob(pat))
                    .literal_separator(true)
                    .backslash_escape(false)
                    .build()
                    .map(|g| g.compile_matcher())
                    .map_err(|e| PathError::InvalidPattern {
                        pattern: pattern.to_string(),
                        message: e.kind().to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let parts = self.parts();
        if pats.len() > parts.len() {
            return Ok(false);
        }
        for (part, m) in parts.iter().rev().zip(matchers.iter().rev()) {
            if !m.is_match(part.as_str()) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A path with no backing at all: just the segments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentPath {
    parts: Vec<String>,
}

impl SegmentPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(path: &str) -> Result<Self, PathError> {
        Self::root().join(path)
    }
}

impl PurePath for SegmentPath {
    fn parts(&self) -> &[String] {
        &self.parts
    }

    fn parent(&self) -> Self {
        let mut parts = self.parts.clone();
        parts.pop();
        Self { parts }
    }

    fn get_subpath(&self, name: &str) -> Result<Self, PathError> {
        match name {
            "" => Err(PathError::InvalidName(name.to_string())),
            n if n.contains('/') => Err(PathError::InvalidName(name.to_string())),
            "." => Ok(self.clone()),
            ".." => Ok(self.parent()),
            n => {
                let mut parts = self.parts.clone();
                parts.push(n.to_string());
                Ok(Self { parts })
            }
        }
    }
}

impl fmt::Display for SegmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_posix())
    }
}
