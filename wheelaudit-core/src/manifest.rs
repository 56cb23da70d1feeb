use crate::layout::{find_special_dir, is_dist_info_path, SpecialDir, SpecialDirError};
use crate::path::{PathError, PurePath};
use crate::record::{parse_row, FileRecord, RecordError};
use crate::tree::{ManifestTree, RecordPath};
use serde::ser::{Serialize, Serializer};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::OnceLock;
use tracing::debug;

/// A parsed RECORD: entries in file order plus the tree they describe.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    entries: Vec<(String, Option<FileRecord>)>,
    index: HashMap<String, usize>,
    tree: ManifestTree,
    dist_info: OnceLock<Result<String, SpecialDirError>>,
    data: OnceLock<Result<Option<String>, SpecialDirError>>,
}

impl Manifest {
    /// Parse RECORD bytes. Stops at the first malformed row.
    pub fn parse<R: Read>(reader: R) -> Result<Self, RecordError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(b',')
            .quote(b'"')
            .from_reader(reader);
        let mut manifest = Manifest::default();
        for row in rdr.records() {
            let row = row?;
            let fields: Vec<&str> = row.iter().collect();
            let (path, record) = parse_row(&fields)?;
            manifest.push_checked(path, record)?;
        }
        debug!(entries = manifest.len(), nodes = manifest.tree.node_count(), "parsed RECORD");
        Ok(manifest)
    }

    pub fn from_entries<I>(entries: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = (String, Option<FileRecord>)>,
    {
        let mut manifest = Manifest::default();
        for (path, record) in entries {
            let fields = [
                path.clone(),
                record.as_ref().map(FileRecord::digest_field).unwrap_or_default(),
                record.as_ref().map(|r| r.size().to_string()).unwrap_or_default(),
            ];
            parse_row(&fields)?;
            manifest.push_checked(path, record)?;
        }
        Ok(manifest)
    }

    fn push_checked(&mut self, path: String, record: Option<FileRecord>) -> Result<(), RecordError> {
        if record.is_none() && !path.ends_with('/') && !is_dist_info_path(&path, "RECORD") {
            return Err(RecordError::NullEntry(path));
        }
        if let Some(&i) = self.index.get(&path) {
            return if self.entries[i].1 == record { Ok(()) } else { Err(RecordError::Conflict(path)) };
        }
        self.tree.insert(&path, record.clone())?;
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path, record));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// `None` if undeclared; `Some(None)` for a directory or null entry.
    pub fn get(&self, path: &str) -> Option<Option<&FileRecord>> {
        self.index.get(path).map(|&i| self.entries[i].1.as_ref())
    }

    /// Entries in RECORD order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FileRecord>)> + '_ {
        self.entries.iter().map(|(p, r)| (p.as_str(), r.as_ref()))
    }

    pub fn filetree(&self) -> &ManifestTree {
        &self.tree
    }

    /// Resolve `path` in the tree without modifying it.
    pub fn record_path(&self, path: &str) -> Result<RecordPath<'_>, PathError> {
        self.tree.root().join(path)
    }

    pub fn dist_info_dirname(&self) -> Result<&str, SpecialDirError> {
        self.dist_info
            .get_or_init(|| {
                find_special_dir(SpecialDir::DistInfo, self.tree.top_level_dirs(), None, true)
                    .map(Option::unwrap_or_default)
            })
            .as_ref()
            .map(String::as_str)
            .map_err(Clone::clone)
    }

    pub fn data_dirname(&self) -> Result<Option<&str>, SpecialDirError> {
        self.data
            .get_or_init(|| find_special_dir(SpecialDir::Data, self.tree.top_level_dirs(), None, false))
            .as_ref()
            .map(Option::as_deref)
            .map_err(Clone::clone)
    }

    /// Serialise back to RECORD form.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        for (path, record) in self.iter() {
            let digest = record.map(FileRecord::digest_field).unwrap_or_default();
            let size = record.map(|r| r.size().to_string()).unwrap_or_default();
            wtr.write_record([path, digest.as_str(), size.as_str()])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}
