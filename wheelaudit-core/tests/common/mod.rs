#![allow(dead_code)]

use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use std::path::Path;
use wheelaudit_core::digest::Algorithm;
use wheelaudit_core::record::FileRecord;
use wheelaudit_core::ZipBacking;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const DIST_INFO: &str = "demo-1.0.dist-info";

pub const WHEEL: &str = "Wheel-Version: 1.0\nGenerator: test\nRoot-Is-Purelib: true\nTag: py3-none-any\n";

pub fn sha256_record(data: &[u8]) -> FileRecord {
    let d = Sha256::digest(data);
    FileRecord::from_bytes(Algorithm::Sha256, &d, data.len() as u64).unwrap()
}

/// One RECORD line declaring `data` at `path`.
pub fn record_row(path: &str, data: &[u8]) -> String {
    let r = sha256_record(data);
    format!("{path},{},{}\n", r.digest_field(), r.size())
}

/// RECORD text for `files` plus the self-entry.
pub fn record_for(files: &[(&str, &[u8])]) -> String {
    let mut s = String::new();
    for (p, d) in files {
        if p.ends_with('/') {
            s.push_str(&format!("{p},,\n"));
        } else {
            s.push_str(&record_row(p, d));
        }
    }
    s.push_str(&format!("{DIST_INFO}/RECORD,,\n"));
    s
}

/// Default wheel contents: a package, METADATA and WHEEL.
pub fn demo_files() -> Vec<(String, Vec<u8>)> {
    vec![
        ("demo/__init__.py".into(), b"from .core import run\n".to_vec()),
        ("demo/core.py".into(), b"def run():\n    return 42\n".to_vec()),
        (format!("{DIST_INFO}/METADATA"), b"Metadata-Version: 2.1\nName: demo\nVersion: 1.0\n".to_vec()),
        (format!("{DIST_INFO}/WHEEL"), WHEEL.as_bytes().to_vec()),
    ]
}

/// `files` plus a RECORD declaring exactly them.
pub fn with_record(files: &[(String, Vec<u8>)]) -> Vec<(String, Vec<u8>)> {
    let refs: Vec<(&str, &[u8])> = files.iter().map(|(p, d)| (p.as_str(), d.as_slice())).collect();
    let mut out = files.to_vec();
    out.push((format!("{DIST_INFO}/RECORD"), record_for(&refs).into_bytes()));
    out
}

pub fn zip_bytes(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    for (name, data) in files {
        if name.ends_with('/') {
            zw.add_directory(name.trim_end_matches('/'), opts).unwrap();
        } else {
            zw.start_file(name.as_str(), opts).unwrap();
            zw.write_all(data).unwrap();
        }
    }
    zw.finish().unwrap().into_inner()
}

pub fn zip_backing(files: &[(String, Vec<u8>)]) -> ZipBacking<Cursor<Vec<u8>>> {
    ZipBacking::from_reader(Cursor::new(zip_bytes(files))).unwrap()
}

pub fn write_tree(root: &Path, files: &[(String, Vec<u8>)]) {
    for (name, data) in files {
        let p = root.join(name);
        if name.ends_with('/') {
            std::fs::create_dir_all(&p).unwrap();
            continue;
        }
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, data).unwrap();
    }
}
