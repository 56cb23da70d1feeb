mod common;

use common::*;
use wheelaudit_core::digest::Algorithm;
use wheelaudit_core::path_safety::PathPolicy;
use wheelaudit_core::{BackingError, DirBacking, FileProvider, PathType};

fn unpacked() -> (tempfile::TempDir, DirBacking) {
    let tmp = tempfile::tempdir().unwrap();
    let mut f = demo_files();
    f.push(("demo/empty/".into(), Vec::new()));
    write_tree(tmp.path(), &f);
    let b = DirBacking::new(tmp.path());
    (tmp, b)
}

#[test]
fn lists_regular_files_as_record_paths() {
    let (_tmp, b) = unpacked();
    assert_eq!(
        b.list_files().unwrap(),
        vec![
            format!("{DIST_INFO}/METADATA"),
            format!("{DIST_INFO}/WHEEL"),
            "demo/__init__.py".to_string(),
            "demo/core.py".to_string(),
        ]
    );
    assert_eq!(b.list_top_level_dirs().unwrap(), vec!["demo".to_string(), DIST_INFO.to_string()]);
}

#[test]
fn classify_and_size() {
    let (_tmp, mut b) = unpacked();
    assert_eq!(b.classify("demo").unwrap(), Some(PathType::Directory));
    assert_eq!(b.classify("demo/empty").unwrap(), Some(PathType::Directory));
    assert_eq!(b.classify("demo/core.py").unwrap(), Some(PathType::File));
    assert_eq!(b.classify("demo/missing.py").unwrap(), None);
    // beneath a regular file
    assert_eq!(b.classify("demo/core.py/inner").unwrap(), None);
    assert_eq!(b.classify("").unwrap(), Some(PathType::Directory));

    assert_eq!(b.file_size("demo/core.py").unwrap(), 25);
    assert!(matches!(b.file_size("demo"), Err(BackingError::NotAFile(_))));
    assert!(matches!(b.open("demo/missing.py"), Err(BackingError::NotFound(_))));
    assert_eq!(
        b.digest("demo/core.py", Algorithm::Sha256).unwrap(),
        sha256_record(b"def run():\n    return 42\n").hex_digest()
    );
}

#[test]
fn rejects_escaping_paths() {
    let (_tmp, b) = unpacked();
    assert!(matches!(b.classify("../etc/passwd"), Err(BackingError::InvalidPath(_))));
    assert!(matches!(b.classify("/etc/passwd"), Err(BackingError::InvalidPath(_))));
}

#[cfg(unix)]
#[test]
fn dangling_symlink_is_not_a_file() {
    let (tmp, _) = unpacked();
    std::os::unix::fs::symlink(tmp.path().join("nowhere"), tmp.path().join("demo/dangling"))
        .unwrap();

    let follow = DirBacking::new(tmp.path());
    let files = follow.list_files().unwrap();
    assert!(files.contains(&"demo/core.py".to_string()));
    assert!(!files.contains(&"demo/dangling".to_string()));
    assert_eq!(follow.classify("demo/dangling").unwrap(), None);

    let strict = DirBacking::with_policy(tmp.path(), PathPolicy { follow_symlinks: false });
    assert!(!strict.list_files().unwrap().contains(&"demo/dangling".to_string()));
    assert_eq!(strict.classify("demo/dangling").unwrap(), Some(PathType::Other));
}

#[cfg(unix)]
#[test]
fn symlinks_follow_policy() {
    let (tmp, _) = unpacked();
    std::os::unix::fs::symlink(tmp.path().join("demo/core.py"), tmp.path().join("demo/alias.py"))
        .unwrap();
    std::os::unix::fs::symlink(tmp.path().join("demo"), tmp.path().join("linked")).unwrap();

    let follow = DirBacking::new(tmp.path());
    assert_eq!(follow.classify("demo/alias.py").unwrap(), Some(PathType::File));
    assert_eq!(follow.classify("linked/core.py").unwrap(), Some(PathType::File));
    assert!(follow.list_files().unwrap().contains(&"demo/alias.py".to_string()));
    assert!(follow.list_top_level_dirs().unwrap().contains(&"linked".to_string()));

    let strict = DirBacking::with_policy(tmp.path(), PathPolicy { follow_symlinks: false });
    assert_eq!(strict.classify("demo/alias.py").unwrap(), Some(PathType::Other));
    assert_eq!(strict.classify("linked/core.py").unwrap(), None);
    assert!(matches!(strict.file_size("demo/alias.py"), Err(BackingError::NotAFile(_))));
    assert!(!strict.list_files().unwrap().contains(&"demo/alias.py".to_string()));
    assert!(!strict.list_top_level_dirs().unwrap().contains(&"linked".to_string()));
}
