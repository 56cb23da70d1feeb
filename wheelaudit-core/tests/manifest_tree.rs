use proptest::prelude::*;
use wheelaudit_core::path::{PathError, PathType, PurePath};
use wheelaudit_core::tree::ManifestTree;
use wheelaudit_core::digest::Algorithm;
use wheelaudit_core::{FileRecord, Manifest, RecordError};

const Z: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

fn sample() -> Manifest {
    let text = format!(
        "pkg/__init__.py,sha256={Z},0\n\
         pkg/sub/mod.py,sha256={Z},0\n\
         pkg/sub/data.bin,sha256={Z},0\n\
         pkg/empty/,,\n\
         demo-1.0.dist-info/METADATA,sha256={Z},0\n\
         demo-1.0.dist-info/RECORD,,\n"
    );
    Manifest::parse(text.as_bytes()).unwrap()
}

#[test]
fn intermediate_directories_are_implied() {
    let m = sample();
    let root = m.filetree().root();
    assert!(root.is_root());
    assert_eq!(root.path_type().unwrap(), PathType::Directory);

    let names: Vec<String> = root.iterdir().unwrap().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["demo-1.0.dist-info", "pkg"]);

    let sub = m.record_path("pkg/sub").unwrap();
    assert!(sub.is_dir());
    assert!(sub.filedata().is_none());
    let children: Vec<String> = sub.iterdir().unwrap().iter().map(|p| p.as_posix()).collect();
    assert_eq!(children, vec!["pkg/sub/data.bin", "pkg/sub/mod.py"]);
    assert_eq!(m.filetree().top_level_dirs(), vec!["demo-1.0.dist-info", "pkg"]);
}

#[test]
fn files_carry_records_and_refuse_children() {
    let m = sample();
    let f = m.record_path("pkg/sub/mod.py").unwrap();
    assert!(f.is_file());
    assert_eq!(f.filedata().unwrap().size(), 0);
    assert!(matches!(f.iterdir(), Err(PathError::NotDirectory(_))));
    assert!(matches!(f.get_subpath("x"), Err(PathError::NotDirectory(_))));
    assert!(matches!(m.record_path("pkg/sub/mod.py/x"), Err(PathError::NotDirectory(_))));

    let own = m.record_path("demo-1.0.dist-info/RECORD").unwrap();
    assert!(own.is_file());
    assert!(own.filedata().is_none());
}

#[test]
fn probing_undeclared_paths_does_not_grow_the_tree() {
    let m = sample();
    let before = m.filetree().node_count();

    let ghost = m.record_path("pkg/nope/deeper/file.txt").unwrap();
    assert!(!ghost.exists());
    assert!(!ghost.is_file());
    assert!(!ghost.is_dir());
    assert!(matches!(ghost.path_type(), Err(PathError::NoSuchPath(p)) if p == "pkg/nope/deeper/file.txt"));
    assert!(matches!(ghost.iterdir(), Err(PathError::NoSuchPath(_))));
    assert_eq!(ghost.as_posix(), "pkg/nope/deeper/file.txt");

    // walking back up lands on real nodes again
    let pkg = ghost.parent().parent().parent();
    assert!(pkg.exists());
    assert_eq!(pkg, m.record_path("pkg").unwrap());
    assert_eq!(m.filetree().node_count(), before);
}

#[test]
fn dot_segments_navigate() {
    let m = sample();
    let p = m.record_path("pkg/./sub/../sub/mod.py").unwrap();
    assert_eq!(p, m.record_path("pkg/sub/mod.py").unwrap());
    assert_eq!(m.record_path("..").unwrap(), m.filetree().root());
    assert!(matches!(m.record_path("/pkg"), Err(PathError::AbsolutePath(_))));
    assert!(matches!(m.filetree().root().get_subpath(""), Err(PathError::InvalidName(_))));
}

#[test]
fn walk_files_is_depth_first_in_name_order() {
    let m = sample();
    let files: Vec<String> = m.filetree().root().walk_files().iter().map(|p| p.as_posix()).collect();
    assert_eq!(
        files,
        vec![
            "demo-1.0.dist-info/METADATA",
            "demo-1.0.dist-info/RECORD",
            "pkg/__init__.py",
            "pkg/sub/data.bin",
            "pkg/sub/mod.py",
        ]
    );
    let empty = m.record_path("pkg/empty").unwrap();
    assert!(empty.is_dir());
    assert!(empty.walk_files().is_empty());
}

#[test]
fn paths_from_different_trees_differ() {
    let a = sample();
    let b = sample();
    assert_ne!(a.record_path("pkg").unwrap(), b.record_path("pkg").unwrap());
    assert!(std::ptr::eq(a.record_path("pkg").unwrap().tree(), a.filetree()));
}

#[test]
fn tree_insert_conflicts() {
    let mut t = ManifestTree::new();
    t.insert("a/b", None).unwrap();
    t.insert("a/b", None).unwrap();
    assert_eq!(t.insert("a/b/c", None).unwrap_err().kind(), "Conflict");
    assert_eq!(t.insert("a/b/", None).unwrap_err().kind(), "Conflict");
    t.insert("a/", None).unwrap();
    assert_eq!(t.insert("a", None).unwrap_err().kind(), "Conflict");
    assert_eq!(t.insert("", None).unwrap_err().kind(), "EmptyPath");
}

type Row = (String, Option<FileRecord>);

/// Distinct file rows in random order, plus a row index and an insertion slot.
fn shuffled_rows() -> impl Strategy<Value = (Vec<Row>, usize, usize)> {
    prop::collection::btree_set("[a-z]{1,3}(/[a-z]{1,3}){0,2}\\.py", 1..10)
        .prop_map(|paths| {
            paths
                .into_iter()
                .enumerate()
                .map(|(i, p)| (p, FileRecord::from_bytes(Algorithm::Sha256, &[i as u8; 32], i as u64)))
                .collect::<Vec<Row>>()
        })
        .prop_shuffle()
        .prop_flat_map(|rows| {
            let n = rows.len();
            (Just(rows), 0..n, 0..=n)
        })
}

proptest! {
    #[test]
    fn repeated_identical_row_is_absorbed((rows, dup, at) in shuffled_rows()) {
        let once = Manifest::from_entries(rows.clone()).unwrap();
        let mut twice = rows.clone();
        twice.insert(at, rows[dup].clone());
        let m = Manifest::from_entries(twice).unwrap();
        prop_assert_eq!(m.len(), once.len());
        prop_assert_eq!(m.filetree().node_count(), once.filetree().node_count());
        for (path, record) in &rows {
            prop_assert_eq!(m.record_path(path).unwrap().filedata(), record.as_ref());
        }
    }

    #[test]
    fn repeated_row_with_other_digest_conflicts((rows, dup, at) in shuffled_rows()) {
        let (path, _) = rows[dup].clone();
        let other = FileRecord::from_bytes(Algorithm::Sha256, &[0xff; 32], 1 << 20);
        let mut rows = rows;
        rows.insert(at, (path.clone(), other));
        let err = Manifest::from_entries(rows).unwrap_err();
        prop_assert!(matches!(&err, RecordError::Conflict(p) if *p == path), "{:?}", err);
    }

    #[test]
    fn probing_is_read_only(probes in prop::collection::vec("[a-z]{1,3}(/[a-z]{1,3}){0,3}", 1..20)) {
        let m = sample();
        let before = m.filetree().node_count();
        for p in &probes {
            let _ = m.record_path(p);
        }
        prop_assert_eq!(m.filetree().node_count(), before);
    }

    #[test]
    fn parent_of_child_is_self(name in "[a-z]{1,6}") {
        let m = sample();
        for dir in ["", "pkg", "pkg/sub", "ghost"] {
            let d = m.record_path(dir).unwrap();
            let c = d.get_subpath(&name).unwrap();
            prop_assert_eq!(c.parent(), d);
        }
    }
}
