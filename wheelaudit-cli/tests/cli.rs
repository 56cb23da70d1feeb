use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use predicates::prelude::*;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use std::process::Command;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const DIST_INFO: &str = "demo-1.0.dist-info";
const WHEEL_NAME: &str = "demo-1.0-py3-none-any.whl";

fn files() -> Vec<(String, Vec<u8>)> {
    vec![
        ("demo/__init__.py".into(), b"from .core import run\n".to_vec()),
        ("demo/core.py".into(), b"def run():\n    return 42\n".to_vec()),
        (format!("{DIST_INFO}/METADATA"), b"Metadata-Version: 2.1\nName: demo\nVersion: 1.0\n".to_vec()),
        (format!("{DIST_INFO}/WHEEL"), b"Wheel-Version: 1.0\nRoot-Is-Purelib: true\n".to_vec()),
    ]
}

fn record_for(files: &[(String, Vec<u8>)]) -> String {
    let mut s = String::new();
    for (p, d) in files {
        let digest = URL_SAFE_NO_PAD.encode(Sha256::digest(d));
        s.push_str(&format!("{p},sha256={digest},{}\n", d.len()));
    }
    s.push_str(&format!("{DIST_INFO}/RECORD,,\n"));
    s
}

fn with_record(files: Vec<(String, Vec<u8>)>) -> Vec<(String, Vec<u8>)> {
    let record = record_for(&files);
    let mut out = files;
    out.push((format!("{DIST_INFO}/RECORD"), record.into_bytes()));
    out
}

fn zip_bytes(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        zw.start_file(name.as_str(), SimpleFileOptions::default()).unwrap();
        zw.write_all(data).unwrap();
    }
    zw.finish().unwrap().into_inner()
}

fn wheelaudit() -> Command {
    Command::cargo_bin("wheelaudit").unwrap()
}

fn good_wheel(td: &assert_fs::TempDir) -> assert_fs::fixture::ChildPath {
    let whl = td.child(WHEEL_NAME);
    whl.write_binary(&zip_bytes(&with_record(files()))).unwrap();
    whl
}

fn tampered_wheel(td: &assert_fs::TempDir, name: &str) -> assert_fs::fixture::ChildPath {
    let mut f = with_record(files());
    f[1].1 = b"def run():\n    return 43\n".to_vec();
    let whl = td.child(name);
    whl.write_binary(&zip_bytes(&f)).unwrap();
    whl
}

#[test]
fn verify_good_wheel_exits_zero() {
    let td = assert_fs::TempDir::new().unwrap();
    let whl = good_wheel(&td);
    wheelaudit()
        .args(["verify", whl.path().to_str().unwrap()])
        .assert()
        .code(0)
        .stdout(predicate::str::contains(format!("{WHEEL_NAME}: OK")));
}

#[test]
fn tampered_wheel_exits_one() {
    let td = assert_fs::TempDir::new().unwrap();
    let whl = tampered_wheel(&td, WHEEL_NAME);
    wheelaudit()
        .args(["verify", whl.path().to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAILED"))
        .stdout(predicate::str::contains("sha256 digest of file demo/core.py"));

    wheelaudit()
        .args(["verify", "--no-digests", whl.path().to_str().unwrap()])
        .assert()
        .code(0);
}

#[test]
fn json_reports_one_line_per_input() {
    let td = assert_fs::TempDir::new().unwrap();
    let good = good_wheel(&td);
    let sub = td.child("bad");
    sub.create_dir_all().unwrap();
    let bad = sub.child(WHEEL_NAME);
    bad.write_binary(&std::fs::read(tampered_wheel(&td, "tmp.whl").path()).unwrap()).unwrap();

    let out = wheelaudit()
        .args(["verify", "--json", good.path().to_str().unwrap(), bad.path().to_str().unwrap()])
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    let lines: Vec<serde_json::Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["ok"], true);
    assert_eq!(lines[1]["ok"], false);
    assert_eq!(lines[1]["report"]["discrepancies"][0]["kind"], "DigestMismatch");
    assert_eq!(lines[1]["report"]["discrepancies"][0]["path"], "demo/core.py");
}

#[test]
fn all_discrepancies_lists_every_problem() {
    let td = assert_fs::TempDir::new().unwrap();
    let mut f = with_record(files());
    f[0].1.push(b'#');
    f.push(("demo/stray.py".into(), Vec::new()));
    let whl = td.child(WHEEL_NAME);
    whl.write_binary(&zip_bytes(&f)).unwrap();

    wheelaudit()
        .args(["verify", "--all-discrepancies", whl.path().to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Size of file demo/__init__.py"))
        .stdout(predicate::str::contains("File not declared in RECORD: demo/stray.py"));
}

#[test]
fn malformed_record_exits_two() {
    let td = assert_fs::TempDir::new().unwrap();
    let mut f = files();
    f.push((format!("{DIST_INFO}/RECORD"), b"demo/core.py,md5=abcdefabcdefabcdefabcd,25\n".to_vec()));
    let whl = td.child(WHEEL_NAME);
    whl.write_binary(&zip_bytes(&f)).unwrap();

    wheelaudit()
        .args(["verify", whl.path().to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Malformed RECORD (demo/core.py)"))
        .stderr(predicate::str::contains("weak digest algorithm"));

    wheelaudit()
        .args(["verify", "--json", whl.path().to_str().unwrap()])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"code\":\"WeakAlgorithm\""));
}

#[test]
fn unreadable_input_exits_two() {
    let td = assert_fs::TempDir::new().unwrap();
    let junk = td.child(WHEEL_NAME);
    junk.write_str("not a zip").unwrap();
    wheelaudit()
        .args(["verify", junk.path().to_str().unwrap(), td.child("absent.whl").path().to_str().unwrap()])
        .assert()
        .code(2);
}

#[test]
fn unpacked_directory_verifies() {
    let td = assert_fs::TempDir::new().unwrap();
    let root = td.child("unpacked");
    for (name, data) in with_record(files()) {
        root.child(name).write_binary(&data).unwrap();
    }
    wheelaudit()
        .args(["verify", "--wheel-name", WHEEL_NAME, root.path().to_str().unwrap()])
        .assert()
        .code(0);

    root.child("demo/extra.py").write_str("x = 1\n").unwrap();
    wheelaudit()
        .args(["verify", root.path().to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("demo/extra.py"));

    wheelaudit()
        .args(["verify", "--wheel-name", "other-1.0-py3-none-any.whl", root.path().to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("do not match wheel name"));
}

#[test]
fn record_subcommand_prints_csv_and_json() {
    let td = assert_fs::TempDir::new().unwrap();
    let whl = good_wheel(&td);
    let expected = record_for(&files());
    wheelaudit()
        .args(["record", "--csv", whl.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::eq(expected));

    let out = wheelaudit()
        .args(["record", whl.path().to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["demo/core.py"]["size"], 25);
    assert_eq!(v["demo/core.py"]["algorithm"], "sha256");
    assert!(v[format!("{DIST_INFO}/RECORD")].is_null());
}

#[test]
fn record_of_bare_dist_info_directory() {
    let td = assert_fs::TempDir::new().unwrap();
    let root = td.child("unpacked");
    for (name, data) in with_record(files()) {
        root.child(name).write_binary(&data).unwrap();
    }
    wheelaudit()
        .args(["record", "--csv", root.child(DIST_INFO).path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("demo/__init__.py,sha256="));
}

#[test]
fn tree_subcommand_lists_files() {
    let td = assert_fs::TempDir::new().unwrap();
    let whl = good_wheel(&td);
    let path = whl.path().to_str().unwrap();

    wheelaudit()
        .args(["tree", "--list", path])
        .assert()
        .success()
        .stdout(predicate::eq("ALL\nPURELIB\nDIST_INFO\n"));
    wheelaudit()
        .args(["tree", path])
        .assert()
        .success()
        .stdout(predicate::eq("demo/__init__.py\ndemo/core.py\n"));
    wheelaudit()
        .args(["tree", "--tree", "DIST_INFO", "--match", "W*", path])
        .assert()
        .success()
        .stdout(predicate::eq("WHEEL\n"));
    wheelaudit()
        .args(["tree", "--tree", "scripts", path])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no scripts tree"));
}
