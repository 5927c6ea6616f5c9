//! End to end runs of the command line tools.

use std::{fs, path::Path, process::Command};

use bowtest::{descriptor_file::write_descriptor_file, Desc, Orb};

const COMPUTE_DISTANCE: &str = env!("CARGO_BIN_EXE_compute_distance");
const TEST_VOC: &str = env!("CARGO_BIN_EXE_test_voc");

fn node(parent: usize, leaf: u8, byte: u8, weight: &str) -> String {
    let desc = vec![byte.to_string(); 32].join(" ");
    format!("{} {} {} {}\n", parent, leaf, desc, weight)
}

fn write_vocabulary(path: &Path) {
    let mut s = String::from("2 1 0 0\n");
    s += &node(0, 1, 0, "1");
    s += &node(0, 1, 255, "1");
    fs::write(path, s).unwrap();
}

fn write_frames(path: &Path) {
    let frames: Vec<Vec<Desc>> = vec![vec![[0; 32]], vec![[255; 32]], vec![[0; 32], [1; 32]]];
    write_descriptor_file::<Orb, _>(path, &frames).unwrap();
}

#[test]
fn compute_distance_writes_table() {
    let dir = tempfile::tempdir().unwrap();
    let gt = dir.path().join("gt.txt");
    fs::write(&gt, "1 0 0 0 0 1 0 0 0 0 1 0\n".repeat(5)).unwrap();
    let out = dir.path().join("dist");

    let status = Command::new(COMPUTE_DISTANCE)
        .arg(&gt)
        .arg(&out)
        .args(["--reference", "0"])
        .status()
        .unwrap();
    assert!(status.success());

    let text = fs::read_to_string(dir.path().join("dist.dat")).unwrap();
    assert_eq!(text, "#frame dist\n0 0\n1 0\n2 0\n3 0\n4 0\n");
}

#[test]
fn compute_distance_wrong_argument_count() {
    let status = Command::new(COMPUTE_DISTANCE).arg("only_one").status().unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn compute_distance_default_reference_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let gt = dir.path().join("gt.txt");
    fs::write(&gt, "1 0 0 0 0 1 0 0 0 0 1 0\n").unwrap();
    let out = dir.path().join("dist");
    let status = Command::new(COMPUTE_DISTANCE).arg(&gt).arg(&out).status().unwrap();
    assert_eq!(status.code(), Some(1));
    assert!(!dir.path().join("dist.dat").exists());
}

#[test]
fn test_voc_writes_matches() {
    let dir = tempfile::tempdir().unwrap();
    let voc = dir.path().join("voc.txt");
    let desc = dir.path().join("desc.bin");
    write_vocabulary(&voc);
    write_frames(&desc);
    let out = dir.path().join("scores");

    let status = Command::new(TEST_VOC)
        .arg(&voc)
        .arg(&desc)
        .arg("orb")
        .arg(&out)
        .args(["--matching-image", "0"])
        .status()
        .unwrap();
    assert!(status.success());

    let text = fs::read_to_string(dir.path().join("scores.dat")).unwrap();
    assert_eq!(text, "#x y\n0 1\n2 1\n");
}

#[test]
fn test_voc_console_only_without_output_name() {
    let dir = tempfile::tempdir().unwrap();
    let voc = dir.path().join("voc.txt");
    let desc = dir.path().join("desc.bin");
    write_vocabulary(&voc);
    write_frames(&desc);

    let output = Command::new(TEST_VOC).arg(&voc).arg(&desc).arg("orb").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Image 0 vs Image 1: 0\n"));
    assert!(stdout.contains("Searching for Image 2."));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn test_voc_missing_vocabulary() {
    let dir = tempfile::tempdir().unwrap();
    let desc = dir.path().join("desc.bin");
    write_frames(&desc);
    let out = dir.path().join("scores");

    let output = Command::new(TEST_VOC)
        .arg(dir.path().join("missing.txt"))
        .arg(&desc)
        .arg("orb")
        .arg(&out)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot load vocabulary"));
    assert!(!dir.path().join("scores.dat").exists());
}

#[test]
fn test_voc_rejects_unknown_feature_type() {
    let status = Command::new(TEST_VOC).args(["voc.txt", "desc.bin", "sift"]).status().unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_voc_wrong_argument_count() {
    let status = Command::new(TEST_VOC).args(["voc.txt"]).status().unwrap();
    assert_eq!(status.code(), Some(1));
    let status = Command::new(TEST_VOC)
        .args(["voc.txt", "desc.bin", "cnn", "out", "extra"])
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}
