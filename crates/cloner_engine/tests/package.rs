use std::fs::{self, File};
use std::io::Read;

use cloner_engine::{package, write_manifest, Manifest, Workspace, MANIFEST_FILENAME};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use zip::ZipArchive;

fn sample_manifest() -> Manifest {
    Manifest {
        cloned_from: "https://example.com".to_string(),
        timestamp_utc: "2024-03-09T14:05:07Z".to_string(),
        total_files_downloaded: 3,
        downloaded_bytes: 12,
        zip_name: "clone_20240309140507_1_0.zip".to_string(),
    }
}

#[test]
fn manifest_is_written_as_json() {
    let temp = TempDir::new().unwrap();
    let workspace = Workspace::create(temp.path(), "clone_a").unwrap();

    let path = write_manifest(&workspace, &sample_manifest()).unwrap();
    assert_eq!(path, workspace.root().join(MANIFEST_FILENAME));

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["cloned_from"], "https://example.com");
    assert_eq!(value["timestamp_utc"], "2024-03-09T14:05:07Z");
    assert_eq!(value["total_files_downloaded"], 3);
    assert_eq!(value["downloaded_bytes"], 12);
    assert_eq!(value["zip_name"], "clone_20240309140507_1_0.zip");
}

#[test]
fn archive_holds_every_file_with_relative_names() {
    let temp = TempDir::new().unwrap();
    let workspace = Workspace::create(temp.path(), "clone_b").unwrap();
    workspace.write_file("index.html", b"<html></html>").unwrap();
    workspace.write_file("example.com/img/logo.png", b"PNG").unwrap();
    write_manifest(&workspace, &sample_manifest()).unwrap();

    let archive_path = temp.path().join("clone_b.zip");
    let summary = package(workspace.root(), &archive_path).unwrap();
    assert_eq!(summary.archive_path, archive_path);
    assert_eq!(
        summary.entries,
        vec!["example.com/img/logo.png", "index.html", "info.json"]
    );

    let mut archive = ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, summary.entries);

    let mut logo = String::new();
    archive
        .by_name("example.com/img/logo.png")
        .unwrap()
        .read_to_string(&mut logo)
        .unwrap();
    assert_eq!(logo, "PNG");
}

#[test]
fn failed_packaging_leaves_no_archive() {
    let temp = TempDir::new().unwrap();
    let archive_path = temp.path().join("broken.zip");

    assert!(package(&temp.path().join("does-not-exist"), &archive_path).is_err());
    assert!(!archive_path.exists());
}
