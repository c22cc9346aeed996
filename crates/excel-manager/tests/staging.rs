//! Staging of the release build into the `npm/` directory.

use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

use excel_manager::{ensure_staged, Arch, ArtifactLocation, Error, Libc, Os, VariantKey};
use pretty_assertions::assert_eq;

fn linux_location(root: &Path) -> ArtifactLocation {
    let variant = VariantKey::new(Os::Linux, Arch::X64, Libc::Gnu);
    ArtifactLocation::new(root, "excel_manager", variant).unwrap()
}

fn write_source(location: &ArtifactLocation, contents: &[u8]) {
    fs::create_dir_all(location.source_path.parent().unwrap()).unwrap();
    fs::write(&location.source_path, contents).unwrap();
}

fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

#[test]
fn test_first_stage_creates_directory_and_copy() {
    let root = tempfile::tempdir().unwrap();
    let location = linux_location(root.path());
    write_source(&location, b"build #1");

    assert!(!location.staging_dir().exists());
    let staged = ensure_staged(&location).unwrap();

    assert!(staged.refreshed);
    assert_eq!(staged.path, root.path().join("npm/excel_manager.linux-x64-gnu.node"));
    assert_eq!(fs::read(&staged.path).unwrap(), b"build #1");
    assert_eq!(mtime(&staged.path), mtime(&location.source_path));
}

#[test]
fn test_unchanged_build_is_not_copied_again() {
    let root = tempfile::tempdir().unwrap();
    let location = linux_location(root.path());
    write_source(&location, b"build #1");

    ensure_staged(&location).unwrap();
    let before = mtime(&location.staged_path);

    let again = ensure_staged(&location).unwrap();
    assert!(!again.refreshed);
    assert_eq!(mtime(&location.staged_path), before);
    assert_eq!(fs::read(&location.staged_path).unwrap(), b"build #1");
}

#[test]
fn test_newer_build_replaces_staged_copy() {
    let root = tempfile::tempdir().unwrap();
    let location = linux_location(root.path());
    write_source(&location, b"build #1");
    ensure_staged(&location).unwrap();

    fs::write(&location.source_path, b"build #2").unwrap();
    set_mtime(
        &location.source_path,
        SystemTime::now() + Duration::from_secs(60),
    );

    let staged = ensure_staged(&location).unwrap();
    assert!(staged.refreshed);
    assert_eq!(fs::read(&location.staged_path).unwrap(), b"build #2");
}

#[test]
fn test_staged_copy_newer_than_build_is_kept() {
    let root = tempfile::tempdir().unwrap();
    let location = linux_location(root.path());
    write_source(&location, b"old build");

    fs::create_dir_all(location.staging_dir()).unwrap();
    fs::write(&location.staged_path, b"hand-placed").unwrap();
    set_mtime(
        &location.source_path,
        SystemTime::now() - Duration::from_secs(3600),
    );

    let staged = ensure_staged(&location).unwrap();
    assert!(!staged.refreshed);
    assert_eq!(fs::read(&location.staged_path).unwrap(), b"hand-placed");
}

#[test]
fn test_no_temporary_files_left_behind() {
    let root = tempfile::tempdir().unwrap();
    let location = linux_location(root.path());
    write_source(&location, b"build");

    ensure_staged(&location).unwrap();

    let entries: Vec<String> = fs::read_dir(location.staging_dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["excel_manager.linux-x64-gnu.node".to_string()]);
}

#[test]
fn test_staging_dir_blocked_by_file() {
    let root = tempfile::tempdir().unwrap();
    let location = linux_location(root.path());
    write_source(&location, b"build");
    fs::write(root.path().join("npm"), b"not a directory").unwrap();

    let err = ensure_staged(&location).unwrap_err();
    assert!(matches!(err, Error::StagingIo { .. }), "{err}");
}

#[test]
fn test_missing_build_is_reported_with_its_path() {
    let root = tempfile::tempdir().unwrap();
    let location = linux_location(root.path());

    match ensure_staged(&location) {
        Err(Error::SourceArtifactMissing(path)) => {
            assert_eq!(path, root.path().join("target/release/libexcel_manager.so"));
        }
        other => panic!("expected SourceArtifactMissing, got {other:?}"),
    }
}
