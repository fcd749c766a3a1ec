//! Tests for locating and loading the sourcekitd library

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use sourcekitd_object::config::LIBRARY_FILE_NAME;
use sourcekitd_object::{LoaderConfig, SourceKitError};

/// Fresh scratch directory under the system temp dir
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sourcekitd-object-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_default_has_search_paths_and_no_explicit_path() {
    let config = LoaderConfig::default();
    assert!(config.library_path.is_none());
    assert!(!config.search_paths.is_empty());
    assert_eq!(config.candidates(), config.search_paths);
}

#[test]
fn test_env_override_goes_first() {
    let config = LoaderConfig::default().with_env_override(Some(OsString::from("/custom/libsourcekitdInProc.so")));
    assert_eq!(config.candidates()[0], Path::new("/custom/libsourcekitdInProc.so"));
    assert_eq!(config.candidates().len(), config.search_paths.len() + 1);
}

#[test]
fn test_empty_env_override_is_ignored() {
    let config = LoaderConfig::default().with_env_override(Some(OsString::new()));
    assert!(config.library_path.is_none());
}

#[test]
fn test_directory_expands_to_library_file() {
    let dir = scratch_dir("expand");
    let config = LoaderConfig::default().with_library_path(&dir);

    assert_eq!(config.candidates()[0], dir.join(LIBRARY_FILE_NAME));
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_resolve_picks_first_existing_file() {
    let dir = scratch_dir("resolve");
    let present = dir.join("present.so");
    fs::write(&present, b"").unwrap();
    let config = LoaderConfig {
        library_path: Some(dir.join("missing.so")),
        search_paths: vec![dir.join("also-missing.so"), present.clone()],
    };

    assert_eq!(config.resolve().unwrap(), present);
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_resolve_reports_every_candidate() {
    let config = LoaderConfig {
        library_path: Some(PathBuf::from("/nonexistent/a.so")),
        search_paths: vec![PathBuf::from("/nonexistent/b.so")],
    };

    let err = config.resolve().unwrap_err();
    let SourceKitError::LibraryNotFound { searched } = &err else {
        panic!("expected LibraryNotFound");
    };
    assert_eq!(searched.len(), 2);
    assert!(err.to_string().contains("/nonexistent/a.so, /nonexistent/b.so"));
}

#[test]
fn test_deserialize_fills_defaults() {
    let config: LoaderConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, LoaderConfig::default());

    let config: LoaderConfig = serde_json::from_str(r#"{"search_paths": ["/x.so"]}"#).unwrap();
    assert_eq!(config.search_paths, vec![PathBuf::from("/x.so")]);
}

#[cfg(feature = "dylib")]
#[test]
fn test_loading_a_non_library_fails_cleanly() {
    use sourcekitd_object::DylibRuntime;

    let dir = scratch_dir("load");
    let bogus = dir.join("not-a-library.so");
    fs::write(&bogus, b"definitely not ELF").unwrap();

    let err = DylibRuntime::open(&bogus).unwrap_err();
    assert!(matches!(err, SourceKitError::LoadFailed { ref path, .. } if path == &bogus));
    fs::remove_dir_all(&dir).unwrap();
}
