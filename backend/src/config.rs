//! Where to find the sourcekitd library
//!
//! An explicit `library_path` wins over the search list. The path may name
//! the library file itself or a directory that contains it.

use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::SourceKitError;

/// Environment variable overriding the library location
pub const LIB_PATH_ENV: &str = "SOURCEKIT_LIB_PATH";

/// Library file name looked up inside a directory given as `library_path`
#[cfg(target_os = "macos")]
pub const LIBRARY_FILE_NAME: &str = "sourcekitd.framework/sourcekitd";
#[cfg(not(target_os = "macos"))]
pub const LIBRARY_FILE_NAME: &str = "libsourcekitdInProc.so";

#[cfg(target_os = "macos")]
const DEFAULT_SEARCH_PATHS: &[&str] = &[
    "/Applications/Xcode.app/Contents/Developer/Toolchains/XcodeDefault.xctoolchain/usr/lib/sourcekitd.framework/sourcekitd",
    "/Library/Developer/CommandLineTools/usr/lib/sourcekitd.framework/sourcekitd",
];
#[cfg(not(target_os = "macos"))]
const DEFAULT_SEARCH_PATHS: &[&str] = &[
    "/usr/lib/libsourcekitdInProc.so",
    "/usr/lib/swift/linux/libsourcekitdInProc.so",
    "/usr/share/swift/usr/lib/libsourcekitdInProc.so",
];

/// Library loader configuration
///
/// # Example
/// ```
/// use std::path::Path;
/// use sourcekitd_object::LoaderConfig;
///
/// let config: LoaderConfig =
///     serde_json::from_str(r#"{"library_path": "/nonexistent/libsourcekitdInProc.so"}"#).unwrap();
/// assert_eq!(config.candidates()[0], Path::new("/nonexistent/libsourcekitdInProc.so"));
/// assert!(config.candidates().len() > 1);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoaderConfig {
    /// Explicit library file or directory; tried first
    #[serde(default)]
    pub library_path: Option<PathBuf>,

    /// Fallback locations, tried in order
    #[serde(default = "default_search_paths")]
    pub search_paths: Vec<PathBuf>,
}

fn default_search_paths() -> Vec<PathBuf> {
    DEFAULT_SEARCH_PATHS.iter().map(PathBuf::from).collect()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            search_paths: default_search_paths(),
        }
    }
}

impl LoaderConfig {
    /// Default configuration with `SOURCEKIT_LIB_PATH` applied, if set.
    pub fn from_env() -> Self {
        Self::default().with_env_override(std::env::var_os(LIB_PATH_ENV))
    }

    /// Apply an environment override value; empty values are ignored.
    pub fn with_env_override(self, value: Option<OsString>) -> Self {
        match value {
            Some(value) if !value.is_empty() => self.with_library_path(PathBuf::from(value)),
            _ => self,
        }
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// Every path the loader will try, in order.
    ///
    /// An explicit path that is an existing directory expands to the library
    /// file inside it; any other explicit path is used as given.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(self.search_paths.len() + 1);
        if let Some(path) = &self.library_path {
            candidates.push(expand_directory(path));
        }
        candidates.extend(self.search_paths.iter().cloned());
        candidates
    }

    /// First candidate that exists on disk.
    ///
    /// # Errors
    ///
    /// Returns `LibraryNotFound` listing every candidate when none exists.
    pub fn resolve(&self) -> Result<PathBuf, SourceKitError> {
        let candidates = self.candidates();
        match candidates.iter().find(|path| path.is_file()) {
            Some(path) => Ok(path.clone()),
            None => Err(SourceKitError::LibraryNotFound { searched: candidates }),
        }
    }
}

fn expand_directory(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(LIBRARY_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}
