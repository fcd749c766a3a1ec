//! sourcekitd loaded as a dynamic library
//!
//! The library is opened with `libloading`, every symbol of the call surface
//! is resolved up front, and `sourcekitd_initialize` runs before the runtime
//! is handed out. `sourcekitd_shutdown` runs when the runtime is dropped.

use std::ffi::{c_char, c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::Library;

use super::{ObjectApi, RawObject, RawUid};
use crate::config::LoaderConfig;
use crate::error::SourceKitError;

type ObjectT = *mut c_void;
type UidT = *mut c_void;

/// Resolved entry points. Plain function pointers, valid while `Library` lives.
struct Symbols {
    initialize: unsafe extern "C" fn(),
    shutdown: unsafe extern "C" fn(),
    int64_create: unsafe extern "C" fn(i64) -> ObjectT,
    string_create: unsafe extern "C" fn(*const c_char) -> ObjectT,
    uid_create: unsafe extern "C" fn(UidT) -> ObjectT,
    array_create: unsafe extern "C" fn(*const ObjectT, usize) -> ObjectT,
    dictionary_create: unsafe extern "C" fn(*const UidT, *const ObjectT, usize) -> ObjectT,
    dictionary_set_value: unsafe extern "C" fn(ObjectT, UidT, ObjectT),
    release: unsafe extern "C" fn(ObjectT),
    description_copy: unsafe extern "C" fn(ObjectT) -> *mut c_char,
    uid_get_from_buf: unsafe extern "C" fn(*const c_char, usize) -> UidT,
    uid_get_string_ptr: unsafe extern "C" fn(UidT) -> *const c_char,
}

/// Copy a function pointer out of `library`.
///
/// # Safety
/// `T` must match the C signature of `symbol`.
unsafe fn resolve<T: Copy>(library: &Library, path: &Path, symbol: &'static str) -> Result<T, SourceKitError> {
    let name = format!("{symbol}\0");
    unsafe { library.get::<T>(name.as_bytes()) }
        .map(|sym| *sym)
        .map_err(|_| SourceKitError::MissingSymbol {
            symbol,
            path: path.to_path_buf(),
        })
}

impl Symbols {
    /// # Safety
    /// `library` must be a sourcekitd build exporting the C request API.
    unsafe fn load(library: &Library, path: &Path) -> Result<Self, SourceKitError> {
        unsafe {
            Ok(Self {
                initialize: resolve(library, path, "sourcekitd_initialize")?,
                shutdown: resolve(library, path, "sourcekitd_shutdown")?,
                int64_create: resolve(library, path, "sourcekitd_request_int64_create")?,
                string_create: resolve(library, path, "sourcekitd_request_string_create")?,
                uid_create: resolve(library, path, "sourcekitd_request_uid_create")?,
                array_create: resolve(library, path, "sourcekitd_request_array_create")?,
                dictionary_create: resolve(library, path, "sourcekitd_request_dictionary_create")?,
                dictionary_set_value: resolve(library, path, "sourcekitd_request_dictionary_set_value")?,
                release: resolve(library, path, "sourcekitd_request_release")?,
                description_copy: resolve(library, path, "sourcekitd_request_description_copy")?,
                uid_get_from_buf: resolve(library, path, "sourcekitd_uid_get_from_buf")?,
                uid_get_string_ptr: resolve(library, path, "sourcekitd_uid_get_string_ptr")?,
            })
        }
    }
}

/// [`ObjectApi`] backed by the sourcekitd shared library
pub struct DylibRuntime {
    symbols: Symbols,
    path: PathBuf,
    // Dropped last: the symbols point into it.
    _library: Library,
}

impl DylibRuntime {
    /// Load the first library candidate of `config` that exists on disk.
    ///
    /// # Errors
    ///
    /// - `LibraryNotFound` if no candidate exists
    /// - `LoadFailed` if the dynamic loader rejects the file
    /// - `MissingSymbol` if the file does not export the request API
    pub fn load(config: &LoaderConfig) -> Result<Self, SourceKitError> {
        let path = config.resolve()?;
        Self::open(&path)
    }

    /// Load sourcekitd from an explicit path.
    pub fn open(path: &Path) -> Result<Self, SourceKitError> {
        // SAFETY: loading runs the library's initializers; sourcekitd has no
        // load-time requirements beyond being a valid shared object.
        let library = unsafe { Library::new(path) }.map_err(|e| SourceKitError::LoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        // SAFETY: the symbol names and signatures follow sourcekitd.h.
        let symbols = unsafe { Symbols::load(&library, path)? };
        // SAFETY: must precede any other sourcekitd call; called once per load.
        unsafe { (symbols.initialize)() };

        log::info!("Loaded sourcekitd from {}", path.display());

        Ok(Self {
            symbols,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for DylibRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DylibRuntime").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Drop for DylibRuntime {
    fn drop(&mut self) {
        log::debug!("Shutting down sourcekitd ({})", self.path.display());
        // SAFETY: paired with the initialize call in `open`.
        unsafe { (self.symbols.shutdown)() };
    }
}

impl ObjectApi for DylibRuntime {
    fn int64_create(&self, value: i64) -> Option<RawObject> {
        RawObject::from_ptr(unsafe { (self.symbols.int64_create)(value) })
    }

    fn string_create(&self, value: &str) -> Option<RawObject> {
        let Ok(value) = CString::new(value) else {
            log::warn!("String with interior NUL cannot be passed to sourcekitd");
            return None;
        };
        RawObject::from_ptr(unsafe { (self.symbols.string_create)(value.as_ptr()) })
    }

    fn uid_create(&self, uid: RawUid) -> Option<RawObject> {
        RawObject::from_ptr(unsafe { (self.symbols.uid_create)(uid.as_ptr()) })
    }

    unsafe fn array_create(&self, elements: &[Option<RawObject>]) -> Option<RawObject> {
        // `Option<RawObject>` has the layout of a nullable `sourcekitd_object_t`.
        let objects = elements.as_ptr().cast::<ObjectT>();
        RawObject::from_ptr(unsafe { (self.symbols.array_create)(objects, elements.len()) })
    }

    unsafe fn dictionary_create(
        &self,
        keys: &[Option<RawUid>],
        values: &[Option<RawObject>],
    ) -> Option<RawObject> {
        assert_eq!(keys.len(), values.len(), "dictionary keys and values differ in length");
        let raw = unsafe {
            (self.symbols.dictionary_create)(
                keys.as_ptr().cast::<UidT>(),
                values.as_ptr().cast::<ObjectT>(),
                keys.len(),
            )
        };
        RawObject::from_ptr(raw)
    }

    unsafe fn dictionary_set_value(&self, dict: RawObject, key: RawUid, value: RawObject) {
        unsafe { (self.symbols.dictionary_set_value)(dict.as_ptr(), key.as_ptr(), value.as_ptr()) }
    }

    unsafe fn release(&self, object: RawObject) {
        unsafe { (self.symbols.release)(object.as_ptr()) }
    }

    unsafe fn description_copy(&self, object: RawObject) -> Option<NonNull<c_char>> {
        NonNull::new(unsafe { (self.symbols.description_copy)(object.as_ptr()) })
    }

    unsafe fn description_free(&self, buffer: NonNull<c_char>) {
        // sourcekitd allocates descriptions with malloc.
        unsafe { libc::free(buffer.as_ptr().cast::<c_void>()) }
    }

    fn uid_get_from_buf(&self, name: &str) -> Option<RawUid> {
        let raw = unsafe { (self.symbols.uid_get_from_buf)(name.as_ptr().cast::<c_char>(), name.len()) };
        RawUid::from_ptr(raw)
    }

    fn uid_get_string(&self, uid: RawUid) -> Option<String> {
        let ptr = unsafe { (self.symbols.uid_get_string_ptr)(uid.as_ptr()) };
        if ptr.is_null() {
            return None;
        }
        // SAFETY: UID strings are NUL-terminated and live as long as the runtime.
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}
