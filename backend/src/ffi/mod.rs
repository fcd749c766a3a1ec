//! Foreign call surface of the sourcekitd request API
//!
//! Every operation the binding layer performs on a foreign object goes
//! through [`ObjectApi`]. Two runtimes implement it:
//!
//! - [`MemoryRuntime`]: pure-Rust emulation of the request-object model,
//!   used by tests and by offline tooling
//! - [`DylibRuntime`]: the real sourcekitd library, loaded at runtime
//!   (feature `dylib`)
//!
//! CRITICAL: raw handles are plain tokens. Ownership lives in
//! [`SourceKitObject`](crate::SourceKitObject), never here.

use std::ffi::{c_char, c_void};
use std::mem::size_of;
use std::ptr::NonNull;

#[cfg(feature = "dylib")]
pub mod dylib;
pub mod memory;

#[cfg(feature = "dylib")]
pub use dylib::DylibRuntime;
pub use memory::{MemoryRuntime, RuntimeStats};

/// Non-null `sourcekitd_object_t`
///
/// `Option<RawObject>` is the "object-or-null" slot passed to the container
/// constructors and has the layout of a nullable C pointer.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawObject(NonNull<c_void>);

impl RawObject {
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Non-null `sourcekitd_uid_t`
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawUid(NonNull<c_void>);

impl RawUid {
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

// SAFETY: UIDs are immutable interned tokens owned by the runtime for the
// life of the process. Sharing the token across threads shares nothing mutable.
unsafe impl Send for RawUid {}
unsafe impl Sync for RawUid {}

const _: () = assert!(size_of::<Option<RawObject>>() == size_of::<*mut c_void>());
const _: () = assert!(size_of::<Option<RawUid>>() == size_of::<*mut c_void>());

/// The fixed set of foreign calls
///
/// Creation calls return `None` when the runtime declines to allocate
/// (recoverable absence). Calls that take a [`RawObject`] are `unsafe`:
/// the object must still be alive, i.e. owned by a handle that has not
/// released it yet.
pub trait ObjectApi: Send + Sync {
    /// `sourcekitd_request_int64_create`
    fn int64_create(&self, value: i64) -> Option<RawObject>;

    /// `sourcekitd_request_string_create`
    fn string_create(&self, value: &str) -> Option<RawObject>;

    /// `sourcekitd_request_uid_create`
    fn uid_create(&self, uid: RawUid) -> Option<RawObject>;

    /// `sourcekitd_request_array_create`
    ///
    /// # Safety
    /// Every `Some` slot must be a live object.
    unsafe fn array_create(&self, elements: &[Option<RawObject>]) -> Option<RawObject>;

    /// `sourcekitd_request_dictionary_create`
    ///
    /// `keys` and `values` have the same length.
    ///
    /// # Safety
    /// Every `Some` value slot must be a live object.
    unsafe fn dictionary_create(
        &self,
        keys: &[Option<RawUid>],
        values: &[Option<RawObject>],
    ) -> Option<RawObject>;

    /// `sourcekitd_request_dictionary_set_value`
    ///
    /// # Safety
    /// `dict` must be a live dictionary and `value` a live object.
    unsafe fn dictionary_set_value(&self, dict: RawObject, key: RawUid, value: RawObject);

    /// `sourcekitd_request_release`
    ///
    /// # Safety
    /// `object` must be live and owned by the caller; it must not be used
    /// by the caller afterwards.
    unsafe fn release(&self, object: RawObject);

    /// `sourcekitd_request_description_copy`
    ///
    /// Returns a NUL-terminated buffer the caller must hand back to
    /// [`ObjectApi::description_free`].
    ///
    /// # Safety
    /// `object` must be live.
    unsafe fn description_copy(&self, object: RawObject) -> Option<NonNull<c_char>>;

    /// Frees a buffer returned by [`ObjectApi::description_copy`].
    ///
    /// # Safety
    /// `buffer` must come from `description_copy` on this runtime and must
    /// not have been freed already.
    unsafe fn description_free(&self, buffer: NonNull<c_char>);

    /// `sourcekitd_uid_get_from_buf`
    fn uid_get_from_buf(&self, name: &str) -> Option<RawUid>;

    /// `sourcekitd_uid_get_string_ptr`
    fn uid_get_string(&self, uid: RawUid) -> Option<String>;
}
