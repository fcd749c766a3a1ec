//! sourcekitd request objects - safe Rust handles
//!
//! Wraps the sourcekitd C request API: native values convert into foreign
//! request objects, and every foreign object is owned by exactly one handle
//! that releases it exactly once.
//!
//! # Architecture
//!
//! - **ffi**: the fixed foreign call surface ([`ObjectApi`]) and its runtimes
//! - **uid**: interned identifier handles and the interning service
//! - **convertible**: the "can produce a foreign object" capability
//! - **object**: the owned handle, [`SourceKitObject`]
//! - **value**: heterogeneous request values and the JSON bridge
//! - **config**: locating the sourcekitd library
//!
//! # Critical Invariants
//!
//! 1. A foreign object is released at most once, and always once its handle
//!    is dropped
//! 2. A container's children outlive it (the handle retains them)
//! 3. Failed children become null slots; containers never short-circuit
//!
//! # Example
//! ```
//! use std::collections::BTreeMap;
//! use sourcekitd_object::SourceKit;
//!
//! let sk = SourceKit::in_memory();
//! let request = BTreeMap::from([("key1", "one"), ("key2", "two")]);
//! let object = sk.object(&request).unwrap();
//! assert_eq!(object.to_string(), "{\n  key1: \"one\",\n  key2: \"two\"\n}");
//! ```

pub mod config;
pub mod context;
pub mod convertible;
pub mod error;
pub mod ffi;
pub mod object;
pub mod uid;
pub mod value;

// Re-exports for convenience
pub use config::{LoaderConfig, LIB_PATH_ENV};
pub use context::SourceKit;
pub use convertible::SourceKitObjectConvertible;
pub use error::SourceKitError;
pub use ffi::{MemoryRuntime, ObjectApi, RawObject, RawUid, RuntimeStats};
pub use object::{ObjectKind, SourceKitObject};
pub use uid::{MapKey, RawStringValue, RequestKind, SourceKitKey, Uid, UidInterner, UidKey};
pub use value::Value;

#[cfg(feature = "dylib")]
pub use ffi::DylibRuntime;
