//! Runtime context shared by every conversion
//!
//! A [`SourceKit`] bundles the foreign call surface with the UID interner.
//! Both are reference counted, so cloning is cheap and every handle keeps the
//! runtime it was created by alive.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::convertible::SourceKitObjectConvertible;
use crate::ffi::{MemoryRuntime, ObjectApi};
use crate::object::SourceKitObject;
use crate::uid::{Uid, UidInterner};

#[cfg(feature = "dylib")]
use crate::{config::LoaderConfig, error::SourceKitError, ffi::DylibRuntime};

#[derive(Clone)]
pub struct SourceKit {
    api: Arc<dyn ObjectApi>,
    interner: Arc<UidInterner>,
}

impl SourceKit {
    /// Context with a fresh interner over `api`.
    pub fn new(api: Arc<dyn ObjectApi>) -> Self {
        let interner = Arc::new(UidInterner::new(Arc::clone(&api)));
        Self { api, interner }
    }

    /// Context sharing an existing interner.
    ///
    /// The interner must front the same runtime as `api`; UIDs are not
    /// portable between runtimes.
    pub fn with_interner(api: Arc<dyn ObjectApi>, interner: Arc<UidInterner>) -> Self {
        Self { api, interner }
    }

    /// Context over a new [`MemoryRuntime`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRuntime::new()))
    }

    /// Context over the sourcekitd library found by `config`.
    #[cfg(feature = "dylib")]
    pub fn load(config: &LoaderConfig) -> Result<Self, SourceKitError> {
        Ok(Self::new(Arc::new(DylibRuntime::load(config)?)))
    }

    pub fn api(&self) -> &dyn ObjectApi {
        self.api.as_ref()
    }

    pub fn interner(&self) -> &UidInterner {
        &self.interner
    }

    pub fn uid(&self, name: &str) -> Uid {
        self.interner.intern(name)
    }

    /// Convert `value`; `None` when the runtime declined to allocate.
    pub fn object<V>(&self, value: &V) -> Option<Rc<SourceKitObject>>
    where
        V: SourceKitObjectConvertible + ?Sized,
    {
        value.sourcekitd_object(self)
    }
}

impl fmt::Debug for SourceKit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceKit")
            .field("interner", &self.interner)
            .finish_non_exhaustive()
    }
}
