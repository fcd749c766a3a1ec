//! UIDs: interned identifier handles
//!
//! sourcekitd names every dictionary key (and request kinds such as
//! `source.request.cursorinfo`) with a UID. UIDs are interned by the runtime
//! and never freed, so a [`Uid`] is a cheap, shareable token.
//!
//! Interning goes through an explicit [`UidInterner`] rather than hidden
//! global state, so tests can run against any [`ObjectApi`].

mod keys;

pub use keys::{RequestKind, SourceKitKey};

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use crate::ffi::{ObjectApi, RawUid};

/// An interned identifier handle
#[derive(Clone)]
pub struct Uid {
    raw: RawUid,
    name: Arc<str>,
}

impl Uid {
    pub fn raw(&self) -> RawUid {
        self.raw
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Uid {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Uid {}

impl Hash for Uid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({:?})", self.name)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Thread-safe string → [`Uid`] cache in front of `uid_get_from_buf`
///
/// Entries live as long as the interner; the runtime owns the UIDs
/// themselves for the life of the process.
pub struct UidInterner {
    api: Arc<dyn ObjectApi>,
    cache: Mutex<HashMap<String, Uid>>,
}

impl UidInterner {
    pub fn new(api: Arc<dyn ObjectApi>) -> Self {
        Self {
            api,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Intern `name`, asking the runtime only on first use.
    ///
    /// # Panics
    ///
    /// Panics if the runtime refuses to intern the name. sourcekitd never
    /// does; a runtime that does cannot key any dictionary.
    pub fn intern(&self, name: &str) -> Uid {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(uid) = cache.get(name) {
            return uid.clone();
        }
        let raw = self
            .api
            .uid_get_from_buf(name)
            .unwrap_or_else(|| panic!("sourcekitd refused to intern UID '{name}'"));
        let uid = Uid {
            raw,
            name: Arc::from(name),
        };
        cache.insert(name.to_owned(), uid.clone());
        uid
    }

    /// Look up the UID the runtime knows for `raw` and cache it.
    pub fn resolve(&self, raw: RawUid) -> Option<Uid> {
        let name = self.api.uid_get_string(raw)?;
        let uid = self.intern(&name);
        (uid.raw == raw).then_some(uid)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for UidInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UidInterner").field("len", &self.len()).finish_non_exhaustive()
    }
}

/// Enumeration-like types whose underlying value is a UID string
///
/// # Example
/// ```
/// use sourcekitd_object::RawStringValue;
///
/// enum Key { Name }
///
/// impl RawStringValue for Key {
///     fn raw_value(&self) -> &str {
///         match self {
///             Key::Name => "key.name",
///         }
///     }
/// }
/// ```
pub trait RawStringValue {
    fn raw_value(&self) -> &str;
}

/// Keys accepted by [`SourceKitObject::update_value`] and
/// [`SourceKitObject::from_pairs`]
///
/// Implemented for [`Uid`], plain strings (interned on use) and every
/// [`RawStringValue`].
///
/// [`SourceKitObject::update_value`]: crate::SourceKitObject::update_value
/// [`SourceKitObject::from_pairs`]: crate::SourceKitObject::from_pairs
pub trait UidKey {
    fn to_uid(&self, interner: &UidInterner) -> Uid;
}

impl UidKey for Uid {
    fn to_uid(&self, _interner: &UidInterner) -> Uid {
        self.clone()
    }
}

impl UidKey for &Uid {
    fn to_uid(&self, _interner: &UidInterner) -> Uid {
        (*self).clone()
    }
}

impl UidKey for str {
    fn to_uid(&self, interner: &UidInterner) -> Uid {
        interner.intern(self)
    }
}

impl UidKey for &str {
    fn to_uid(&self, interner: &UidInterner) -> Uid {
        interner.intern(self)
    }
}

impl UidKey for String {
    fn to_uid(&self, interner: &UidInterner) -> Uid {
        interner.intern(self)
    }
}

impl<T: RawStringValue> UidKey for T {
    fn to_uid(&self, interner: &UidInterner) -> Uid {
        interner.intern(self.raw_value())
    }
}

/// Key types a Rust map may have to convert into a sourcekitd dictionary
///
/// Only identifier handles and plain strings qualify. Maps keyed by anything
/// else, including [`RawStringValue`] enums, do not convert:
///
/// ```compile_fail
/// use std::collections::HashMap;
/// use sourcekitd_object::SourceKit;
///
/// let sk = SourceKit::in_memory();
/// sk.object(&HashMap::from([(1i32, 1i64)]));
/// ```
///
/// ```compile_fail
/// use std::collections::HashMap;
/// use sourcekitd_object::{SourceKit, SourceKitKey};
///
/// let sk = SourceKit::in_memory();
/// sk.object(&HashMap::from([(SourceKitKey::Offset, 1i64)]));
/// ```
///
/// ```
/// use std::collections::HashMap;
/// use sourcekitd_object::SourceKit;
///
/// let sk = SourceKit::in_memory();
/// assert!(sk.object(&HashMap::from([("key.offset", 1i64)])).is_some());
/// ```
pub trait MapKey: UidKey {}

impl MapKey for Uid {}
impl MapKey for &Uid {}
impl MapKey for str {}
impl MapKey for &str {}
impl MapKey for String {}
