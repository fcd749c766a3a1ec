//! Owned handle around one sourcekitd request object
//!
//! A [`SourceKitObject`] owns exactly one reference to a foreign object and
//! releases it exactly once, when the handle is dropped. It also keeps the
//! handles of the children it was built from, so they cannot be released
//! before it.
//!
//! Handles are shared through `Rc<SourceKitObject>` and are never cloned:
//! any number of `Rc` clones still means one foreign reference and one
//! release. Request graphs are built on one thread (`Rc` is not `Send`).

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CStr;
use std::fmt;
use std::rc::Rc;

use crate::context::SourceKit;
use crate::convertible::SourceKitObjectConvertible;
use crate::ffi::{RawObject, RawUid};
use crate::uid::{Uid, UidKey};

/// What kind of object a handle holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Int64,
    String,
    Uid,
    Array,
    Dictionary,
}

/// Owned sourcekitd request object
pub struct SourceKitObject {
    raw: RawObject,
    kind: ObjectKind,
    sk: SourceKit,
    /// Children supplied at construction, in order; `None` for null slots
    retained: Vec<Option<Rc<SourceKitObject>>>,
    /// Values stored later through `update_value`, latest per key
    updated: RefCell<HashMap<Uid, Rc<SourceKitObject>>>,
}

impl SourceKitObject {
    /// Take ownership of `raw`.
    ///
    /// # Safety
    /// `raw` must be a live object of `kind`, created by the runtime behind
    /// `sk`, and the caller must transfer one reference to the handle.
    pub unsafe fn from_raw(
        sk: &SourceKit,
        raw: RawObject,
        kind: ObjectKind,
        retained: Vec<Option<Rc<SourceKitObject>>>,
    ) -> Rc<Self> {
        Rc::new(Self {
            raw,
            kind,
            sk: sk.clone(),
            retained,
            updated: RefCell::new(HashMap::new()),
        })
    }

    /// Build a dictionary from `(key, value)` pairs, in the given order.
    ///
    /// Values that fail to convert become null slots.
    ///
    /// # Panics
    ///
    /// Panics if the runtime refuses to create the dictionary itself.
    ///
    /// # Example
    /// ```
    /// use sourcekitd_object::{SourceKit, SourceKitObject, Value};
    ///
    /// let sk = SourceKit::in_memory();
    /// let request = SourceKitObject::from_pairs(&sk, [
    ///     ("key.offset", Value::from(12)),
    ///     ("key.sourcefile", Value::from("main.swift")),
    /// ]);
    /// assert_eq!(request.retained_count(), 2);
    /// ```
    pub fn from_pairs<K, V, I>(sk: &SourceKit, pairs: I) -> Rc<Self>
    where
        K: UidKey,
        V: SourceKitObjectConvertible,
        I: IntoIterator<Item = (K, V)>,
    {
        let (keys, values): (Vec<Uid>, Vec<_>) = pairs
            .into_iter()
            .map(|(key, value)| (key.to_uid(sk.interner()), value.sourcekitd_object(sk)))
            .unzip();
        let count = keys.len();
        Self::dictionary(sk, &keys, values)
            .unwrap_or_else(|| panic!("sourcekitd refused to create a dictionary of {count} entries"))
    }

    /// Array over already converted children; `None` children are null slots.
    pub(crate) fn array(sk: &SourceKit, children: Vec<Option<Rc<SourceKitObject>>>) -> Option<Rc<Self>> {
        let slots = raw_slots(&children);
        log_null_slots("array", &slots);
        // SAFETY: every slot is owned by a handle in `children`.
        let raw = unsafe { sk.api().array_create(&slots) }?;
        // SAFETY: fresh object, its only reference moves into the handle.
        Some(unsafe { Self::from_raw(sk, raw, ObjectKind::Array, children) })
    }

    /// Dictionary over interned keys and already converted values.
    pub(crate) fn dictionary(
        sk: &SourceKit,
        keys: &[Uid],
        values: Vec<Option<Rc<SourceKitObject>>>,
    ) -> Option<Rc<Self>> {
        debug_assert_eq!(keys.len(), values.len());
        let raw_keys: Vec<Option<RawUid>> = keys.iter().map(|k| Some(k.raw())).collect();
        let slots = raw_slots(&values);
        log_null_slots("dictionary", &slots);
        // SAFETY: every value slot is owned by a handle in `values`.
        let raw = unsafe { sk.api().dictionary_create(&raw_keys, &slots) }?;
        // SAFETY: fresh object, its only reference moves into the handle.
        Some(unsafe { Self::from_raw(sk, raw, ObjectKind::Dictionary, values) })
    }

    /// Set `key` to `value` inside this dictionary, replacing any value the
    /// key already had.
    ///
    /// The key may be a [`Uid`], a plain string or any
    /// [`RawStringValue`](crate::RawStringValue); strings are interned first.
    /// The handle keeps the stored value alive until it is replaced or the
    /// dictionary is dropped.
    ///
    /// # Panics
    ///
    /// - if `value` does not convert to an object
    /// - if this handle is not a dictionary
    /// - if `value` is this dictionary or holds it, directly or through
    ///   other handles (the two would keep each other alive forever)
    pub fn update_value<V, K>(&self, value: &V, key: K)
    where
        V: SourceKitObjectConvertible + ?Sized,
        K: UidKey,
    {
        assert_eq!(
            self.kind,
            ObjectKind::Dictionary,
            "update_value called on a sourcekitd {:?}",
            self.kind
        );
        let uid = key.to_uid(self.sk.interner());
        let object = value
            .sourcekitd_object(&self.sk)
            .unwrap_or_else(|| panic!("value for '{uid}' did not convert to a sourcekitd object"));
        assert!(!object.holds(self.raw), "cannot store a sourcekitd dictionary inside itself");

        // SAFETY: both objects are owned by live handles.
        unsafe { self.sk.api().dictionary_set_value(self.raw, uid.raw(), object.raw) };
        self.updated.borrow_mut().insert(uid, object);
    }

    /// Human-readable rendering from the runtime.
    ///
    /// Copies the runtime's buffer and frees it before returning; nothing is
    /// cached. Invalid UTF-8 is replaced, and a runtime that cannot describe
    /// the object yields an empty string.
    pub fn description(&self) -> String {
        let api = self.sk.api();
        // SAFETY: `raw` is live while `self` is.
        let Some(buffer) = (unsafe { api.description_copy(self.raw) }) else {
            log::warn!("sourcekitd returned no description for {:?} object", self.kind);
            return String::new();
        };
        // SAFETY: the runtime returns a NUL-terminated buffer.
        let text = unsafe { CStr::from_ptr(buffer.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        // SAFETY: copied from this runtime above and not freed yet.
        unsafe { api.description_free(buffer) };
        text
    }

    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn source_kit(&self) -> &SourceKit {
        &self.sk
    }

    /// Number of children supplied at construction, null slots included
    pub fn retained_count(&self) -> usize {
        self.retained.len()
    }

    /// Children supplied at construction, in order
    pub fn retained(&self) -> &[Option<Rc<SourceKitObject>>] {
        &self.retained
    }
}

impl SourceKitObject {
    /// Whether `target` is this object or reachable through the handles it
    /// keeps alive.
    fn holds(&self, target: RawObject) -> bool {
        let mut pending: Vec<Rc<SourceKitObject>> = Vec::new();
        if self.raw == target {
            return true;
        }
        self.push_children(&mut pending);
        while let Some(object) = pending.pop() {
            if object.raw == target {
                return true;
            }
            object.push_children(&mut pending);
        }
        false
    }

    fn push_children(&self, pending: &mut Vec<Rc<SourceKitObject>>) {
        pending.extend(self.retained.iter().flatten().cloned());
        pending.extend(self.updated.borrow().values().cloned());
    }
}

fn raw_slots(children: &[Option<Rc<SourceKitObject>>]) -> Vec<Option<RawObject>> {
    children
        .iter()
        .map(|child| child.as_ref().map(|c| c.raw))
        .collect()
}

fn log_null_slots(container: &str, slots: &[Option<RawObject>]) {
    let nulls = slots.iter().filter(|s| s.is_none()).count();
    if nulls > 0 {
        log::warn!("Creating sourcekitd {container} with {nulls} null slot(s) of {}", slots.len());
    } else {
        log::debug!("Creating sourcekitd {container} with {} slot(s)", slots.len());
    }
}

impl Drop for SourceKitObject {
    fn drop(&mut self) {
        log::trace!("Releasing sourcekitd {:?} object {:?}", self.kind, self.raw);
        // SAFETY: the handle owns one reference and this is its only release.
        // Children are dropped after this, with the fields.
        unsafe { self.sk.api().release(self.raw) };
    }
}

impl PartialEq for SourceKitObject {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Display for SourceKitObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

impl fmt::Debug for SourceKitObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceKitObject")
            .field("raw", &self.raw)
            .field("kind", &self.kind)
            .field("retained", &self.retained.len())
            .field("updated", &self.updated.borrow().len())
            .finish()
    }
}
