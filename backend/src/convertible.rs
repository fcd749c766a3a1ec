//! Conversion of Rust values into sourcekitd request objects
//!
//! Leaves (integers, strings, UIDs) map to one foreign call each. Containers
//! convert every child first and never short-circuit: a child the runtime
//! refuses becomes a null slot, and the new handle still retains one entry
//! per supplied child.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::rc::Rc;

use crate::context::SourceKit;
use crate::object::{ObjectKind, SourceKitObject};
use crate::uid::{MapKey, RawStringValue, RequestKind, Uid};

/// Values that can produce a sourcekitd request object
///
/// `None` means the runtime declined to create the object.
pub trait SourceKitObjectConvertible {
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>>;
}

fn int64_object(sk: &SourceKit, value: i64) -> Option<Rc<SourceKitObject>> {
    let raw = sk.api().int64_create(value)?;
    // SAFETY: fresh object, its only reference moves into the handle.
    Some(unsafe { SourceKitObject::from_raw(sk, raw, ObjectKind::Int64, Vec::new()) })
}

macro_rules! impl_convertible_for_int {
    ($($ty:ty),*) => {$(
        impl SourceKitObjectConvertible for $ty {
            fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
                int64_object(sk, i64::from(*self))
            }
        }
    )*};
}

// Wider types convert only when the value fits in an int64.
macro_rules! impl_convertible_for_wide_int {
    ($($ty:ty),*) => {$(
        impl SourceKitObjectConvertible for $ty {
            fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
                int64_object(sk, i64::try_from(*self).ok()?)
            }
        }
    )*};
}

impl_convertible_for_int!(i8, i16, i32, i64, u8, u16, u32);
impl_convertible_for_wide_int!(isize, u64, usize);

impl SourceKitObjectConvertible for str {
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        let raw = sk.api().string_create(self)?;
        // SAFETY: fresh object, its only reference moves into the handle.
        Some(unsafe { SourceKitObject::from_raw(sk, raw, ObjectKind::String, Vec::new()) })
    }
}

impl SourceKitObjectConvertible for String {
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        self.as_str().sourcekitd_object(sk)
    }
}

impl SourceKitObjectConvertible for Uid {
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        let raw = sk.api().uid_create(self.raw())?;
        // SAFETY: fresh object, its only reference moves into the handle.
        Some(unsafe { SourceKitObject::from_raw(sk, raw, ObjectKind::Uid, Vec::new()) })
    }
}

impl SourceKitObjectConvertible for RequestKind {
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        sk.uid(self.raw_value()).sourcekitd_object(sk)
    }
}

/// Identity: a handle converts to itself.
impl SourceKitObjectConvertible for Rc<SourceKitObject> {
    fn sourcekitd_object(&self, _sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        Some(Rc::clone(self))
    }
}

impl<T: SourceKitObjectConvertible + ?Sized> SourceKitObjectConvertible for &T {
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        (**self).sourcekitd_object(sk)
    }
}

impl<T: SourceKitObjectConvertible> SourceKitObjectConvertible for Option<T> {
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        self.as_ref()?.sourcekitd_object(sk)
    }
}

impl<T: SourceKitObjectConvertible> SourceKitObjectConvertible for [T] {
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        let children = self.iter().map(|element| element.sourcekitd_object(sk)).collect();
        SourceKitObject::array(sk, children)
    }
}

impl<T: SourceKitObjectConvertible> SourceKitObjectConvertible for Vec<T> {
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        self.as_slice().sourcekitd_object(sk)
    }
}

impl<T: SourceKitObjectConvertible, const N: usize> SourceKitObjectConvertible for [T; N] {
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        self.as_slice().sourcekitd_object(sk)
    }
}

/// Intern every key, convert every value, then build the dictionary.
fn dictionary_from_entries<'a, K, V, I>(sk: &SourceKit, entries: I) -> Option<Rc<SourceKitObject>>
where
    K: MapKey + ?Sized + 'a,
    V: SourceKitObjectConvertible + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    let (keys, values): (Vec<Uid>, Vec<_>) = entries
        .map(|(key, value)| (key.to_uid(sk.interner()), value.sourcekitd_object(sk)))
        .unzip();
    SourceKitObject::dictionary(sk, &keys, values)
}

impl<K, V, S> SourceKitObjectConvertible for HashMap<K, V, S>
where
    K: MapKey,
    V: SourceKitObjectConvertible,
    S: BuildHasher,
{
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        dictionary_from_entries(sk, self.iter())
    }
}

impl<K, V> SourceKitObjectConvertible for BTreeMap<K, V>
where
    K: MapKey,
    V: SourceKitObjectConvertible,
{
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        dictionary_from_entries(sk, self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::MemoryRuntime;
    use std::sync::Arc;

    #[test]
    fn test_wide_int_out_of_range_is_absent() {
        let runtime = Arc::new(MemoryRuntime::new());
        let sk = SourceKit::new(runtime.clone());

        assert!(sk.object(&u64::MAX).is_none());
        assert!(sk.object(&(i64::MAX as u64)).is_some());
        assert_eq!(runtime.stats().objects_created, 1);
    }

    #[test]
    fn test_option_none_is_null_slot() {
        let sk = SourceKit::in_memory();
        let values = vec![Some(1), None, Some(3)];
        let array = sk.object(&values).unwrap();

        assert_eq!(array.retained_count(), 3);
        assert!(array.retained()[1].is_none());
        assert_eq!(array.description(), "[\n  1,\n  <null>,\n  3\n]");
    }

    #[test]
    fn test_request_kind_converts_to_uid_value() {
        let sk = SourceKit::in_memory();
        let object = sk.object(&RequestKind::EditorOpen).unwrap();
        assert_eq!(object.kind(), ObjectKind::Uid);
        assert_eq!(object.description(), "source.request.editor.open");
    }
}
