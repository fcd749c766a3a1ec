//! Tests for the in-memory runtime, driven through the raw call surface
//!
//! These pin down the object model the handles rely on: containers retain
//! children, releases cascade, misuse is counted rather than fatal.

use sourcekitd_object::{MemoryRuntime, ObjectApi, RawUid};

fn uid(runtime: &MemoryRuntime, name: &str) -> RawUid {
    runtime.uid_get_from_buf(name).unwrap()
}

#[test]
fn test_new_runtime_is_empty() {
    let runtime = MemoryRuntime::new();
    assert_eq!(runtime.stats(), Default::default());
}

#[test]
fn test_uids_are_stable_and_named() {
    let runtime = MemoryRuntime::new();
    let first = uid(&runtime, "key.name");
    let again = uid(&runtime, "key.name");
    let other = uid(&runtime, "key.usr");

    assert_eq!(first, again);
    assert_ne!(first, other);
    assert_eq!(runtime.uid_get_string(first).as_deref(), Some("key.name"));

    let stats = runtime.stats();
    assert_eq!(stats.interned_uids, 2);
    assert_eq!(stats.intern_calls, 3);
}

#[test]
fn test_dictionary_retains_values_until_freed() {
    let runtime = MemoryRuntime::new();
    let key = uid(&runtime, "key.offset");
    let value = runtime.int64_create(4).unwrap();
    let dict = unsafe { runtime.dictionary_create(&[Some(key)], &[Some(value)]) }.unwrap();

    unsafe { runtime.release(value) };
    assert!(runtime.is_live(value));
    assert_eq!(runtime.refcount(value), 1);

    unsafe { runtime.release(dict) };
    assert!(!runtime.is_live(value));
    assert_eq!(runtime.stats().live_objects, 0);
}

#[test]
fn test_shared_child_survives_one_parent() {
    let runtime = MemoryRuntime::new();
    let child = runtime.string_create("shared").unwrap();
    let left = unsafe { runtime.array_create(&[Some(child)]) }.unwrap();
    let right = unsafe { runtime.array_create(&[Some(child)]) }.unwrap();
    unsafe { runtime.release(child) };

    unsafe { runtime.release(left) };
    assert!(runtime.is_live(child));

    unsafe { runtime.release(right) };
    assert!(!runtime.is_live(child));
}

#[test]
fn test_null_key_is_refused() {
    let runtime = MemoryRuntime::new();
    let value = runtime.int64_create(1).unwrap();

    assert!(unsafe { runtime.dictionary_create(&[None], &[Some(value)]) }.is_none());
    assert_eq!(runtime.stats().invalid_accesses, 1);
    assert_eq!(runtime.refcount(value), 1);
}

#[test]
fn test_released_child_cannot_be_inserted() {
    let runtime = MemoryRuntime::new();
    let child = runtime.int64_create(1).unwrap();
    unsafe { runtime.release(child) };

    assert!(unsafe { runtime.array_create(&[Some(child)]) }.is_none());
    assert_eq!(runtime.stats().invalid_accesses, 1);
}

#[test]
fn test_unknown_uid_value_is_refused() {
    let runtime = MemoryRuntime::new();
    let other = MemoryRuntime::new();
    // Tokens of another runtime are unknown here.
    other.int64_create(0).unwrap();
    let foreign = uid(&other, "key.name");

    assert!(runtime.uid_create(foreign).is_none());
    assert_eq!(runtime.stats().invalid_accesses, 1);
}

#[test]
fn test_set_value_on_non_dictionary_is_counted() {
    let runtime = MemoryRuntime::new();
    let key = uid(&runtime, "key.name");
    let array = unsafe { runtime.array_create(&[]) }.unwrap();
    let value = runtime.int64_create(1).unwrap();

    unsafe { runtime.dictionary_set_value(array, key, value) };

    assert_eq!(runtime.stats().invalid_accesses, 1);
    assert_eq!(runtime.refcount(value), 1);
}

#[test]
fn test_foreign_description_buffer_is_not_freed() {
    let runtime = MemoryRuntime::new();
    let other = MemoryRuntime::new();
    let value = other.int64_create(1).unwrap();
    let buffer = unsafe { other.description_copy(value) }.unwrap();

    unsafe { runtime.description_free(buffer) };
    assert_eq!(runtime.stats().invalid_accesses, 1);

    unsafe { other.description_free(buffer) };
    assert_eq!(other.stats().outstanding_descriptions, 0);
}

#[test]
fn test_string_refusal_is_exact() {
    let runtime = MemoryRuntime::new();
    runtime.refuse_string("no");

    assert!(runtime.string_create("no").is_none());
    assert!(runtime.string_create("no ").is_some());
    assert_eq!(runtime.stats().refused_allocations, 1);
}
