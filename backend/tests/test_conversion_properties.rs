//! Property tests for conversion and teardown
//!
//! For arbitrary request shapes:
//! - rendering is non-empty
//! - containers retain exactly one entry per supplied child
//! - dropping the root frees everything, each object released once

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use sourcekitd_object::{MemoryRuntime, SourceKit, Value};

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        "[a-z0-9 ._-]{0,12}".prop_map(Value::String),
        "key\\.[a-z]{1,8}".prop_map(Value::Uid),
        Just(Value::Null),
    ]
}

fn request() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("key\\.[a-z]{1,6}", inner), 0..6).prop_map(Value::Dictionary),
        ]
    })
}

fn memory() -> (Arc<MemoryRuntime>, SourceKit) {
    let runtime = Arc::new(MemoryRuntime::new());
    let sk = SourceKit::new(runtime.clone());
    (runtime, sk)
}

proptest! {
    #[test]
    fn prop_rendering_is_non_empty(value in request()) {
        let (_runtime, sk) = memory();
        if let Some(object) = sk.object(&value) {
            prop_assert!(!object.description().is_empty());
        } else {
            prop_assert_eq!(value, Value::Null);
        }
    }

    #[test]
    fn prop_array_retains_every_element(
        strings in prop::collection::vec("[a-c]{1,2}", 0..20),
        refused in "[a-c]{1,2}",
    ) {
        let (runtime, sk) = memory();
        runtime.refuse_string(refused.clone());

        let object = sk.object(&strings).unwrap();

        prop_assert_eq!(object.retained_count(), strings.len());
        let nulls = object.retained().iter().filter(|c| c.is_none()).count();
        prop_assert_eq!(nulls, strings.iter().filter(|s| **s == refused).count());
    }

    #[test]
    fn prop_mapping_retains_every_value(
        entries in prop::collection::btree_map("key\\.[a-z]{1,6}", any::<i64>(), 0..16),
        budget in 0usize..20,
    ) {
        let (runtime, sk) = memory();
        // Exhaust the budget part-way through the values, then lift it for
        // the dictionary itself.
        runtime.set_allocation_budget(Some(budget));
        let children: Vec<_> = entries.values().map(|v| sk.object(v)).collect();
        runtime.set_allocation_budget(None);
        let expected_nulls = entries.len().saturating_sub(budget);

        let converted: BTreeMap<String, Value> = entries
            .keys()
            .zip(children)
            .map(|(k, child)| (k.clone(), child.map_or(Value::Null, Value::Object)))
            .collect();
        let object = sk.object(&converted).unwrap();

        prop_assert_eq!(object.retained_count(), entries.len());
        let nulls = object.retained().iter().filter(|c| c.is_none()).count();
        prop_assert_eq!(nulls, expected_nulls);
    }

    #[test]
    fn prop_teardown_releases_everything_once(value in request()) {
        let (runtime, sk) = memory();
        let object = sk.object(&value);
        drop(object);

        let stats = runtime.stats();
        prop_assert_eq!(stats.live_objects, 0);
        prop_assert_eq!(stats.double_releases, 0);
        prop_assert_eq!(stats.invalid_accesses, 0);
        prop_assert_eq!(stats.release_calls, stats.objects_created);
        prop_assert_eq!(stats.outstanding_descriptions, 0);
    }
}
