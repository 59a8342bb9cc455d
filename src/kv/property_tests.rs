//! Property-Based Tests for the Key-Value Store
//!
//! Uses proptest to check list ordering and prefix deletion against a model.

use proptest::prelude::*;
use std::collections::HashMap;

use crate::kv::KvStore;

// == Strategies ==
/// Generates short keys drawn from two prefixes so prefix deletes overlap.
fn key_strategy() -> impl Strategy<Value = String> {
    ("(orders|users)", "[a-z0-9]{1,8}").prop_map(|(prefix, rest)| format!("{}::{}", prefix, rest))
}

fn items_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z0-9|]{0,16}", 0..5)
}

#[derive(Debug, Clone)]
enum KvOp {
    Push { key: String, items: Vec<String> },
    Del { key: String },
    DeletePrefix { prefix: String },
}

fn kv_op_strategy() -> impl Strategy<Value = KvOp> {
    prop_oneof![
        (key_strategy(), items_strategy()).prop_map(|(key, items)| KvOp::Push { key, items }),
        key_strategy().prop_map(|key| KvOp::Del { key }),
        "(orders|users)::".prop_map(|prefix| KvOp::DeletePrefix { prefix }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any interleaving of pushes and deletes leaves every list equal to the
    // concatenation of the pushes since its last removal.
    #[test]
    fn prop_store_matches_model(ops in prop::collection::vec(kv_op_strategy(), 1..60)) {
        let mut store = KvStore::new();
        let mut model: HashMap<String, Vec<String>> = HashMap::new();

        for op in ops {
            match op {
                KvOp::Push { key, items } => {
                    store.rpush(&key, items.clone()).unwrap();
                    model.entry(key).or_default().extend(items);
                }
                KvOp::Del { key } => {
                    let existed = store.del(&key);
                    prop_assert_eq!(existed, model.remove(&key).is_some());
                }
                KvOp::DeletePrefix { prefix } => {
                    let removed = store.delete_prefix(&prefix);
                    let before = model.len();
                    model.retain(|k, _| !k.starts_with(&prefix));
                    prop_assert_eq!(removed, before - model.len());
                }
            }
        }

        prop_assert_eq!(store.len(), model.len());
        for (key, items) in &model {
            prop_assert_eq!(&store.lrange(key), items);
        }
    }

    // A prefix delete never touches keys outside the prefix.
    #[test]
    fn prop_delete_prefix_is_scoped(
        keys in prop::collection::hash_set(key_strategy(), 1..20)
    ) {
        let mut store = KvStore::new();
        for key in &keys {
            store.rpush(key, vec!["x".to_string()]).unwrap();
        }

        store.delete_prefix("orders::");

        for key in &keys {
            let present = !store.lrange(key).is_empty();
            prop_assert_eq!(present, !key.starts_with("orders::"));
        }
    }
}
