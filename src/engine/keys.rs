//! Storage key layout.
//!
//! Every cached result set lives under two keys sharing the cache's prefix:
//! `<cache>::<query>::meta` for the schema and `<cache>::<query>::value` for
//! the rows. Queries that themselves contain `::` can collide; this is not
//! special-cased.

/// Separator between key components.
pub const KEY_SEPARATOR: &str = "::";

/// Character cache names may not contain. With it excluded, `prefix(a)` never
/// starts a key of a different cache `b`.
pub const NAME_FORBIDDEN: char = ':';

/// Key holding the row records for `query` in `cache`.
pub fn value_key(cache: &str, query: &str) -> String {
    format!("{cache}{KEY_SEPARATOR}{query}{KEY_SEPARATOR}value")
}

/// Key holding the schema record for `query` in `cache`.
pub fn meta_key(cache: &str, query: &str) -> String {
    format!("{cache}{KEY_SEPARATOR}{query}{KEY_SEPARATOR}meta")
}

/// Prefix shared by every key belonging to `cache`.
pub fn prefix(cache: &str) -> String {
    format!("{cache}{KEY_SEPARATOR}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(
            value_key("orders", "SELECT id FROM orders"),
            "orders::SELECT id FROM orders::value"
        );
        assert_eq!(
            meta_key("orders", "SELECT id FROM orders"),
            "orders::SELECT id FROM orders::meta"
        );
        assert_eq!(prefix("orders"), "orders::");
    }

    #[test]
    fn test_known_ambiguity() {
        // Delimiters inside the components make distinct pairs collide.
        assert_eq!(value_key("a::b", "c"), value_key("a", "b::c"));
    }

    proptest! {
        #[test]
        fn prop_keys_are_prefixed_and_distinct(
            cache in "[a-z]{1,12}",
            query in "[A-Za-z0-9 ,*=]{0,40}",
        ) {
            let value = value_key(&cache, &query);
            let meta = meta_key(&cache, &query);
            let cache_prefix = prefix(&cache);
            prop_assert!(value.starts_with(&cache_prefix));
            prop_assert!(meta.starts_with(&cache_prefix));
            prop_assert_ne!(value, meta);
        }

        #[test]
        fn prop_prefix_never_covers_other_cache(
            a in "[a-z_]{1,8}",
            b in "[a-z_]{1,8}",
            query in "[A-Za-z0-9 :]{0,20}",
        ) {
            prop_assume!(a != b);
            prop_assert!(!meta_key(&b, &query).starts_with(&prefix(&a)));
            prop_assert!(!value_key(&b, &query).starts_with(&prefix(&a)));
        }

        #[test]
        fn prop_distinct_queries_give_distinct_keys(
            cache in "[a-z]{1,12}",
            q1 in "[A-Za-z0-9 ]{0,20}",
            q2 in "[A-Za-z0-9 ]{0,20}",
        ) {
            prop_assume!(q1 != q2);
            prop_assert_ne!(value_key(&cache, &q1), value_key(&cache, &q2));
        }
    }
}
