//! Keyword list merging

/// Merge two keyword lists: every element of `first` in order, followed by
/// the elements of `second` not already present, in `second`'s order.
///
/// Duplicates inside `first` are dropped as well, so the result never
/// contains the same keyword twice.
pub fn merge<T: Clone + PartialEq>(first: &[T], second: &[T]) -> Vec<T> {
    let mut merged: Vec<T> = Vec::with_capacity(first.len() + second.len());
    for item in first.iter().chain(second.iter()) {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_merge_keeps_first_seen_order() {
        let a = vec!["tax", "finance"];
        let b = vec!["health", "tax", "roads"];
        assert_eq!(merge(&a, &b), vec!["tax", "finance", "health", "roads"]);
    }

    #[test]
    fn test_merge_empty_sides() {
        let empty: Vec<&str> = vec![];
        assert_eq!(merge(&empty, &["a"]), vec!["a"]);
        assert_eq!(merge(&["a"], &empty), vec!["a"]);
        assert!(merge(&empty, &empty).is_empty());
    }

    fn arb_keywords() -> impl Strategy<Value = Vec<String>> {
        prop::collection::hash_set("[a-e]{1,2}", 0..12).prop_map(|set| set.into_iter().collect())
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(a in arb_keywords()) {
            prop_assert_eq!(merge(&a, &a), a);
        }

        #[test]
        fn merge_contains_a_then_b_minus_a(a in arb_keywords(), b in arb_keywords()) {
            let merged = merge(&a, &b);
            prop_assert_eq!(&merged[..a.len()], &a[..]);

            let rest: Vec<String> = b.iter().filter(|k| !a.contains(k)).cloned().collect();
            prop_assert_eq!(&merged[a.len()..], &rest[..]);

            let mut dedup = merged.clone();
            dedup.sort();
            dedup.dedup();
            prop_assert_eq!(dedup.len(), merged.len());
        }
    }
}
