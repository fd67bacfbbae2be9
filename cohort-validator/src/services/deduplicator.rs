//! Order-preserving deduplication

use std::collections::HashSet;
use std::hash::Hash;

/// Keep the first item for each distinct key, in input order
///
/// **Algorithm:**
/// 1. Walk items in order
/// 2. Keep an item only if its key has not been seen
///
/// Used before validation keyed by (identity, raw project) and again after
/// classification keyed by (final identity, resolved project).
pub fn deduplicate_by_key<T, K, F>(items: Vec<T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}
