//! Helpers for aligning fetched rows with the keys a batch asked for.

use std::collections::HashMap;
use std::hash::Hash;

/// Group `items` by `key_fn` and return one list per key, in key order.
///
/// Keys with no matching items get an empty list.
pub fn build_list<K, T, F>(items: impl IntoIterator<Item = T>, keys: &[K], key_fn: F) -> Vec<Vec<T>>
where
  K: Eq + Hash,
  T: Clone,
  F: Fn(&T) -> K,
{
  let mut groups: HashMap<K, Vec<T>> = HashMap::new();
  for item in items {
    groups.entry(key_fn(&item)).or_default().push(item);
  }
  keys
    .iter()
    .map(|key| groups.get(key).cloned().unwrap_or_default())
    .collect()
}

/// Index `items` by `key_fn` and return the matching item per key, in key order.
///
/// When several items share a key the last one wins.
pub fn build_object<K, T, F>(
  items: impl IntoIterator<Item = T>,
  keys: &[K],
  key_fn: F,
) -> Vec<Option<T>>
where
  K: Eq + Hash,
  T: Clone,
  F: Fn(&T) -> K,
{
  let index: HashMap<K, T> = items.into_iter().map(|item| (key_fn(&item), item)).collect();
  keys.iter().map(|key| index.get(key).cloned()).collect()
}
