use std::collections::HashMap;
use std::hash::Hash;

/// Collapses `items` to one record per key.
///
/// The last occurrence of a key supplies the value, while the key keeps the slot
/// where it was first seen. Records with an empty key are not special-cased and
/// collapse into a single bucket like any other key.
pub fn dedup_by_key<T, K, F>(items: impl IntoIterator<Item = T>, mut key_fn: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::new();

    for item in items {
        let key = key_fn(&item);
        match slots.get(&key) {
            Some(&idx) => out[idx] = item,
            None => {
                slots.insert(key, out.len());
                out.push(item);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_value_wins_in_first_slot() {
        let items = vec![("a", 1), ("b", 1), ("c", 1), ("c", 2), ("d", 1)];
        let out = dedup_by_key(items, |(k, _)| *k);
        assert_eq!(out, vec![("a", 1), ("b", 1), ("c", 2), ("d", 1)]);
    }

    #[test]
    fn test_repeated_key_keeps_original_position() {
        let items = vec![("a", 1), ("b", 1), ("a", 2)];
        let out = dedup_by_key(items, |(k, _)| *k);
        assert_eq!(out, vec![("a", 2), ("b", 1)]);
    }

    #[test]
    fn test_empty_keys_collapse() {
        let items = vec![("", 1), ("x", 1), ("", 2)];
        let out = dedup_by_key(items, |(k, _)| k.to_string());
        assert_eq!(out, vec![("", 2), ("x", 1)]);
    }

    #[test]
    fn test_empty_input() {
        let out = dedup_by_key(Vec::<(&str, i32)>::new(), |(k, _)| *k);
        assert!(out.is_empty());
    }
}
