use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

/// A hash table with a fixed number of buckets, resolving collisions
/// by chaining.
///
/// The table never resizes: the number of buckets is a tuning
/// parameter picked at construction, and the number of entries is
/// kept in check by whoever owns the table (see `EntryTable`).
/// Values are expected to be small handles, so lookups return them by
/// copy.
#[derive(Debug, Clone)]
pub struct HashTable<K, V> {
    buckets: Vec<Vec<(K, V)>>,

    hasher: RandomState,

    /// The number of entries in the table.
    ///
    /// INVARIANT: this is the sum of the bucket lengths.
    len: usize,
}

impl<K: Eq + Hash, V: Copy> HashTable<K, V> {
    /// Create a table with the given number of buckets.  A prime
    /// number spreads keys best.
    ///
    /// Panics:
    ///
    /// - If called with a bucket_count of 0.
    pub fn with_buckets(bucket_count: usize) -> Self {
        if bucket_count == 0 {
            panic!("cannot create a hash table with no buckets");
        }

        let mut buckets = Vec::with_capacity(bucket_count);
        buckets.resize_with(bucket_count, Vec::new);

        Self {
            buckets,
            hasher: RandomState::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Insert a value, returning the value previously stored under
    /// the same key, if there was one.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let index = self.bucket_index(&key);
        let bucket = &mut self.buckets[index];

        for (k, v) in bucket.iter_mut() {
            if *k == key {
                return Some(std::mem::replace(v, value));
            }
        }

        bucket.push((key, value));
        self.len += 1;
        None
    }

    pub fn find(&self, key: &K) -> Option<V> {
        self.buckets[self.bucket_index(key)]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    /// Remove a key, returning its value if it was present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index = self.bucket_index(key);
        let bucket = &mut self.buckets[index];

        let position = bucket.iter().position(|(k, _)| k == key)?;
        let (_, value) = bucket.swap_remove(position);
        self.len -= 1;
        Some(value)
    }

    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.buckets.iter().flatten().map(|(k, _)| k)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&K, V)> {
        self.buckets.iter().flatten().map(|(k, v)| (k, *v))
    }

    fn bucket_index(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) % self.buckets.len() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_find() {
        let mut table = HashTable::with_buckets(7);

        assert_eq!(None, table.insert("a", 1));
        assert_eq!(None, table.insert("b", 2));

        assert_eq!(Some(1), table.find(&"a"));
        assert_eq!(Some(2), table.find(&"b"));
        assert_eq!(None, table.find(&"c"));
        assert_eq!(2, table.len());
    }

    #[test]
    fn insert_replaces() {
        let mut table = HashTable::with_buckets(7);

        table.insert("a", 1);
        assert_eq!(Some(1), table.insert("a", 10));

        assert_eq!(Some(10), table.find(&"a"));
        assert_eq!(1, table.len());
    }

    #[test]
    fn remove_only_removes_key() {
        let mut table = HashTable::with_buckets(7);

        table.insert("a", 1);
        table.insert("b", 2);

        assert_eq!(Some(1), table.remove(&"a"));
        assert_eq!(None, table.remove(&"a"));
        assert_eq!(None, table.find(&"a"));
        assert_eq!(Some(2), table.find(&"b"));
        assert_eq!(1, table.len());
    }

    #[test]
    fn single_bucket_chains_everything() {
        let mut table = HashTable::with_buckets(1);

        for i in 0..100 {
            table.insert(i, i * 2);
        }
        for i in (0..100).step_by(2) {
            assert_eq!(Some(i * 2), table.remove(&i));
        }

        assert_eq!(50, table.len());
        assert_eq!(1, table.bucket_count());
        for i in 0..100 {
            let expected = if i % 2 == 0 { None } else { Some(i * 2) };
            assert_eq!(expected, table.find(&i));
        }
    }

    #[test]
    fn keys_match_len() {
        let mut table = HashTable::with_buckets(13);

        for i in 0..50 {
            table.insert(i, ());
        }
        table.remove(&7);

        let mut keys = table.keys().copied().collect::<Vec<_>>();
        keys.sort_unstable();

        assert_eq!(table.len(), keys.len());
        assert!(!keys.contains(&7));
    }

    #[test]
    #[should_panic(expected = "no buckets")]
    fn zero_buckets_panics() {
        HashTable::<u8, u8>::with_buckets(0);
    }
}
