use std::hash::Hash;

use super::hash_table::HashTable;
use super::lru_list::LruList;

/// A stable handle to an entry in an `EntryTable`.
///
/// Handles are only meaningful for the table that issued them, and
/// only until the entry is removed: a slot is reused by later
/// insertions.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EntryId(usize);

/// A size-bounded store of entries with LRU eviction.
///
/// Entries live in an arena of slots.  A `HashTable` maps keys to
/// slots and an `LruList` orders slots by recency: neither holds a
/// copy of the entry, and every insertion or removal goes through
/// this type, so the two indices cannot drift apart.
#[derive(Debug)]
pub struct EntryTable<K, E> {
    /// INVARIANT: the occupied slots are exactly the slots in `index`
    /// and in `lru`.
    slots: Vec<Option<Slot<K, E>>>,

    /// Unoccupied slots, reused before the arena grows.
    free: Vec<usize>,

    index: HashTable<K, EntryId>,

    lru: LruList,

    /// INVARIANT: the number of occupied slots never exceeds this.
    capacity: usize,
}

#[derive(Debug)]
struct Slot<K, E> {
    key: K,
    entry: E,
}

impl<K: Clone + Eq + Hash, E> EntryTable<K, E> {
    /// Create a table with `bucket_count` hash buckets, holding at
    /// most `capacity` entries.
    ///
    /// Panics:
    ///
    /// - If called with a bucket_count or capacity of 0.
    pub fn new(bucket_count: usize, capacity: usize) -> Self {
        if capacity == 0 {
            panic!("cannot create a zero-size entry table");
        }

        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashTable::with_buckets(bucket_count),
            lru: LruList::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// The number of entries in the LRU list, which is always the
    /// same as `len`.
    pub fn lru_len(&self) -> usize {
        self.lru.len()
    }

    pub fn find(&self, key: &K) -> Option<EntryId> {
        self.index.find(key)
    }

    pub fn get(&self, id: EntryId) -> Option<&E> {
        self.slot(id).map(|slot| &slot.entry)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut E> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .map(|slot| &mut slot.entry)
    }

    /// Mark an entry as the most recently used.
    pub fn touch(&mut self, id: EntryId) {
        if self.slot(id).is_some() {
            self.lru.touch(id.0);
        }
    }

    /// Insert an entry as the most recently used, making room first
    /// if the table is full.
    ///
    /// To make room, the least recently used entry for which
    /// `evictable` returns true is removed.  If there is no such
    /// entry, the least recently used entry is removed regardless.
    /// The removed key and entry are returned, so the caller can deal
    /// with anything still attached to it.
    ///
    /// If the key is already present, its entry is replaced and
    /// nothing is evicted; the old entry is returned instead.
    pub fn insert<F>(&mut self, key: K, entry: E, evictable: F) -> (EntryId, Option<(K, E)>)
    where
        F: Fn(&E) -> bool,
    {
        if let Some(id) = self.index.find(&key) {
            self.lru.touch(id.0);
            let old = self.slots[id.0].replace(Slot { key, entry });
            return (id, old.map(|slot| (slot.key, slot.entry)));
        }

        let evicted = if self.is_full() {
            self.eviction_candidate(evictable)
                .and_then(|victim| self.remove(victim))
        } else {
            None
        };

        let id = match self.free.pop() {
            Some(free) => {
                self.slots[free] = Some(Slot {
                    key: key.clone(),
                    entry,
                });
                EntryId(free)
            }
            None => {
                self.slots.push(Some(Slot {
                    key: key.clone(),
                    entry,
                }));
                EntryId(self.slots.len() - 1)
            }
        };

        self.index.insert(key, id);
        self.lru.push_front(id.0);

        (id, evicted)
    }

    /// Remove an entry from the table and both of its indices.
    pub fn remove(&mut self, id: EntryId) -> Option<(K, E)> {
        let slot = self.slots.get_mut(id.0)?.take()?;
        self.index.remove(&slot.key);
        self.lru.remove(id.0);
        self.free.push(id.0);
        Some((slot.key, slot.entry))
    }

    /// Iterate over the entries, from least to most recently used.
    pub fn iter_lru(&self) -> impl Iterator<Item = (EntryId, &K, &E)> {
        self.lru.iter_lru().filter_map(|i| {
            self.slots[i]
                .as_ref()
                .map(|slot| (EntryId(i), &slot.key, &slot.entry))
        })
    }

    fn eviction_candidate<F>(&self, evictable: F) -> Option<EntryId>
    where
        F: Fn(&E) -> bool,
    {
        self.iter_lru()
            .find(|(_, _, entry)| evictable(entry))
            .map(|(id, _, _)| id)
            .or_else(|| self.lru.back().map(EntryId))
    }

    fn slot(&self, id: EntryId) -> Option<&Slot<K, E>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }
}

#[cfg(test)]
impl<K: Clone + Eq + Hash + std::fmt::Debug, E> EntryTable<K, E> {
    pub fn key(&self, id: EntryId) -> Option<&K> {
        self.slot(id).map(|slot| &slot.key)
    }

    /// Check that the arena, the hash table, and the LRU list agree.
    pub fn assert_invariants(&self) {
        use std::collections::HashSet;

        assert!(self.len() <= self.capacity);
        assert_eq!(self.index.len(), self.lru.len());

        let occupied = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| i)
            .collect::<HashSet<_>>();
        let indexed = self.index.iter().map(|(_, id)| id.0).collect::<HashSet<_>>();
        let ordered = self.lru.iter_lru().collect::<HashSet<_>>();

        assert_eq!(occupied, indexed);
        assert_eq!(occupied, ordered);

        for (key, id) in self.index.iter() {
            assert_eq!(Some(key), self.key(id));
        }
        for free in &self.free {
            assert!(self.slots[*free].is_none());
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use crate::protocol::types::test_util::*;
    use crate::protocol::types::DomainName;

    use super::*;

    #[test]
    fn insert_then_find() {
        let mut table = EntryTable::new(7, 4);
        let (id, evicted) = table.insert("a", 1, |_| true);

        assert!(evicted.is_none());
        assert_eq!(Some(id), table.find(&"a"));
        assert_eq!(Some(&1), table.get(id));
        assert_eq!(Some(&"a"), table.key(id));
        table.assert_invariants();
    }

    #[test]
    fn insert_existing_key_replaces() {
        let mut table = EntryTable::new(7, 1);
        let (id1, _) = table.insert("a", 1, |_| true);
        let (id2, old) = table.insert("a", 2, |_| true);

        assert_eq!(id1, id2);
        assert_eq!(Some(("a", 1)), old);
        assert_eq!(Some(&2), table.get(id2));
        assert_eq!(1, table.len());
        table.assert_invariants();
    }

    #[test]
    fn full_table_evicts_least_recently_used() {
        let mut table = EntryTable::new(7, 3);
        let (a, _) = table.insert("a", 1, |_| true);
        table.insert("b", 2, |_| true);
        table.insert("c", 3, |_| true);
        table.touch(a);

        let (_, evicted) = table.insert("d", 4, |_| true);

        assert_eq!(Some(("b", 2)), evicted);
        assert_eq!(None, table.find(&"b"));
        assert_eq!(3, table.len());
        table.assert_invariants();
    }

    #[test]
    fn eviction_skips_entries_which_are_not_evictable() {
        let mut table = EntryTable::new(7, 3);
        table.insert("a", 1, |_| true);
        table.insert("b", 2, |_| true);
        table.insert("c", 3, |_| true);

        let (_, evicted) = table.insert("d", 4, |e| *e != 1);

        assert_eq!(Some(("b", 2)), evicted);
        assert!(table.find(&"a").is_some());
        table.assert_invariants();
    }

    #[test]
    fn eviction_falls_back_to_tail() {
        let mut table = EntryTable::new(7, 2);
        table.insert("a", 1, |_| true);
        table.insert("b", 2, |_| true);

        let (_, evicted) = table.insert("c", 3, |_| false);

        assert_eq!(Some(("a", 1)), evicted);
        assert_eq!(2, table.len());
        table.assert_invariants();
    }

    #[test]
    fn remove_frees_slot_for_reuse() {
        let mut table = EntryTable::new(7, 2);
        let (a, _) = table.insert("a", 1, |_| true);

        assert_eq!(Some(("a", 1)), table.remove(a));
        assert_eq!(None, table.remove(a));
        assert_eq!(None, table.get(a));

        let (b, _) = table.insert("b", 2, |_| true);
        assert_eq!(a, b);
        table.assert_invariants();
    }

    #[test]
    fn random_operations_maintain_invariants() {
        let mut rng = rand::thread_rng();
        let mut table = EntryTable::<DomainName, usize>::new(13, 25);
        let names = (0..60).map(|_| arbitrary_domainname()).collect::<Vec<_>>();

        for i in 0..1000 {
            let name = &names[rng.gen_range(0..names.len())];
            match rng.gen_range(0..3) {
                0 => {
                    table.insert(name.clone(), i, |e| e % 2 == 0);
                }
                1 => {
                    if let Some(id) = table.find(name) {
                        table.touch(id);
                    }
                }
                _ => {
                    if let Some(id) = table.find(name) {
                        table.remove(id);
                    }
                }
            }

            table.assert_invariants();
        }
    }

    #[test]
    #[should_panic(expected = "zero-size")]
    fn zero_capacity_panics() {
        EntryTable::<u8, u8>::new(7, 0);
    }
}
