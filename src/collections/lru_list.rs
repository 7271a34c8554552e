/// A recency-ordered, doubly linked list of slot indices.
///
/// The list does not own entries: it orders the slots of an arena
/// (see `EntryTable`), and keeps its links in a vector indexed by the
/// slot, so every operation except iteration is O(1).
///
/// The head is the most recently used slot, the tail the least
/// recently used.
#[derive(Debug, Clone, Default)]
pub struct LruList {
    /// Links, indexed by slot.  `None` if the slot is not in the
    /// list.
    links: Vec<Option<Link>>,

    head: Option<usize>,

    tail: Option<usize>,

    /// INVARIANT: the number of `Some` entries in `links`.
    len: usize,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Link {
    /// Towards the head (more recently used).
    prev: Option<usize>,
    /// Towards the tail (less recently used).
    next: Option<usize>,
}

impl LruList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            links: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, slot: usize) -> bool {
        matches!(self.links.get(slot), Some(Some(_)))
    }

    /// The least recently used slot.
    pub fn back(&self) -> Option<usize> {
        self.tail
    }

    /// The most recently used slot.
    pub fn front(&self) -> Option<usize> {
        self.head
    }

    /// Add a slot as the most recently used one.  If it is already in
    /// the list, this is the same as `touch`.
    pub fn push_front(&mut self, slot: usize) {
        if self.contains(slot) {
            self.unlink(slot);
        } else {
            if slot >= self.links.len() {
                self.links.resize(slot + 1, None);
            }
            self.len += 1;
        }

        self.links[slot] = Some(Link {
            prev: None,
            next: self.head,
        });
        match self.head {
            Some(old_head) => self.link_mut(old_head).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    /// Mark a slot as the most recently used one.
    pub fn touch(&mut self, slot: usize) {
        if self.head != Some(slot) {
            self.push_front(slot);
        }
    }

    /// Remove and return the least recently used slot.
    pub fn evict(&mut self) -> Option<usize> {
        let tail = self.tail?;
        self.remove(tail);
        Some(tail)
    }

    /// Remove a slot.  Returns whether it was in the list.
    pub fn remove(&mut self, slot: usize) -> bool {
        if !self.contains(slot) {
            return false;
        }

        self.unlink(slot);
        self.links[slot] = None;
        self.len -= 1;
        true
    }

    /// Iterate from the least recently used slot to the most recently
    /// used.
    pub fn iter_lru(&self) -> impl Iterator<Item = usize> + '_ {
        let mut cursor = self.tail;
        std::iter::from_fn(move || {
            let slot = cursor?;
            cursor = self.links[slot].and_then(|link| link.prev);
            Some(slot)
        })
    }

    /// Detach a slot from its neighbours, leaving its own link stale.
    fn unlink(&mut self, slot: usize) {
        let Link { prev, next } = *self.link_mut(slot);

        match prev {
            Some(p) => self.link_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.link_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }

    fn link_mut(&mut self, slot: usize) -> &mut Link {
        self.links[slot]
            .as_mut()
            .expect("[INTERNAL ERROR] LRU list link missing for linked slot")
    }
}
