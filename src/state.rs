use std::fmt;

/// The resolution state of a zone or nameserver entry.
///
/// `New` becomes `InProgress` when a resolver request is issued, which
/// becomes `Ready` or `Unreachable` when it completes.  Both of those
/// go back to `New` on expiry or invalidation.  There is no terminal
/// state: an entry cycles for as long as it is cached.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum EntryState {
    /// Nothing is known, or what was known has expired.
    #[default]
    New,
    /// A resolver request is outstanding.
    InProgress,
    /// Usable data is attached.
    Ready,
    /// Resolution failed.  Kept as a negative cache entry until it
    /// expires.
    Unreachable,
}

impl EntryState {
    /// Whether the entry holds a settled answer (positive or
    /// negative), which may expire.
    pub fn is_settled(&self) -> bool {
        matches!(self, EntryState::Ready | EntryState::Unreachable)
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EntryState::New => write!(f, "NEW"),
            EntryState::InProgress => write!(f, "IN_PROGRESS"),
            EntryState::Ready => write!(f, "READY"),
            EntryState::Unreachable => write!(f, "UNREACHABLE"),
        }
    }
}
