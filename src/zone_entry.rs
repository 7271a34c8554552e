use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use crate::address::AddressCallback;
use crate::protocol::types::{DomainName, RecordClass};
use crate::state::EntryState;

/// The key of a zone entry.  Names compare case-insensitively.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ZoneKey {
    pub name: DomainName,
    pub class: RecordClass,
}

impl ZoneKey {
    pub fn new(name: DomainName, class: RecordClass) -> Self {
        Self { name, class }
    }
}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.name, self.class)
    }
}

/// Cached state for one zone: which nameservers serve it, and who is
/// waiting for one of their addresses.
pub struct ZoneEntry {
    key: ZoneKey,

    /// Names of the nameservers serving the zone, in referral order.
    ///
    /// INVARIANT: no name appears twice, and there is at least one.
    nameservers: Vec<DomainName>,

    state: EntryState,

    /// When the nameserver set lapses and should be taken from the
    /// next referral instead.
    expires_at: Instant,

    /// Callbacks waiting for an address, oldest first.
    pending: VecDeque<AddressCallback>,
}

impl ZoneEntry {
    pub fn new(key: ZoneKey, nameservers: Vec<DomainName>, expires_at: Instant) -> Self {
        Self {
            key,
            nameservers,
            state: EntryState::New,
            expires_at,
            pending: VecDeque::new(),
        }
    }

    pub fn nameservers(&self) -> &[DomainName] {
        &self.nameservers
    }

    #[cfg(test)]
    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }

    /// The state the next lookup will find: a settled zone whose
    /// nameserver set has lapsed is `New` again.
    pub fn state_at(&self, now: Instant) -> EntryState {
        if self.state.is_settled() && self.is_expired(now) {
            EntryState::New
        } else {
            self.state
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Replace the nameserver set of an expired zone with the one from
    /// a fresh referral.  Pending callbacks are kept.
    pub fn reseed(&mut self, nameservers: Vec<DomainName>, expires_at: Instant) {
        self.nameservers = nameservers;
        self.expires_at = expires_at;
        self.state = EntryState::New;
    }

    pub fn enqueue(&mut self, callback: AddressCallback) {
        self.pending.push_back(callback);
    }

    /// At least one nameserver has a usable address.  Returns the
    /// callbacks to answer, oldest first.
    pub fn mark_ready(&mut self) -> VecDeque<AddressCallback> {
        self.state = EntryState::Ready;
        std::mem::take(&mut self.pending)
    }

    /// Some nameserver is still being resolved.
    pub fn mark_in_progress(&mut self) {
        self.state = EntryState::InProgress;
    }

    /// Every nameserver is unreachable.  Returns the callbacks to
    /// fail, oldest first.
    pub fn mark_unreachable(&mut self) -> VecDeque<AddressCallback> {
        self.state = EntryState::Unreachable;
        std::mem::take(&mut self.pending)
    }

    /// Hand back every pending callback, for an entry that is being
    /// evicted.
    pub fn take_pending(&mut self) -> VecDeque<AddressCallback> {
        std::mem::take(&mut self.pending)
    }

    /// Make the nameserver set lapse now, so the next referral
    /// replaces it.
    pub fn invalidate(&mut self, now: Instant) {
        self.expires_at = now;
        self.state = EntryState::New;
    }
}

impl fmt::Debug for ZoneEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneEntry")
            .field("key", &self.key)
            .field("nameservers", &self.nameservers)
            .field("state", &self.state)
            .field("expires_at", &self.expires_at)
            .field("pending", &self.pending.len())
            .finish()
    }
}
