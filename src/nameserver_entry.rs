use std::net::IpAddr;
use std::time::{Duration, Instant};

use crate::protocol::types::DomainName;
use crate::state::EntryState;
use crate::zone_entry::ZoneKey;

/// Weight of a new RTT sample in the smoothed RTT of an address.
pub const RTT_SMOOTHING: f64 = 0.3;

/// An address learned for a nameserver, from glue or a resolver
/// answer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AddressRecord {
    pub address: IpAddr,
    pub ttl: u32,
}

/// A known address of a nameserver, with what has been learned about
/// talking to it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AddressInfo {
    pub address: IpAddr,

    /// Smoothed round-trip time.  `None` until the first report.
    pub rtt: Option<Duration>,

    /// If the address has been reported unreachable, when to start
    /// trying it again.
    pub unreachable_until: Option<Instant>,
}

impl AddressInfo {
    fn new(address: IpAddr) -> Self {
        Self {
            address,
            rtt: None,
            unreachable_until: None,
        }
    }

    pub fn is_usable(&self, now: Instant) -> bool {
        self.unreachable_until.map_or(true, |until| until <= now)
    }
}

/// Cached state for one nameserver name.
///
/// A nameserver entry is shared by every zone which names it: zones
/// find it by name, they do not own it.
#[derive(Debug, Clone)]
pub struct NameserverEntry {
    name: DomainName,

    state: EntryState,

    /// INVARIANT: no address appears twice.
    addresses: Vec<AddressInfo>,

    /// When the current `Ready` or `Unreachable` state lapses.
    ///
    /// INVARIANT: `Some` if the state is settled.
    expires_at: Option<Instant>,

    /// Generation of the outstanding resolver request.
    ///
    /// INVARIANT: `Some` if and only if the state is `InProgress`.
    request: Option<u64>,

    /// Zones to re-process once the outstanding request completes.
    ///
    /// INVARIANT: no zone appears twice.
    waiting_zones: Vec<ZoneKey>,
}

impl NameserverEntry {
    pub fn new(name: DomainName) -> Self {
        Self {
            name,
            state: EntryState::New,
            addresses: Vec::new(),
            expires_at: None,
            request: None,
            waiting_zones: Vec::new(),
        }
    }

    pub fn name(&self) -> &DomainName {
        &self.name
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn addresses(&self) -> &[AddressInfo] {
        &self.addresses
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == EntryState::InProgress
    }

    pub fn request_generation(&self) -> Option<u64> {
        self.request
    }

    pub fn waiting_zones(&self) -> &[ZoneKey] {
        &self.waiting_zones
    }

    /// Demote a settled entry whose data has expired back to `New`.
    /// Returns whether it was demoted.
    ///
    /// Data is still good at the instant it expires, so a zero TTL
    /// answer can be used by the zones which were waiting for it.
    ///
    /// Addresses are kept, so their RTTs carry over to whatever the
    /// next resolution finds, but they are not used while the entry
    /// is not `Ready`.
    pub fn refresh(&mut self, now: Instant) -> bool {
        if self.state.is_settled() && self.expires_at.map_or(true, |at| at < now) {
            self.state = EntryState::New;
            self.expires_at = None;
            true
        } else {
            false
        }
    }

    /// Record that a resolver request with the given generation has
    /// been issued for this nameserver.
    pub fn begin_resolution(&mut self, generation: u64) {
        self.state = EntryState::InProgress;
        self.request = Some(generation);
        self.expires_at = None;
    }

    /// Whether the entry is waiting for the answer to the request with
    /// the given generation.
    pub fn is_awaiting(&self, generation: u64) -> bool {
        self.is_in_flight() && self.request == Some(generation)
    }

    pub fn add_waiter(&mut self, zone: &ZoneKey) {
        if !self.waiting_zones.contains(zone) {
            self.waiting_zones.push(zone.clone());
        }
    }

    pub fn take_waiters(&mut self) -> Vec<ZoneKey> {
        std::mem::take(&mut self.waiting_zones)
    }

    /// Attach a fresh set of addresses, making the entry `Ready` (or
    /// `Unreachable`, if there are none).  Any outstanding request is
    /// forgotten, so a late answer to it is ignored.
    ///
    /// Returns the zones which were waiting on this nameserver.
    pub fn complete(&mut self, records: &[AddressRecord], expires_at: Instant) -> Vec<ZoneKey> {
        let mut addresses = Vec::with_capacity(records.len());
        for record in records {
            if addresses
                .iter()
                .any(|a: &AddressInfo| a.address == record.address)
            {
                continue;
            }

            let rtt = self
                .addresses
                .iter()
                .find(|a| a.address == record.address)
                .and_then(|a| a.rtt);
            addresses.push(AddressInfo {
                rtt,
                ..AddressInfo::new(record.address)
            });
        }

        self.state = if addresses.is_empty() {
            EntryState::Unreachable
        } else {
            EntryState::Ready
        };
        self.addresses = addresses;
        self.expires_at = Some(expires_at);
        self.request = None;
        self.take_waiters()
    }

    /// Record that resolution failed.  The entry stays `Unreachable`
    /// until `expires_at`.
    ///
    /// Returns the zones which were waiting on this nameserver.
    pub fn fail(&mut self, expires_at: Instant) -> Vec<ZoneKey> {
        self.state = EntryState::Unreachable;
        self.expires_at = Some(expires_at);
        self.request = None;
        self.take_waiters()
    }

    /// Whether the entry can be used to answer a zone right now.
    pub fn is_usable(&self, now: Instant) -> bool {
        self.state == EntryState::Ready && self.addresses.iter().any(|a| a.is_usable(now))
    }

    pub fn usable_addresses(&self, now: Instant) -> impl Iterator<Item = &AddressInfo> {
        self.addresses.iter().filter(move |a| a.is_usable(now))
    }

    /// Fold a measured round-trip time into the address's smoothed
    /// RTT.  A response means the address is reachable again.
    ///
    /// Returns false if the address is unknown.
    pub fn update_rtt(&mut self, address: IpAddr, rtt: Duration) -> bool {
        if let Some(info) = self.addresses.iter_mut().find(|a| a.address == address) {
            info.rtt = Some(match info.rtt {
                Some(old) => old.mul_f64(1.0 - RTT_SMOOTHING) + rtt.mul_f64(RTT_SMOOTHING),
                None => rtt,
            });
            info.unreachable_until = None;
            true
        } else {
            false
        }
    }

    /// Stop handing out an address until `until`.
    ///
    /// Returns false if the address is unknown.
    pub fn mark_unreachable(&mut self, address: IpAddr, until: Instant) -> bool {
        if let Some(info) = self.addresses.iter_mut().find(|a| a.address == address) {
            info.unreachable_until = Some(until);
            true
        } else {
            false
        }
    }

    /// Forget a settled answer so the next use resolves the
    /// nameserver again.  An entry with a request in flight is left
    /// alone.
    ///
    /// Returns whether the entry was invalidated.
    pub fn invalidate(&mut self) -> bool {
        if self.is_in_flight() {
            return false;
        }

        self.state = EntryState::New;
        self.addresses.clear();
        self.expires_at = None;
        true
    }
}
