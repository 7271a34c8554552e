use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::address::{
    AddressCallback, AddressCandidate, AddressSelector, NameserverAddress, RttWeightedSelector,
};
use crate::collections::entry_table::{EntryId, EntryTable};
use crate::error::{InvalidReferral, LookupError};
use crate::nameserver_entry::{AddressInfo, AddressRecord, NameserverEntry};
use crate::protocol::types::{DomainName, RecordClass, ResourceRecord};
use crate::referral::{self, Delegation};
use crate::resolver::{AddressRequest, ResolutionError, Resolver};
use crate::settings::Settings;
use crate::state::EntryState;
use crate::zone_entry::{ZoneEntry, ZoneKey};

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] address store mutex poisoned, cannot recover from this - aborting";

/// A cache of nameserver addresses, keyed by the zones they serve.
///
/// Given a referral, `lookup` answers with an address of one of the
/// zone's nameservers: straight away if one is cached, or once the
/// `Resolver` has found one.  Any number of lookups for a zone can
/// wait on the same resolution.
///
/// Invoking `clone` gives a new handle to the same store.
#[derive(Clone)]
pub struct NameserverAddressStore {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<StoreState>,
    resolver: Box<dyn Resolver>,
    selector: Box<dyn AddressSelector>,
}

/// Sizes of the store's tables.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StoreStats {
    pub zones: usize,
    pub zone_lru: usize,
    pub nameservers: usize,
    pub nameserver_lru: usize,

    /// Resolutions still in flight for nameservers which have been
    /// evicted.
    pub parked_resolutions: usize,
}

impl NameserverAddressStore {
    /// A store with the default settings and selector.
    pub fn new<R: Resolver + 'static>(resolver: R) -> Self {
        Self::with_settings(resolver, &Settings::default())
    }

    /// A store using the `RttWeightedSelector`.
    ///
    /// Panics:
    ///
    /// - If any of the hash sizes or capacities is 0.
    pub fn with_settings<R: Resolver + 'static>(resolver: R, settings: &Settings) -> Self {
        Self::with_selector(resolver, settings, RttWeightedSelector)
    }

    /// Panics:
    ///
    /// - If any of the hash sizes or capacities is 0.
    pub fn with_selector<R, S>(resolver: R, settings: &Settings, selector: S) -> Self
    where
        R: Resolver + 'static,
        S: AddressSelector + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(StoreState::new(settings)),
                resolver: Box::new(resolver),
                selector: Box::new(selector),
            }),
        }
    }

    /// Ask for an address of a nameserver of `zone`, as delegated to
    /// by the `authority` section of a referral.  Address records in
    /// `additional` for the delegated nameservers are used as glue.
    ///
    /// `callback` is called exactly once, possibly before this
    /// returns.  It is not called if the referral is refused.
    ///
    /// # Errors
    ///
    /// If the referral is not a delegation of `zone` in `class`.  The
    /// store is not changed.
    pub fn lookup(
        &self,
        zone: &DomainName,
        class: RecordClass,
        authority: &[ResourceRecord],
        additional: &[ResourceRecord],
        callback: AddressCallback,
    ) -> Result<(), InvalidReferral> {
        let delegation = match referral::validate(zone, class, authority) {
            Ok(delegation) => delegation,
            Err(error) => {
                tracing::debug!(%zone, %error, "refusing referral");
                return Err(error);
            }
        };
        let glue = referral::glue_addresses(&delegation, class, additional);
        let key = ZoneKey::new(zone.clone(), class);
        let now = Instant::now();

        let mut effects = Effects::default();
        {
            let mut state = self.lock();
            let selector = &*self.shared.selector;

            for (name, addresses) in glue {
                state.apply_glue(name, &addresses, now, selector, &mut effects);
            }

            let zone_id = state.admit_zone(&key, delegation, now, &mut effects);
            if let Some(zone) = state.zones.get_mut(zone_id) {
                zone.enqueue(callback);
            }
            state.process_zone(&key, now, selector, &mut effects);
        }
        self.run(effects);

        Ok(())
    }

    /// Like `lookup`, but answers through a future.
    ///
    /// # Errors
    ///
    /// If the referral is not a delegation of `zone` in `class`.
    pub fn lookup_address(
        &self,
        zone: &DomainName,
        class: RecordClass,
        authority: &[ResourceRecord],
        additional: &[ResourceRecord],
    ) -> Result<PendingAddress, InvalidReferral> {
        let (sender, receiver) = oneshot::channel::<Result<NameserverAddress, LookupError>>();
        self.lookup(
            zone,
            class,
            authority,
            additional,
            Box::new(move |result| {
                // the receiver may have given up
                let _ = sender.send(result);
            }),
        )?;
        Ok(PendingAddress { receiver })
    }

    /// Report a measured round-trip time to an address, which also
    /// marks it as reachable.  Returns false if the address is no
    /// longer cached.
    pub fn update_rtt(&self, address: &NameserverAddress, rtt: Duration) -> bool {
        let mut state = self.lock();
        match state.nameservers.find(&address.nameserver) {
            Some(id) => state
                .nameservers
                .get_mut(id)
                .map_or(false, |entry| entry.update_rtt(address.address, rtt)),
            None => false,
        }
    }

    /// Report that an address did not answer.  It will not be handed
    /// out again until the unreachable TTL has passed, or an RTT is
    /// reported for it.  Returns false if the address is no longer
    /// cached.
    pub fn mark_unreachable(&self, address: &NameserverAddress) -> bool {
        let mut state = self.lock();
        let until = Instant::now() + state.unreachable_ttl;
        match state.nameservers.find(&address.nameserver) {
            Some(id) => {
                tracing::debug!(nameserver = %address.nameserver, address = %address.address, "marking address unreachable");
                state
                    .nameservers
                    .get_mut(id)
                    .map_or(false, |entry| entry.mark_unreachable(address.address, until))
            }
            None => false,
        }
    }

    /// Forget the nameserver set of a zone, so the next referral for
    /// it is used instead.  Waiting lookups are kept.  Returns false
    /// if the zone is not cached.
    pub fn invalidate_zone(&self, zone: &DomainName, class: RecordClass) -> bool {
        let mut state = self.lock();
        let key = ZoneKey::new(zone.clone(), class);
        match state.zones.find(&key) {
            Some(id) => {
                if let Some(entry) = state.zones.get_mut(id) {
                    entry.invalidate(Instant::now());
                }
                true
            }
            None => false,
        }
    }

    /// Forget the addresses of a nameserver, so it is resolved again
    /// next time it is needed.  Returns false if it is not cached or
    /// is being resolved right now.
    pub fn invalidate_nameserver(&self, name: &DomainName) -> bool {
        let mut state = self.lock();
        match state.nameservers.find(name) {
            Some(id) => state
                .nameservers
                .get_mut(id)
                .map_or(false, NameserverEntry::invalidate),
            None => false,
        }
    }

    /// A zone whose nameserver set has expired is reported as `New`,
    /// as the next lookup will take a fresh one from its referral.
    pub fn zone_state(&self, zone: &DomainName, class: RecordClass) -> Option<EntryState> {
        let now = Instant::now();
        let state = self.lock();
        let key = ZoneKey::new(zone.clone(), class);
        state
            .zones
            .find(&key)
            .and_then(|id| state.zones.get(id))
            .map(|entry| entry.state_at(now))
    }

    pub fn zone_nameservers(&self, zone: &DomainName, class: RecordClass) -> Option<Vec<DomainName>> {
        let state = self.lock();
        let key = ZoneKey::new(zone.clone(), class);
        state
            .zones
            .find(&key)
            .and_then(|id| state.zones.get(id))
            .map(|entry| entry.nameservers().to_vec())
    }

    pub fn nameserver_state(&self, name: &DomainName) -> Option<EntryState> {
        let state = self.lock();
        state
            .nameservers
            .find(name)
            .and_then(|id| state.nameservers.get(id))
            .map(NameserverEntry::state)
    }

    /// The cached addresses of a nameserver, usable or not.
    pub fn nameserver_addresses(&self, name: &DomainName) -> Vec<AddressInfo> {
        let state = self.lock();
        state
            .nameservers
            .find(name)
            .and_then(|id| state.nameservers.get(id))
            .map(|entry| entry.addresses().to_vec())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.lock();
        StoreStats {
            zones: state.zones.len(),
            zone_lru: state.zones.lru_len(),
            nameservers: state.nameservers.len(),
            nameserver_lru: state.nameservers.lru_len(),
            parked_resolutions: state.parked.len(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.shared.state.lock().expect(MUTEX_POISON_MESSAGE)
    }

    /// Handle the answer to a resolver request.
    fn resolved(
        &self,
        name: DomainName,
        generation: u64,
        result: Result<Vec<ResourceRecord>, ResolutionError>,
    ) {
        let addresses = match result {
            Ok(records) => referral::addresses_of(&name, &records),
            Err(error) => {
                tracing::debug!(%name, %error, "could not resolve nameserver");
                Vec::new()
            }
        };
        let now = Instant::now();

        let mut effects = Effects::default();
        {
            let mut state = self.lock();
            let selector = &*self.shared.selector;
            state.complete_resolution(name, generation, &addresses, now, selector, &mut effects);
        }
        self.run(effects);
    }

    /// Call the callbacks and send the requests gathered while the
    /// lock was held.
    fn run(&self, effects: Effects) {
        for (callback, result) in effects.callbacks {
            callback(result);
        }

        for PendingRequest {
            request,
            generation,
        } in effects.requests
        {
            tracing::trace!(name = %request.name, %generation, "resolving nameserver");
            let store = Arc::downgrade(&self.shared);
            let name = request.name.clone();
            self.shared.resolver.resolve_address(
                request,
                Box::new(move |result| {
                    if let Some(shared) = Weak::upgrade(&store) {
                        NameserverAddressStore { shared }.resolved(name, generation, result);
                    }
                }),
            );
        }
    }
}

impl std::fmt::Debug for NameserverAddressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameserverAddressStore")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// The answer to a `lookup_address`.
#[derive(Debug)]
pub struct PendingAddress {
    receiver: oneshot::Receiver<Result<NameserverAddress, LookupError>>,
}

impl Future for PendingAddress {
    type Output = Result<NameserverAddress, LookupError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(LookupError::StoreDropped)))
    }
}

/// Work which has to happen after the lock is released.
#[derive(Default)]
struct Effects {
    /// In the order the lookups were answered.
    callbacks: Vec<(AddressCallback, Result<NameserverAddress, LookupError>)>,
    requests: Vec<PendingRequest>,
}

struct PendingRequest {
    request: AddressRequest,
    generation: u64,
}

/// A resolution still in flight for a nameserver which was evicted.
/// Its answer re-creates the entry and goes to the waiting zones.
#[derive(Debug)]
struct ParkedResolution {
    generation: u64,
    waiting_zones: Vec<ZoneKey>,
}

/// Everything behind the store's lock.
struct StoreState {
    zones: EntryTable<ZoneKey, ZoneEntry>,

    nameservers: EntryTable<DomainName, NameserverEntry>,

    /// INVARIANT: no name in here is also in `nameservers`.
    parked: HashMap<DomainName, ParkedResolution>,

    /// Generation of the next resolver request.  Every request gets a
    /// new one, so answers to abandoned requests can be told apart.
    next_generation: u64,

    max_ttl: Duration,

    unreachable_ttl: Duration,
}

impl StoreState {
    fn new(settings: &Settings) -> Self {
        Self {
            zones: EntryTable::new(settings.zone_hash_size, settings.zone_capacity),
            nameservers: EntryTable::new(
                settings.nameserver_hash_size,
                settings.nameserver_capacity,
            ),
            parked: HashMap::new(),
            next_generation: 0,
            max_ttl: settings.max_ttl(),
            unreachable_ttl: settings.unreachable_ttl(),
        }
    }

    fn expiry(&self, now: Instant, ttl: u32) -> Instant {
        now + Duration::from_secs(ttl.into()).min(self.max_ttl)
    }

    /// Find the zone, or create it from the delegation.  An expired
    /// zone takes its nameservers from the delegation again.
    fn admit_zone(
        &mut self,
        key: &ZoneKey,
        delegation: Delegation,
        now: Instant,
        effects: &mut Effects,
    ) -> EntryId {
        let expires_at = self.expiry(now, delegation.ttl);

        if let Some(id) = self.zones.find(key) {
            self.zones.touch(id);
            if let Some(zone) = self.zones.get_mut(id) {
                if zone.is_expired(now) {
                    tracing::trace!(%key, "reseeding expired zone");
                    zone.reseed(delegation.nameservers, expires_at);
                }
            }
            return id;
        }

        let entry = ZoneEntry::new(key.clone(), delegation.nameservers, expires_at);
        let (id, evicted) = self.zones.insert(key.clone(), entry, |zone| !zone.has_pending());
        if let Some((evicted_key, mut evicted_zone)) = evicted {
            let pending = evicted_zone.take_pending();
            tracing::debug!(zone = %evicted_key, pending = %pending.len(), "evicting zone");
            for callback in pending {
                effects.callbacks.push((
                    callback,
                    Err(LookupError::CapacityEviction {
                        zone: evicted_key.name.clone(),
                    }),
                ));
            }
        }
        id
    }

    /// Create an entry for a nameserver, making room if need be.  A
    /// nameserver evicted while being resolved is parked.
    fn insert_nameserver(&mut self, name: &DomainName) -> EntryId {
        let mut entry = NameserverEntry::new(name.clone());
        if let Some(parked) = self.parked.remove(name) {
            for zone in &parked.waiting_zones {
                entry.add_waiter(zone);
            }
        }

        let (id, evicted) = self
            .nameservers
            .insert(name.clone(), entry, |ns| !ns.is_in_flight());
        if let Some((evicted_name, mut evicted_entry)) = evicted {
            if let Some(generation) = evicted_entry.request_generation() {
                tracing::debug!(nameserver = %evicted_name, %generation, "evicting nameserver in flight");
                self.parked.insert(
                    evicted_name,
                    ParkedResolution {
                        generation,
                        waiting_zones: evicted_entry.take_waiters(),
                    },
                );
            } else {
                tracing::trace!(nameserver = %evicted_name, "evicting nameserver");
            }
        }
        id
    }

    /// Issue a resolver request for a nameserver on behalf of a zone.
    fn begin_resolution(&mut self, id: EntryId, zone: &ZoneKey, effects: &mut Effects) {
        let generation = self.next_generation;
        self.next_generation += 1;

        if let Some(entry) = self.nameservers.get_mut(id) {
            entry.begin_resolution(generation);
            entry.add_waiter(zone);
            effects.requests.push(PendingRequest {
                request: AddressRequest {
                    name: entry.name().clone(),
                },
                generation,
            });
        }
    }

    /// Use the glue for a nameserver, unless it already has usable
    /// addresses.  Zones waiting on the nameserver are processed.
    fn apply_glue(
        &mut self,
        name: DomainName,
        addresses: &[AddressRecord],
        now: Instant,
        selector: &dyn AddressSelector,
        effects: &mut Effects,
    ) {
        let id = match self.nameservers.find(&name) {
            Some(id) => {
                self.nameservers.touch(id);
                id
            }
            None => self.insert_nameserver(&name),
        };

        let ttl = addresses.iter().map(|a| a.ttl).min().unwrap_or(0);
        let expires_at = self.expiry(now, ttl);
        let waiters = match self.nameservers.get_mut(id) {
            Some(entry) => {
                entry.refresh(now);
                if entry.is_usable(now) {
                    return;
                }
                tracing::trace!(nameserver = %name, "using glue");
                entry.complete(addresses, expires_at)
            }
            None => return,
        };

        for zone in waiters {
            self.process_zone(&zone, now, selector, effects);
        }
    }

    /// Apply the answer to a resolver request, if it is still wanted,
    /// and process the zones waiting on it.
    fn complete_resolution(
        &mut self,
        name: DomainName,
        generation: u64,
        addresses: &[AddressRecord],
        now: Instant,
        selector: &dyn AddressSelector,
        effects: &mut Effects,
    ) {
        let awaiting = self.nameservers.find(&name).filter(|id| {
            self.nameservers
                .get(*id)
                .map_or(false, |entry| entry.is_awaiting(generation))
        });
        let parked = self
            .parked
            .get(&name)
            .map_or(false, |parked| parked.generation == generation);

        let id = match awaiting {
            Some(id) => id,
            None if parked => {
                tracing::trace!(nameserver = %name, %generation, "restoring parked nameserver");
                self.insert_nameserver(&name)
            }
            None => {
                tracing::trace!(nameserver = %name, %generation, "ignoring stale resolution");
                return;
            }
        };

        let ttl = addresses.iter().map(|a| a.ttl).min().unwrap_or(0);
        let ready_until = self.expiry(now, ttl);
        let unreachable_until = now + self.unreachable_ttl;
        let waiters = match self.nameservers.get_mut(id) {
            Some(entry) if addresses.is_empty() => {
                tracing::debug!(nameserver = %name, "nameserver unreachable");
                entry.fail(unreachable_until)
            }
            Some(entry) => {
                tracing::trace!(nameserver = %name, addresses = %addresses.len(), "nameserver resolved");
                entry.complete(addresses, ready_until)
            }
            None => return,
        };

        for zone in waiters {
            self.process_zone(&zone, now, selector, effects);
        }
    }

    /// Work out what can be said about a zone from its nameservers,
    /// start resolving any which are unknown, and answer the waiting
    /// lookups if possible.
    ///
    /// Running this again with nothing changed does nothing.
    fn process_zone(
        &mut self,
        key: &ZoneKey,
        now: Instant,
        selector: &dyn AddressSelector,
        effects: &mut Effects,
    ) {
        let Some(nameservers) = self
            .zones
            .find(key)
            .and_then(|id| self.zones.get(id))
            .map(|zone| zone.nameservers().to_vec())
        else {
            return;
        };

        let mut candidates = Vec::new();
        let mut in_progress = false;
        for name in &nameservers {
            let id = if let Some(id) = self.nameservers.find(name) {
                self.nameservers.touch(id);
                id
            } else if let Some(parked) = self.parked.get_mut(name) {
                if !parked.waiting_zones.contains(key) {
                    parked.waiting_zones.push(key.clone());
                }
                in_progress = true;
                continue;
            } else {
                self.insert_nameserver(name)
            };

            let Some(entry) = self.nameservers.get_mut(id) else {
                continue;
            };
            entry.refresh(now);
            match entry.state() {
                EntryState::Ready => {
                    candidates.extend(entry.usable_addresses(now).map(|info| AddressCandidate {
                        nameserver: name.clone(),
                        address: info.address,
                        rtt: info.rtt,
                    }));
                }
                EntryState::InProgress => {
                    entry.add_waiter(key);
                    in_progress = true;
                }
                EntryState::Unreachable => (),
                EntryState::New => {
                    self.begin_resolution(id, key, effects);
                    in_progress = true;
                }
            }
        }

        let Some(zone) = self.zones.find(key).and_then(|id| self.zones.get_mut(id)) else {
            return;
        };
        if !candidates.is_empty() {
            for callback in zone.mark_ready() {
                let chosen = candidates
                    .get(selector.select(&candidates))
                    .unwrap_or(&candidates[0]);
                effects.callbacks.push((
                    callback,
                    Ok(NameserverAddress {
                        zone: key.name.clone(),
                        nameserver: chosen.nameserver.clone(),
                        address: chosen.address,
                        rtt: chosen.rtt,
                    }),
                ));
            }
        } else if in_progress {
            zone.mark_in_progress();
        } else {
            let pending = zone.mark_unreachable();
            if !pending.is_empty() {
                tracing::debug!(zone = %key, pending = %pending.len(), "no reachable nameserver");
            }
            for callback in pending {
                effects.callbacks.push((
                    callback,
                    Err(LookupError::ResolutionFailure {
                        zone: key.name.clone(),
                    }),
                ));
            }
        }
    }
}
