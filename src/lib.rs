//! A nameserver address store for a recursive DNS resolver.
//!
//! Given a referral, a `NameserverAddressStore` hands out an address
//! of one of the delegated nameservers: from cache, from glue, or
//! by asking a `Resolver` and waiting.  Zones and nameservers are
//! cached separately, each in a bounded table with LRU eviction.

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// Don't care enough to fix
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![allow(clippy::wildcard_imports)]

pub mod address;
pub mod collections;
pub mod error;
pub mod nameserver_entry;
pub mod protocol;
pub mod referral;
pub mod resolver;
pub mod settings;
pub mod state;
pub mod store;
pub mod zone_entry;

pub use self::address::{
    AddressCallback, AddressCandidate, AddressSelector, FirstAddressSelector, NameserverAddress,
    RttWeightedSelector,
};
pub use self::error::{InvalidReferral, LookupError};
pub use self::resolver::{
    AddressCompletion, AddressRequest, ResolutionError, Resolver, TokioResolver,
};
pub use self::settings::Settings;
pub use self::state::EntryState;
pub use self::store::{NameserverAddressStore, PendingAddress, StoreStats};
pub use self::zone_entry::ZoneKey;
