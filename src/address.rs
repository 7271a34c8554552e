use rand::distributions::{Distribution, WeightedIndex};
use std::net::IpAddr;
use std::time::Duration;

use crate::error::LookupError;
use crate::protocol::types::DomainName;

/// Called with the answer to a `lookup`.
pub type AddressCallback = Box<dyn FnOnce(Result<NameserverAddress, LookupError>) + Send>;

/// An address to send a query for a zone to.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct NameserverAddress {
    /// The zone the address was looked up for.
    pub zone: DomainName,

    /// The nameserver the address belongs to.
    pub nameserver: DomainName,

    pub address: IpAddr,

    /// The smoothed round-trip time at the moment of selection, if
    /// any has been reported.
    pub rtt: Option<Duration>,
}

/// One address an `AddressSelector` may pick.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct AddressCandidate {
    pub nameserver: DomainName,
    pub address: IpAddr,
    pub rtt: Option<Duration>,
}

/// A policy for picking which nameserver address to hand out.
pub trait AddressSelector: Send + Sync {
    /// Pick one of the candidates, by index.  `candidates` is never
    /// empty, and an out-of-range answer is treated as 0.
    fn select(&self, candidates: &[AddressCandidate]) -> usize;
}

/// Pick at random, favouring addresses which answer quickly: the
/// chance of picking an address is proportional to 1 / rtt², with the
/// RTT in milliseconds.
///
/// Addresses which have never been measured count as 1ms, so they are
/// tried early.  RTTs under 1ms are counted as 1ms too.
#[derive(Debug, Copy, Clone, Default)]
pub struct RttWeightedSelector;

impl RttWeightedSelector {
    pub fn weight(rtt: Option<Duration>) -> f64 {
        let ms = rtt.map_or(1.0, |rtt| rtt.as_secs_f64() * 1000.0).max(1.0);
        1.0 / (ms * ms)
    }
}

impl AddressSelector for RttWeightedSelector {
    fn select(&self, candidates: &[AddressCandidate]) -> usize {
        if candidates.len() < 2 {
            return 0;
        }

        match WeightedIndex::new(candidates.iter().map(|c| Self::weight(c.rtt))) {
            Ok(dist) => dist.sample(&mut rand::thread_rng()),
            Err(error) => {
                tracing::trace!(?error, "could not weight candidates");
                0
            }
        }
    }
}

/// Always pick the first candidate: the first usable address of the
/// first usable nameserver, in referral order.
#[derive(Debug, Copy, Clone, Default)]
pub struct FirstAddressSelector;

impl AddressSelector for FirstAddressSelector {
    fn select(&self, _candidates: &[AddressCandidate]) -> usize {
        0
    }
}
