use std::fmt;

use crate::protocol::types::{DomainName, RecordClass, RecordType};

/// Reasons a referral is refused by `lookup`.  A refused referral
/// leaves the store untouched.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum InvalidReferral {
    /// The authority section has no records.
    EmptyAuthority,

    /// An authority record is not an NS record.
    NotDelegation { owner: DomainName, rtype: RecordType },

    /// An authority record is owned by some other zone.
    ZoneMismatch { zone: DomainName, owner: DomainName },

    /// An authority record is in some other class.
    ClassMismatch {
        expected: RecordClass,
        actual: RecordClass,
    },
}

impl InvalidReferral {
    pub fn is_not_delegation(&self) -> bool {
        matches!(
            self,
            InvalidReferral::EmptyAuthority | InvalidReferral::NotDelegation { .. }
        )
    }

    pub fn is_zone_mismatch(&self) -> bool {
        matches!(
            self,
            InvalidReferral::ZoneMismatch { .. } | InvalidReferral::ClassMismatch { .. }
        )
    }
}

impl fmt::Display for InvalidReferral {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InvalidReferral::EmptyAuthority => write!(f, "referral has no authority records"),
            InvalidReferral::NotDelegation { owner, rtype } => {
                write!(f, "'{owner}' {rtype} is not a delegation")
            }
            InvalidReferral::ZoneMismatch { zone, owner } => {
                write!(f, "'{owner}' does not match zone '{zone}'")
            }
            InvalidReferral::ClassMismatch { expected, actual } => {
                write!(f, "class {actual} does not match class {expected}")
            }
        }
    }
}

impl std::error::Error for InvalidReferral {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// Reasons a queued lookup is answered without an address.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum LookupError {
    /// Every nameserver of the zone is unreachable.
    ResolutionFailure { zone: DomainName },

    /// The zone was evicted to make room while the lookup waited.
    CapacityEviction { zone: DomainName },

    /// The store was dropped before the lookup was answered.
    StoreDropped,
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LookupError::ResolutionFailure { zone } => {
                write!(f, "no nameserver of '{zone}' is reachable")
            }
            LookupError::CapacityEviction { zone } => {
                write!(f, "'{zone}' was evicted while waiting for an address")
            }
            LookupError::StoreDropped => write!(f, "address store dropped"),
        }
    }
}

impl std::error::Error for LookupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
