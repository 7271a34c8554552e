//! Checking referrals, and pulling addresses out of record sets.

use crate::error::InvalidReferral;
use crate::nameserver_entry::AddressRecord;
use crate::protocol::types::{DomainName, RecordClass, RecordType, ResourceRecord};

/// The nameservers a referral delegates a zone to.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Delegation {
    /// In the order of the authority section, without duplicates.
    pub nameservers: Vec<DomainName>,

    /// The smallest TTL of the NS records.
    pub ttl: u32,
}

/// Check that an authority section is a delegation of `zone` in
/// `class`: it must be non-empty, contain only NS records, and every
/// record must be owned by the zone and be in the class.
///
/// # Errors
///
/// See `InvalidReferral`.
pub fn validate(
    zone: &DomainName,
    class: RecordClass,
    authority: &[ResourceRecord],
) -> Result<Delegation, InvalidReferral> {
    if authority.is_empty() {
        return Err(InvalidReferral::EmptyAuthority);
    }

    if let Some(rr) = authority
        .iter()
        .find(|rr| rr.rtype_with_data.rtype() != RecordType::NS)
    {
        return Err(InvalidReferral::NotDelegation {
            owner: rr.name.clone(),
            rtype: rr.rtype_with_data.rtype(),
        });
    }

    let mut nameservers: Vec<DomainName> = Vec::with_capacity(authority.len());
    let mut ttl = u32::MAX;
    for rr in authority {
        if rr.name != *zone {
            return Err(InvalidReferral::ZoneMismatch {
                zone: zone.clone(),
                owner: rr.name.clone(),
            });
        }
        if rr.rclass != class {
            return Err(InvalidReferral::ClassMismatch {
                expected: class,
                actual: rr.rclass,
            });
        }

        if let Some(nsdname) = rr.nameserver() {
            if !nameservers.contains(nsdname) {
                nameservers.push(nsdname.clone());
            }
        }
        ttl = ttl.min(rr.ttl);
    }

    Ok(Delegation { nameservers, ttl })
}

/// The addresses in `records` for `name` in `class`.
pub fn addresses_for(
    name: &DomainName,
    class: RecordClass,
    records: &[ResourceRecord],
) -> Vec<AddressRecord> {
    address_records(
        records
            .iter()
            .filter(|rr| rr.name == *name && rr.rclass == class),
    )
}

/// The addresses in `records` for `name`, whatever their class.
pub fn addresses_of(name: &DomainName, records: &[ResourceRecord]) -> Vec<AddressRecord> {
    address_records(records.iter().filter(|rr| rr.name == *name))
}

fn address_records<'a>(records: impl Iterator<Item = &'a ResourceRecord>) -> Vec<AddressRecord> {
    records
        .filter_map(|rr| {
            rr.address().map(|address| AddressRecord {
                address,
                ttl: rr.ttl,
            })
        })
        .collect()
}

/// Glue: the addresses in the additional section for each delegated
/// nameserver.  Nameservers without glue are left out.  Address
/// records for any other name are ignored.
pub fn glue_addresses(
    delegation: &Delegation,
    class: RecordClass,
    additional: &[ResourceRecord],
) -> Vec<(DomainName, Vec<AddressRecord>)> {
    delegation
        .nameservers
        .iter()
        .filter_map(|ns| {
            let addresses = addresses_for(ns, class, additional);
            if addresses.is_empty() {
                None
            } else {
                Some((ns.clone(), addresses))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use crate::protocol::types::test_util::*;

    use super::*;

    #[test]
    fn validate_collects_nameservers_in_order() {
        let mut ns2 = ns_record("example.com.", "ns2.example.com.");
        ns2.ttl = 60;
        let authority = vec![
            ns_record("example.com.", "ns1.example.com."),
            ns2,
            ns_record("EXAMPLE.com.", "NS1.example.com."),
        ];

        let delegation = validate(&domain("example.com."), RecordClass::IN, &authority).unwrap();

        assert_eq!(
            vec![domain("ns1.example.com."), domain("ns2.example.com.")],
            delegation.nameservers
        );
        assert_eq!(60, delegation.ttl);
    }

    #[test]
    fn validate_rejects_empty_authority() {
        assert_eq!(
            Err(InvalidReferral::EmptyAuthority),
            validate(&domain("example.com."), RecordClass::IN, &[])
        );
    }

    #[test]
    fn validate_rejects_non_ns() {
        let authority = vec![
            ns_record("example.com.", "ns1.example.com."),
            a_record("example.com.", Ipv4Addr::new(192, 0, 2, 1)),
        ];

        let err = validate(&domain("example.com."), RecordClass::IN, &authority).unwrap_err();

        assert!(err.is_not_delegation());
        assert_eq!(
            InvalidReferral::NotDelegation {
                owner: domain("example.com."),
                rtype: RecordType::A,
            },
            err
        );
    }

    #[test]
    fn validate_rejects_soa_authority() {
        let authority = vec![
            unknown_record("example.com.", 6),
            ns_record("example.com.", "ns1.example.com."),
        ];

        assert_eq!(
            Err(InvalidReferral::NotDelegation {
                owner: domain("example.com."),
                rtype: RecordType::from(6),
            }),
            validate(&domain("example.com."), RecordClass::IN, &authority)
        );
    }

    #[test]
    fn validate_rejects_other_owner() {
        let authority = vec![ns_record("other.com.", "ns1.other.com.")];

        let err = validate(&domain("example.com."), RecordClass::IN, &authority).unwrap_err();

        assert!(err.is_zone_mismatch());
        assert_eq!(
            InvalidReferral::ZoneMismatch {
                zone: domain("example.com."),
                owner: domain("other.com."),
            },
            err
        );
    }

    #[test]
    fn validate_rejects_other_class() {
        let authority = vec![ns_record("example.com.", "ns1.example.com.")];

        let err = validate(&domain("example.com."), RecordClass::CH, &authority).unwrap_err();

        assert!(err.is_zone_mismatch());
    }

    #[test]
    fn validate_rejects_subdomain_owner() {
        let authority = vec![ns_record("www.example.com.", "ns1.example.com.")];

        assert!(validate(&domain("example.com."), RecordClass::IN, &authority)
            .unwrap_err()
            .is_zone_mismatch());
    }

    #[test]
    fn glue_is_matched_by_name_and_class() {
        let delegation = Delegation {
            nameservers: vec![domain("ns1.example.com."), domain("ns2.example.com.")],
            ttl: 300,
        };
        let v6 = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
        let mut chaos = a_record("ns2.example.com.", Ipv4Addr::new(192, 0, 2, 2));
        chaos.rclass = RecordClass::CH;
        let additional = vec![
            a_record("ns1.example.com.", Ipv4Addr::new(192, 0, 2, 1)),
            aaaa_record("ns1.example.com.", v6),
            chaos,
            a_record("www.example.com.", Ipv4Addr::new(192, 0, 2, 3)),
            cname_record("ns1.example.com.", "www.example.com."),
        ];

        let glue = glue_addresses(&delegation, RecordClass::IN, &additional);

        assert_eq!(1, glue.len());
        assert_eq!(domain("ns1.example.com."), glue[0].0);
        assert_eq!(
            vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), IpAddr::V6(v6)],
            glue[0].1.iter().map(|r| r.address).collect::<Vec<_>>()
        );
    }

    #[test]
    fn addresses_of_ignores_class() {
        let mut chaos = a_record("ns1.example.com.", Ipv4Addr::new(192, 0, 2, 1));
        chaos.rclass = RecordClass::CH;
        let records = vec![
            chaos,
            a_record("ns2.example.com.", Ipv4Addr::new(192, 0, 2, 2)),
            cname_record("ns1.example.com.", "www.example.com."),
        ];

        assert_eq!(
            vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))],
            addresses_of(&domain("ns1.example.com."), &records)
                .iter()
                .map(|r| r.address)
                .collect::<Vec<_>>()
        );
        assert!(addresses_for(&domain("ns1.example.com."), RecordClass::IN, &records).is_empty());
    }

    #[test]
    fn addresses_for_keeps_ttls() {
        let mut rr = a_record("ns1.example.com.", Ipv4Addr::new(192, 0, 2, 1));
        rr.ttl = 42;

        assert_eq!(
            vec![AddressRecord {
                address: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
                ttl: 42,
            }],
            addresses_for(&domain("ns1.example.com."), RecordClass::IN, &[rr])
        );
    }
}
