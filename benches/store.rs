use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::net::Ipv4Addr;

use nsas::protocol::types::*;
use nsas::*;

/// A resolver which answers every request at once.
struct Immediate;

impl Resolver for Immediate {
    fn resolve_address(&self, request: AddressRequest, on_complete: AddressCompletion) {
        on_complete(Ok(vec![ResourceRecord {
            name: request.name,
            rtype_with_data: RecordTypeWithData::A {
                address: Ipv4Addr::new(192, 0, 2, 1),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        }]));
    }
}

#[allow(non_snake_case)]
fn bench__lookup__glue(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup/glue");
    for size in [1, 100, 1000] {
        let referrals = make_referrals(size, true);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &referrals, |b, referrals| {
            b.iter_batched(
                || NameserverAddressStore::new(Immediate),
                |store| run_lookups(&store, referrals),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

#[allow(non_snake_case)]
fn bench__lookup__resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup/resolve");
    for size in [1, 100, 1000] {
        let referrals = make_referrals(size, false);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &referrals, |b, referrals| {
            b.iter_batched(
                || NameserverAddressStore::new(Immediate),
                |store| run_lookups(&store, referrals),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

#[allow(non_snake_case)]
fn bench__lookup__hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup/hit");
    for size in [1, 100, 1000] {
        let referrals = make_referrals(size, false);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &referrals, |b, referrals| {
            b.iter_batched(
                || {
                    let store = NameserverAddressStore::new(Immediate);
                    run_lookups(&store, referrals);
                    store
                },
                |store| run_lookups(&store, referrals),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

#[allow(non_snake_case)]
fn bench__lookup__evicting(c: &mut Criterion) {
    let settings = Settings {
        zone_capacity: 10,
        nameserver_capacity: 20,
        ..Settings::default()
    };
    let mut group = c.benchmark_group("lookup/evicting");
    for size in [100, 1000] {
        let referrals = make_referrals(size, true);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &referrals, |b, referrals| {
            b.iter_batched(
                || NameserverAddressStore::with_settings(Immediate, &settings),
                |store| run_lookups(&store, referrals),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench__lookup__glue,
    bench__lookup__resolve,
    bench__lookup__hit,
    bench__lookup__evicting
);
criterion_main!(benches);

type Referral = (DomainName, Vec<ResourceRecord>, Vec<ResourceRecord>);

fn run_lookups(store: &NameserverAddressStore, referrals: &[Referral]) {
    for (zone, authority, additional) in referrals {
        store
            .lookup(zone, RecordClass::IN, authority, additional, Box::new(|_| ()))
            .unwrap();
    }
}

#[allow(clippy::cast_possible_truncation)]
fn make_referrals(size: usize, with_glue: bool) -> Vec<Referral> {
    let mut out = Vec::with_capacity(size);
    for i in 0..size {
        let zone = DomainName::from_dotted_string(&format!("zone{i}.example.com.")).unwrap();
        let mut authority = Vec::with_capacity(2);
        let mut additional = Vec::with_capacity(2);
        for n in 1..=2 {
            let nameserver =
                DomainName::from_dotted_string(&format!("ns{n}.zone{i}.example.com.")).unwrap();
            authority.push(ResourceRecord {
                name: zone.clone(),
                rtype_with_data: RecordTypeWithData::NS {
                    nsdname: nameserver.clone(),
                },
                rclass: RecordClass::IN,
                ttl: 300,
            });
            if with_glue {
                additional.push(ResourceRecord {
                    name: nameserver,
                    rtype_with_data: RecordTypeWithData::A {
                        address: Ipv4Addr::new(10, (i >> 8) as u8, i as u8, n),
                    },
                    rclass: RecordClass::IN,
                    ttl: 300,
                });
            }
        }
        out.push((zone, authority, additional));
    }
    out
}
