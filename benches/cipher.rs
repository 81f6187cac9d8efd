//! Throughput of secret protection and reveal at a few input sizes.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use credvault::cipher::{self, VaultKey};

const SIZES: [usize; 3] = [256, 1024, 1024 * 1024];

fn bench_protect(c: &mut Criterion) {
    let key = VaultKey::from_material("0123456789abcdef0123456789abcdef");
    let mut group = c.benchmark_group("protect");
    for size in SIZES {
        let plaintext = vec![b'A'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &plaintext, |b, input| {
            b.iter(|| cipher::protect(black_box(input), &key))
        });
    }
    group.finish();
}

fn bench_reveal(c: &mut Criterion) {
    let key = VaultKey::from_material("0123456789abcdef0123456789abcdef");
    let mut group = c.benchmark_group("reveal");
    for size in SIZES {
        let blob = cipher::protect(&vec![b'A'; size], &key);
        group.throughput(Throughput::Bytes(blob.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &blob, |b, input| {
            b.iter(|| cipher::reveal(black_box(input), &key))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_protect, bench_reveal);
criterion_main!(benches);
