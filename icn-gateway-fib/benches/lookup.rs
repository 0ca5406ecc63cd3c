use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use icn_gateway_common::MeshAddress;
use icn_gateway_fib::{ForwardingTable, NextHops};

fn populated_table(prefixes: usize) -> ForwardingTable {
    let mut fib = ForwardingTable::new(prefixes, 3);
    for i in 0..prefixes {
        let hop: NextHops = MeshAddress::new(format!("AA:BB:CC:DD:{:02X}:01", i % 256))
            .into_iter()
            .collect();
        let _ = fib.save(&format!("/sensor/{}/temp", i), hop);
    }
    fib
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("fib_lookup");

    for &size in &[10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("exact", size), &size, |b, &size| {
            let mut fib = populated_table(size);
            let name = format!("/sensor/{}/temp", size / 2);
            b.iter(|| fib.lookup(black_box(&name)))
        });

        group.bench_with_input(BenchmarkId::new("degrade", size), &size, |b, &size| {
            let mut fib = populated_table(size);
            let name = format!("/sensor/{}/temp/1700000000000/extra", size / 2);
            b.iter(|| fib.lookup(black_box(&name)))
        });

        group.bench_with_input(BenchmarkId::new("miss", size), &size, |b, &size| {
            let mut fib = populated_table(size);
            b.iter(|| fib.lookup(black_box("/unknown/sensor/reading")))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lookup);
criterion_main!(benches);
