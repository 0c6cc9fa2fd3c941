//! Criterion micro-benchmarks: pool vs. the global allocator, and framer
//! throughput over a pre-built value stream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use keystone::framing::{self, FramerKind};
use keystone::Pool;

fn bench_pool_vs_box(c: &mut Criterion) {
    let pool = Pool::<[u64; 4]>::new(4096, 0).unwrap();

    let mut group = c.benchmark_group("allocation");
    group.bench_function("pool_construct_destroy", |b| {
        b.iter(|| {
            let ptr = pool.construct(black_box([1u64, 2, 3, 4])).unwrap();
            unsafe { pool.destroy(ptr) };
        })
    });
    group.bench_function("box_new_drop", |b| {
        b.iter(|| {
            let boxed = Box::new(black_box([1u64, 2, 3, 4]));
            drop(boxed);
        })
    });
    group.finish();
}

fn bench_framers(c: &mut Criterion) {
    let mut stream = Vec::new();
    for i in 0..512 {
        stream.extend_from_slice(
            format!("{{\"id\":{},\"name\":\"item-{}\",\"tags\":[1,2,3]}}\n", i, i).as_bytes(),
        );
    }

    let mut group = c.benchmark_group("framing");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    for kind in [FramerKind::Incremental, FramerKind::RingBuffer] {
        group.bench_function(format!("{}", kind), |b| {
            b.iter(|| {
                let count = Arc::new(AtomicUsize::new(0));
                let counter = Arc::clone(&count);
                let mut framer = framing::create(
                    kind,
                    Box::new(move |_json| {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }),
                    None,
                    8192,
                );
                framer.push(black_box(&stream));
                assert_eq!(count.load(Ordering::Relaxed), 512);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pool_vs_box, bench_framers);
criterion_main!(benches);
