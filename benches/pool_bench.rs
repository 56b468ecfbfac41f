//! Criterion benchmark for the slot pools
//!
//! Run with: cargo bench --bench pool_bench

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use hotpath::pool::{FixedPool, GrowablePool};

#[derive(Clone, Copy)]
struct Order {
    id: u64,
    price: i64,
    quantity: u32,
}

fn order(id: u64) -> Order {
    Order {
        id,
        price: 10_050,
        quantity: 7,
    }
}

fn bench_fixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_pool");
    group.throughput(Throughput::Elements(1));

    group.bench_function("alloc_free", |b| {
        let mut pool: FixedPool<Order, 1024> = FixedPool::new();
        let mut i = 0u64;
        b.iter(|| {
            if let Ok(ptr) = pool.alloc(black_box(order(i))) {
                let _ = pool.free(ptr.as_ptr());
            }
            i = i.wrapping_add(1);
        });
    });

    // Worst case for the free-slot scan: only the last slot is free
    group.bench_function("alloc_free_nearly_full", |b| {
        let mut pool: FixedPool<Order, 1024> = FixedPool::new();
        for i in 0..1023 {
            let _ = pool.alloc(order(i));
        }
        b.iter(|| {
            if let Ok(ptr) = pool.alloc(black_box(order(0))) {
                let _ = pool.free(ptr.as_ptr());
            }
        });
    });

    group.finish();
}

fn bench_fixed_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_pool_fill");
    group.throughput(Throughput::Elements(4096));

    group.bench_function("fill_4096", |b| {
        b.iter_batched_ref(
            FixedPool::<Order, 4096>::new,
            |pool| {
                for i in 0..4096u64 {
                    black_box(pool.alloc(order(i)).is_ok());
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_growable(c: &mut Criterion) {
    let mut group = c.benchmark_group("growable_pool");
    group.throughput(Throughput::Elements(1));

    group.bench_function("alloc_free_steady", |b| {
        let mut pool: GrowablePool<Order> = GrowablePool::new(1024);
        let mut i = 0u64;
        b.iter(|| {
            let handle = pool.alloc(black_box(order(i)));
            let _ = pool.free(handle);
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("get", |b| {
        let mut pool: GrowablePool<Order> = GrowablePool::new(16);
        let handles: Vec<_> = (0..1000).map(|i| pool.alloc(order(i))).collect();
        let mut n = 0usize;
        b.iter(|| {
            let o = pool.get(handles[n % handles.len()]);
            black_box(o.map(|o| o.price * o.quantity as i64 + o.id as i64));
            n += 1;
        });
    });

    group.throughput(Throughput::Elements(10_000));
    group.bench_function("grow_from_one_10k", |b| {
        b.iter(|| {
            let mut pool: GrowablePool<Order> = GrowablePool::new(1);
            for i in 0..10_000u64 {
                black_box(pool.alloc(order(i)));
            }
            black_box(pool.capacity())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fixed, bench_fixed_fill, bench_growable);
criterion_main!(benches);
