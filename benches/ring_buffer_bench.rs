//! Criterion benchmark for the SPSC ring buffer
//!
//! Run with: cargo bench --bench ring_buffer_bench

use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use hotpath::core::RingBuffer;

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_trip");
    group.throughput(Throughput::Elements(1));

    // Steady state: one item in flight, cells reused in order
    group.bench_function("u64", |b| {
        let mut rb: RingBuffer<u64, 1024> = RingBuffer::new();
        let mut i = 0u64;
        b.iter(|| {
            let _ = rb.enqueue(black_box(i));
            i = black_box(rb.dequeue()).unwrap_or(i).wrapping_add(1);
        });
    });

    // Heap-owning payload moved through the ring; the same buffer circulates
    // so only the moves are timed, not allocation
    group.bench_function("owned_string", |b| {
        let mut rb: RingBuffer<String, 1024> = RingBuffer::new();
        let mut payload = Some(String::from("ORDER|BUY|XYZ|100@10.25"));
        b.iter(|| {
            if let Some(s) = payload.take() {
                let _ = rb.enqueue(s);
            }
            payload = rb.dequeue().ok();
            black_box(payload.as_deref());
        });
    });

    // Half-full ring holding boxed records
    group.bench_function("boxed_half_full", |b| {
        let mut rb: RingBuffer<Box<[u64; 8]>, 1024> = RingBuffer::new();
        for i in 0..512u64 {
            let _ = rb.enqueue(Box::new([i; 8]));
        }
        b.iter(|| {
            if let Ok(item) = rb.dequeue() {
                let _ = rb.enqueue(black_box(item));
            }
        });
    });

    // Rejection path: the item comes straight back to the caller
    group.bench_function("rejected_when_full", |b| {
        let mut rb: RingBuffer<String, 4> = RingBuffer::new();
        while rb.enqueue(String::new()).is_ok() {}
        let mut spare = Some(String::from("spare"));
        b.iter(|| {
            if let Some(s) = spare.take() {
                spare = Some(rb.enqueue(s).unwrap_err().into_inner());
            }
            black_box(spare.as_deref());
        });
    });

    group.finish();
}

fn bench_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");

    for batch_size in [100u64, 1000, 10000] {
        group.throughput(Throughput::Elements(batch_size));
        group.bench_function(format!("batch_{}", batch_size), |b| {
            let mut rb: RingBuffer<u64, 65536> = RingBuffer::new();
            b.iter(|| {
                for i in 0..batch_size {
                    let _ = rb.enqueue(black_box(i));
                }
                for _ in 0..batch_size {
                    let _ = black_box(rb.dequeue());
                }
            });
        });
    }

    group.finish();
}

fn bench_cross_thread(c: &mut Criterion) {
    const ITEMS: u64 = 100_000;

    let mut group = c.benchmark_group("cross_thread");
    group.throughput(Throughput::Elements(ITEMS));
    group.sample_size(20);

    group.bench_function("spsc_100k", |b| {
        b.iter(|| {
            let (mut producer, mut consumer) = RingBuffer::<u64, 1024>::new().split();
            let handle = thread::spawn(move || {
                let mut next = 0u64;
                while next < ITEMS {
                    if producer.enqueue(next).is_ok() {
                        next += 1;
                    }
                }
            });

            let mut received = 0u64;
            while received < ITEMS {
                if let Ok(v) = consumer.dequeue() {
                    black_box(v);
                    received += 1;
                }
            }
            handle.join().ok();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_round_trip, bench_batches, bench_cross_thread);
criterion_main!(benches);
