//! Order pipeline demo
//!
//! A gateway thread places orders in a shared fixed pool and passes slot
//! indices through an SPSC ring to a matcher thread, which reads each order
//! and frees its slot. Both sides log through their own async logger.
//!
//! Run with: cargo run --release --example pipeline

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hotpath::core::RingBuffer;
use hotpath::error::LogError;
use hotpath::logging::{LogConfig, LogLevel, LogWriter};
use hotpath::pool::FixedPool;

const ORDERS: u64 = 200_000;
const POOL_SLOTS: usize = 512;
const RING_SLOTS: usize = 256;

#[derive(Debug)]
struct Order {
    id: u64,
    side: Side,
    price: i64,
    quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Buy,
    Sell,
}

type OrderPool = FixedPool<Order, POOL_SLOTS>;

fn main() -> Result<(), LogError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let log_dir = std::env::temp_dir().join("hotpath-pipeline");
    let (gateway_log, gateway_writer) = LogWriter::spawn(
        LogConfig::new(&log_dir)
            .file_stem("gateway")
            .min_level(LogLevel::Debug),
    )?;
    let (matcher_log, matcher_writer) =
        LogWriter::spawn(LogConfig::new(&log_dir).file_stem("matcher"))?;

    let pool = Arc::new(Mutex::new(OrderPool::new()));
    let (mut tx, mut rx) = RingBuffer::<usize, RING_SLOTS>::new().split();

    let start = Instant::now();

    let gateway = {
        let pool = Arc::clone(&pool);
        thread::Builder::new()
            .name("gateway".into())
            .spawn(move || {
                let mut log = gateway_log;
                let mut exhausted = 0u64;
                let mut id = 0u64;
                while id < ORDERS {
                    let order = Order {
                        id,
                        side: if id % 2 == 0 { Side::Buy } else { Side::Sell },
                        price: 10_000 + (id % 50) as i64,
                        quantity: 1 + (id % 10) as u32,
                    };

                    let placed = {
                        let mut pool = pool.lock();
                        pool.alloc_with(|| order)
                            .map(|ptr| pool.slot_index(ptr.as_ptr()))
                    };
                    let mut index = match placed {
                        Ok(index) => index.expect("pointer handed out by this pool"),
                        Err(e) => {
                            exhausted += 1;
                            let _ = log.debug(format!("order {id} waiting: {e}"));
                            thread::yield_now();
                            continue;
                        }
                    };

                    while let Err(full) = tx.enqueue(index) {
                        index = full.into_inner();
                        std::hint::spin_loop();
                    }
                    id += 1;
                }
                let _ = log.info(format!("gateway done, pool exhausted {exhausted} times"));
                (exhausted, log.dropped())
            })
            .expect("spawn gateway")
    };

    let matcher = {
        let pool = Arc::clone(&pool);
        thread::Builder::new()
            .name("matcher".into())
            .spawn(move || {
                let mut log = matcher_log;
                let mut matched = 0u64;
                let mut notional = 0i64;
                let mut next_id = 0u64;
                while matched < ORDERS {
                    let Ok(index) = rx.dequeue() else {
                        std::hint::spin_loop();
                        continue;
                    };

                    let mut pool = pool.lock();
                    let Some(ptr) = pool.ptr_at(index) else {
                        let _ = log.error(format!("slot {index} arrived empty"));
                        continue;
                    };
                    match pool.take(ptr.as_ptr()) {
                        Ok(order) => {
                            assert_eq!(order.id, next_id, "orders must arrive in sequence");
                            let signed = match order.side {
                                Side::Buy => order.quantity as i64,
                                Side::Sell => -(order.quantity as i64),
                            };
                            notional += signed * order.price;
                            next_id += 1;
                            matched += 1;
                            if matched % 50_000 == 0 {
                                let _ = log.info(format!("matched {matched} orders"));
                            }
                        }
                        Err(e) => {
                            let _ = log.error(format!("slot {index}: {e}"));
                        }
                    }
                }
                (matched, notional)
            })
            .expect("spawn matcher")
    };

    let (exhausted, gateway_dropped) = gateway.join().expect("gateway panicked");
    let (matched, notional) = matcher.join().expect("matcher panicked");
    let elapsed = start.elapsed();

    let gateway_stats = gateway_writer.shutdown()?;
    let matcher_stats = matcher_writer.shutdown()?;

    info!(
        matched,
        exhausted,
        notional,
        gateway_dropped,
        live = pool.lock().len(),
        "pipeline finished"
    );
    println!(
        "{} orders in {:.2} ms ({:.2} M orders/sec)",
        matched,
        elapsed.as_secs_f64() * 1000.0,
        matched as f64 / elapsed.as_secs_f64() / 1_000_000.0
    );
    println!("gateway log: {}", gateway_stats.path.display());
    println!("matcher log: {}", matcher_stats.path.display());
    Ok(())
}
