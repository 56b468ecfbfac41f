//! Hotpath latency probe
//!
//! Times the hot-path primitives in-process:
//! - Ring buffer enqueue / dequeue
//! - Fixed and growable slot pool alloc / free
//! - Logger submit latency and end-to-end drain

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hotpath::core::RingBuffer;
use hotpath::error::LogError;
use hotpath::logging::{LogConfig, LogLevel, LogWriter};
use hotpath::pool::{FixedPool, GrowablePool};

#[derive(Parser, Debug)]
#[command(name = "hotpath", version, about = "Latency probe for the hotpath primitives")]
struct Args {
    /// Operations per measurement
    #[arg(short = 'n', long, default_value_t = 1_000_000)]
    iterations: usize,

    /// Directory for the logger measurement's output file
    #[arg(long, env = "HOTPATH_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Minimum level accepted by the logger
    #[arg(long, env = "HOTPATH_LOG_LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Skip the logger measurement (no files are created)
    #[arg(long)]
    skip_logger: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    info!(iterations = args.iterations, "hotpath latency probe");

    probe_ring_buffer(args.iterations);
    probe_fixed_pool(args.iterations);
    probe_growable_pool(args.iterations);

    if !args.skip_logger {
        probe_logger(&args)?;
    }

    info!("all probes complete");
    Ok(())
}

fn per_op_ns(elapsed: std::time::Duration, ops: usize) -> f64 {
    elapsed.as_nanos() as f64 / ops.max(1) as f64
}

fn probe_ring_buffer(iterations: usize) {
    println!("Ring Buffer (lock-free SPSC)");
    println!("----------------------------");

    let mut rb: RingBuffer<u64, 65536> = RingBuffer::new();

    // Warm up
    for i in 0..1000 {
        let _ = rb.enqueue(i);
    }
    while rb.dequeue().is_ok() {}

    let start = Instant::now();
    for i in 0..iterations {
        if rb.enqueue(i as u64).is_err() {
            let _ = rb.dequeue();
            let _ = rb.enqueue(i as u64);
        }
    }
    let enqueue = start.elapsed();

    while rb.dequeue().is_ok() {}
    let batch = iterations.min(rb.capacity());
    for i in 0..batch {
        let _ = rb.enqueue(i as u64);
    }
    let start = Instant::now();
    for _ in 0..batch {
        let _ = rb.dequeue();
    }
    let dequeue = start.elapsed();

    let enqueue_ns = per_op_ns(enqueue, iterations);
    println!("  Operations:      {}", iterations);
    println!("  Enqueue latency: {:.2} ns/op", enqueue_ns);
    println!("  Dequeue latency: {:.2} ns/op", per_op_ns(dequeue, batch));
    println!(
        "  Throughput:      {:.2} M ops/sec\n",
        iterations as f64 / enqueue.as_secs_f64() / 1_000_000.0
    );
}

#[derive(Clone, Copy)]
#[allow(dead_code)]
struct Order {
    id: u64,
    price: i64,
    quantity: u32,
}

fn probe_fixed_pool(iterations: usize) {
    println!("Fixed Slot Pool (1024 slots)");
    println!("----------------------------");

    let mut pool: FixedPool<Order, 1024> = FixedPool::new();
    let mut live = Vec::with_capacity(pool.capacity());

    let start = Instant::now();
    for i in 0..iterations {
        if pool.is_full() {
            for ptr in live.drain(..) {
                let _ = pool.free(ptr);
            }
        }
        if let Ok(ptr) = pool.alloc(Order {
            id: i as u64,
            price: 100,
            quantity: 1,
        }) {
            live.push(ptr.as_ptr());
        }
    }
    let elapsed = start.elapsed();
    for ptr in live.drain(..) {
        let _ = pool.free(ptr);
    }

    println!("  Alloc+free:      {:.2} ns/op", per_op_ns(elapsed, iterations));
    println!("  Live after run:  {}\n", pool.len());
}

fn probe_growable_pool(iterations: usize) {
    println!("Growable Slot Pool");
    println!("------------------");

    let mut pool: GrowablePool<Order> = GrowablePool::new(16);

    let start = Instant::now();
    let handles: Vec<_> = (0..iterations)
        .map(|i| {
            pool.alloc(Order {
                id: i as u64,
                price: -5,
                quantity: 2,
            })
        })
        .collect();
    let alloc = start.elapsed();

    let start = Instant::now();
    for handle in handles {
        let _ = pool.free(handle);
    }
    let free = start.elapsed();

    println!("  Alloc latency:   {:.2} ns/op", per_op_ns(alloc, iterations));
    println!("  Free latency:    {:.2} ns/op", per_op_ns(free, iterations));
    println!(
        "  Capacity:        {} after {} growths\n",
        pool.capacity(),
        pool.growth_count()
    );
}

fn probe_logger(args: &Args) -> Result<(), LogError> {
    println!("Async Logger");
    println!("------------");

    let config = LogConfig::new(&args.log_dir)
        .file_stem("hotpath_probe")
        .min_level(args.log_level);
    let (mut logger, writer) = LogWriter::spawn(config)?;

    let ops = args.iterations.min(100_000);
    let mut accepted = 0usize;

    let start = Instant::now();
    for i in 0..ops {
        match logger.log_with(LogLevel::Info, || format!("probe message {i}")) {
            Ok(()) if logger.enabled(LogLevel::Info) => accepted += 1,
            Ok(()) => {}
            Err(LogError::QueueFull) => {}
            Err(e) => return Err(e),
        }
    }
    let submit = start.elapsed();

    let start = Instant::now();
    let stats = writer.shutdown()?;
    let drain = start.elapsed();

    if logger.dropped() > 0 {
        warn!(dropped = logger.dropped(), "logger queue overflowed during probe");
    }

    println!("  Submit latency:  {:.2} ns/op", per_op_ns(submit, ops));
    println!("  Accepted:        {} / {}", accepted, ops);
    println!("  Written:         {}", stats.records_written);
    println!("  Drain time:      {:.3} ms", drain.as_secs_f64() * 1000.0);
    println!("  Output:          {}", stats.path.display());
    Ok(())
}
