//! sweepq workload simulator
//!
//! Builds an encrypted RAM disk behind a request queue, drives a seeded
//! random read/write workload through the LOOK scheduler, and reports the
//! sweep counters.

use std::collections::VecDeque;
use std::sync::Arc;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use sweepq::device::{BlockDevice, DeviceError, DeviceResult, EncRamConfig, EncRamDisk};
use sweepq::queue::RequestQueue;
use sweepq::sched::Sector;

#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drive a random workload through the LOOK scheduler")]
struct Cli {
    /// Device size in sectors
    #[arg(long, default_value_t = 4096)]
    nsectors: u64,

    /// Number of requests to issue
    #[arg(long, default_value_t = 256)]
    requests: usize,

    /// Largest single transfer in sectors
    #[arg(long, default_value_t = 8)]
    max_transfer: u64,

    /// Submissions allowed in flight before awaiting completions
    #[arg(long, default_value_t = 32)]
    queue_depth: usize,

    /// Workload RNG seed
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

enum Pending {
    Read(oneshot::Receiver<DeviceResult<Vec<u8>>>),
    Write(oneshot::Receiver<DeviceResult<usize>>),
}

async fn settle(
    pending: Pending,
    read_bytes: &mut u64,
    written_bytes: &mut u64,
) -> DeviceResult<()> {
    match pending {
        Pending::Read(rx) => {
            let data = rx.await.unwrap_or(Err(DeviceError::Shutdown))?;
            *read_bytes += data.len() as u64;
        }
        Pending::Write(rx) => {
            let n = rx.await.unwrap_or(Err(DeviceError::Shutdown))?;
            *written_bytes += n as u64;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let depth = cli.queue_depth.max(1);
    let max_transfer = cli.max_transfer.max(1);

    tracing::info!(
        nsectors = cli.nsectors,
        requests = cli.requests,
        queue_depth = depth,
        seed = cli.seed,
        "starting sweepq workload"
    );

    let disk = Arc::new(EncRamDisk::new(
        EncRamConfig::default().with_nsectors(cli.nsectors),
    )?);
    disk.open();
    let sector_size = disk.sector_size();

    let queue = RequestQueue::new(Arc::clone(&disk));
    let pump = tokio::spawn(Arc::clone(&queue).run());

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut window: VecDeque<Pending> = VecDeque::with_capacity(depth);
    let mut reads = 0usize;
    let mut writes = 0usize;
    let mut read_bytes = 0u64;
    let mut written_bytes = 0u64;

    // About half the workload continues where the previous request ended,
    // giving the queue adjacent spans it can merge.
    let mut continuation: Option<(bool, Sector)> = None;
    for _ in 0..cli.requests {
        let (is_write, start, sectors) = match continuation.take() {
            Some((w, at)) if rng.gen_bool(0.5) && at < cli.nsectors => {
                let sectors = rng.gen_range(1..=max_transfer).min(cli.nsectors - at);
                (w, at, sectors)
            }
            _ => {
                let is_write = rng.gen_bool(0.5);
                let sectors = rng.gen_range(1..=max_transfer).min(cli.nsectors);
                let start = rng.gen_range(0..=cli.nsectors - sectors);
                (is_write, start, sectors)
            }
        };
        continuation = Some((is_write, start + sectors));

        if is_write {
            let mut data = vec![0u8; sectors as usize * sector_size];
            rng.fill(&mut data[..]);
            window.push_back(Pending::Write(queue.submit_write(start, data)?));
            writes += 1;
        } else {
            window.push_back(Pending::Read(queue.submit_read(start, sectors)?));
            reads += 1;
        }

        while window.len() >= depth {
            if let Some(pending) = window.pop_front() {
                settle(pending, &mut read_bytes, &mut written_bytes).await?;
            }
        }
    }
    while let Some(pending) = window.pop_front() {
        settle(pending, &mut read_bytes, &mut written_bytes).await?;
    }

    queue.shutdown();
    pump.await?;
    disk.release();

    let stats = queue.stats();
    println!(
        "workload:  {} requests ({} reads, {} writes)",
        cli.requests, reads, writes
    );
    println!(
        "sched:     {} dispatched, {} merged, {} sweeps, {} idle resets",
        stats.dispatched, stats.merged, stats.sweeps, stats.idle_resets
    );
    println!(
        "seek:      {} sectors total, {:.1} avg per dispatch",
        stats.seek_sectors, stats.avg_seek_sectors
    );
    println!(
        "data:      {} bytes read, {} bytes written",
        read_bytes, written_bytes
    );

    Ok(())
}
