//! Many workers hammering one lock cell.
//!
//! Each worker takes the lock with the bounded busy-wait, bumps a counter
//! with a plain load/store pair, holds for a random few microseconds and
//! releases. Lost increments or an occupancy above one mean two holders
//! overlapped.

use std::hint;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use wlock::{CellOffsets, SharedRegion, WordLock};

#[derive(Debug, Clone, Copy)]
pub struct ContentionConfig {
    pub threads: usize,
    pub iterations: u64,
    /// Upper bound of the random hold time
    pub max_hold_us: u64,
    /// Busy-wait budget per acquisition
    pub wait_ms: f64,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            iterations: 1000,
            max_hold_us: 50,
            wait_ms: wlock::config::ACQUIRE_WAIT_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentionReport {
    pub acquired: u64,
    pub timed_out: u64,
    /// Increments that survived; equals `acquired` when exclusion held
    pub counter: u64,
    /// Most holders ever seen at once
    pub max_occupancy: u32,
}

impl ContentionReport {
    pub fn is_exclusive(&self) -> bool {
        self.max_occupancy <= 1 && self.counter == self.acquired
    }
}

pub fn run_contention(config: &ContentionConfig) -> io::Result<ContentionReport> {
    let region: SharedRegion = SharedRegion::new();
    let cells = region
        .resolve(CellOffsets::default())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    WordLock::new(cells.lock).init();

    let counter = AtomicU64::new(0);
    let occupancy = AtomicU32::new(0);
    let max_occupancy = AtomicU32::new(0);
    let acquired = AtomicU64::new(0);
    let timed_out = AtomicU64::new(0);

    thread::scope(|s| -> io::Result<()> {
        for id in 0..config.threads {
            thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn_scoped(s, || {
                    let lock = WordLock::new(cells.lock);
                    let mut rng = rand::thread_rng();
                    for _ in 0..config.iterations {
                        if !lock.busy_spin_wait_acquire(config.wait_ms) {
                            timed_out.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                        let holders = occupancy.fetch_add(1, Ordering::SeqCst) + 1;
                        max_occupancy.fetch_max(holders, Ordering::SeqCst);

                        // Deliberately not a fetch_add: only the lock keeps this exact.
                        let seen = counter.load(Ordering::Relaxed);
                        hold(Duration::from_micros(rng.gen_range(0..=config.max_hold_us)));
                        counter.store(seen + 1, Ordering::Relaxed);

                        occupancy.fetch_sub(1, Ordering::SeqCst);
                        acquired.fetch_add(1, Ordering::Relaxed);
                        lock.release();
                    }
                })?;
        }
        Ok(())
    })?;

    let report = ContentionReport {
        acquired: acquired.into_inner(),
        timed_out: timed_out.into_inner(),
        counter: counter.into_inner(),
        max_occupancy: max_occupancy.into_inner(),
    };
    log::info!("contention finished: {:?}", report);
    Ok(report)
}

/// Busy hold; the holder must not sleep either.
fn hold(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_never_overlap() {
        let config = ContentionConfig {
            threads: 4,
            iterations: 200,
            max_hold_us: 20,
            ..ContentionConfig::default()
        };
        let report = run_contention(&config).unwrap();
        assert!(report.is_exclusive(), "{:?}", report);
        assert_eq!(report.acquired + report.timed_out, 800);
        assert_eq!(report.max_occupancy, 1);
    }
}
