//! Stress tests for shelfdb.
//!
//! These helpers drive a database from several threads at once and report
//! throughput.

use crate::fixtures::{TestThing2, TestStore};
use shelfdb_core::{DataAccess, Database, RecordId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent writer threads.
    pub threads: usize,
    /// Every n-th operation removes the record it just added.
    pub remove_every: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            remove_every: 5,
        }
    }
}

/// Adds records from several threads while another thread takes snapshots.
///
/// Each writer allocates fresh identifiers, adds a record, updates it and
/// removes every `remove_every`-th one.
pub fn concurrent_writes(db: &Database, config: &StressConfig) -> StressTestResult {
    let things: DataAccess<TestThing2> = db
        .data_access("TestThing2")
        .expect("TestThing2 partition must be registered");
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let writers: Vec<_> = (0..config.threads)
        .map(|_| {
            let things = things.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();
            thread::spawn(move || {
                for i in 0..config.operations {
                    let id = things.act_on(|set| set.allocate_id());
                    let ok = apply(&things, id, i, config.remove_every);
                    let counter = if ok { &successful } else { &failed };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    let reader = {
        let things = things.clone();
        thread::spawn(move || {
            let mut snapshots = 0usize;
            let mut last = 0usize;
            while snapshots < 200 {
                let len = things.read(|snapshot| snapshot.len());
                last = last.max(len);
                snapshots += 1;
            }
            last
        })
    };

    for writer in writers {
        writer.join().expect("writer thread panicked");
    }
    reader.join().expect("reader thread panicked");

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

fn apply(things: &DataAccess<TestThing2>, id: RecordId, i: usize, remove_every: usize) -> bool {
    let record = TestThing2::new(id.as_u64(), "blue", "vanilla");
    let result = things.act_on(|set| -> shelfdb_core::CoreResult<bool> {
        if !set.add(record.clone())? {
            return Ok(false);
        }
        set.update(TestThing2::new(id.as_u64(), "red", "chocolate"))?;
        if remove_every > 0 && i % remove_every == 0 {
            set.remove(&record)?;
        }
        Ok(true)
    });
    matches!(result, Ok(true))
}

/// Number of records a [`concurrent_writes`] run leaves behind.
pub fn expected_survivors(config: &StressConfig) -> usize {
    let removed_per_thread = if config.remove_every == 0 {
        0
    } else {
        config.operations.div_ceil(config.remove_every)
    };
    config.threads * (config.operations - removed_per_thread)
}

/// Runs [`concurrent_writes`] against a persisted database, then checks
/// that a fresh recovery sees exactly what memory held.
pub fn persisted_round(config: &StressConfig) -> (StressTestResult, usize, usize) {
    let store = TestStore::new();
    let (db, _) = store.open_database();
    let result = concurrent_writes(&db, config);
    let in_memory = db
        .data_access::<TestThing2>("TestThing2")
        .expect("TestThing2 partition must be registered")
        .read(|snapshot| snapshot.len());
    db.shutdown();

    let (reopened, _) = store.open_database();
    let on_disk = reopened
        .data_access::<TestThing2>("TestThing2")
        .expect("TestThing2 partition must be registered")
        .read(|snapshot| snapshot.len());
    (result, in_memory, on_disk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::memory_database;

    #[test]
    fn memory_stress() {
        let config = StressConfig {
            operations: 500,
            ..StressConfig::default()
        };
        let db = memory_database();
        let result = concurrent_writes(&db, &config);

        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, config.threads * config.operations);
        let len = db
            .data_access::<TestThing2>("TestThing2")
            .unwrap()
            .read(|snapshot| snapshot.len());
        assert_eq!(len, expected_survivors(&config));
    }

    #[test]
    fn persisted_stress_recovers_everything() {
        let config = StressConfig {
            operations: 100,
            threads: 3,
            remove_every: 4,
        };
        let (result, in_memory, on_disk) = persisted_round(&config);

        assert_eq!(result.failed_ops, 0);
        assert_eq!(in_memory, expected_survivors(&config));
        assert_eq!(on_disk, in_memory);
    }
}
