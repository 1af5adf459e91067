use motionwatch_rs::result_pool::ResultPool;
use motionwatch_rs::{Axis, Channel, Sensor};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const BINS: usize = 64;

// =============================================================================
// ORDERING
// =============================================================================

#[test]
fn test_latest_after_pool_size_writes() {
    for pool_size in 1..=4 {
        let pool = ResultPool::new(pool_size, BINS).unwrap();
        let base = Instant::now();

        for i in 0..pool_size as u64 {
            let slot = pool.acquire_oldest_for_write().unwrap();
            slot.commit(base + Duration::from_millis(i + 1));
        }

        let latest = pool.acquire_latest_for_read().unwrap();
        assert_eq!(
            latest.timestamp,
            Some(base + Duration::from_millis(pool_size as u64))
        );
        assert_eq!(latest.sequence, pool_size as u64);
    }
}

#[test]
fn test_writer_recycles_oldest_slot() {
    let pool = ResultPool::new(2, BINS).unwrap();
    let base = Instant::now();

    let mut order = Vec::new();
    for i in 0..6u64 {
        let slot = pool.acquire_oldest_for_write().unwrap();
        order.push(slot.index());
        slot.commit(base + Duration::from_millis(i));
    }
    assert_eq!(order[2..], [order[0], order[1], order[0], order[1]]);
}

// =============================================================================
// CONCURRENCY
// =============================================================================

/// Writers fill every bin of a slot with one value; readers must never see
/// a mix of two writes.
#[test]
fn test_readers_never_see_torn_results() {
    let pool = Arc::new(ResultPool::new(3, BINS).unwrap());
    let stop = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicU64::new(0));
    let gyro_x = Channel::new(Sensor::Gyro, Axis::X);

    std::thread::scope(|scope| {
        for writer in 0..2u64 {
            let pool = Arc::clone(&pool);
            let stop = Arc::clone(&stop);
            scope.spawn(move || {
                let mut value = writer as f32 * 1_000_000.0;
                while !stop.load(Ordering::Relaxed) {
                    let Some(mut slot) = pool.acquire_oldest_for_write() else {
                        continue;
                    };
                    value += 1.0;
                    let (magnitude, power) = slot.spectra_mut(gyro_x);
                    magnitude.fill(value);
                    power.fill(value);
                    slot.commit(Instant::now());
                }
            });
        }

        for _ in 0..2 {
            let pool = Arc::clone(&pool);
            let reads = Arc::clone(&reads);
            scope.spawn(move || {
                for _ in 0..5000 {
                    let Some(slot) = pool.acquire_latest_for_read() else {
                        continue;
                    };
                    let psd = slot.psd(gyro_x);
                    assert!(psd.iter().all(|&p| p == psd[0]), "torn result read");
                    assert_eq!(slot.magnitude(gyro_x)[0], psd[0]);
                    reads.fetch_add(1, Ordering::Relaxed);
                }
            });
        }

        std::thread::sleep(Duration::from_millis(200));
        stop.store(true, Ordering::Relaxed);
    });

    assert!(reads.load(Ordering::Relaxed) > 0);
}

#[test]
fn test_published_read_follows_writer() {
    let pool = Arc::new(ResultPool::new(2, BINS).unwrap());
    let writer_pool = Arc::clone(&pool);

    let writer = std::thread::spawn(move || {
        for _ in 0..100 {
            if let Some(slot) = writer_pool.acquire_oldest_for_write() {
                slot.commit(Instant::now());
            }
        }
    });
    writer.join().unwrap();

    let slot = pool.acquire_published_for_read().unwrap();
    assert_eq!(slot.sequence, 100);
}
