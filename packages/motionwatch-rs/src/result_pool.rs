// Fixed pool of spectral result slots shared by the spectral engine (writer)
// and the classifier (reader).
//
// Each slot has its own mutex and is only ever taken with `try_lock`, so
// neither side blocks the other. Selection scans all slots and keeps the
// oldest (writer) or newest (reader) one it managed to lock. The scan is not
// atomic across slots: a concurrent scan may see a slot as busy and return
// `None` even though another slot frees up a moment later. Callers treat
// `None` as "retry next cycle".

use crate::config::SpectralConfig;
use crate::error::{MonitorError, Result};
use crate::types::{Channel, Sensor};
use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

const NOT_PUBLISHED: usize = usize::MAX;

/// Single-sided spectra of all six channels for one analysis window.
#[derive(Debug, Clone)]
pub struct SpectralResult {
    pub accel_magnitude: [Vec<f32>; 3],
    pub gyro_magnitude: [Vec<f32>; 3],
    pub accel_psd: [Vec<f32>; 3],
    pub gyro_psd: [Vec<f32>; 3],
    /// When the result was completed; `None` until first written
    pub timestamp: Option<Instant>,
    /// Timestamp of the newest sample folded into the window
    pub sample_timestamp: Duration,
    /// Monotonic write counter, 0 until first written
    pub sequence: u64,
}

fn zeroed(len: usize) -> Result<Vec<f32>> {
    let mut bins = Vec::new();
    bins.try_reserve_exact(len).map_err(|e| {
        MonitorError::AllocationFailed(format!("{} spectral bins: {}", len, e))
    })?;
    bins.resize(len, 0.0);
    Ok(bins)
}

fn zeroed_axes(len: usize) -> Result<[Vec<f32>; 3]> {
    Ok([zeroed(len)?, zeroed(len)?, zeroed(len)?])
}

impl SpectralResult {
    /// Allocate a zeroed result holding `bins` bins per channel.
    pub fn new(bins: usize) -> Result<Self> {
        Ok(Self {
            accel_magnitude: zeroed_axes(bins)?,
            gyro_magnitude: zeroed_axes(bins)?,
            accel_psd: zeroed_axes(bins)?,
            gyro_psd: zeroed_axes(bins)?,
            timestamp: None,
            sample_timestamp: Duration::ZERO,
            sequence: 0,
        })
    }

    pub fn bins(&self) -> usize {
        self.accel_psd[0].len()
    }

    pub fn magnitude(&self, channel: Channel) -> &[f32] {
        match channel.sensor {
            Sensor::Accel => &self.accel_magnitude[channel.axis.index()],
            Sensor::Gyro => &self.gyro_magnitude[channel.axis.index()],
        }
    }

    pub fn psd(&self, channel: Channel) -> &[f32] {
        match channel.sensor {
            Sensor::Accel => &self.accel_psd[channel.axis.index()],
            Sensor::Gyro => &self.gyro_psd[channel.axis.index()],
        }
    }

    /// Mutable (magnitude, power) spectra of one channel.
    pub fn spectra_mut(&mut self, channel: Channel) -> (&mut [f32], &mut [f32]) {
        let axis = channel.axis.index();
        match channel.sensor {
            Sensor::Accel => (&mut self.accel_magnitude[axis], &mut self.accel_psd[axis]),
            Sensor::Gyro => (&mut self.gyro_magnitude[axis], &mut self.gyro_psd[axis]),
        }
    }
}

/// An exclusively locked pool slot. Dropping it releases the lock.
pub struct SlotGuard<'a> {
    index: usize,
    pool: &'a ResultPool,
    guard: MutexGuard<'a, SpectralResult>,
}

impl<'a> SlotGuard<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Stamp the slot as complete, publish it as the newest result and
    /// release the lock.
    pub fn commit(mut self, timestamp: Instant) {
        self.guard.timestamp = Some(timestamp);
        self.guard.sequence = self.pool.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.pool.published.store(self.index, Ordering::Release);
    }
}

impl Deref for SlotGuard<'_> {
    type Target = SpectralResult;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for SlotGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// Pool of `P` spectral result slots with per-slot non-blocking locks.
pub struct ResultPool {
    slots: Vec<Mutex<SpectralResult>>,
    published: AtomicUsize,
    sequence: AtomicU64,
}

impl ResultPool {
    /// Allocate `pool_size` slots of `bins` bins each.
    pub fn new(pool_size: usize, bins: usize) -> Result<Self> {
        if pool_size == 0 {
            return Err(MonitorError::InvalidConfig(
                "result pool needs at least one slot".to_string(),
            ));
        }

        let mut slots = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            slots.push(Mutex::new(SpectralResult::new(bins)?));
        }

        log::debug!("Allocated result pool: {} slots x {} bins", pool_size, bins);

        Ok(Self {
            slots,
            published: AtomicUsize::new(NOT_PUBLISHED),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn from_config(config: &SpectralConfig) -> Result<Self> {
        Self::new(config.pool_size, config.bins())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Lock the least recently written slot among those not currently held.
    ///
    /// Never-written slots count as oldest. Returns `None` if every slot is
    /// busy.
    pub fn acquire_oldest_for_write(&self) -> Option<SlotGuard<'_>> {
        self.scan(|candidate, best| candidate < best)
    }

    /// Lock the most recently written slot among those not currently held.
    ///
    /// Never-written slots are skipped, so this returns `None` until the
    /// first result has been committed.
    pub fn acquire_latest_for_read(&self) -> Option<SlotGuard<'_>> {
        let guard = self.scan(|candidate, best| candidate > best)?;
        if guard.timestamp.is_some() {
            Some(guard)
        } else {
            None
        }
    }

    /// Lock the slot most recently published by [`SlotGuard::commit`], if it
    /// is free. Avoids the multi-slot scan entirely.
    pub fn acquire_published_for_read(&self) -> Option<SlotGuard<'_>> {
        let index = self.published.load(Ordering::Acquire);
        if index == NOT_PUBLISHED {
            return None;
        }
        self.slots[index].try_lock().map(|guard| SlotGuard {
            index,
            pool: self,
            guard,
        })
    }

    /// Reader path of the classifier: the published slot if it is free,
    /// otherwise the newest slot the scan can lock.
    pub fn acquire_freshest_for_read(&self) -> Option<SlotGuard<'_>> {
        self.acquire_published_for_read()
            .or_else(|| self.acquire_latest_for_read())
    }

    /// Number of results committed so far.
    pub fn committed(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    fn scan<F>(&self, better: F) -> Option<SlotGuard<'_>>
    where
        F: Fn(Option<Instant>, Option<Instant>) -> bool,
    {
        let mut best: Option<SlotGuard<'_>> = None;

        for (index, slot) in self.slots.iter().enumerate() {
            let Some(guard) = slot.try_lock() else {
                continue;
            };

            let replace = match &best {
                None => true,
                Some(current) => better(guard.timestamp, current.timestamp),
            };

            if replace {
                // Assigning drops (and unlocks) the previous best
                best = Some(SlotGuard {
                    index,
                    pool: self,
                    guard,
                });
            }
        }

        best
    }
}
