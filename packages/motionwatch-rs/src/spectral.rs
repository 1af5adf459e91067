//! Spectral engine: sliding windows in, single-sided power spectra out.
//!
//! Each of the six channels owns a [`MirrorBuffer`] of `N` samples. After
//! every new sample the engine runs a real-to-complex FFT of length `N` over
//! each channel's current window, keeps bins `0..N/2`, and writes
//! `|X[k]|` and `|X[k]|^2 / (N * Fs)` into a pool slot. The scaling is a
//! fixed normalization that keeps detector thresholds comparable across
//! window lengths and rates, not a calibrated PSD.

use crate::config::{SpectralConfig, TimingConfig};
use crate::error::{MonitorError, Result};
use crate::mirror_buffer::MirrorBuffer;
use crate::result_pool::{ResultPool, SpectralResult};
use crate::supervisor::{ShutdownCause, ShutdownSignal};
use crate::types::{Channel, Sample};
use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct SpectralEngine {
    config: SpectralConfig,
    windows: Vec<MirrorBuffer<f32>>,
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    samples_folded: u64,
    latest_timestamp: Duration,
}

impl SpectralEngine {
    /// Allocate the six channel windows and plan the transform.
    pub fn new(config: &SpectralConfig) -> Result<Self> {
        let mut windows = Vec::with_capacity(Channel::ALL.len());
        for _ in Channel::ALL {
            windows.push(MirrorBuffer::new(config.window_size)?);
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.window_size);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Ok(Self {
            config: config.clone(),
            windows,
            fft,
            input,
            spectrum,
            scratch,
            samples_folded: 0,
            latest_timestamp: Duration::ZERO,
        })
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    /// Fold one sample's six components into their windows.
    pub fn push_sample(&mut self, sample: &Sample) {
        for (window, channel) in self.windows.iter_mut().zip(Channel::ALL) {
            window.push(sample.channel(channel));
        }
        self.samples_folded += 1;
        self.latest_timestamp = sample.timestamp;
    }

    /// True once every window holds `N` real samples.
    pub fn is_primed(&self) -> bool {
        self.samples_folded >= self.config.window_size as u64
    }

    pub fn samples_folded(&self) -> u64 {
        self.samples_folded
    }

    /// Current window of one channel, oldest sample first.
    pub fn window(&self, channel: Channel) -> &[f32] {
        self.windows[channel.index()].current_window()
    }

    /// Transform all six windows into `result`, in fixed channel order.
    pub fn compute_into(&mut self, result: &mut SpectralResult) -> Result<()> {
        if result.bins() != self.config.bins() {
            return Err(MonitorError::Transform(format!(
                "result holds {} bins, engine produces {}",
                result.bins(),
                self.config.bins()
            )));
        }

        let scale = self.config.power_scale();
        for (slot, channel) in Channel::ALL.into_iter().enumerate() {
            // The FFT consumes its input buffer, so the window is copied once here
            self.input.copy_from_slice(self.windows[slot].current_window());
            self.fft
                .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
                .map_err(|e| MonitorError::Transform(e.to_string()))?;

            let (magnitude, power) = result.spectra_mut(channel);
            fill_spectra(&self.spectrum, magnitude, power, scale);
        }

        result.sample_timestamp = self.latest_timestamp;
        Ok(())
    }
}

/// Magnitude and scaled power of the first `magnitude.len()` bins.
fn fill_spectra(spectrum: &[Complex<f32>], magnitude: &mut [f32], power: &mut [f32], scale: f32) {
    for ((bin, mag), pow) in spectrum.iter().zip(magnitude.iter_mut()).zip(power.iter_mut()) {
        *mag = bin.norm();
        *pow = *mag * *mag * scale;
    }
}

/// Frequency in Hz of bin `index`.
pub fn bin_frequency(index: usize, config: &SpectralConfig) -> f32 {
    index as f32 * config.resolution_hz()
}

/// Spectral task body.
///
/// Blocks until the windows are primed, then transforms after every sample,
/// writing into the oldest free pool slot. Returns when the shutdown signal
/// is raised or the sample channel disconnects; a disconnect raises
/// [`ShutdownCause::EndOfInput`] so the rest of the pipeline winds down.
pub fn run_spectral_task(
    mut engine: SpectralEngine,
    samples: Receiver<Sample>,
    pool: Arc<ResultPool>,
    shutdown: Arc<ShutdownSignal>,
    timing: TimingConfig,
) {
    log::info!("Spectral task started");
    log::info!(
        "Waiting for {} samples of IMU data",
        engine.config().window_size
    );

    while !engine.is_primed() {
        if shutdown.is_raised() {
            return;
        }
        match samples.recv_timeout(timing.sensor_timeout()) {
            Ok(sample) => engine.push_sample(&sample),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                log::info!(
                    "Sample stream ended after {} samples, before the window was primed",
                    engine.samples_folded()
                );
                shutdown.raise(ShutdownCause::EndOfInput);
                return;
            }
        }
    }

    log::info!("Spectral windows primed");

    loop {
        loop {
            if shutdown.is_raised() {
                return;
            }
            let sample = match samples.try_recv() {
                Ok(sample) => sample,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::info!("Sample stream ended, spectral task exiting");
                    shutdown.raise(ShutdownCause::EndOfInput);
                    return;
                }
            };

            engine.push_sample(&sample);
            process_cycle(&mut engine, &pool);
        }
        std::thread::sleep(timing.spectral_idle());
    }
}

fn process_cycle(engine: &mut SpectralEngine, pool: &ResultPool) {
    let Some(mut slot) = pool.acquire_oldest_for_write() else {
        log::warn!("No spectral result slot available, skipping cycle");
        return;
    };

    match engine.compute_into(&mut slot) {
        Ok(()) => slot.commit(Instant::now()),
        Err(e) => log::error!("Spectral transform failed: {}", e),
    }
}

/// Initialize an engine for the spectral thread, raising the shutdown
/// signal if the windows cannot be allocated.
pub fn engine_or_shutdown(config: &SpectralConfig, shutdown: &ShutdownSignal) -> Option<SpectralEngine> {
    match SpectralEngine::new(config) {
        Ok(engine) => Some(engine),
        Err(e) => {
            log::error!("Failed to create spectral windows: {}", e);
            shutdown.raise(ShutdownCause::AllocationFailure);
            None
        }
    }
}
