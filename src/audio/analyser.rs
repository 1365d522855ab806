//! Spectrum analyser tap state.
//!
//! Keeps the most recent `fft_size` mono samples flowing through a tapped
//! node and produces byte-scaled magnitudes in the range visualizers expect:
//! a Blackman window, per-bin exponential smoothing, and a decibel window of
//! `[MIN_DECIBELS, MAX_DECIBELS]` mapped onto `0..=255`.

use std::collections::VecDeque;
use std::f32::consts::PI;

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// Default FFT size for visualizer taps.
pub const DEFAULT_FFT_SIZE: usize = 256;
const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32_768;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
const SMOOTHING: f32 = 0.8;

/// Normalize a requested FFT size to a supported power of two.
pub fn normalized_fft_size(requested: usize) -> usize {
    requested
        .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
        .checked_next_power_of_two()
        .unwrap_or(MAX_FFT_SIZE)
        .min(MAX_FFT_SIZE)
}

/// Rolling sample window plus smoothed spectrum for one analyser node.
#[derive(Debug, Clone)]
pub struct AnalyserState {
    fft_size: usize,
    samples: VecDeque<f32>,
    smoothed: Vec<f32>,
}

impl AnalyserState {
    /// Create an analyser with a normalized FFT size.
    pub fn new(fft_size: usize) -> Self {
        let fft_size = normalized_fft_size(fft_size);
        Self {
            fft_size,
            samples: VecDeque::with_capacity(fft_size),
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    /// FFT size in samples.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins reported by [`Self::byte_frequency_data`].
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Append one mono sample, discarding the oldest once the window is full.
    pub fn push(&mut self, sample: f32) {
        if self.samples.len() == self.fft_size {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Clear the sample window, e.g. after the graph stops rendering.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.smoothed.iter_mut().for_each(|bin| *bin = 0.0);
    }

    /// Compute smoothed magnitudes for the current window as bytes.
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let magnitudes = self.magnitudes();
        for (smoothed, magnitude) in self.smoothed.iter_mut().zip(magnitudes) {
            *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * magnitude;
        }
        self.smoothed.iter().map(|value| magnitude_to_byte(*value)).collect()
    }

    fn magnitudes(&self) -> Vec<f32> {
        let size = self.fft_size;
        let padding = size - self.samples.len();
        let mut buffer: Vec<Complex<f32>> = (0..size)
            .map(|index| {
                let sample = if index < padding {
                    0.0
                } else {
                    self.samples[index - padding]
                };
                Complex::new(sample * blackman(index, size), 0.0)
            })
            .collect();
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        fft.process(&mut buffer);
        let normalization = 1.0 / size as f32;
        buffer
            .iter()
            .take(size / 2)
            .map(|bin| bin.norm() * normalization)
            .collect()
    }
}

fn blackman(index: usize, size: usize) -> f32 {
    let alpha = 0.16;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    let x = index as f32 / size as f32;
    a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
}

fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let decibels = 20.0 * magnitude.log10();
    let scaled = 255.0 * (decibels - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_size_is_clamped_to_power_of_two() {
        assert_eq!(normalized_fft_size(256), 256);
        assert_eq!(normalized_fft_size(300), 512);
        assert_eq!(normalized_fft_size(1), MIN_FFT_SIZE);
        assert_eq!(normalized_fft_size(usize::MAX), MAX_FFT_SIZE);
    }

    #[test]
    fn silence_produces_zero_bins() {
        let mut analyser = AnalyserState::new(DEFAULT_FFT_SIZE);
        for _ in 0..DEFAULT_FFT_SIZE {
            analyser.push(0.0);
        }
        let data = analyser.byte_frequency_data();
        assert_eq!(data.len(), 128);
        assert!(data.iter().all(|bin| *bin == 0));
    }

    #[test]
    fn tone_peaks_near_its_bin() {
        let size = 256;
        let mut analyser = AnalyserState::new(size);
        let bin = 16;
        for index in 0..size {
            let phase = 2.0 * PI * bin as f32 * index as f32 / size as f32;
            analyser.push(0.001 * phase.sin());
        }
        let mut data = Vec::new();
        for _ in 0..20 {
            data = analyser.byte_frequency_data();
        }
        let peak = data
            .iter()
            .enumerate()
            .max_by_key(|(_, value)| **value)
            .map(|(index, _)| index)
            .unwrap();
        assert!((peak as i64 - bin as i64).abs() <= 1, "peak at {peak}");
        assert!(data[peak] > 0);
    }

    #[test]
    fn window_keeps_only_latest_samples() {
        let mut analyser = AnalyserState::new(32);
        for index in 0..100 {
            analyser.push(index as f32);
        }
        assert_eq!(analyser.samples.len(), 32);
        assert_eq!(analyser.samples.front().copied(), Some(68.0));
    }
}
