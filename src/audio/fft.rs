use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::AudioFrame;
use crate::error::{BandlightError, Result};

/// Magnitude spectrum of one frame, `frame_size / 2` bins.
#[derive(Debug, Clone)]
pub struct SpectralFrame {
    pub frame_index: u64,
    pub magnitudes: Vec<f32>,
}

impl SpectralFrame {
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}

/// Windowed FFT over fixed-size frames.
///
/// The analyzer holds only the precomputed Hann window and the FFT plan, so the
/// same frame always yields the same spectrum.
pub struct SpectralAnalyzer {
    frame_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl SpectralAnalyzer {
    pub fn new(frame_size: usize) -> Result<Self> {
        if frame_size < 2 || frame_size % 2 != 0 {
            return Err(BandlightError::InvalidFrameSize(frame_size));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_size);

        Ok(Self {
            frame_size,
            fft,
            window: Self::hann_window(frame_size),
        })
    }

    fn hann_window(size: usize) -> Vec<f32> {
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn analyze(&self, frame: &AudioFrame) -> Result<SpectralFrame> {
        if frame.len() != self.frame_size {
            return Err(BandlightError::InvalidFrameLength {
                expected: self.frame_size,
                actual: frame.len(),
            });
        }

        let mut buffer: Vec<Complex<f32>> = frame
            .samples
            .iter()
            .zip(self.window.iter())
            .map(|(&x, &w)| Complex::new(x * w, 0.0))
            .collect();

        self.fft.process(&mut buffer);

        let scale = 1.0 / self.frame_size as f32;
        let magnitudes = buffer[..self.frame_size / 2]
            .iter()
            .map(|c| c.norm() * scale)
            .collect();

        Ok(SpectralFrame {
            frame_index: frame.index,
            magnitudes,
        })
    }
}
