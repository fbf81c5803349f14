use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{Band, BandValues, SpectralFrame};
use crate::error::{BandlightError, Result};

/// Frequency range and peak/average blend for one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandDefinition {
    pub band: Band,
    pub low_hz: f32,
    pub high_hz: f32,
    pub peak_weight: f32,
    pub avg_weight: f32,
}

impl BandDefinition {
    pub const fn new(band: Band, low_hz: f32, high_hz: f32, peak_weight: f32, avg_weight: f32) -> Self {
        Self {
            band,
            low_hz,
            high_hz,
            peak_weight,
            avg_weight,
        }
    }

    /// The five fixed bands in channel order.
    pub fn defaults() -> [BandDefinition; 5] {
        [
            BandDefinition::new(Band::Vocals, 300.0, 3000.0, 0.5, 0.5),
            BandDefinition::new(Band::Chord, 200.0, 2000.0, 0.5, 0.5),
            BandDefinition::new(Band::Snare, 150.0, 250.0, 0.9, 0.1),
            BandDefinition::new(Band::Clap, 2000.0, 5000.0, 0.9, 0.1),
            BandDefinition::new(Band::Bass, 50.0, 120.0, 0.7, 0.3),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let sum = self.peak_weight + self.avg_weight;
        if (sum - 1.0).abs() > 1e-6 || self.peak_weight < 0.0 || self.avg_weight < 0.0 {
            return Err(BandlightError::InvalidBandWeights {
                band: self.band.name(),
                sum,
            });
        }
        if !(self.low_hz >= 0.0 && self.high_hz > self.low_hz) {
            return Err(BandlightError::InvalidBandRange {
                band: self.band.name(),
                low_hz: self.low_hz,
                high_hz: self.high_hz,
            });
        }
        Ok(())
    }

    /// Inclusive bin range covering this band, or `None` when the band is
    /// narrower than one bin at this resolution.
    pub fn bin_range(&self, sample_rate: f32, frame_size: usize) -> Option<(usize, usize)> {
        let resolution = sample_rate / frame_size as f32;
        let last_bin = frame_size / 2 - 1;

        let low_bin = ((self.low_hz / resolution) as usize).max(1);
        let high_bin = ((self.high_hz / resolution) as usize).min(last_bin);

        (high_bin > low_bin).then_some((low_bin, high_bin))
    }
}

/// Kick-drum emphasis for the bass band: extra energy when the current peak
/// jumps above the recent peak average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientBoost {
    /// Number of past bass peaks averaged for the threshold
    pub history: usize,
    /// Current peak must exceed `ratio * mean(recent peaks)`
    pub ratio: f32,
    /// Weight applied to the positive spectral flux of the bass bins
    pub weight: f32,
}

impl Default for TransientBoost {
    fn default() -> Self {
        Self {
            history: 8,
            ratio: 1.3,
            weight: 0.3,
        }
    }
}

/// Turns a magnitude spectrum into one raw energy per band.
pub struct BandEnergyExtractor {
    definitions: [BandDefinition; 5],
    ranges: [Option<(usize, usize)>; 5],
    boost: TransientBoost,

    // Bass transient state
    previous_bass_bins: Vec<f32>,
    recent_bass_peaks: VecDeque<f32>,
}

impl BandEnergyExtractor {
    pub fn new(sample_rate: f32, frame_size: usize) -> Result<Self> {
        Self::with_definitions(BandDefinition::defaults(), TransientBoost::default(), sample_rate, frame_size)
    }

    pub fn with_definitions(
        definitions: [BandDefinition; 5],
        boost: TransientBoost,
        sample_rate: f32,
        frame_size: usize,
    ) -> Result<Self> {
        if frame_size < 2 || frame_size % 2 != 0 {
            return Err(BandlightError::InvalidFrameSize(frame_size));
        }
        if !(sample_rate > 0.0) {
            return Err(BandlightError::InvalidConfig(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }
        for (i, definition) in definitions.iter().enumerate() {
            definition.validate()?;
            if definition.band.index() != i {
                return Err(BandlightError::InvalidConfig(format!(
                    "band '{}' listed at position {}, expected {}",
                    definition.band.name(),
                    i,
                    definition.band.index()
                )));
            }
        }

        let ranges = definitions.map(|d| d.bin_range(sample_rate, frame_size));
        for (definition, range) in definitions.iter().zip(ranges.iter()) {
            match range {
                Some((low, high)) => debug!(
                    "Band {} -> bins {}..={} ({:.1} Hz/bin)",
                    definition.band.name(),
                    low,
                    high,
                    sample_rate / frame_size as f32
                ),
                None => debug!("Band {} narrower than one bin, will read as 0", definition.band.name()),
            }
        }

        Ok(Self {
            definitions,
            ranges,
            boost,
            previous_bass_bins: Vec::new(),
            recent_bass_peaks: VecDeque::with_capacity(boost.history),
        })
    }

    pub fn definitions(&self) -> &[BandDefinition; 5] {
        &self.definitions
    }

    pub fn extract(&mut self, spectrum: &SpectralFrame) -> BandValues<f32> {
        let mut energies = BandValues::splat(0.0);

        for (definition, range) in self.definitions.into_iter().zip(self.ranges) {
            let Some((low, high)) = range else {
                continue;
            };
            if high >= spectrum.len() {
                continue;
            }

            let bins = &spectrum.magnitudes[low..=high];
            let peak = bins.iter().fold(0.0f32, |a, &b| a.max(b));
            let mean = bins.iter().sum::<f32>() / bins.len() as f32;

            let mut energy = definition.peak_weight * peak + definition.avg_weight * mean;

            if definition.band == Band::Bass {
                energy += self.bass_transient(bins, peak);
            }

            energies[definition.band] = energy.max(0.0);
        }

        energies
    }

    fn bass_transient(&mut self, bins: &[f32], peak: f32) -> f32 {
        let mut boost = 0.0;

        if !self.recent_bass_peaks.is_empty() && self.previous_bass_bins.len() == bins.len() {
            let recent_avg = self.recent_bass_peaks.iter().sum::<f32>() / self.recent_bass_peaks.len() as f32;
            if peak > recent_avg * self.boost.ratio {
                let flux: f32 = bins
                    .iter()
                    .zip(self.previous_bass_bins.iter())
                    .map(|(&current, &previous)| (current - previous).max(0.0))
                    .sum();
                boost = self.boost.weight * flux;
            }
        }

        self.previous_bass_bins.clear();
        self.previous_bass_bins.extend_from_slice(bins);

        self.recent_bass_peaks.push_back(peak);
        while self.recent_bass_peaks.len() > self.boost.history.max(1) {
            self.recent_bass_peaks.pop_front();
        }

        boost
    }
}
