use serde::{Deserialize, Serialize};

use super::{Band, BandValues};
use crate::error::{BandlightError, Result};

/// Sharp-rise detection: a level this many times above the smoothed value
/// switches the band to its fast-attack factor for one frame.
const ATTACK_RATIO: f32 = 1.5;
const ATTACK_BOOST: f32 = 1.5;
const MAX_ATTACK_FACTOR: f32 = 0.9;

/// Per-band blend weights for the exponential moving average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingFactors(pub BandValues<f32>);

impl Default for SmoothingFactors {
    fn default() -> Self {
        // vocals, chord, snare, clap, bass
        Self(BandValues([0.4, 0.5, 0.9, 0.9, 0.7]))
    }
}

impl SmoothingFactors {
    pub fn validate(&self) -> Result<()> {
        for (band, factor) in self.0.iter() {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(BandlightError::InvalidConfig(format!(
                    "smoothing factor for '{}' must be within (0, 1], got {}",
                    band.name(),
                    factor
                )));
            }
        }
        Ok(())
    }
}

/// Holds the session's smoothed level per band, always within [0, 100].
///
/// Fast attack, slow release: a sharp rise gets a larger blend factor for the
/// frame it happens on, everything else uses the band's configured factor.
#[derive(Debug, Clone)]
pub struct AdaptiveSmoother {
    factors: SmoothingFactors,
    levels: BandValues<f32>,
}

impl AdaptiveSmoother {
    pub fn new(factors: SmoothingFactors) -> Result<Self> {
        factors.validate()?;
        Ok(Self {
            factors,
            levels: BandValues::splat(0.0),
        })
    }

    pub fn levels(&self) -> &BandValues<f32> {
        &self.levels
    }

    pub fn level(&self, band: Band) -> f32 {
        self.levels[band]
    }

    /// Only called when the device changes mode.
    pub fn reset(&mut self) {
        self.levels = BandValues::splat(0.0);
    }

    pub fn update(&mut self, input: &BandValues<f32>) -> BandValues<f32> {
        for band in Band::ALL {
            let level = input[band].clamp(0.0, 100.0);
            let smoothed = self.levels[band];

            let mut factor = self.factors.0[band];
            if level > smoothed * ATTACK_RATIO {
                factor = (factor * ATTACK_BOOST).min(MAX_ATTACK_FACTOR);
            }

            self.levels[band] = (smoothed * (1.0 - factor) + level * factor).clamp(0.0, 100.0);
        }

        self.levels
    }
}

impl Default for AdaptiveSmoother {
    fn default() -> Self {
        Self {
            factors: SmoothingFactors::default(),
            levels: BandValues::splat(0.0),
        }
    }
}
