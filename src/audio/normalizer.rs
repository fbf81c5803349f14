use serde::{Deserialize, Serialize};

use super::BandValues;
use crate::error::{BandlightError, Result};

/// Mapping from decibels to the 0-100 perceptual scale.
///
/// `level = clamp((dB + offset_db) / range_db * 100, 0, 100) * sensitivity`,
/// capped at 100, then anything under `noise_floor` reads as silence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerParameters {
    pub offset_db: f32,
    pub range_db: f32,
    pub sensitivity: f32,
    pub noise_floor: f32,
}

impl Default for NormalizerParameters {
    fn default() -> Self {
        Self {
            offset_db: 50.0,
            range_db: 50.0,
            sensitivity: 1.2,
            noise_floor: 15.0,
        }
    }
}

impl NormalizerParameters {
    pub fn validate(&self) -> Result<()> {
        if !(self.range_db > 0.0) {
            return Err(BandlightError::InvalidConfig(format!(
                "normalizer range_db must be positive, got {}",
                self.range_db
            )));
        }
        if !(self.sensitivity > 0.0) {
            return Err(BandlightError::InvalidConfig(format!(
                "normalizer sensitivity must be positive, got {}",
                self.sensitivity
            )));
        }
        if !(0.0..=100.0).contains(&self.noise_floor) {
            return Err(BandlightError::InvalidConfig(format!(
                "normalizer noise_floor must be within 0-100, got {}",
                self.noise_floor
            )));
        }
        if !self.offset_db.is_finite() {
            return Err(BandlightError::InvalidConfig("normalizer offset_db must be finite".into()));
        }
        Ok(())
    }
}

/// Log-scales raw band energy into a bounded 0-100 level.
#[derive(Debug, Clone)]
pub struct PerceptualNormalizer {
    parameters: NormalizerParameters,
}

const ENERGY_EPSILON: f32 = 1e-10;

impl PerceptualNormalizer {
    pub fn new(parameters: NormalizerParameters) -> Result<Self> {
        parameters.validate()?;
        Ok(Self { parameters })
    }

    pub fn parameters(&self) -> &NormalizerParameters {
        &self.parameters
    }

    pub fn normalize(&self, energy: f32) -> f32 {
        let p = &self.parameters;
        // NaN from upstream is treated as silence
        let energy = if energy.is_finite() { energy.max(0.0) } else { 0.0 };

        let db = 20.0 * (energy + ENERGY_EPSILON).log10();
        let level = ((db + p.offset_db) / p.range_db * 100.0).clamp(0.0, 100.0);
        let level = (level * p.sensitivity).min(100.0);

        if level < p.noise_floor {
            0.0
        } else {
            level
        }
    }

    pub fn normalize_bands(&self, energies: &BandValues<f32>) -> BandValues<f32> {
        energies.map(|_, energy| self.normalize(energy))
    }
}

impl Default for PerceptualNormalizer {
    fn default() -> Self {
        Self {
            parameters: NormalizerParameters::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_reads_zero() {
        let normalizer = PerceptualNormalizer::default();
        assert_eq!(normalizer.normalize(0.0), 0.0);
        assert_eq!(normalizer.normalize(f32::NAN), 0.0);
    }

    #[test]
    fn test_strong_signal_saturates() {
        let normalizer = PerceptualNormalizer::default();
        assert_eq!(normalizer.normalize(1.0), 100.0);
        assert_eq!(normalizer.normalize(1e6), 100.0);
    }

    #[test]
    fn test_mid_scale_value() {
        let normalizer = PerceptualNormalizer::default();
        // 0.01 -> -40 dB -> (10 / 50) * 100 = 20 -> * 1.2 = 24
        let level = normalizer.normalize(0.01);
        assert!((level - 24.0).abs() < 1e-3, "level {}", level);
    }

    #[test]
    fn test_noise_floor_clamps_to_zero() {
        let normalizer = PerceptualNormalizer::default();
        // -45 dB -> 10 -> 12, under the floor of 15
        let energy = 10f32.powf(-45.0 / 20.0);
        assert_eq!(normalizer.normalize(energy), 0.0);
    }

    #[test]
    fn test_output_bounded_and_monotonic() {
        let normalizer = PerceptualNormalizer::default();
        let mut previous = 0.0;
        for step in 0..=400 {
            let energy = 10f32.powf(-12.0 + step as f32 * 0.035);
            let level = normalizer.normalize(energy);
            assert!((0.0..=100.0).contains(&level));
            assert!(level >= previous, "not monotonic at energy {}", energy);
            previous = level;
        }
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let params = NormalizerParameters {
            range_db: 0.0,
            ..Default::default()
        };
        assert!(PerceptualNormalizer::new(params).is_err());

        let params = NormalizerParameters {
            noise_floor: 120.0,
            ..Default::default()
        };
        assert!(PerceptualNormalizer::new(params).is_err());
    }
}
