//! JSON configuration for the host pipeline and the device simulator
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::bands::TransientBoost;
use crate::audio::smoother::SmoothingFactors;
use crate::audio::{BandDefinition, BeatParameters, NormalizerParameters, BAND_COUNT, DEFAULT_DECAY_RATES};
use crate::device::DeviceTiming;
use crate::error::{BandlightError, Result};

/// All tunables in one place. Every section falls back to its defaults, so a
/// config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandlightConfig {
    /// Samples per analysis frame
    pub frame_size: usize,
    /// Expected capture rate. The capture device's actual rate wins at runtime.
    pub sample_rate: f32,
    pub bands: [BandDefinition; BAND_COUNT],
    pub transient_boost: TransientBoost,
    pub normalizer: NormalizerParameters,
    pub smoothing: SmoothingFactors,
    pub beat: BeatParameters,
    /// Sent to the device on connect, also used for host-side off-beat fades
    pub decay_rates: [f32; BAND_COUNT],
    pub tempo_sync: bool,
    pub queue_capacity: usize,
    /// Serial line speed of the LED board
    pub baud_rate: u32,
    /// Wait after opening the port before the first write (board reset)
    pub connect_settle_ms: u64,
    pub device: DeviceTiming,
}

impl Default for BandlightConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            sample_rate: 44100.0,
            bands: BandDefinition::defaults(),
            transient_boost: TransientBoost::default(),
            normalizer: NormalizerParameters::default(),
            smoothing: SmoothingFactors::default(),
            beat: BeatParameters::default(),
            decay_rates: DEFAULT_DECAY_RATES,
            tempo_sync: true,
            queue_capacity: 8,
            baud_rate: 9600,
            connect_settle_ms: 2000,
            device: DeviceTiming::default(),
        }
    }
}

impl BandlightConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_size < 2 || self.frame_size % 2 != 0 {
            return Err(BandlightError::InvalidFrameSize(self.frame_size));
        }
        if !(self.sample_rate > 0.0) {
            return Err(BandlightError::InvalidConfig(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        for definition in &self.bands {
            definition.validate()?;
        }
        self.normalizer.validate()?;
        self.smoothing.validate()?;
        self.beat.validate()?;
        if let Some(rate) = self.decay_rates.iter().find(|r| !(0.0..=1.0).contains(*r)) {
            return Err(BandlightError::InvalidConfig(format!(
                "decay rates must be within [0, 1], got {}",
                rate
            )));
        }
        if self.queue_capacity == 0 {
            return Err(BandlightError::InvalidConfig("queue_capacity must be at least 1".into()));
        }
        if self.baud_rate == 0 {
            return Err(BandlightError::InvalidConfig("baud_rate must be non-zero".into()));
        }
        Ok(())
    }

    /// Nominal frame duration at the configured rate, in milliseconds.
    pub fn frame_duration_ms(&self) -> f32 {
        self.frame_size as f32 / self.sample_rate * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BandlightConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.frame_duration_ms() - 46.44).abs() < 0.01);
        assert_eq!(config.baud_rate, 9600);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BandlightConfig =
            serde_json::from_str(r#"{ "tempo_sync": false, "queue_capacity": 4 }"#).unwrap();
        assert!(!config.tempo_sync);
        assert_eq!(config.queue_capacity, 4);
        assert_eq!(config.frame_size, 2048);
        assert_eq!(config.decay_rates, DEFAULT_DECAY_RATES);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("bandlight-config-{}.json", std::process::id()));
        let mut config = BandlightConfig::default();
        config.connect_settle_ms = 500;
        config.decay_rates = [0.9; BAND_COUNT];
        config.save(&path).unwrap();

        let loaded = BandlightConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = BandlightConfig::default();
        config.decay_rates[2] = 1.5;
        assert!(matches!(config.validate(), Err(BandlightError::InvalidConfig(_))));

        let mut config = BandlightConfig::default();
        config.frame_size = 1023;
        assert!(matches!(config.validate(), Err(BandlightError::InvalidFrameSize(1023))));

        let mut config = BandlightConfig::default();
        config.bands[0].peak_weight = 0.9;
        assert!(matches!(config.validate(), Err(BandlightError::InvalidBandWeights { .. })));

        let mut config = BandlightConfig::default();
        config.baud_rate = 0;
        assert!(matches!(config.validate(), Err(BandlightError::InvalidConfig(_))));
    }
}
