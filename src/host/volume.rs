use log::debug;

use crate::error::{BandlightError, Result};

/// OS master-volume seam driven by the device's knob.
pub trait VolumeControl {
    /// Set the master volume, 0-100 percent.
    fn set_volume(&mut self, percent: u8) -> Result<()>;

    /// Current master volume, 0-100 percent.
    fn volume(&self) -> Result<u8>;
}

/// In-process stand-in for an endpoint whose level is set in dB.
///
/// Percent maps linearly onto `[min_db, max_db]`, the same way a Windows
/// endpoint volume range is driven.
#[derive(Debug, Clone)]
pub struct SimulatedVolume {
    min_db: f32,
    max_db: f32,
    level_db: f32,
}

impl SimulatedVolume {
    pub fn new(min_db: f32, max_db: f32) -> Result<Self> {
        if !(min_db < max_db) {
            return Err(BandlightError::InvalidConfig(format!(
                "volume range {}..{} dB is empty",
                min_db, max_db
            )));
        }
        Ok(Self {
            min_db,
            max_db,
            level_db: max_db,
        })
    }

    pub fn level_db(&self) -> f32 {
        self.level_db
    }
}

impl Default for SimulatedVolume {
    fn default() -> Self {
        Self {
            min_db: -65.25,
            max_db: 0.0,
            level_db: 0.0,
        }
    }
}

impl VolumeControl for SimulatedVolume {
    fn set_volume(&mut self, percent: u8) -> Result<()> {
        let fraction = f32::from(percent.min(100)) / 100.0;
        self.level_db = (self.min_db + (self.max_db - self.min_db) * fraction).clamp(self.min_db, self.max_db);
        debug!("Volume {}% -> {:.2} dB", percent, self.level_db);
        Ok(())
    }

    fn volume(&self) -> Result<u8> {
        let fraction = (self.level_db - self.min_db) / (self.max_db - self.min_db);
        Ok((fraction * 100.0).round().clamp(0.0, 100.0) as u8)
    }
}
