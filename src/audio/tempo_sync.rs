use super::{Band, BandValues, ChannelValues, BAND_COUNT, DEFAULT_DECAY_RATES};

/// Bass/snare level a beat needs before its channel is emphasized
pub const SIGNIFICANCE_THRESHOLD: f32 = 20.0;

/// Maps smoothed levels to 0-255 channel values, optionally locking the bass
/// and snare channels to a 4/4 backbeat.
///
/// With sync on, bass lights on beats 1 and 3, snare on beats 2 and 4. Off-beat
/// (or too quiet) the channel fades from its last output at the same rate the
/// device uses, so the host never hard-cuts a channel.
#[derive(Debug, Clone)]
pub struct TempoSyncMapper {
    sync_enabled: bool,
    decay_rates: [f32; BAND_COUNT],
    previous: ChannelValues,
}

impl TempoSyncMapper {
    pub fn new(sync_enabled: bool, decay_rates: [f32; BAND_COUNT]) -> Self {
        Self {
            sync_enabled,
            decay_rates: decay_rates.map(|r| r.clamp(0.0, 1.0)),
            previous: [0; BAND_COUNT],
        }
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    pub fn set_sync(&mut self, enabled: bool) {
        self.sync_enabled = enabled;
    }

    pub fn decay_rates(&self) -> &[f32; BAND_COUNT] {
        &self.decay_rates
    }

    pub fn reset(&mut self) {
        self.previous = [0; BAND_COUNT];
    }

    /// `round(level * 2.55)`, computed as `* 255 / 100` so half-steps round up.
    pub fn direct(level: f32) -> u8 {
        (level * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8
    }

    fn decayed(&self, band: Band) -> u8 {
        let i = band.index();
        (self.previous[i] as f32 * self.decay_rates[i]).round().clamp(0.0, 255.0) as u8
    }

    fn emphasized(&self, band: Band, level: f32, on_beat: bool) -> u8 {
        if on_beat && level > SIGNIFICANCE_THRESHOLD {
            Self::direct(level)
        } else {
            self.decayed(band)
        }
    }

    pub fn map(&mut self, levels: &BandValues<f32>, beat_position: u8) -> ChannelValues {
        let mut values = levels.map(|_, level| Self::direct(level)).0;

        if self.sync_enabled {
            let downbeat = beat_position % 2 == 0;
            values[Band::Bass.index()] = self.emphasized(Band::Bass, levels[Band::Bass], downbeat);
            values[Band::Snare.index()] = self.emphasized(Band::Snare, levels[Band::Snare], !downbeat);
        }

        self.previous = values;
        values
    }
}

impl Default for TempoSyncMapper {
    fn default() -> Self {
        Self::new(true, DEFAULT_DECAY_RATES)
    }
}
