use log::debug;

use crate::audio::BAND_COUNT;

/// PWM-capable output pin for each channel: vocals, chord, snare, clap, bass.
pub const CHANNEL_PINS: [u8; BAND_COUNT] = [3, 9, 5, 6, 10];

/// Hardware seam for the controller's output step.
pub trait OutputPins {
    fn write_pwm(&mut self, pin: u8, duty: u8);
}

/// Keeps the last duty written to each channel pin. Logs changes only.
#[derive(Debug, Clone, Default)]
pub struct RecordingPins {
    duties: [u8; BAND_COUNT],
    writes: usize,
}

impl RecordingPins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duties(&self) -> [u8; BAND_COUNT] {
        self.duties
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl OutputPins for RecordingPins {
    fn write_pwm(&mut self, pin: u8, duty: u8) {
        self.writes += 1;
        if let Some(channel) = CHANNEL_PINS.iter().position(|&p| p == pin) {
            if self.duties[channel] != duty {
                debug!("pin {} -> {}", pin, duty);
            }
            self.duties[channel] = duty;
        }
    }
}
