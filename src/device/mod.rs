//! Embedded-side controller: button, knob, mode state machine and LED output
pub mod animation;
pub mod controller;
pub mod debounce;
pub mod pins;

pub use animation::{AnimationTiming, Pattern};
pub use controller::{DeviceModeController, LoopInput};
pub use debounce::{Debouncer, Edge};
pub use pins::{OutputPins, RecordingPins, CHANNEL_PINS};

pub use crate::protocol::DeviceMode;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    ButtonPressed,
}

/// Mode transition table.
pub fn transition(mode: DeviceMode, event: ModeEvent) -> DeviceMode {
    match (mode, event) {
        (DeviceMode::AudioControl, ModeEvent::ButtonPressed) => DeviceMode::Animation,
        (DeviceMode::Animation, ModeEvent::ButtonPressed) => DeviceMode::Visualizer,
        (DeviceMode::Visualizer, ModeEvent::ButtonPressed) => DeviceMode::AudioControl,
    }
}

/// Timing constants of the controller loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceTiming {
    pub debounce_ms: u64,
    /// Interval between visualizer decay steps
    pub decay_tick_ms: u64,
    /// Minimum spacing between two volume reports
    pub volume_report_ms: u64,
    pub animation: AnimationTiming,
}

impl Default for DeviceTiming {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            decay_tick_ms: 50,
            volume_report_ms: 100,
            animation: AnimationTiming::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_cycle() {
        let mut mode = DeviceMode::AudioControl;
        let mut seen = Vec::new();
        for _ in 0..3 {
            mode = transition(mode, ModeEvent::ButtonPressed);
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![DeviceMode::Animation, DeviceMode::Visualizer, DeviceMode::AudioControl]
        );
    }
}
