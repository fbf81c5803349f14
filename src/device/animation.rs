use serde::{Deserialize, Serialize};

use crate::audio::BAND_COUNT;

/// Audio-independent light patterns shown in Animation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Breathing,
    Chase,
    GroupBlink,
}

impl Pattern {
    const ROTATION: [Pattern; 3] = [Pattern::Breathing, Pattern::Chase, Pattern::GroupBlink];
}

/// Bounce order for the chase: out to the last channel and back.
const CHASE_SEQUENCE: [usize; 8] = [0, 1, 2, 3, 4, 3, 2, 1];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationTiming {
    /// Time each pattern runs before the next one takes over
    pub rotation_ms: u64,
    pub breathing_period_ms: u64,
    pub chase_step_ms: u64,
    pub blink_ms: u64,
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            rotation_ms: 5000,
            breathing_period_ms: 2000,
            chase_step_ms: 150,
            blink_ms: 400,
        }
    }
}

impl AnimationTiming {
    pub fn pattern_at(&self, elapsed_ms: u64) -> Pattern {
        let slot = (elapsed_ms / self.rotation_ms.max(1)) as usize % Pattern::ROTATION.len();
        Pattern::ROTATION[slot]
    }

    /// Brightness of every channel `elapsed_ms` after the mode was entered.
    pub fn render(&self, elapsed_ms: u64) -> [f32; BAND_COUNT] {
        let t = elapsed_ms % self.rotation_ms.max(1);
        let mut frame = [0.0; BAND_COUNT];

        match self.pattern_at(elapsed_ms) {
            Pattern::Breathing => {
                let period = self.breathing_period_ms.max(1);
                let phase = (t % period) as f32 / period as f32;
                let level = (1.0 - (2.0 * std::f32::consts::PI * phase).cos()) / 2.0 * 255.0;
                frame = [level; BAND_COUNT];
            }
            Pattern::Chase => {
                let step = (t / self.chase_step_ms.max(1)) as usize % CHASE_SEQUENCE.len();
                frame[CHASE_SEQUENCE[step]] = 255.0;
            }
            Pattern::GroupBlink => {
                let odd_group = (t / self.blink_ms.max(1)) % 2 == 1;
                for (i, value) in frame.iter_mut().enumerate() {
                    if (i % 2 == 1) == odd_group {
                        *value = 255.0;
                    }
                }
            }
        }

        frame
    }
}
