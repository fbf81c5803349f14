//! Line protocol between host and device
//!
//! One message per `\n`-terminated line:
//!
//! | Direction     | Line                         |
//! |---------------|------------------------------|
//! | host → device | `L:v0,v1,v2,v3,v4`           |
//! | host → device | `DECAY:r0,r1,r2,r3,r4`       |
//! | host → device | `tempo_set:<bpm>`            |
//! | device → host | `MODE:AUDIO_CONTROL` etc.    |
//! | device → host | `VOL:<0-100>`                |
//!
//! The host also accepts `tempo_on`/`tempo_off` and the `CMD:TEMPO_*` forms.
pub mod codec;

pub use codec::{encode, ProtocolDecoder};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::audio::{ChannelValues, BAND_COUNT};

/// Device operating mode. Cycles AudioControl → Animation → Visualizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceMode {
    AudioControl,
    Animation,
    Visualizer,
}

impl DeviceMode {
    pub fn as_wire(self) -> &'static str {
        match self {
            DeviceMode::AudioControl => "AUDIO_CONTROL",
            DeviceMode::Animation => "ANIMATION",
            DeviceMode::Visualizer => "VISUALIZER",
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for DeviceMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUDIO_CONTROL" => Ok(DeviceMode::AudioControl),
            "ANIMATION" => Ok(DeviceMode::Animation),
            "VISUALIZER" => Ok(DeviceMode::Visualizer),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProtocolMessage {
    LedSet(ChannelValues),
    DecaySet([f32; BAND_COUNT]),
    ModeNotify(DeviceMode),
    VolumeReport(u8),
    TempoSet(f32),
    TempoSync(bool),
}
