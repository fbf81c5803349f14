pub mod fft;
pub mod bands;
pub mod normalizer;
pub mod smoother;
pub mod beat_tracker;
pub mod tempo_sync;
pub mod queue;
pub mod capture;

pub use fft::{SpectralAnalyzer, SpectralFrame};
pub use bands::{BandDefinition, BandEnergyExtractor};
pub use normalizer::{NormalizerParameters, PerceptualNormalizer};
pub use smoother::AdaptiveSmoother;
pub use beat_tracker::{BeatParameters, BeatState, BeatTracker};
pub use tempo_sync::TempoSyncMapper;
pub use queue::{frame_queue, FrameConsumer, FrameProducer};
pub use capture::AudioCapture;

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Number of frequency bands, and of output channels on the device.
pub const BAND_COUNT: usize = 5;

/// Final per-channel brightness, ordered vocals, chord, snare, clap, bass.
pub type ChannelValues = [u8; BAND_COUNT];

/// Per-channel brightness multipliers applied on every decay step. Transient
/// bands (snare, clap) fade fastest.
pub const DEFAULT_DECAY_RATES: [f32; BAND_COUNT] = [0.6, 0.5, 0.1, 0.1, 0.3];

/// The musical elements tracked by the analyzer. The declaration order is the
/// channel order on the wire and on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Vocals,
    Chord,
    Snare,
    Clap,
    Bass,
}

impl Band {
    pub const ALL: [Band; BAND_COUNT] = [
        Band::Vocals,
        Band::Chord,
        Band::Snare,
        Band::Clap,
        Band::Bass,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Band::Vocals => "vocals",
            Band::Chord => "chord",
            Band::Snare => "snare",
            Band::Clap => "clap",
            Band::Bass => "bass",
        }
    }
}

/// One value per band, indexable by [`Band`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandValues<T>(pub [T; BAND_COUNT]);

impl<T: Copy> BandValues<T> {
    pub fn splat(value: T) -> Self {
        Self([value; BAND_COUNT])
    }

    pub fn map<U>(&self, mut f: impl FnMut(Band, T) -> U) -> BandValues<U> {
        BandValues(std::array::from_fn(|i| f(Band::ALL[i], self.0[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, T)> + '_ {
        Band::ALL.iter().map(move |&band| (band, self.0[band.index()]))
    }
}

impl<T> Index<Band> for BandValues<T> {
    type Output = T;

    fn index(&self, band: Band) -> &T {
        &self.0[band.index()]
    }
}

impl<T> IndexMut<Band> for BandValues<T> {
    fn index_mut(&mut self, band: Band) -> &mut T {
        &mut self.0[band.index()]
    }
}

/// One fixed-size block of mono PCM handed from capture to the analysis thread.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub index: u64,
    pub sample_rate: f32,
    pub samples: Vec<f32>,
}

impl AudioFrame {
    pub fn new(index: u64, sample_rate: f32, samples: Vec<f32>) -> Self {
        Self {
            index,
            sample_rate,
            samples,
        }
    }

    /// Build a frame from signed 16-bit PCM, scaling to [-1, 1].
    pub fn from_i16(index: u64, sample_rate: f32, pcm: &[i16]) -> Self {
        let samples = pcm.iter().map(|&s| s as f32 / 32768.0).collect();
        Self::new(index, sample_rate, samples)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame duration in milliseconds at its sample rate
    pub fn duration_ms(&self) -> f32 {
        self.samples.len() as f32 * 1000.0 / self.sample_rate
    }
}
