use log::{debug, info, warn};
use std::time::Duration;

use crate::audio::{
    AdaptiveSmoother, AudioFrame, BandEnergyExtractor, BandValues, BeatState, BeatTracker, ChannelValues,
    PerceptualNormalizer, SpectralAnalyzer, TempoSyncMapper,
};
use crate::config::BandlightConfig;
use crate::error::Result;

/// Frames between two debug summaries of the analysis state.
const DEBUG_EVERY_FRAMES: u64 = 100;

/// The full frame-to-channels chain: FFT, band energies, dB scaling,
/// smoothing, beat tracking and tempo-synced mapping.
///
/// Owns all per-session analysis state. Only one thread drives it.
pub struct AnalysisPipeline {
    analyzer: SpectralAnalyzer,
    extractor: BandEnergyExtractor,
    normalizer: PerceptualNormalizer,
    smoother: AdaptiveSmoother,
    tracker: BeatTracker,
    mapper: TempoSyncMapper,
    sample_rate: f32,
    frames_processed: u64,
}

impl AnalysisPipeline {
    /// Build the chain for audio arriving at `sample_rate`, which may differ
    /// from the configured rate.
    pub fn new(config: &BandlightConfig, sample_rate: f32) -> Result<Self> {
        config.validate()?;

        if (sample_rate - config.sample_rate).abs() > f32::EPSILON {
            warn!(
                "Capture runs at {} Hz instead of {} Hz: {:.1} Hz per bin, {:.1} ms per frame",
                sample_rate,
                config.sample_rate,
                sample_rate / config.frame_size as f32,
                config.frame_size as f32 / sample_rate * 1000.0
            );
        }

        let pipeline = Self {
            analyzer: SpectralAnalyzer::new(config.frame_size)?,
            extractor: BandEnergyExtractor::with_definitions(
                config.bands,
                config.transient_boost,
                sample_rate,
                config.frame_size,
            )?,
            normalizer: PerceptualNormalizer::new(config.normalizer)?,
            smoother: AdaptiveSmoother::new(config.smoothing)?,
            tracker: BeatTracker::new(config.beat)?,
            mapper: TempoSyncMapper::new(config.tempo_sync, config.decay_rates),
            sample_rate,
            frames_processed: 0,
        };

        info!(
            "Analysis pipeline ready: {} samples at {} Hz, tempo sync {}",
            config.frame_size,
            sample_rate,
            if config.tempo_sync { "on" } else { "off" }
        );
        Ok(pipeline)
    }

    /// Run one frame through the chain. `now` is the offset since session start.
    pub fn process_frame(&mut self, frame: &AudioFrame, now: Duration) -> Result<ChannelValues> {
        let spectrum = self.analyzer.analyze(frame)?;
        let energies = self.extractor.extract(&spectrum);
        let levels = self.normalizer.normalize_bands(&energies);
        let smoothed = self.smoother.update(&levels);
        let beat = self.tracker.update(now, &smoothed);
        let channels = self.mapper.map(&smoothed, beat.position);

        self.frames_processed += 1;
        if self.frames_processed % DEBUG_EVERY_FRAMES == 0 {
            debug!(
                "frame {}: levels {:?} beat {}/4 {:.1} BPM{} -> {:?}",
                frame.index,
                smoothed.0,
                beat.position + 1,
                self.tracker.estimated_bpm(),
                if self.tracker.state().using_fixed_tempo { " (fixed)" } else { "" },
                channels
            );
        }

        Ok(channels)
    }

    /// Clear smoothed levels and the mapper's fade memory.
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.mapper.reset();
    }

    pub fn set_tempo(&mut self, bpm: f32, now: Duration) -> Result<()> {
        self.tracker.set_tempo(bpm, now)
    }

    pub fn set_sync(&mut self, enabled: bool) {
        info!("Tempo sync {}", if enabled { "enabled" } else { "disabled" });
        self.mapper.set_sync(enabled);
    }

    pub fn sync_enabled(&self) -> bool {
        self.mapper.sync_enabled()
    }

    pub fn beat_state(&self) -> &BeatState {
        self.tracker.state()
    }

    pub fn estimated_bpm(&self) -> f32 {
        self.tracker.estimated_bpm()
    }

    pub fn levels(&self) -> &BandValues<f32> {
        self.smoother.levels()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}
