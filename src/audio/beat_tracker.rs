use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use super::{Band, BandValues};
use crate::error::{BandlightError, Result};

/// Accepted window for explicit tempo overrides
pub const MIN_TEMPO_BPM: f32 = 60.0;
pub const MAX_TEMPO_BPM: f32 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatParameters {
    /// Frames of onset signal averaged for the adaptive threshold
    pub history: usize,
    /// Prior frames required before any onset can fire
    pub min_history: usize,
    /// Signal must exceed `sensitivity * rolling average`
    pub sensitivity: f32,
    /// Absolute signal floor on the 0-100 level scale
    pub min_level: f32,
    /// Shortest allowed gap between two onsets
    pub min_interval_ms: u64,
    /// Silence after which beat stepping switches to the fixed clock
    pub fallback_timeout_ms: u64,
    /// Tempo used by the fixed clock before any interval is known
    pub default_bpm: f32,
    /// EMA weight of each newly observed interval
    pub interval_smoothing: f32,
}

impl Default for BeatParameters {
    fn default() -> Self {
        Self {
            history: 20,
            min_history: 3,
            sensitivity: 1.5,
            min_level: 5.0,
            min_interval_ms: 200,
            fallback_timeout_ms: 2000,
            default_bpm: 120.0,
            interval_smoothing: 0.3,
        }
    }
}

impl BeatParameters {
    pub fn validate(&self) -> Result<()> {
        if self.history == 0 || self.min_history > self.history {
            return Err(BandlightError::InvalidConfig(format!(
                "beat history {} must be non-zero and at least min_history {}",
                self.history, self.min_history
            )));
        }
        if !(self.sensitivity > 0.0) {
            return Err(BandlightError::InvalidConfig(format!(
                "beat sensitivity must be positive, got {}",
                self.sensitivity
            )));
        }
        if self.min_interval_ms == 0 || self.fallback_timeout_ms <= self.min_interval_ms {
            return Err(BandlightError::InvalidConfig(format!(
                "beat min_interval_ms {} must be non-zero and below fallback_timeout_ms {}",
                self.min_interval_ms, self.fallback_timeout_ms
            )));
        }
        if !(self.default_bpm > 0.0) {
            return Err(BandlightError::InvalidConfig(format!(
                "default_bpm must be positive, got {}",
                self.default_bpm
            )));
        }
        if !(self.interval_smoothing > 0.0 && self.interval_smoothing <= 1.0) {
            return Err(BandlightError::InvalidConfig(format!(
                "interval_smoothing must be within (0, 1], got {}",
                self.interval_smoothing
            )));
        }
        Ok(())
    }
}

/// Intervals are kept at millisecond resolution, like the device clock.
fn whole_millis(ms: f64) -> Duration {
    Duration::from_millis(ms.round().max(1.0) as u64)
}

/// Tempo and 4-beat position for the current session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatState {
    pub last_beat: Duration,
    pub estimated_interval: Option<Duration>,
    /// 0..=3, the position within the bar
    pub beat_position: u8,
    pub using_fixed_tempo: bool,
}

impl Default for BeatState {
    fn default() -> Self {
        Self {
            last_beat: Duration::ZERO,
            estimated_interval: None,
            beat_position: 0,
            using_fixed_tempo: false,
        }
    }
}

/// What happened on one tracker update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BeatUpdate {
    pub onset: bool,
    pub fixed_step: bool,
    pub position: u8,
}

/// Onset detection on the bass/snare levels with a fixed-clock fallback.
///
/// Time is passed in as the offset since session start so the tracker can be
/// driven from the frame clock or from tests.
pub struct BeatTracker {
    params: BeatParameters,
    state: BeatState,
    signal_history: VecDeque<f32>,
    seen_onset: bool,
    fixed_anchor: Duration,
}

impl BeatTracker {
    pub fn new(params: BeatParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            state: BeatState::default(),
            signal_history: VecDeque::with_capacity(params.history),
            seen_onset: false,
            fixed_anchor: Duration::ZERO,
        })
    }

    pub fn state(&self) -> &BeatState {
        &self.state
    }

    pub fn position(&self) -> u8 {
        self.state.beat_position
    }

    /// Current tempo estimate, falling back to the default BPM.
    pub fn interval(&self) -> Duration {
        self.state
            .estimated_interval
            .unwrap_or_else(|| whole_millis(60_000.0 / self.params.default_bpm as f64))
    }

    pub fn estimated_bpm(&self) -> f32 {
        (60.0 / self.interval().as_secs_f64()) as f32
    }

    /// Onset signal: the stronger of the two rhythm bands.
    fn onset_signal(levels: &BandValues<f32>) -> f32 {
        levels[Band::Bass].max(levels[Band::Snare])
    }

    pub fn update(&mut self, now: Duration, levels: &BandValues<f32>) -> BeatUpdate {
        let signal = Self::onset_signal(levels);
        let since_last = now.saturating_sub(self.state.last_beat);

        let onset = self.signal_history.len() >= self.params.min_history
            && signal > self.rolling_average() * self.params.sensitivity
            && signal > self.params.min_level
            && since_last >= Duration::from_millis(self.params.min_interval_ms);

        self.signal_history.push_back(signal);
        while self.signal_history.len() > self.params.history {
            self.signal_history.pop_front();
        }

        if onset {
            self.register_onset(now, since_last);
            return BeatUpdate {
                onset: true,
                fixed_step: false,
                position: self.state.beat_position,
            };
        }

        let fixed_step = self.step_fixed_clock(now, since_last);
        BeatUpdate {
            onset: false,
            fixed_step,
            position: self.state.beat_position,
        }
    }

    fn rolling_average(&self) -> f32 {
        if self.signal_history.is_empty() {
            return 0.0;
        }
        self.signal_history.iter().sum::<f32>() / self.signal_history.len() as f32
    }

    fn register_onset(&mut self, now: Duration, observed: Duration) {
        let timeout = Duration::from_millis(self.params.fallback_timeout_ms);

        if self.seen_onset && observed <= timeout {
            let alpha = self.params.interval_smoothing as f64;
            let observed_ms = observed.as_millis() as f64;
            let estimate_ms = match self.state.estimated_interval {
                Some(previous) => previous.as_millis() as f64 * (1.0 - alpha) + observed_ms * alpha,
                None => observed_ms,
            };
            self.state.estimated_interval = Some(whole_millis(estimate_ms));
        }

        if self.state.using_fixed_tempo {
            debug!("Onset detected, leaving fixed tempo");
        }

        self.seen_onset = true;
        self.state.beat_position = (self.state.beat_position + 1) % 4;
        self.state.last_beat = now;
        self.state.using_fixed_tempo = false;

        debug!(
            "Beat {}/4 at {:?}, tempo {:.1} BPM",
            self.state.beat_position + 1,
            now,
            self.estimated_bpm()
        );
    }

    fn step_fixed_clock(&mut self, now: Duration, since_last: Duration) -> bool {
        if !self.state.using_fixed_tempo {
            if since_last <= Duration::from_millis(self.params.fallback_timeout_ms) {
                return false;
            }
            // Counted from the last beat: any interval below the timeout is
            // already due
            self.state.using_fixed_tempo = true;
            self.fixed_anchor = self.state.last_beat;
            info!(
                "No onset for {} ms, stepping beats at fixed {:.1} BPM",
                since_last.as_millis(),
                self.estimated_bpm()
            );
        }

        let interval = self.interval();
        if now.saturating_sub(self.fixed_anchor) < interval {
            return false;
        }

        self.state.beat_position = (self.state.beat_position + 1) % 4;
        self.fixed_anchor += interval;
        // Resync if frames stalled for more than a whole beat
        if now.saturating_sub(self.fixed_anchor) >= interval {
            self.fixed_anchor = now;
        }
        true
    }

    /// Explicit tempo override. Resets the bar position and restarts the
    /// fallback timer from `now`.
    pub fn set_tempo(&mut self, bpm: f32, now: Duration) -> Result<()> {
        if !(MIN_TEMPO_BPM..=MAX_TEMPO_BPM).contains(&bpm) {
            return Err(BandlightError::TempoOutOfRange {
                bpm,
                min: MIN_TEMPO_BPM,
                max: MAX_TEMPO_BPM,
            });
        }

        self.state = BeatState {
            last_beat: now,
            estimated_interval: Some(whole_millis(60_000.0 / bpm as f64)),
            beat_position: 0,
            using_fixed_tempo: false,
        };
        self.seen_onset = false;
        self.fixed_anchor = now;
        info!("Tempo set to {:.1} BPM", bpm);
        Ok(())
    }
}

impl Default for BeatTracker {
    fn default() -> Self {
        let params = BeatParameters::default();
        Self {
            params,
            state: BeatState::default(),
            signal_history: VecDeque::with_capacity(params.history),
            seen_onset: false,
            fixed_anchor: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(bass: f32) -> BandValues<f32> {
        let mut values = BandValues::splat(0.0);
        values[Band::Bass] = bass;
        values
    }

    /// Drive the tracker in 10 ms steps, spiking bass at the given times.
    fn run(tracker: &mut BeatTracker, from_ms: u64, to_ms: u64, spikes: &[u64]) -> Vec<(u64, BeatUpdate)> {
        let mut updates = Vec::new();
        let mut t = from_ms;
        while t < to_ms {
            let level = if spikes.contains(&t) { 60.0 } else { 0.0 };
            updates.push((t, tracker.update(Duration::from_millis(t), &levels(level))));
            t += 10;
        }
        updates
    }

    #[test]
    fn test_regular_spikes_register_onsets() {
        let mut tracker = BeatTracker::default();
        let updates = run(&mut tracker, 0, 2600, &[1000, 1500, 2000, 2500]);

        let onsets: Vec<u64> = updates.iter().filter(|(_, u)| u.onset).map(|(t, _)| *t).collect();
        assert_eq!(onsets, vec![1000, 1500, 2000, 2500]);
        assert_eq!(tracker.position(), 0);

        let interval = tracker.state().estimated_interval.unwrap();
        assert!((interval.as_secs_f64() - 0.5).abs() < 1e-6);
        assert!((tracker.estimated_bpm() - 120.0).abs() < 0.01);
    }

    #[test]
    fn test_onsets_never_closer_than_min_interval() {
        let mut tracker = BeatTracker::default();
        let spikes: Vec<u64> = (0..300).map(|i| 100 + i * 50).collect();
        let updates = run(&mut tracker, 0, 15000, &spikes);

        let onsets: Vec<u64> = updates.iter().filter(|(_, u)| u.onset).map(|(t, _)| *t).collect();
        assert!(onsets.len() > 10);
        for pair in onsets.windows(2) {
            assert!(pair[1] - pair[0] >= 200, "onsets at {} and {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_fixed_tempo_after_silence() {
        let mut tracker = BeatTracker::default();
        run(&mut tracker, 0, 2600, &[1000, 1400, 1800, 2200]);
        assert!(!tracker.state().using_fixed_tempo);
        let interval = tracker.interval();
        assert!((interval.as_secs_f64() - 0.4).abs() < 1e-6);

        // Still inside the 2 s window
        run(&mut tracker, 2600, 4200, &[]);
        assert!(!tracker.state().using_fixed_tempo);

        let engaged = run(&mut tracker, 4200, 4220, &[]);
        assert!(tracker.state().using_fixed_tempo);
        let steps: Vec<u64> = engaged.iter().filter(|(_, u)| u.fixed_step).map(|(t, _)| *t).collect();
        assert_eq!(steps, vec![4210]);
        let start = tracker.position();

        // 2000 ms at 400 ms per beat -> five steps
        let updates = run(&mut tracker, 4220, 6220, &[]);
        let steps = updates.iter().filter(|(_, u)| u.fixed_step).count();
        assert_eq!(steps, 5);
        assert_eq!(tracker.position(), (start + 5) % 4);
    }

    #[test]
    fn test_fixed_tempo_uses_default_bpm_without_estimate() {
        let mut tracker = BeatTracker::default();
        let updates = run(&mut tracker, 0, 5030, &[]);

        assert!(tracker.state().using_fixed_tempo);
        // Fallback engages and steps just after 2000 ms, then 500 ms per beat
        let steps: Vec<u64> = updates.iter().filter(|(_, u)| u.fixed_step).map(|(t, _)| *t).collect();
        assert_eq!(steps, vec![2010, 2510, 3010, 3510, 4010, 4510, 5010]);
    }

    #[test]
    fn test_onset_leaves_fixed_tempo() {
        let mut tracker = BeatTracker::default();
        run(&mut tracker, 0, 3000, &[]);
        assert!(tracker.state().using_fixed_tempo);

        let updates = run(&mut tracker, 3000, 3100, &[3050]);
        assert!(updates.iter().any(|(_, u)| u.onset));
        assert!(!tracker.state().using_fixed_tempo);
    }

    #[test]
    fn test_tempo_override() {
        let mut tracker = BeatTracker::default();
        run(&mut tracker, 0, 3000, &[]);
        assert!(tracker.state().using_fixed_tempo);

        tracker.set_tempo(150.0, Duration::from_millis(3000)).unwrap();
        let state = tracker.state();
        assert!(!state.using_fixed_tempo);
        assert_eq!(state.beat_position, 0);
        assert_eq!(state.estimated_interval, Some(Duration::from_millis(400)));

        assert!(matches!(
            tracker.set_tempo(20.0, Duration::from_millis(3000)),
            Err(BandlightError::TempoOutOfRange { .. })
        ));
        assert_eq!(tracker.state().estimated_interval, Some(Duration::from_millis(400)));
    }

    #[test]
    fn test_quiet_signal_never_triggers() {
        let mut tracker = BeatTracker::default();
        let mut t = 0;
        while t < 1500 {
            let level = if t % 300 == 0 { 4.0 } else { 0.0 };
            let update = tracker.update(Duration::from_millis(t), &levels(level));
            assert!(!update.onset);
            t += 10;
        }
    }
}
