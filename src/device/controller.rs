use log::{debug, info};

use super::pins::{OutputPins, CHANNEL_PINS};
use super::{transition, Debouncer, DeviceMode, DeviceTiming, Edge, ModeEvent};
use crate::audio::{ChannelValues, BAND_COUNT, DEFAULT_DECAY_RATES};
use crate::protocol::{ProtocolDecoder, ProtocolMessage};

/// Brightness below this is switched off instead of decaying forever.
const SNAP_THRESHOLD: f32 = 1.0;
const POT_MAX: u16 = 1023;

/// Everything the controller samples in one loop pass.
#[derive(Debug, Clone, Default)]
pub struct LoopInput {
    pub now_ms: u64,
    /// Raw button level, true while held
    pub button_down: bool,
    /// Potentiometer reading, 0..=1023
    pub pot_raw: u16,
    /// Serial lines received since the last pass
    pub lines: Vec<String>,
}

impl LoopInput {
    pub fn at(now_ms: u64) -> Self {
        Self {
            now_ms,
            ..Self::default()
        }
    }

    pub fn with_button(mut self, down: bool) -> Self {
        self.button_down = down;
        self
    }

    pub fn with_pot(mut self, raw: u16) -> Self {
        self.pot_raw = raw;
        self
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }
}

/// Mode-aware state machine of the LED device.
///
/// [`poll`](Self::poll) advances the state for one loop pass and returns the
/// messages to send back to the host. [`drive`](Self::drive) writes the
/// resulting duties to the pins. Malformed input is ignored; there is no
/// error path.
#[derive(Debug, Clone)]
pub struct DeviceModeController {
    timing: DeviceTiming,
    mode: DeviceMode,
    brightness: [f32; BAND_COUNT],
    decay_rates: [f32; BAND_COUNT],
    decoder: ProtocolDecoder,
    button: Debouncer,

    // Reset on every mode change
    mode_entered_ms: u64,
    last_decay_ms: u64,
    last_volume_report: Option<(u64, u8)>,
}

impl DeviceModeController {
    pub fn new(timing: DeviceTiming) -> Self {
        Self {
            timing,
            mode: DeviceMode::AudioControl,
            brightness: [0.0; BAND_COUNT],
            decay_rates: DEFAULT_DECAY_RATES,
            decoder: ProtocolDecoder::new(),
            button: Debouncer::new(timing.debounce_ms),
            mode_entered_ms: 0,
            last_decay_ms: 0,
            last_volume_report: None,
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn brightness(&self) -> [f32; BAND_COUNT] {
        self.brightness
    }

    pub fn decay_rates(&self) -> [f32; BAND_COUNT] {
        self.decay_rates
    }

    /// One control loop pass. A button edge switches mode before this pass's
    /// serial lines are applied, so the lines see the new mode.
    pub fn poll(&mut self, input: LoopInput) -> Vec<ProtocolMessage> {
        let now = input.now_ms;
        let mut outbound = Vec::new();

        if self.button.update(now, input.button_down) == Some(Edge::Pressed) {
            let next = transition(self.mode, ModeEvent::ButtonPressed);
            self.enter_mode(next, now);
            outbound.push(ProtocolMessage::ModeNotify(next));
        }

        for line in &input.lines {
            self.handle_line(line, now);
        }

        match self.mode {
            DeviceMode::AudioControl => {
                if let Some(percent) = self.update_volume(now, input.pot_raw) {
                    outbound.push(ProtocolMessage::VolumeReport(percent));
                }
            }
            DeviceMode::Animation => {
                let elapsed = now.saturating_sub(self.mode_entered_ms);
                self.brightness = self.timing.animation.render(elapsed);
            }
            DeviceMode::Visualizer => self.apply_decay(now),
        }

        outbound
    }

    /// Apply one inbound serial line.
    pub fn handle_line(&mut self, line: &str, now_ms: u64) {
        match self.decoder.decode(line) {
            Some(ProtocolMessage::LedSet(values)) if self.mode == DeviceMode::Visualizer => {
                self.brightness = values.map(f32::from);
                self.last_decay_ms = now_ms;
            }
            Some(ProtocolMessage::LedSet(_)) => {
                debug!("LED frame ignored in {} mode", self.mode);
            }
            Some(ProtocolMessage::DecaySet(rates)) => {
                debug!("Decay rates set to {:?}", rates);
                self.decay_rates = rates;
            }
            Some(other) => debug!("Ignoring host-bound message {:?}", other),
            None => {}
        }
    }

    /// PWM duty per channel for the current brightness.
    pub fn duties(&self) -> ChannelValues {
        self.brightness.map(|b| b.round().clamp(0.0, 255.0) as u8)
    }

    pub fn drive(&self, pins: &mut impl OutputPins) {
        for (pin, duty) in CHANNEL_PINS.iter().zip(self.duties()) {
            pins.write_pwm(*pin, duty);
        }
    }

    fn enter_mode(&mut self, mode: DeviceMode, now_ms: u64) {
        info!("Mode {} -> {}", self.mode, mode);
        self.mode = mode;
        self.brightness = [0.0; BAND_COUNT];
        self.decoder.reset_leds();
        self.mode_entered_ms = now_ms;
        self.last_decay_ms = now_ms;
        self.last_volume_report = None;
    }

    fn apply_decay(&mut self, now_ms: u64) {
        let tick = self.timing.decay_tick_ms.max(1);
        let ticks = now_ms.saturating_sub(self.last_decay_ms) / tick;
        if ticks == 0 {
            return;
        }
        self.last_decay_ms += ticks * tick;

        let steps = ticks.min(i32::MAX as u64) as i32;
        for (b, rate) in self.brightness.iter_mut().zip(self.decay_rates) {
            *b = (*b * rate.powi(steps)).max(0.0);
            if *b < SNAP_THRESHOLD {
                *b = 0.0;
            }
        }
    }

    /// Bar display of the knob position. Returns the percent when a report is due.
    fn update_volume(&mut self, now_ms: u64, pot_raw: u16) -> Option<u8> {
        let percent = pot_percent(pot_raw);
        self.brightness = volume_bar(percent);

        let due = match self.last_volume_report {
            None => true,
            Some((at, last)) => {
                last != percent && now_ms.saturating_sub(at) >= self.timing.volume_report_ms
            }
        };
        if due {
            self.last_volume_report = Some((now_ms, percent));
            Some(percent)
        } else {
            None
        }
    }
}

impl Default for DeviceModeController {
    fn default() -> Self {
        Self::new(DeviceTiming::default())
    }
}

fn pot_percent(raw: u16) -> u8 {
    let raw = u32::from(raw.min(POT_MAX));
    ((raw * 100 + u32::from(POT_MAX) / 2) / u32::from(POT_MAX)) as u8
}

fn volume_bar(percent: u8) -> [f32; BAND_COUNT] {
    let level = f32::from(percent) / 100.0 * BAND_COUNT as f32;
    let full = level.floor() as usize;
    let mut bar = [0.0; BAND_COUNT];
    for (i, value) in bar.iter_mut().enumerate() {
        if i < full {
            *value = 255.0;
        } else if i == full {
            *value = (level - full as f32) * 255.0;
        }
    }
    bar
}
