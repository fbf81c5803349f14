use log::debug;

use super::{DeviceMode, ProtocolMessage};
use crate::audio::{ChannelValues, BAND_COUNT, DEFAULT_DECAY_RATES};

const LED_PREFIX: &str = "L:";
const DECAY_PREFIX: &str = "DECAY:";
const MODE_PREFIX: &str = "MODE:";
const VOLUME_PREFIX: &str = "VOL:";
const TEMPO_SET_PREFIX: &str = "tempo_set:";
const CMD_TEMPO_SET_PREFIX: &str = "CMD:TEMPO_SET:";

/// Render one message as a newline-terminated line.
pub fn encode(message: &ProtocolMessage) -> String {
    match message {
        ProtocolMessage::LedSet(values) => format!("{}{}\n", LED_PREFIX, join(values)),
        ProtocolMessage::DecaySet(rates) => format!("{}{}\n", DECAY_PREFIX, join(rates)),
        ProtocolMessage::ModeNotify(mode) => format!("{}{}\n", MODE_PREFIX, mode.as_wire()),
        ProtocolMessage::VolumeReport(percent) => format!("{}{}\n", VOLUME_PREFIX, percent),
        ProtocolMessage::TempoSet(bpm) => format!("{}{}\n", TEMPO_SET_PREFIX, bpm),
        ProtocolMessage::TempoSync(true) => "tempo_on\n".to_string(),
        ProtocolMessage::TempoSync(false) => "tempo_off\n".to_string(),
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

/// Parses inbound lines into messages.
///
/// Never fails: unknown lines come back as `None`. List payloads are parsed
/// field by field, an empty or non-numeric field reads as 0 and a missing
/// trailing field keeps the value from the previous message of that kind.
#[derive(Debug, Clone)]
pub struct ProtocolDecoder {
    last_leds: ChannelValues,
    last_decay: [f32; BAND_COUNT],
}

impl ProtocolDecoder {
    pub fn new() -> Self {
        Self {
            last_leds: [0; BAND_COUNT],
            last_decay: DEFAULT_DECAY_RATES,
        }
    }

    /// Forget remembered LED values so a partial line starts from dark.
    pub fn reset_leds(&mut self) {
        self.last_leds = [0; BAND_COUNT];
    }

    pub fn decode(&mut self, line: &str) -> Option<ProtocolMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let message = if let Some(payload) = line.strip_prefix(LED_PREFIX) {
            let values = parse_fields(payload, self.last_leds, |v| v.round().clamp(0.0, 255.0) as u8);
            self.last_leds = values;
            Some(ProtocolMessage::LedSet(values))
        } else if let Some(payload) = line.strip_prefix(DECAY_PREFIX) {
            let rates = parse_fields(payload, self.last_decay, |v| v.clamp(0.0, 1.0));
            self.last_decay = rates;
            Some(ProtocolMessage::DecaySet(rates))
        } else if let Some(payload) = line.strip_prefix(MODE_PREFIX) {
            payload.trim().parse::<DeviceMode>().ok().map(ProtocolMessage::ModeNotify)
        } else if let Some(payload) = line.strip_prefix(VOLUME_PREFIX) {
            parse_scalar(payload).map(|v| ProtocolMessage::VolumeReport(v.round().clamp(0.0, 100.0) as u8))
        } else if let Some(payload) = line
            .strip_prefix(TEMPO_SET_PREFIX)
            .or_else(|| line.strip_prefix(CMD_TEMPO_SET_PREFIX))
        {
            parse_scalar(payload).map(ProtocolMessage::TempoSet)
        } else {
            match line {
                "tempo_on" | "CMD:TEMPO_ON" => Some(ProtocolMessage::TempoSync(true)),
                "tempo_off" | "CMD:TEMPO_OFF" => Some(ProtocolMessage::TempoSync(false)),
                _ => None,
            }
        };

        if message.is_none() {
            debug!("Ignoring unrecognized line: {:?}", line);
        }
        message
    }
}

impl Default for ProtocolDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_fields<T: Copy>(payload: &str, previous: [T; BAND_COUNT], convert: impl Fn(f32) -> T) -> [T; BAND_COUNT] {
    let mut values = previous;
    for (slot, field) in values.iter_mut().zip(payload.split(',')) {
        let parsed = field.trim().parse::<f32>().ok().filter(|v| v.is_finite()).unwrap_or(0.0);
        *slot = convert(parsed);
    }
    values
}

fn parse_scalar(payload: &str) -> Option<f32> {
    payload.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_lines() {
        assert_eq!(encode(&ProtocolMessage::LedSet([0, 128, 255, 1, 2])), "L:0,128,255,1,2\n");
        assert_eq!(
            encode(&ProtocolMessage::DecaySet(DEFAULT_DECAY_RATES)),
            "DECAY:0.6,0.5,0.1,0.1,0.3\n"
        );
        assert_eq!(
            encode(&ProtocolMessage::ModeNotify(DeviceMode::Visualizer)),
            "MODE:VISUALIZER\n"
        );
        assert_eq!(encode(&ProtocolMessage::VolumeReport(42)), "VOL:42\n");
        assert_eq!(encode(&ProtocolMessage::TempoSet(120.0)), "tempo_set:120\n");
        assert_eq!(encode(&ProtocolMessage::TempoSync(false)), "tempo_off\n");
    }

    #[test]
    fn test_led_round_trip() {
        let mut decoder = ProtocolDecoder::new();
        let line = encode(&ProtocolMessage::LedSet([10, 20, 30, 40, 50]));
        assert_eq!(decoder.decode(&line), Some(ProtocolMessage::LedSet([10, 20, 30, 40, 50])));
    }

    #[test]
    fn test_empty_field_reads_zero() {
        let mut decoder = ProtocolDecoder::new();
        assert_eq!(
            decoder.decode("L:10,,30,40,50"),
            Some(ProtocolMessage::LedSet([10, 0, 30, 40, 50]))
        );
        assert_eq!(
            decoder.decode("L:10,abc,30,40,50\r\n"),
            Some(ProtocolMessage::LedSet([10, 0, 30, 40, 50]))
        );
    }

    #[test]
    fn test_missing_trailing_fields_keep_previous() {
        let mut decoder = ProtocolDecoder::new();
        decoder.decode("L:1,2,3,4,5");
        assert_eq!(decoder.decode("L:9,8"), Some(ProtocolMessage::LedSet([9, 8, 3, 4, 5])));
    }

    #[test]
    fn test_led_values_clamped() {
        let mut decoder = ProtocolDecoder::new();
        assert_eq!(
            decoder.decode("L:300,-5,12.6,0,255,99"),
            Some(ProtocolMessage::LedSet([255, 0, 13, 0, 255]))
        );
    }

    #[test]
    fn test_decay_partial_keeps_defaults() {
        let mut decoder = ProtocolDecoder::new();
        assert_eq!(
            decoder.decode("DECAY:0.9,0.8"),
            Some(ProtocolMessage::DecaySet([0.9, 0.8, 0.1, 0.1, 0.3]))
        );
        assert_eq!(
            decoder.decode("DECAY:2,x,0.5,0.5,0.5"),
            Some(ProtocolMessage::DecaySet([1.0, 0.0, 0.5, 0.5, 0.5]))
        );
    }

    #[test]
    fn test_mode_and_volume() {
        let mut decoder = ProtocolDecoder::new();
        assert_eq!(
            decoder.decode("MODE:ANIMATION"),
            Some(ProtocolMessage::ModeNotify(DeviceMode::Animation))
        );
        assert_eq!(decoder.decode("MODE:DISCO"), None);
        assert_eq!(decoder.decode("VOL:73"), Some(ProtocolMessage::VolumeReport(73)));
        assert_eq!(decoder.decode("VOL:140"), Some(ProtocolMessage::VolumeReport(100)));
        assert_eq!(decoder.decode("VOL:loud"), None);
    }

    #[test]
    fn test_tempo_commands() {
        let mut decoder = ProtocolDecoder::new();
        assert_eq!(decoder.decode("tempo_set:128"), Some(ProtocolMessage::TempoSet(128.0)));
        assert_eq!(decoder.decode("CMD:TEMPO_SET:90.5"), Some(ProtocolMessage::TempoSet(90.5)));
        assert_eq!(decoder.decode("CMD:TEMPO_ON"), Some(ProtocolMessage::TempoSync(true)));
        assert_eq!(decoder.decode("tempo_off"), Some(ProtocolMessage::TempoSync(false)));
        assert_eq!(decoder.decode("tempo_set:"), None);
    }

    #[test]
    fn test_unknown_lines_ignored() {
        let mut decoder = ProtocolDecoder::new();
        assert_eq!(decoder.decode(""), None);
        assert_eq!(decoder.decode("   "), None);
        assert_eq!(decoder.decode("hello arduino"), None);
        assert_eq!(decoder.decode("l:1,2,3,4,5"), None);
    }
}
