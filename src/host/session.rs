use crossbeam_channel::Receiver;
use log::{info, warn};
use std::io::Write;
use std::time::{Duration, Instant};

use super::pipeline::AnalysisPipeline;
use super::transport::SerialLink;
use super::volume::VolumeControl;
use crate::audio::{AudioFrame, ChannelValues, FrameConsumer, BAND_COUNT};
use crate::error::Result;
use crate::protocol::{DeviceMode, ProtocolDecoder, ProtocolMessage};

/// How long one pass waits for a frame before servicing lines again.
const FRAME_WAIT: Duration = Duration::from_millis(100);

/// Commands typed by the user on the host console.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserCommand {
    TempoSync(bool),
    TempoSet(f32),
}

impl UserCommand {
    /// Accepts `tempo_on`, `tempo_off` and `tempo_set:<bpm>`.
    pub fn parse(line: &str) -> Option<Self> {
        match ProtocolDecoder::new().decode(line)? {
            ProtocolMessage::TempoSync(enabled) => Some(UserCommand::TempoSync(enabled)),
            ProtocolMessage::TempoSet(bpm) => Some(UserCommand::TempoSet(bpm)),
            _ => None,
        }
    }
}

/// Host side of one device connection.
///
/// The session is the only writer of the serial link: LED frames, the decay
/// handshake and tempo overrides all leave through it, one line at a time.
pub struct HostSession<W: Write, V: VolumeControl> {
    pipeline: AnalysisPipeline,
    link: SerialLink<W>,
    volume: V,
    decoder: ProtocolDecoder,
    decay_rates: [f32; BAND_COUNT],
    device_mode: DeviceMode,
}

impl<W: Write, V: VolumeControl> HostSession<W, V> {
    pub fn new(pipeline: AnalysisPipeline, link: SerialLink<W>, volume: V, decay_rates: [f32; BAND_COUNT]) -> Self {
        Self {
            pipeline,
            link,
            volume,
            decoder: ProtocolDecoder::new(),
            decay_rates,
            device_mode: DeviceMode::AudioControl,
        }
    }

    pub fn device_mode(&self) -> DeviceMode {
        self.device_mode
    }

    pub fn pipeline(&self) -> &AnalysisPipeline {
        &self.pipeline
    }

    pub fn link(&self) -> &SerialLink<W> {
        &self.link
    }

    pub fn volume(&self) -> &V {
        &self.volume
    }

    /// Initial handshake: push the configured decay rates to the device.
    pub fn connect(&mut self) -> Result<()> {
        self.link.send(&ProtocolMessage::DecaySet(self.decay_rates))?;
        info!("Sent decay rates {:?}", self.decay_rates);
        Ok(())
    }

    pub fn handle_device_line(&mut self, line: &str, now: Duration) -> Result<()> {
        match self.decoder.decode(line) {
            Some(ProtocolMessage::ModeNotify(mode)) if mode != self.device_mode => {
                info!("Device switched to {} mode", mode);
                self.device_mode = mode;
                self.pipeline.reset();
            }
            Some(ProtocolMessage::VolumeReport(percent)) => {
                if let Err(e) = self.volume.set_volume(percent) {
                    warn!("Failed to set volume to {}%: {}", percent, e);
                } else {
                    info!("Volume set to {}%", percent);
                }
            }
            Some(ProtocolMessage::TempoSync(enabled)) => self.pipeline.set_sync(enabled),
            Some(ProtocolMessage::TempoSet(bpm)) => {
                self.apply_tempo(bpm, now);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn handle_command(&mut self, command: UserCommand, now: Duration) -> Result<()> {
        match command {
            UserCommand::TempoSync(enabled) => self.pipeline.set_sync(enabled),
            UserCommand::TempoSet(bpm) => {
                if self.apply_tempo(bpm, now) {
                    self.link.send(&ProtocolMessage::TempoSet(bpm))?;
                }
            }
        }
        Ok(())
    }

    fn apply_tempo(&mut self, bpm: f32, now: Duration) -> bool {
        match self.pipeline.set_tempo(bpm, now) {
            Ok(()) => true,
            Err(e) => {
                warn!("Ignoring tempo override: {}", e);
                false
            }
        }
    }

    /// Analyze one frame. The result is streamed only while the device is
    /// in Visualizer mode; a frame of the wrong size is skipped.
    pub fn handle_frame(&mut self, frame: &AudioFrame, now: Duration) -> Result<Option<ChannelValues>> {
        let channels = match self.pipeline.process_frame(frame, now) {
            Ok(channels) => channels,
            Err(e) => {
                warn!("Skipping frame {}: {}", frame.index, e);
                return Ok(None);
            }
        };

        if self.device_mode != DeviceMode::Visualizer {
            return Ok(None);
        }
        self.link.send(&ProtocolMessage::LedSet(channels))?;
        Ok(Some(channels))
    }

    /// Serve frames, device lines and user commands until the frame source
    /// disconnects or a write fails.
    pub fn run(
        &mut self,
        frames: &FrameConsumer,
        device_lines: &Receiver<String>,
        commands: &Receiver<UserCommand>,
        started: Instant,
    ) -> Result<()> {
        loop {
            for line in device_lines.try_iter() {
                self.handle_device_line(&line, started.elapsed())?;
            }
            for command in commands.try_iter() {
                self.handle_command(command, started.elapsed())?;
            }

            match frames.recv_timeout(FRAME_WAIT) {
                Ok(Some(frame)) => {
                    self.handle_frame(&frame, started.elapsed())?;
                }
                Ok(None) => continue,
                Err(_) => {
                    info!(
                        "Audio input closed after {} frames, {} dropped",
                        self.pipeline.frames_processed(),
                        frames.dropped()
                    );
                    return Ok(());
                }
            }
        }
    }
}
