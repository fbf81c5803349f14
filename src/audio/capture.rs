use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use log::{info, warn};

use super::{AudioFrame, FrameProducer};

/// Cuts an interleaved callback stream into fixed-size mono frames.
pub struct Framer {
    frame_size: usize,
    channels: usize,
    sample_rate: f32,
    pending: Vec<f32>,
    next_index: u64,
}

impl Framer {
    pub fn new(frame_size: usize, channels: usize, sample_rate: f32) -> Self {
        Self {
            frame_size,
            channels: channels.max(1),
            sample_rate,
            pending: Vec::with_capacity(frame_size),
            next_index: 0,
        }
    }

    /// Mix `data` down to mono and emit every completed frame.
    pub fn push_interleaved(&mut self, data: &[f32], mut emit: impl FnMut(AudioFrame)) {
        for chunk in data.chunks(self.channels) {
            let sample = chunk.iter().sum::<f32>() / chunk.len() as f32;
            self.pending.push(sample.clamp(-1.0, 1.0));

            if self.pending.len() == self.frame_size {
                let samples = std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_size));
                emit(AudioFrame::new(self.next_index, self.sample_rate, samples));
                self.next_index += 1;
            }
        }
    }
}

/// Live input from the default capture device, feeding the frame queue.
///
/// The stream stops when this is dropped.
pub struct AudioCapture {
    _stream: Stream,
    sample_rate: f32,
}

impl AudioCapture {
    pub fn start(frame_size: usize, producer: FrameProducer) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No input device available"))?;

        let config = device
            .default_input_config()
            .map_err(|e| anyhow::anyhow!("Failed to get default input config: {}", e))?;

        info!("Using audio device: {}", device.name().unwrap_or_else(|_| "Unknown".to_string()));
        info!("Audio config: {:?}", config);

        let sample_rate = config.sample_rate().0 as f32;
        let stream = Self::create_input_stream(&device, &config.into(), frame_size, producer)?;
        stream.play()?;

        Ok(Self {
            _stream: stream,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn create_input_stream(
        device: &Device,
        config: &StreamConfig,
        frame_size: usize,
        producer: FrameProducer,
    ) -> Result<Stream> {
        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;

        info!("Creating input stream with {} channels at {} Hz", channels, sample_rate);

        let mut framer = Framer::new(frame_size, channels, sample_rate as f32);
        let stream = device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                framer.push_interleaved(data, |frame| producer.push(frame));
            },
            |err| {
                warn!("Audio stream error: {}", err);
            },
            None,
        )?;

        Ok(stream)
    }
}
