use anyhow::{Context, Result};
use clap::Parser;
use hound::{SampleFormat, WavReader};
use log::info;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use bandlight::audio::capture::Framer;
use bandlight::audio::AudioFrame;
use bandlight::host::{AnalysisPipeline, SerialLink};
use bandlight::protocol::ProtocolMessage;
use bandlight::BandlightConfig;

#[derive(Parser)]
#[command(name = "bandlight-replay")]
#[command(about = "Run a WAV file through the analysis pipeline and print the LED protocol lines")]
struct Args {
    /// WAV file to replay
    #[arg()]
    input_file: PathBuf,

    /// Write lines here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Disable bass/snare backbeat locking
    #[arg(long)]
    no_tempo_sync: bool,

    /// Start the output with the DECAY handshake line
    #[arg(long)]
    handshake: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BandlightConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BandlightConfig::default(),
    };
    if args.no_tempo_sync {
        config.tempo_sync = false;
    }

    let reader = WavReader::open(&args.input_file)
        .with_context(|| format!("Failed to open {}", args.input_file.display()))?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate as f32;
    info!(
        "Replaying {}: {} Hz, {} channel(s), {} bit {:?}",
        args.input_file.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );

    let samples = read_samples(reader)?;
    let frames = split_frames(&samples, config.frame_size, spec.channels as usize, sample_rate);
    info!("{} frames of {} samples", frames.len(), config.frame_size);

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    let mut link = SerialLink::new(out);

    let mut pipeline = AnalysisPipeline::new(&config, sample_rate)?;
    if args.handshake {
        link.send(&ProtocolMessage::DecaySet(config.decay_rates))?;
    }

    // Synthetic clock: each frame starts where the previous one ended
    let frame_secs = config.frame_size as f64 / sample_rate as f64;
    for frame in &frames {
        let now = Duration::from_secs_f64(frame.index as f64 * frame_secs);
        let channels = pipeline.process_frame(frame, now)?;
        link.send(&ProtocolMessage::LedSet(channels))?;
    }

    info!(
        "Done: {} lines, final tempo estimate {:.1} BPM",
        link.lines_sent(),
        pipeline.estimated_bpm()
    );
    Ok(())
}

/// Interleaved samples scaled to [-1, 1].
fn read_samples(reader: WavReader<BufReader<File>>) -> Result<Vec<f32>> {
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(samples)
}

fn split_frames(samples: &[f32], frame_size: usize, channels: usize, sample_rate: f32) -> Vec<AudioFrame> {
    let mut framer = Framer::new(frame_size, channels, sample_rate);
    let mut frames = Vec::new();
    framer.push_interleaved(samples, |frame| frames.push(frame));
    frames
}
