use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::Sender;
use log::{info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use bandlight::audio::{frame_queue, AudioCapture};
use bandlight::host::{
    open_serial, spawn_line_reader, AnalysisPipeline, HostSession, SerialLink, SimulatedVolume, UserCommand,
    VolumeControl,
};
use bandlight::BandlightConfig;

#[derive(Parser)]
#[command(name = "bandlight")]
#[command(about = "Drive a five-channel LED board from live audio input")]
struct Args {
    /// Serial port of the LED board
    #[arg(long, short, default_value = "/dev/ttyACM0")]
    port: String,

    /// Override the configured baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Start with bass/snare backbeat locking disabled
    #[arg(long)]
    no_tempo_sync: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,
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
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    config.validate()?;

    if args.dump_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    info!("Starting bandlight host");

    let (producer, frames) = frame_queue(config.queue_capacity);
    let capture = AudioCapture::start(config.frame_size, producer).context("Failed to start audio capture")?;
    let pipeline = AnalysisPipeline::new(&config, capture.sample_rate())?;

    let (port, reader) = open_serial(&args.port, config.baud_rate)
        .with_context(|| format!("Failed to open serial port {}", args.port))?;
    info!("Waiting {} ms for the board to reset", config.connect_settle_ms);
    thread::sleep(Duration::from_millis(config.connect_settle_ms));

    let (line_tx, device_lines) = crossbeam_channel::unbounded();
    spawn_line_reader(reader, line_tx).context("Failed to start device reader")?;
    let (command_tx, commands) = crossbeam_channel::unbounded();
    spawn_console(command_tx)?;

    let volume = SimulatedVolume::default();
    info!("Current system volume: {}%", volume.volume()?);

    let mut session = HostSession::new(pipeline, SerialLink::new(port), volume, config.decay_rates);
    session.connect().context("Failed to send decay rates")?;

    info!("Ready. Press the board's button to cycle AUDIO_CONTROL -> ANIMATION -> VISUALIZER");
    info!("Console commands: tempo_on, tempo_off, tempo_set:<bpm>");

    session.run(&frames, &device_lines, &commands, Instant::now())?;

    info!("Sent {} lines", session.link().lines_sent());
    drop(capture);
    Ok(())
}

fn spawn_console(commands: Sender<UserCommand>) -> Result<()> {
    thread::Builder::new().name("console".into()).spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match UserCommand::parse(&line) {
                Some(command) => {
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => warn!("Unknown command: {}", line.trim()),
            }
        }
    })?;
    Ok(())
}
