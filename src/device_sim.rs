use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, TryRecvError};
use log::{info, warn};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use bandlight::device::{DeviceModeController, LoopInput, RecordingPins};
use bandlight::host::SerialLink;
use bandlight::BandlightConfig;

#[derive(Parser)]
#[command(name = "device-sim")]
#[command(about = "Run the LED board controller against protocol lines from stdin")]
struct Args {
    /// JSON configuration file (only the device section is used)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Controller loop period in milliseconds
    #[arg(long, default_value = "10")]
    tick_ms: u64,
}

/// What the operator typed, besides plain protocol lines.
enum Stimulus {
    Press,
    Pot(u16),
    Line(String),
}

fn parse_stimulus(line: &str) -> Option<Stimulus> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == "press" {
        return Some(Stimulus::Press);
    }
    if let Some(value) = line.strip_prefix("pot ") {
        return match value.trim().parse::<u16>() {
            Ok(raw) => Some(Stimulus::Pot(raw.min(1023))),
            Err(_) => {
                warn!("pot expects 0-1023, got {:?}", value);
                None
            }
        };
    }
    Some(Stimulus::Line(line.to_string()))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let timing = match &args.config {
        Some(path) => {
            BandlightConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
                .device
        }
        None => BandlightConfig::default().device,
    };

    let (tx, stimuli) = crossbeam_channel::unbounded();
    thread::Builder::new().name("stdin".into()).spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if let Some(stimulus) = parse_stimulus(&line) {
                if tx.send(stimulus).is_err() {
                    break;
                }
            }
        }
    })?;

    info!("Device simulator running, {} ms loop", args.tick_ms);
    let mut controller = DeviceModeController::new(timing);
    let mut pins = RecordingPins::new();
    let mut link = SerialLink::new(io::stdout());

    // A press holds the button for twice the debounce window, then stays
    // released as long before the next queued press starts
    let hold_ms = timing.debounce_ms * 2;
    let mut button_until: Option<u64> = None;
    let mut pending_presses = 0u32;
    let mut pot_raw = 0u16;
    let started = Instant::now();

    loop {
        let now_ms = started.elapsed().as_millis() as u64;
        let (lines, closed) = drain(&stimuli, &mut pending_presses, &mut pot_raw);

        let idle = button_until.map_or(true, |until| now_ms >= until + hold_ms);
        if idle && pending_presses > 0 {
            pending_presses -= 1;
            button_until = Some(now_ms + hold_ms);
        }

        let input = LoopInput {
            now_ms,
            button_down: button_until.is_some_and(|until| now_ms < until),
            pot_raw,
            lines,
        };
        for message in controller.poll(input) {
            link.send(&message)?;
        }
        controller.drive(&mut pins);

        let finished = button_until.map_or(true, |until| now_ms >= until + hold_ms);
        if closed && finished && pending_presses == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(args.tick_ms));
    }

    info!("Input closed in {} mode, duties {:?}", controller.mode(), pins.duties());
    Ok(())
}

fn drain(stimuli: &Receiver<Stimulus>, pending_presses: &mut u32, pot_raw: &mut u16) -> (Vec<String>, bool) {
    let mut lines = Vec::new();
    loop {
        match stimuli.try_recv() {
            Ok(Stimulus::Press) => *pending_presses += 1,
            Ok(Stimulus::Pot(raw)) => *pot_raw = raw,
            Ok(Stimulus::Line(line)) => lines.push(line),
            Err(TryRecvError::Empty) => return (lines, false),
            Err(TryRecvError::Disconnected) => return (lines, true),
        }
    }
}
