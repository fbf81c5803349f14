use std::path::PathBuf;
use std::time::Duration;

use bandlight::audio::{AudioFrame, Band, DEFAULT_DECAY_RATES};
use bandlight::device::{DeviceModeController, DeviceMode, LoopInput};
use bandlight::host::{AnalysisPipeline, HostSession, SerialLink, SimulatedVolume};
use bandlight::BandlightConfig;

const FRAME: usize = 2048;
const RATE: u32 = 44100;

fn frame_time(index: u64) -> Duration {
    Duration::from_micros(index * FRAME as u64 * 1_000_000 / RATE as u64)
}

fn temp_wav(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("bandlight-{}-{}.wav", name, std::process::id()))
}

/// Write a mono 16-bit tone with hound and read it back as analysis frames.
fn tone_frames(name: &str, freq: f32, amplitude: f32, seconds: f32) -> Vec<AudioFrame> {
    let path = temp_wav(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let total = (seconds * RATE as f32) as usize;
    for i in 0..total {
        let t = i as f32 / RATE as f32;
        let sample = amplitude * (2.0 * std::f32::consts::PI * freq * t).sin();
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    let pcm: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    std::fs::remove_file(&path).ok();

    pcm.chunks_exact(FRAME)
        .enumerate()
        .map(|(i, chunk)| AudioFrame::from_i16(i as u64, RATE as f32, chunk))
        .collect()
}

fn session(config: &BandlightConfig) -> HostSession<Vec<u8>, SimulatedVolume> {
    let pipeline = AnalysisPipeline::new(config, RATE as f32).unwrap();
    HostSession::new(
        pipeline,
        SerialLink::new(Vec::new()),
        SimulatedVolume::default(),
        config.decay_rates,
    )
}

fn output_lines(session: &HostSession<Vec<u8>, SimulatedVolume>) -> Vec<String> {
    String::from_utf8(session.link().get_ref().clone())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn press(device: &mut DeviceModeController, at: u64) {
    device.poll(LoopInput::at(at).with_button(true));
    device.poll(LoopInput::at(at + 60).with_button(true));
    device.poll(LoopInput::at(at + 120));
    device.poll(LoopInput::at(at + 180));
}

#[test]
fn silent_input_streams_dark_frames() {
    let mut session = session(&BandlightConfig::default());
    session.handle_device_line("MODE:VISUALIZER", Duration::ZERO).unwrap();

    for i in 0..100 {
        let frame = AudioFrame::new(i, RATE as f32, vec![0.0; FRAME]);
        session.handle_frame(&frame, frame_time(i)).unwrap();
    }

    let lines = output_lines(&session);
    assert_eq!(lines.len(), 100);
    assert!(lines.iter().all(|line| line == "L:0,0,0,0,0"));
}

#[test]
fn host_lines_drive_device_pins() {
    let mut config = BandlightConfig::default();
    config.tempo_sync = false;
    let mut host = session(&config);
    host.connect().unwrap();
    host.handle_device_line("MODE:VISUALIZER", Duration::ZERO).unwrap();

    let mut last = [0; 5];
    for frame in tone_frames("drive", 440.0, 0.6, 1.0) {
        if let Some(channels) = host.handle_frame(&frame, frame_time(frame.index)).unwrap() {
            last = channels;
        }
    }
    assert!(last[Band::Vocals.index()] > 0);
    assert!(last[Band::Chord.index()] > 0);

    let mut device = DeviceModeController::default();
    press(&mut device, 0);
    press(&mut device, 500);
    assert_eq!(device.mode(), DeviceMode::Visualizer);

    let mut now = 1000;
    for line in output_lines(&host) {
        device.poll(LoopInput::at(now).with_line(line));
        now += 46;
    }
    assert_eq!(device.decay_rates(), DEFAULT_DECAY_RATES);
    assert_eq!(device.duties(), last);

    // With the stream stopped the device fades on its own
    device.poll(LoopInput::at(now + 2000));
    assert_eq!(device.duties(), [0; 5]);
}

#[test]
fn bass_follows_backbeat_with_tempo_sync() {
    let frames = tone_frames("backbeat", 60.0, 0.5, 5.0);

    let run = |tempo_sync: bool| -> Vec<(Duration, u8)> {
        let mut config = BandlightConfig::default();
        config.tempo_sync = tempo_sync;
        let mut pipeline = AnalysisPipeline::new(&config, RATE as f32).unwrap();
        frames
            .iter()
            .map(|frame| {
                let now = frame_time(frame.index);
                let channels = pipeline.process_frame(frame, now).unwrap();
                (now, channels[Band::Bass.index()])
            })
            .collect()
    };

    let warm = Duration::from_millis(500);
    let direct = run(false);
    assert!(direct.iter().filter(|(t, _)| *t > warm).all(|&(_, bass)| bass > 100));

    // A steady tone has no onsets, so the fixed tempo takes over after 2 s and
    // bass fades on the odd beats
    let synced = run(true);
    assert!(synced
        .iter()
        .filter(|(t, _)| *t > warm && *t < Duration::from_millis(2000))
        .all(|&(_, bass)| bass > 100));
    assert!(synced
        .iter()
        .filter(|(t, _)| *t > Duration::from_millis(2000))
        .any(|&(_, bass)| bass == 0));
    assert!(synced
        .iter()
        .filter(|(t, _)| *t > Duration::from_millis(3200))
        .any(|&(_, bass)| bass > 100));
}

#[test]
fn device_cycles_through_all_modes() {
    let mut device = DeviceModeController::default();
    let mut modes = vec![device.mode()];
    for i in 0..3 {
        press(&mut device, i * 400);
        modes.push(device.mode());
    }
    assert_eq!(
        modes,
        vec![
            DeviceMode::AudioControl,
            DeviceMode::Animation,
            DeviceMode::Visualizer,
            DeviceMode::AudioControl
        ]
    );
}
