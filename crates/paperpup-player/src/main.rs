//! # PaperPup player
//!
//! Plays a file of ADPCM blocks through the default output device.

mod args;

use anyhow::{Context, Result};
use args::Args;
use clap::Parser;
use paperpup_audio::block::blocks_to_samples;
use paperpup_audio::{
    default_device_name, list_output_devices, AudioEngine, BlockMemory, EngineConfig, Sound,
    SOURCE_RATE,
};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the device loop checks whether the sound has finished.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Frames rendered per pass in headless mode.
const RENDER_FRAMES: usize = 1024;

/// Headless renders of endlessly looping sounds stop here without `--seconds`.
const HEADLESS_LIMIT: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "paperpup=info,paperpup_player=info,paperpup_audio=info".into()
            }),
        )
        .init();

    let args = Args::parse();
    if args.list_devices {
        return list_devices();
    }

    run(&args)
}

fn list_devices() -> Result<()> {
    let default = default_device_name();
    for name in list_output_devices().context("Failed to list output devices")? {
        let marker = if default.as_deref() == Some(name.as_str()) { "*" } else { " " };
        println!("{marker} {name}");
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    info!("Starting PaperPup player v{}", env!("CARGO_PKG_VERSION"));

    let file = args.file.as_deref().context("No block file given")?;
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let memory = BlockMemory::new(bytes)
        .with_context(|| format!("Invalid block file {}", file.display()))?;
    info!(
        "Loaded {} blocks ({} samples) from {}",
        memory.len(),
        blocks_to_samples(memory.len()),
        file.display()
    );

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let step = args.step()?;

    if args.headless {
        render_headless(args, memory, step, &config)
    } else {
        play_device(args, memory, step, &config)
    }
}

fn start_sound(
    engine: &AudioEngine,
    args: &Args,
    memory: BlockMemory,
    step: u16,
) -> Result<Sound> {
    let sound = engine
        .create_sound(memory, args.start, args.loop_index)
        .context("Failed to create sound")?;
    sound.set_sample_rate(step);
    sound.set_volume(args.volume, args.volume);
    sound.play();

    info!(
        "Playing from block {} (loop {}), step {:#06x}, volume {:#06x}",
        args.start, args.loop_index, step, args.volume
    );
    Ok(sound)
}

fn play_device(
    args: &Args,
    memory: BlockMemory,
    step: u16,
    config: &EngineConfig,
) -> Result<()> {
    let engine = AudioEngine::new(config).context("Failed to initialize audio")?;
    let sound = start_sound(&engine, args, memory, step)?;

    let started = Instant::now();
    while sound.is_keyed_on() {
        if args.time_limit().is_some_and(|limit| started.elapsed() >= limit) {
            info!("Time limit reached");
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    sound.stop();
    info!("Playback finished after {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}

fn render_headless(
    args: &Args,
    memory: BlockMemory,
    step: u16,
    config: &EngineConfig,
) -> Result<()> {
    let mut engine = AudioEngine::headless();
    let sound = start_sound(&engine, args, memory, step)?;

    let rate = config.sample_rate.unwrap_or(SOURCE_RATE);
    let limit = args.time_limit().unwrap_or_else(|| {
        warn!("No --seconds given, rendering at most {}s", HEADLESS_LIMIT.as_secs());
        HEADLESS_LIMIT
    });
    let max_frames = (limit.as_secs_f64() * f64::from(rate)) as u64;

    let mut out = vec![0i16; RENDER_FRAMES * 2];
    let mut frames = 0u64;
    let mut peak = 0i16;
    while sound.is_keyed_on() && frames < max_frames {
        engine.render(rate, &mut out);
        frames += RENDER_FRAMES as u64;
        peak = out.iter().fold(peak, |peak, &s| peak.max(s.saturating_abs()));
    }

    info!(
        "Rendered {frames} frames ({:.2}s at {rate} Hz), peak level {peak:#06x}",
        frames as f64 / f64::from(rate)
    );
    Ok(())
}
