//! Command-line arguments.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use anyhow::{anyhow, Result};
use clap::Parser;
use paperpup_audio::{SOURCE_RATE, UNITY_STEP};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SOURCE_RATE: u32 = 37_800;
const DEFAULT_VOLUME: i16 = 0x3FFF;

/// Play a file of PaperPup ADPCM blocks
#[derive(Debug, Parser)]
#[command(name = "paperpup-play", version)]
pub struct Args {
    /// Block file to play
    #[arg(required_unless_present = "list_devices")]
    pub file: Option<PathBuf>,

    /// Rate the blocks were authored at, in Hz
    #[arg(
        long,
        default_value_t = DEFAULT_SOURCE_RATE,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub source_rate: u32,

    /// Left and right volume, 0x4000 is unity (decimal or 0x hex)
    #[arg(
        long,
        default_value_t = DEFAULT_VOLUME,
        value_parser = parse_volume,
        allow_hyphen_values = true
    )]
    pub volume: i16,

    /// Block to start playing at
    #[arg(long, default_value_t = 0)]
    pub start: usize,

    /// Block to return to at the end
    #[arg(long = "loop", default_value_t = 0)]
    pub loop_index: usize,

    /// Stop after this many seconds
    #[arg(long, value_parser = parse_seconds)]
    pub seconds: Option<Duration>,

    /// JSON engine configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Render without an output device
    #[arg(long)]
    pub headless: bool,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Args {
    /// Voice step that plays blocks authored at `source_rate` at their pitch.
    pub fn step(&self) -> Result<u16> {
        let step = u64::from(UNITY_STEP) * u64::from(self.source_rate) / u64::from(SOURCE_RATE);
        u16::try_from(step).map_err(|_| anyhow!("source rate {} Hz is too high", self.source_rate))
    }

    /// How long to play before stopping, if limited.
    pub const fn time_limit(&self) -> Option<Duration> {
        self.seconds
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal volume, optionally negative.
fn parse_volume(raw: &str) -> Result<i16, String> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };

    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i32::from_str_radix(hex, 16),
        None => digits.parse(),
    }
    .map_err(|e| format!("invalid volume `{raw}`: {e}"))?;

    let value = if negative { -magnitude } else { magnitude };
    i16::try_from(value).map_err(|_| format!("volume `{raw}` is outside -0x8000..=0x7FFF"))
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let seconds: f64 = raw
        .parse()
        .map_err(|e| format!("invalid duration `{raw}`: {e}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration `{raw}`: {e}"))
}
