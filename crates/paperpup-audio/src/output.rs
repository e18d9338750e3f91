//! Audio output using cpal.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::config::EngineConfig;
use crate::mixer::{MixBuffer, Mixer};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream,
    StreamConfig, SupportedStreamConfig,
};
use paperpup_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Parameters of the opened output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
    pub buffer_frames: Option<u32>,
}

/// Audio output stream pulling from a [`Mixer`].
///
/// The stream runs until the output is dropped. `cpal::Stream` is not `Send`
/// on every host, so neither is this type.
pub struct AudioOutput {
    _stream: Stream,
    config: OutputConfig,
    device_name: String,
}

impl AudioOutput {
    /// Open the configured output device, or the host default, and start mixing.
    pub fn new(mixer: Arc<Mixer>, config: &EngineConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = match config.device.as_deref() {
            Some(name) => host
                .output_devices()
                .map_err(|e| Error::InitializationFailure(format!("Failed to list devices: {e}")))?
                .find(|d| d.name().is_ok_and(|n| n == name))
                .ok_or_else(|| {
                    Error::InitializationFailure(format!("Output device not found: {name}"))
                })?,
            None => host.default_output_device().ok_or_else(|| {
                Error::InitializationFailure("No output device found".to_string())
            })?,
        };

        Self::with_device(device, mixer, config)
    }

    /// Start mixing into a specific device.
    pub fn with_device(device: Device, mixer: Arc<Mixer>, config: &EngineConfig) -> Result<Self> {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio output device: {device_name}");

        let supported = choose_config(&device, config.sample_rate)?;
        debug!("Selected output config: {:?}", supported);

        let sample_format = supported.sample_format();
        let mut stream_config: StreamConfig = supported.into();
        if let Some(frames) = config.buffer_frames {
            stream_config.buffer_size = BufferSize::Fixed(frames);
        }

        let output_config = OutputConfig {
            sample_rate: stream_config.sample_rate.0,
            channels: stream_config.channels,
            sample_format,
            buffer_frames: config.buffer_frames,
        };

        let capacity = config.mix_capacity_frames;
        let stream = match sample_format {
            SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &stream_config, mixer, capacity)?
            }
            SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &stream_config, mixer, capacity)?
            }
            SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &stream_config, mixer, capacity)?
            }
            _ => {
                return Err(Error::InitializationFailure(format!(
                    "Unsupported sample format: {sample_format:?}"
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::InitializationFailure(format!("Failed to start stream: {e}")))?;

        info!(
            "Audio output started: {} Hz, {} channels, {:?}",
            output_config.sample_rate, output_config.channels, output_config.sample_format
        );

        Ok(Self {
            _stream: stream,
            config: output_config,
            device_name,
        })
    }

    fn build_stream<T: SizedSample + FromSample<i16>>(
        device: &Device,
        config: &StreamConfig,
        mixer: Arc<Mixer>,
        capacity: usize,
    ) -> Result<Stream> {
        let channels = usize::from(config.channels);
        let sample_rate = config.sample_rate.0;
        let mut buffer = MixBuffer::with_capacity(capacity);
        let mut stereo: Vec<i16> = Vec::with_capacity(capacity * 2);

        let err_fn = |err| {
            error!("Audio stream error: {err}");
        };

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    stereo.resize(frames * 2, 0);
                    mixer.mix(sample_rate, &mut buffer, &mut stereo);
                    write_frames(&stereo, channels, data);
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::InitializationFailure(format!("Failed to build stream: {e}")))
    }

    /// Get the output configuration.
    pub const fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Get the device name.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Get the sample rate.
    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Get the number of channels.
    pub const fn channels(&self) -> u16 {
        self.config.channels
    }
}

/// Pick a stream configuration at the requested rate, preferring stereo i16.
fn choose_config(device: &Device, requested_rate: Option<u32>) -> Result<SupportedStreamConfig> {
    let default = device.default_output_config().map_err(|e| {
        Error::InitializationFailure(format!("Failed to get output config: {e}"))
    })?;
    let rate = requested_rate.unwrap_or(default.sample_rate().0);

    let best = device
        .supported_output_configs()
        .map_err(|e| Error::InitializationFailure(format!("Failed to query configs: {e}")))?
        .filter(|range| range.min_sample_rate().0 <= rate && rate <= range.max_sample_rate().0)
        .filter(|range| config_rank(range.channels(), range.sample_format()).is_some())
        .min_by_key(|range| config_rank(range.channels(), range.sample_format()));

    match best {
        Some(range) => Ok(range.with_sample_rate(SampleRate(rate))),
        None => {
            if requested_rate.is_some() {
                warn!(
                    "No output config supports {rate} Hz, using {} Hz",
                    default.sample_rate().0
                );
            }
            Ok(default)
        }
    }
}

/// Ordering key for candidate configs, lower is better. `None` for formats
/// the callback cannot write.
fn config_rank(channels: u16, format: SampleFormat) -> Option<(u8, u8)> {
    let format_rank = match format {
        SampleFormat::I16 => 0,
        SampleFormat::F32 => 1,
        SampleFormat::U16 => 2,
        _ => return None,
    };
    let channel_rank = match channels {
        0 => return None,
        2 => 0,
        1 => 2,
        _ => 1,
    };
    Some((channel_rank, format_rank))
}

/// Copy interleaved stereo into the device's channel layout.
///
/// Mono devices get the average of both sides; channels past the second
/// are silent.
fn write_frames<T: Sample + FromSample<i16>>(stereo: &[i16], channels: usize, data: &mut [T]) {
    for (frame, pair) in data.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
        if channels == 1 {
            let mono = (i32::from(pair[0]) + i32::from(pair[1])) / 2;
            frame[0] = T::from_sample(mono as i16);
            continue;
        }

        frame[0] = T::from_sample(pair[0]);
        frame[1] = T::from_sample(pair[1]);
        frame[2..].fill(T::EQUILIBRIUM);
    }
}

/// List available output devices.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to list devices: {e}")))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok(devices)
}

/// Get the default output device name.
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}
