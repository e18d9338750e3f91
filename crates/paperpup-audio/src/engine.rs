//! Audio engine tying the mixer to an output device.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::block::BlockMemory;
use crate::config::EngineConfig;
use crate::mixer::{MixBuffer, Mixer};
use crate::output::AudioOutput;
use crate::sound::Sound;
use crate::voice::Voice;
use paperpup_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Owner of the mixer and, unless headless, the device stream feeding from it.
///
/// Sounds keep the mixer alive on their own, so they may outlive the engine;
/// they go quiet once the output is dropped.
pub struct AudioEngine {
    mixer: Arc<Mixer>,
    output: Option<AudioOutput>,
    render_buffer: MixBuffer,
}

impl AudioEngine {
    /// Open the output device described by `config` and start mixing.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;

        let mixer = Arc::new(Mixer::new());
        let output = AudioOutput::new(Arc::clone(&mixer), config)?;

        info!(
            "Audio engine initialized: {} Hz, {} channels, device: {}",
            output.sample_rate(),
            output.channels(),
            output.device_name()
        );

        Ok(Self {
            mixer,
            output: Some(output),
            render_buffer: MixBuffer::with_capacity(config.mix_capacity_frames),
        })
    }

    /// Create an engine without a device. Audio is pulled with [`Self::render`].
    pub fn headless() -> Self {
        debug!("Audio engine running headless");
        Self {
            mixer: Arc::new(Mixer::new()),
            output: None,
            render_buffer: MixBuffer::default(),
        }
    }

    /// The shared mixer.
    pub const fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    /// Whether a device stream is running.
    pub const fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Device rate, if a device is open.
    pub fn sample_rate(&self) -> Option<u32> {
        self.output.as_ref().map(AudioOutput::sample_rate)
    }

    /// Device name, if a device is open.
    pub fn device_name(&self) -> Option<&str> {
        self.output.as_ref().map(AudioOutput::device_name)
    }

    /// Create a sound keyed on at block `start`, looping back to `loop_index`.
    ///
    /// The sound is registered but not playing.
    pub fn create_sound(
        &self,
        memory: BlockMemory,
        start: usize,
        loop_index: usize,
    ) -> Result<Sound> {
        let blocks = memory.len();
        if start >= blocks || loop_index >= blocks {
            return Err(Error::InvalidArgument(format!(
                "start {start} and loop {loop_index} must be below block count {blocks}"
            )));
        }

        let voice = Voice::with_memory(memory, start, loop_index);
        Ok(Sound::new(Arc::clone(&self.mixer), voice))
    }

    /// Mix directly into `out` as interleaved stereo at `output_rate`.
    ///
    /// With a device open this competes with the device callback for the
    /// same voices; it is meant for headless engines.
    pub fn render(&mut self, output_rate: u32, out: &mut [i16]) {
        self.mixer.mix(output_rate, &mut self.render_buffer, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, BlockFlags, SAMPLES_PER_BLOCK};
    use crate::voice::SOURCE_RATE;

    fn memory(flags: BlockFlags) -> BlockMemory {
        BlockMemory::from_blocks(&[
            Block::encode(0, 0, BlockFlags::empty(), &[3; SAMPLES_PER_BLOCK]),
            Block::encode(0, 0, flags, &[3; SAMPLES_PER_BLOCK]),
        ])
    }

    #[test]
    fn test_headless_engine() {
        let engine = AudioEngine::headless();
        assert!(!engine.has_output());
        assert_eq!(engine.sample_rate(), None);
        assert_eq!(engine.device_name(), None);
    }

    #[test]
    fn test_create_sound_validates_indices() {
        let engine = AudioEngine::headless();
        assert!(engine.create_sound(memory(BlockFlags::LOOP), 0, 1).is_ok());

        let err = engine.create_sound(memory(BlockFlags::LOOP), 2, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        let err = engine.create_sound(memory(BlockFlags::LOOP), 0, 5).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_render_plays_sound_to_end() {
        let mut engine = AudioEngine::headless();
        let sound = engine.create_sound(memory(BlockFlags::LOOP), 0, 0).unwrap();
        sound.play();

        let mut out = vec![0i16; 2 * SAMPLES_PER_BLOCK * 2];
        engine.render(SOURCE_RATE, &mut out);
        assert!(out[8 * 2..].iter().all(|&s| s > 0));
        assert!(!sound.is_keyed_on());

        engine.render(SOURCE_RATE, &mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_dropping_sound_frees_voice() {
        let engine = AudioEngine::headless();
        let sound = engine
            .create_sound(memory(BlockFlags::LOOP | BlockFlags::SUSTAIN), 1, 1)
            .unwrap();
        sound.play();
        assert_eq!(engine.mixer().active_count(), 1);

        drop(sound);
        assert_eq!(engine.mixer().voice_count(), 0);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = EngineConfig {
            mix_capacity_frames: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(AudioEngine::new(&config), Err(Error::Config(_))));
    }
}
