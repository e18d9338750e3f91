//! # paperpup-audio
//!
//! Real-time audio for PaperPup.
//!
//! Features:
//! - Bit-exact decoding of the 16-byte ADPCM block format
//! - Per-voice Gaussian resampling, volume and key-on/key-off
//! - Lock-guarded mixer pulled by a low-latency cpal output

pub mod block;
pub mod config;
pub mod decode;
pub mod engine;
pub mod mixer;
pub mod output;
pub mod resample;
pub mod sound;
pub mod voice;

pub use block::{Block, BlockFlags, BlockMemory, BLOCK_SIZE, SAMPLES_PER_BLOCK};
pub use config::EngineConfig;
pub use decode::Decoder;
pub use engine::AudioEngine;
pub use mixer::{MixBuffer, Mixer, MixerLock, VoiceId};
pub use output::{default_device_name, list_output_devices, AudioOutput};
pub use sound::{Sound, SoundPtr};
pub use voice::{EnvelopePhase, Voice, VoiceControls, SOURCE_RATE, UNITY_STEP, UNITY_VOLUME};
