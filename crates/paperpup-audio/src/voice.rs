//! Playable voice: block decoding, pitch resampling, envelope and volume.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;

use crate::block::{BlockFlags, BlockMemory, SAMPLES_PER_BLOCK};
use crate::decode::{clip_sample, Decoder};
use crate::resample;

/// Rate the block data is authored at, in Hz.
pub const SOURCE_RATE: u32 = 44_100;

/// Step that plays the source at its authored pitch (4.12 fixed point).
pub const UNITY_STEP: u16 = 0x1000;

/// Volume that leaves the signal unscaled (2.14 fixed point).
pub const UNITY_VOLUME: i16 = 0x4000;

/// Fractional bits of the playback position.
const POSITION_BITS: u32 = 12;

/// Length of one decoded block in position units.
const BLOCK_SPAN: u32 = (SAMPLES_PER_BLOCK as u32) << POSITION_BITS;

/// Envelope phase of a voice.
///
/// Only `Off` and `Attack` are ever entered; the remaining phases exist for
/// ADSR support that is not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopePhase {
    #[default]
    Off,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Per-voice parameters the control thread may change while the voice is mixing.
///
/// Each value is a single atomic word, so the mixing thread sees either the
/// old or the new value of a setting, never half of each.
#[derive(Debug)]
pub struct VoiceControls {
    step: AtomicU16,
    /// Left volume in the low half, right volume in the high half.
    volume: AtomicU32,
}

impl VoiceControls {
    /// Controls at unity pitch and unity volume.
    pub fn new() -> Self {
        Self {
            step: AtomicU16::new(UNITY_STEP),
            volume: AtomicU32::new(pack_volume(UNITY_VOLUME, UNITY_VOLUME)),
        }
    }

    /// Set the playback step in 1/4096ths of a source sample per output frame.
    pub fn set_sample_rate(&self, step: u16) {
        self.step.store(step, Ordering::Relaxed);
    }

    /// Current playback step.
    pub fn sample_rate(&self) -> u16 {
        self.step.load(Ordering::Relaxed)
    }

    /// Set left and right volume.
    pub fn set_volume(&self, left: i16, right: i16) {
        self.volume.store(pack_volume(left, right), Ordering::Relaxed);
    }

    /// Current `(left, right)` volume.
    pub fn volume(&self) -> (i16, i16) {
        let packed = self.volume.load(Ordering::Relaxed);
        (packed as u16 as i16, (packed >> 16) as u16 as i16)
    }
}

impl Default for VoiceControls {
    fn default() -> Self {
        Self::new()
    }
}

const fn pack_volume(left: i16, right: i16) -> u32 {
    (left as u16 as u32) | ((right as u16 as u32) << 16)
}

/// Scale the step for an output rate other than the source rate.
fn effective_step(step: u16, output_rate: u32) -> u32 {
    debug_assert!(output_rate > 0, "output rate must be positive");

    if output_rate == SOURCE_RATE || output_rate == 0 {
        return u32::from(step);
    }
    (u64::from(step) * u64::from(SOURCE_RATE) / u64::from(output_rate)) as u32
}

#[inline]
fn apply_volume(value: i32, volume: i16) -> i16 {
    clip_sample((value * i32::from(volume)) >> 14)
}

/// One independently playable ADPCM voice.
#[derive(Debug)]
pub struct Voice {
    decoder: Decoder,
    /// Most recently decoded block.
    buffer: [i16; SAMPLES_PER_BLOCK],
    /// Header flags of the block in `buffer`.
    block_flags: BlockFlags,
    envelope: EnvelopePhase,
    /// Position within `buffer`, 12 fractional bits.
    subposition: u32,
    /// Resample history, oldest first.
    history: [i16; 3],
    adsr: u32,
    controls: Arc<VoiceControls>,
}

impl Voice {
    /// Create a silent voice with no memory bound.
    pub fn new() -> Self {
        Self {
            decoder: Decoder::new(),
            buffer: [0; SAMPLES_PER_BLOCK],
            block_flags: BlockFlags::empty(),
            envelope: EnvelopePhase::Off,
            subposition: 0,
            history: [0; 3],
            adsr: 0,
            controls: Arc::new(VoiceControls::new()),
        }
    }

    /// Create a voice bound to `memory` and keyed on at `start`.
    pub fn with_memory(memory: BlockMemory, start: usize, loop_index: usize) -> Self {
        let mut voice = Self::new();
        voice.set_memory(memory);
        voice.key_on(start, loop_index);
        voice
    }

    /// Shared handle to this voice's volume and pitch.
    pub const fn controls(&self) -> &Arc<VoiceControls> {
        &self.controls
    }

    /// Bind block memory. The voice stays silent until the next key-on.
    pub fn set_memory(&mut self, memory: BlockMemory) {
        self.decoder.set_memory(memory);
        self.envelope = EnvelopePhase::Off;
    }

    /// Set the playback step (`0x1000` plays at the authored pitch).
    pub fn set_sample_rate(&self, step: u16) {
        self.controls.set_sample_rate(step);
    }

    /// Set left and right volume (`0x4000` is unity, negative inverts).
    pub fn set_volume(&self, left: i16, right: i16) {
        self.controls.set_volume(left, right);
    }

    /// Store packed ADSR parameters.
    ///
    /// The envelope does not follow them yet: a keyed-on voice plays at full
    /// level until it is keyed off or reaches a terminal block.
    pub fn set_adsr(&mut self, raw: u32) {
        self.adsr = raw;
    }

    /// Packed ADSR parameters last stored.
    pub const fn adsr(&self) -> u32 {
        self.adsr
    }

    /// Current envelope phase.
    pub const fn envelope(&self) -> EnvelopePhase {
        self.envelope
    }

    /// Whether the voice is producing sound.
    pub fn is_keyed_on(&self) -> bool {
        self.envelope != EnvelopePhase::Off
    }

    /// Block index the decoder reads next.
    pub const fn block_position(&self) -> usize {
        self.decoder.position()
    }

    /// Restart playback at block `start`, falling back to `loop_index` at the end.
    pub fn key_on(&mut self, start: usize, loop_index: usize) {
        debug_assert!(self.decoder.is_bound(), "key-on without block memory");

        self.decoder.set_pointer(start, loop_index);
        self.decoder.reset_filter();
        self.subposition = 0;
        self.history = [0; 3];
        self.load_block();
        self.envelope = EnvelopePhase::Attack;
    }

    /// Silence the voice immediately.
    pub fn key_off(&mut self) {
        self.envelope = EnvelopePhase::Off;
    }

    /// Fill `out` with interleaved stereo frames at `output_rate`.
    ///
    /// Every frame of `out` is written; frames past the end of the sound are
    /// silence.
    pub fn decode(&mut self, output_rate: u32, out: &mut [i16]) {
        debug_assert!(out.len() % 2 == 0, "output must hold whole stereo frames");

        let step = effective_step(self.controls.sample_rate(), output_rate);
        let (volume_left, volume_right) = self.controls.volume();

        let mut written = 0;
        for frame in out.chunks_exact_mut(2) {
            if self.envelope == EnvelopePhase::Off {
                break;
            }

            let value = self.next_sample(step);
            frame[0] = apply_volume(value, volume_left);
            frame[1] = apply_volume(value, volume_right);
            written += 2;
        }

        out[written..].fill(0);
    }

    /// Interpolate the sample under the playback position and advance by `step`.
    fn next_sample(&mut self, step: u32) -> i32 {
        let index = (self.subposition >> POSITION_BITS) as usize;
        let current = self.buffer[index];
        let fraction = ((self.subposition & 0xFF0) >> 4) as usize;
        let value = resample::interpolate(fraction, self.history, current);

        let next = self.subposition + step;
        if next >> POSITION_BITS != self.subposition >> POSITION_BITS {
            self.history = [self.history[1], self.history[2], current];
        }
        self.subposition = next;

        while self.subposition >= BLOCK_SPAN {
            if self.block_flags.is_terminal() {
                self.envelope = EnvelopePhase::Off;
                break;
            }
            self.load_block();
            self.subposition -= BLOCK_SPAN;
        }

        value
    }

    fn load_block(&mut self) {
        self.block_flags = self.decoder.flags();
        self.decoder.decode_block(&mut self.buffer);
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self::new()
    }
}
