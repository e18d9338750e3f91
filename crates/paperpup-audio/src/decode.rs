//! Streaming ADPCM block decoder.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::block::{BlockFlags, BlockMemory, SAMPLES_PER_BLOCK};

/// Largest magnitude a decoded sample may take.
pub const SAMPLE_LIMIT: i32 = 0x7FFF;

/// Clip a wide intermediate to the symmetric 16-bit sample range.
#[inline]
pub(crate) fn clip_sample(value: i32) -> i16 {
    value.clamp(-SAMPLE_LIMIT, SAMPLE_LIMIT) as i16
}

/// Stateful decoder walking an array of blocks.
///
/// Holds the block memory by reference count, the current and loop block
/// indices, and the two predictor history registers carried from one block
/// to the next.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    memory: BlockMemory,
    position: usize,
    loop_position: usize,
    filter_old: i32,
    filter_older: i32,
}

impl Decoder {
    /// Create an unbound decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the block array to decode from.
    pub fn set_memory(&mut self, memory: BlockMemory) {
        debug_assert!(!memory.is_empty(), "block memory must hold a block");

        self.memory = memory;
        self.position = 0;
        self.loop_position = 0;
    }

    /// Set the block to decode next and the loop fallback block.
    pub fn set_pointer(&mut self, position: usize, loop_position: usize) {
        debug_assert!(position < self.memory.len(), "position out of range");
        debug_assert!(
            loop_position < self.memory.len(),
            "loop position out of range"
        );

        self.position = position;
        self.loop_position = loop_position;
    }

    /// Clear the predictor history.
    pub fn reset_filter(&mut self) {
        self.filter_old = 0;
        self.filter_older = 0;
    }

    /// Whether block memory has been bound.
    pub fn is_bound(&self) -> bool {
        !self.memory.is_empty()
    }

    /// Number of blocks in the bound memory.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Whether the bound memory holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Index of the block the next call to [`Self::decode_block`] reads.
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Index playback returns to on a loop jump.
    pub const fn loop_position(&self) -> usize {
        self.loop_position
    }

    /// Flags of the block about to be decoded.
    pub fn flags(&self) -> BlockFlags {
        self.memory.flags(self.position)
    }

    /// Decode the current block into 28 samples and advance.
    pub fn decode_block(&mut self, out: &mut [i16; SAMPLES_PER_BLOCK]) {
        let block = self.memory.block(self.position);
        let flags = block.flags();
        let shift = block.shift();
        let (f0, f1) = block.coefficients();

        if flags.contains(BlockFlags::SET_LOOP) {
            self.loop_position = self.position;
        }

        for (sample, nibble) in out.iter_mut().zip(block.nibbles()) {
            let predicted = (self.filter_old * f0 + self.filter_older * f1 + 32) / 64;
            let decoded = clip_sample((nibble << shift) + predicted);

            *sample = decoded;
            self.filter_older = self.filter_old;
            self.filter_old = i32::from(decoded);
        }

        if flags.contains(BlockFlags::LOOP) {
            self.position = self.loop_position;
        } else {
            self.position += 1;
            if self.position >= self.memory.len() {
                self.position = self.loop_position;
            }
        }
    }
}
