//! ADPCM block format.
//!
//! ```text
//! byte 0     shift index (bits 0-3), filter index (bits 4-6)
//! byte 1     flags
//! bytes 2-15 28 signed nibbles, low nibble first
//! ```

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use bitflags::bitflags;
use bytes::Bytes;
use paperpup_core::{Error, Result};
use tracing::warn;

/// Size of one encoded block in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Number of PCM samples carried by one block.
pub const SAMPLES_PER_BLOCK: usize = 28;

/// Predictor coefficient pairs (f0, f1), indexed by the block's filter index.
///
/// Indices 5-7 are reserved and predict nothing.
pub const FILTERS: [(i32, i32); 8] = [
    (0, 0),
    (60, 0),
    (115, -52),
    (98, -55),
    (122, -60),
    (0, 0),
    (0, 0),
    (0, 0),
];

bitflags! {
    /// Flag byte of a block header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BlockFlags: u8 {
        /// Jump to the loop point after this block.
        const LOOP = 1 << 0;
        /// Keep the voice sounding across the loop jump.
        const SUSTAIN = 1 << 1;
        /// This block becomes the loop point when decoded.
        const SET_LOOP = 1 << 2;
    }
}

impl BlockFlags {
    /// Loop without sustain marks the last block of a one-shot sound.
    pub fn is_terminal(self) -> bool {
        self.contains(Self::LOOP) && !self.contains(Self::SUSTAIN)
    }
}

/// Number of blocks needed to hold `samples` samples.
pub const fn samples_to_blocks(samples: usize) -> usize {
    samples.div_ceil(SAMPLES_PER_BLOCK)
}

/// Number of samples held by `blocks` blocks.
pub const fn blocks_to_samples(blocks: usize) -> usize {
    blocks * SAMPLES_PER_BLOCK
}

/// One 16-byte compressed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block([u8; BLOCK_SIZE]);

impl Block {
    /// Wrap raw block bytes.
    pub const fn from_bytes(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    /// Assemble a block from its header fields and 28 nibble values.
    ///
    /// Nibbles must lie in `-8..=7`; only their low four bits are stored.
    pub fn encode(
        shift_index: u8,
        filter_index: u8,
        flags: BlockFlags,
        nibbles: &[i8; SAMPLES_PER_BLOCK],
    ) -> Self {
        debug_assert!(shift_index < 16, "shift index out of range");
        debug_assert!(filter_index < 8, "filter index out of range");
        debug_assert!(nibbles.iter().all(|n| (-8..=7).contains(n)));

        let mut bytes = [0u8; BLOCK_SIZE];
        bytes[0] = (shift_index & 0x0F) | ((filter_index & 0x07) << 4);
        bytes[1] = flags.bits();
        for (byte, pair) in bytes[2..].iter_mut().zip(nibbles.chunks_exact(2)) {
            *byte = (pair[0] as u8 & 0x0F) | ((pair[1] as u8 & 0x0F) << 4);
        }
        Self(bytes)
    }

    /// Raw bytes of the block.
    pub const fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }

    /// Quantization shift index as stored in the header.
    pub const fn shift_index(&self) -> u8 {
        self.0[0] & 0x0F
    }

    /// Effective left shift applied to each nibble (`12 - index`, never negative).
    pub const fn shift(&self) -> u32 {
        12u8.saturating_sub(self.shift_index()) as u32
    }

    /// Predictor filter index.
    pub const fn filter_index(&self) -> usize {
        ((self.0[0] & 0x70) >> 4) as usize
    }

    /// Predictor coefficients selected by the filter index.
    pub const fn coefficients(&self) -> (i32, i32) {
        FILTERS[self.filter_index()]
    }

    /// Header flags.
    pub const fn flags(&self) -> BlockFlags {
        BlockFlags::from_bits_truncate(self.0[1])
    }

    /// Sign-extended sample nibbles in playback order.
    pub fn nibbles(&self) -> impl Iterator<Item = i32> + '_ {
        self.0[2..]
            .iter()
            .flat_map(|&byte| [byte & 0x0F, byte >> 4])
            .map(|nibble| (i32::from(nibble) << 28) >> 28)
    }
}

/// Immutable array of blocks shared between the loader and any voices.
///
/// Cloning is cheap: the bytes are reference counted, never copied.
#[derive(Debug, Clone, Default)]
pub struct BlockMemory {
    bytes: Bytes,
}

impl BlockMemory {
    /// Take ownership of a loaded buffer of blocks.
    ///
    /// Trailing bytes that do not form a whole block are dropped.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let mut bytes = bytes.into();
        let blocks = bytes.len() / BLOCK_SIZE;

        if blocks == 0 {
            return Err(Error::InvalidArgument(format!(
                "block memory needs at least {BLOCK_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let trailing = bytes.len() % BLOCK_SIZE;
        if trailing != 0 {
            warn!("Ignoring {trailing} trailing bytes after {blocks} blocks");
            bytes.truncate(blocks * BLOCK_SIZE);
        }

        Ok(Self { bytes })
    }

    /// Pack a slice of blocks into block memory.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let bytes: Vec<u8> = blocks.iter().flat_map(|b| b.0).collect();
        Self {
            bytes: Bytes::from(bytes),
        }
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.bytes.len() / BLOCK_SIZE
    }

    /// Whether no memory has been bound.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy out the block at `index`.
    pub fn block(&self, index: usize) -> Block {
        debug_assert!(index < self.len(), "block index {index} out of range");

        let start = index * BLOCK_SIZE;
        let mut raw = [0u8; BLOCK_SIZE];
        raw.copy_from_slice(&self.bytes[start..start + BLOCK_SIZE]);
        Block(raw)
    }

    /// Flags of the block at `index`, without copying the block.
    pub fn flags(&self, index: usize) -> BlockFlags {
        debug_assert!(index < self.len(), "block index {index} out of range");

        BlockFlags::from_bits_truncate(self.bytes[index * BLOCK_SIZE + 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fields() {
        let block = Block::from_bytes([0x4A, 0x05, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(block.shift_index(), 10);
        assert_eq!(block.shift(), 2);
        assert_eq!(block.filter_index(), 4);
        assert_eq!(block.coefficients(), (122, -60));
        assert_eq!(block.flags(), BlockFlags::LOOP | BlockFlags::SET_LOOP);
    }

    #[test]
    fn test_shift_clamps_at_zero() {
        let mut raw = [0u8; BLOCK_SIZE];
        raw[0] = 0x0F;
        assert_eq!(Block::from_bytes(raw).shift(), 0);
    }

    #[test]
    fn test_reserved_filters_are_zero() {
        for index in 5u8..8 {
            let mut raw = [0u8; BLOCK_SIZE];
            raw[0] = index << 4;
            assert_eq!(Block::from_bytes(raw).coefficients(), (0, 0));
        }
    }

    #[test]
    fn test_nibble_order_low_first() {
        let mut raw = [0u8; BLOCK_SIZE];
        raw[2] = 0x8F; // low = -1, high = -8
        raw[3] = 0x07; // low = 7, high = 0
        let nibbles: Vec<i32> = Block::from_bytes(raw).nibbles().take(4).collect();
        assert_eq!(nibbles, vec![-1, -8, 7, 0]);
    }

    #[test]
    fn test_encode_matches_layout() {
        let mut nibbles = [0i8; SAMPLES_PER_BLOCK];
        nibbles[0] = 3;
        nibbles[1] = -2;
        nibbles[27] = -8;
        let block = Block::encode(2, 1, BlockFlags::SUSTAIN, &nibbles);

        let bytes = block.as_bytes();
        assert_eq!(bytes[0], 0x12);
        assert_eq!(bytes[1], 0x02);
        assert_eq!(bytes[2], 0xE3);
        assert_eq!(bytes[15], 0x80);

        let decoded: Vec<i32> = block.nibbles().collect();
        let expected: Vec<i32> = nibbles.iter().map(|&n| i32::from(n)).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_terminal_flags() {
        assert!(BlockFlags::LOOP.is_terminal());
        assert!(!(BlockFlags::LOOP | BlockFlags::SUSTAIN).is_terminal());
        assert!(!BlockFlags::SUSTAIN.is_terminal());
        assert!(!BlockFlags::empty().is_terminal());
    }

    #[test]
    fn test_sample_block_conversions() {
        assert_eq!(samples_to_blocks(0), 0);
        assert_eq!(samples_to_blocks(1), 1);
        assert_eq!(samples_to_blocks(28), 1);
        assert_eq!(samples_to_blocks(29), 2);
        assert_eq!(blocks_to_samples(3), 84);
    }

    #[test]
    fn test_memory_rejects_short_buffer() {
        let err = BlockMemory::new(vec![0u8; 15]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_memory_drops_trailing_bytes() {
        let memory = BlockMemory::new(vec![0u8; 16 * 3 + 5]).unwrap();
        assert_eq!(memory.len(), 3);
    }

    #[test]
    fn test_memory_block_access() {
        let first = Block::encode(0, 0, BlockFlags::empty(), &[1; SAMPLES_PER_BLOCK]);
        let second = Block::encode(4, 2, BlockFlags::LOOP, &[-1; SAMPLES_PER_BLOCK]);
        let memory = BlockMemory::from_blocks(&[first, second]);

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.block(0), first);
        assert_eq!(memory.block(1), second);
        assert_eq!(memory.flags(1), BlockFlags::LOOP);
    }
}
