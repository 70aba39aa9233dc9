//! S-bit cluster word layout.
//!
//! ```text
//!  31      26 25            14 13   11 10          0
//! +----------+----------------+-------+-------------+
//! |  unused  |     delay      | size  |   address   |
//! +----------+----------------+-------+-------------+
//! ```
//!
//! The field widths are fixed by the VFAT3 trigger link format.

use sbitpix_core::hits_for_size_code;

use serde::{Deserialize, Serialize};

/// Mask of the 11-bit S-bit address.
pub const ADDRESS_MASK: u32 = 0x7FF;
/// Shift of the 3-bit cluster size code.
pub const SIZE_SHIFT: u32 = 11;
/// Mask of the cluster size code after shifting.
pub const SIZE_MASK: u32 = 0x7;
/// Shift of the 12-bit L1A delay.
pub const DELAY_SHIFT: u32 = 14;
/// Mask of the delay after shifting.
pub const DELAY_MASK: u32 = 0xFFF;

/// Fields extracted from one cluster word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodedHeader {
    /// S-bit address, `0..2048`; only `0..1536` addresses a VFAT.
    pub address: u16,
    /// Cluster size code, `0..8`.
    pub size_code: u8,
    /// L1A to S-bit delay, `0..4096`.
    pub delay: u16,
}

impl DecodedHeader {
    /// Extracts the fields of a raw word. Every `u32` decodes.
    #[inline]
    #[must_use]
    pub fn decode(word: u32) -> Self {
        Self {
            address: (word & ADDRESS_MASK) as u16,
            size_code: ((word >> SIZE_SHIFT) & SIZE_MASK) as u8,
            delay: ((word >> DELAY_SHIFT) & DELAY_MASK) as u16,
        }
    }

    /// Packs the fields back into a word. Out-of-range values are masked.
    #[inline]
    #[must_use]
    pub fn encode(&self) -> u32 {
        ((u32::from(self.delay) & DELAY_MASK) << DELAY_SHIFT)
            | ((u32::from(self.size_code) & SIZE_MASK) << SIZE_SHIFT)
            | (u32::from(self.address) & ADDRESS_MASK)
    }

    /// Number of channels in the cluster, `2..=16`.
    #[inline]
    #[must_use]
    pub fn hit_count(&self) -> usize {
        hits_for_size_code(self.size_code)
    }
}

/// Shorthand for [`DecodedHeader::decode`].
#[inline]
#[must_use]
pub fn decode(word: u32) -> DecodedHeader {
    DecodedHeader::decode(word)
}
