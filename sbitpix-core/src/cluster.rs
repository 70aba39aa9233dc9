//! Expanded S-bit clusters and the per-cluster diagnostics attached to them.

use crate::geometry::{GridPosition, ModuleId};
use crate::hit::HitRecord;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest number of channels one cluster word can describe.
pub const MAX_CLUSTER_HITS: usize = 16;

/// Number of hits described by a 3-bit cluster size code.
#[inline]
#[must_use]
pub fn hits_for_size_code(size_code: u8) -> usize {
    2 * (usize::from(size_code & 0x7) + 1)
}

/// The two strips of a cluster's leading doublet are not neighbours.
///
/// Points at an inconsistent channel map rather than a corrupt word.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[error(
    "not adjacent strips on {module}: channels ({first_channel}, {}) map to strips {first_strip} and {second_strip}",
    .first_channel + 1
)]
pub struct AdjacencyViolation {
    /// VFAT of the doublet.
    pub module: ModuleId,
    /// Even channel of the doublet.
    pub first_channel: u8,
    /// Strip of the even channel.
    pub first_strip: u8,
    /// Strip of the odd channel.
    pub second_strip: u8,
}

/// A cluster ran past the last sector of its region.
///
/// Hits produced before the overrun are kept; the rest are dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[error(
    "cluster exceeds GEB positions: word {word:#010x}, {module}, first channel {first_channel}, size code {size_code}, ieta {region}, iphi {sector}, {emitted} hits kept"
)]
pub struct BoundaryOverrun {
    /// Raw cluster word.
    pub word: u32,
    /// VFAT on which the cluster ran out of channels.
    pub module: ModuleId,
    /// First channel of the cluster on its starting VFAT.
    pub first_channel: u8,
    /// Cluster size code of the word.
    pub size_code: u8,
    /// iEta region of `module`.
    pub region: u8,
    /// iPhi sector of `module`.
    pub sector: u8,
    /// Hits emitted before expansion stopped.
    pub emitted: usize,
}

/// All hits derived from one cluster word, plus where it started.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Raw cluster word.
    pub word: u32,
    /// 3-bit size code.
    pub size_code: u8,
    /// L1A to S-bit delay.
    pub delay: u16,
    /// VFAT holding the leading doublet.
    pub origin: ModuleId,
    /// Grid position of `origin`.
    pub origin_position: GridPosition,
    /// Even channel of the leading doublet.
    pub first_channel: u8,
    /// Hits in expansion order.
    pub hits: Vec<HitRecord>,
    /// Set when the leading doublet maps to non-neighbouring strips.
    pub adjacency: Option<AdjacencyViolation>,
}

impl Cluster {
    /// Hits the word asked for, `2..=16`.
    #[inline]
    #[must_use]
    pub fn expected_hits(&self) -> usize {
        hits_for_size_code(self.size_code)
    }

    /// Returns the number of hits actually produced.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if no hits were produced.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// True if expansion stopped before reaching [`Cluster::expected_hits`].
    #[inline]
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.hits.len() < self.expected_hits()
    }

    /// True if the cluster continued onto a neighbouring VFAT.
    #[must_use]
    pub fn crosses_modules(&self) -> bool {
        self.hits.iter().any(|h| h.module != self.origin)
    }

    /// Returns an iterator over the hits.
    pub fn iter(&self) -> impl Iterator<Item = &HitRecord> {
        self.hits.iter()
    }
}
