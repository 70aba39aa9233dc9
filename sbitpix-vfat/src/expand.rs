//! Cluster expansion: one decoded word into the hits it describes.
//!
//! A cluster starts on the doublet named by its address and grows towards
//! higher channels. When it runs off the end of a VFAT it continues on
//! channel 0 of the next iPhi sector of the same iEta; past the third sector
//! there is nowhere to go and the cluster is truncated.

use crate::address::resolve;
use crate::word::DecodedHeader;
use sbitpix_core::{
    AdjacencyViolation, BoundaryOverrun, ChannelMap, Cluster, GridPosition, HitRecord, ModuleId,
    PositionMap, CHANNELS_PER_MODULE,
};

const LAST_CHANNEL: u8 = (CHANNELS_PER_MODULE - 1) as u8;

/// Result of expanding one cluster word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterOutcome {
    /// The address lies in the unused part of the address space; no hits.
    InvalidAddress {
        /// Raw word.
        word: u32,
        /// The offending address, `>= 1536`.
        address: u16,
    },
    /// All hits the word describes.
    Complete(Cluster),
    /// The cluster ran past the last sector; only the hits before it.
    Truncated {
        /// Hits produced before the overrun.
        cluster: Cluster,
        /// Where and why expansion stopped.
        overrun: BoundaryOverrun,
    },
}

impl ClusterOutcome {
    /// The expanded cluster, if the address was valid.
    #[must_use]
    pub fn cluster(&self) -> Option<&Cluster> {
        match self {
            Self::InvalidAddress { .. } => None,
            Self::Complete(cluster) | Self::Truncated { cluster, .. } => Some(cluster),
        }
    }

    /// Consumes the outcome, returning the cluster if there is one.
    #[must_use]
    pub fn into_cluster(self) -> Option<Cluster> {
        match self {
            Self::InvalidAddress { .. } => None,
            Self::Complete(cluster) | Self::Truncated { cluster, .. } => Some(cluster),
        }
    }

    /// Hits produced; empty for invalid addresses.
    #[must_use]
    pub fn hits(&self) -> &[HitRecord] {
        self.cluster().map_or(&[], |c| c.hits.as_slice())
    }

    /// The raw word this outcome came from.
    #[must_use]
    pub fn word(&self) -> u32 {
        match self {
            Self::InvalidAddress { word, .. } => *word,
            Self::Complete(cluster) | Self::Truncated { cluster, .. } => cluster.word,
        }
    }

    /// Returns true for the "no data" outcome.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::InvalidAddress { .. })
    }

    /// The overrun, if the cluster was truncated.
    #[must_use]
    pub fn overrun(&self) -> Option<&BoundaryOverrun> {
        match self {
            Self::Truncated { overrun, .. } => Some(overrun),
            _ => None,
        }
    }

    /// The doublet adjacency warning, if any.
    #[must_use]
    pub fn adjacency(&self) -> Option<&AdjacencyViolation> {
        self.cluster().and_then(|c| c.adjacency.as_ref())
    }
}

/// Expands decoded words against a position map and a channel map.
///
/// Borrows both maps; it is cheap to create one per worker.
#[derive(Debug, Clone, Copy)]
pub struct ClusterExpander<'a> {
    positions: &'a PositionMap,
    channels: &'a ChannelMap,
}

impl<'a> ClusterExpander<'a> {
    /// Creates an expander over the given maps.
    #[must_use]
    pub fn new(positions: &'a PositionMap, channels: &'a ChannelMap) -> Self {
        Self {
            positions,
            channels,
        }
    }

    /// Decodes and expands a raw word.
    #[must_use]
    pub fn expand_word(&self, word: u32) -> ClusterOutcome {
        self.expand_decoded(word, DecodedHeader::decode(word))
    }

    /// Expands an already decoded header.
    ///
    /// Fields wider than the word format are masked first, so the hits
    /// always agree with the word they report.
    #[must_use]
    pub fn expand(&self, header: DecodedHeader) -> ClusterOutcome {
        self.expand_word(header.encode())
    }

    fn expand_decoded(&self, word: u32, header: DecodedHeader) -> ClusterOutcome {
        let Some(start) = resolve(header.address) else {
            return ClusterOutcome::InvalidAddress {
                word,
                address: header.address,
            };
        };

        let hit_count = header.hit_count();
        let origin = start.module;
        let origin_position = self.positions.position(origin);
        let mut hits = Vec::with_capacity(hit_count);

        // The doublet always lands on the addressed VFAT.
        let first = self.hit(&header, origin, origin_position, start.first_channel);
        let second = self.hit(&header, origin, origin_position, start.second_channel);
        let adjacency = (first.strip.abs_diff(second.strip) > 1).then_some(AdjacencyViolation {
            module: origin,
            first_channel: first.channel,
            first_strip: first.strip,
            second_strip: second.strip,
        });
        hits.push(first);
        hits.push(second);

        let mut module = origin;
        let mut position = origin_position;
        let mut channel = start.second_channel;
        let mut overrun = None;

        for _ in 2..hit_count {
            if channel < LAST_CHANNEL {
                channel += 1;
            } else if let Some(next) = position.next_sector() {
                position = next;
                module = self.positions.module_at(next);
                channel = 0;
            } else {
                overrun = Some(BoundaryOverrun {
                    word,
                    module,
                    first_channel: start.first_channel,
                    size_code: header.size_code,
                    region: position.region,
                    sector: position.sector,
                    emitted: hits.len(),
                });
                break;
            }
            hits.push(self.hit(&header, module, position, channel));
        }

        let cluster = Cluster {
            word,
            size_code: header.size_code,
            delay: header.delay,
            origin,
            origin_position,
            first_channel: start.first_channel,
            hits,
            adjacency,
        };

        match overrun {
            Some(overrun) => ClusterOutcome::Truncated { cluster, overrun },
            None => ClusterOutcome::Complete(cluster),
        }
    }

    #[inline]
    fn hit(
        &self,
        header: &DecodedHeader,
        module: ModuleId,
        position: GridPosition,
        channel: u8,
    ) -> HitRecord {
        HitRecord {
            module,
            channel,
            strip: self.channels.strip(module, channel),
            region: position.region,
            sector: position.sector,
            delay: header.delay,
            cluster_size: header.size_code,
        }
    }
}
