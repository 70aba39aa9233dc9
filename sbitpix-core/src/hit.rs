//! Hit records and the sink interface that consumes them.

use crate::cluster::Cluster;
use crate::geometry::{GridPosition, ModuleId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One fired channel produced by expanding an S-bit cluster word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitRecord {
    /// VFAT the channel belongs to.
    pub module: ModuleId,
    /// Local channel on the VFAT, `0..128`.
    pub channel: u8,
    /// Readout strip the channel is bonded to, `0..128`.
    pub strip: u8,
    /// iEta region of the VFAT, `1..=8`.
    pub region: u8,
    /// iPhi sector of the VFAT, `1..=3`.
    pub sector: u8,
    /// L1A to S-bit delay of the originating word (BX).
    pub delay: u16,
    /// Raw 3-bit cluster size code of the originating word.
    pub cluster_size: u8,
}

impl HitRecord {
    /// Grid position of the hit's VFAT.
    #[inline]
    #[must_use]
    pub fn position(&self) -> GridPosition {
        GridPosition {
            region: self.region,
            sector: self.sector,
        }
    }

    /// Channel index along the whole region, `0..384`.
    #[inline]
    #[must_use]
    pub fn region_channel(&self) -> u16 {
        self.position().region_offset() + u16::from(self.channel)
    }

    /// Strip index along the whole region, `0..384`.
    #[inline]
    #[must_use]
    pub fn region_strip(&self) -> u16 {
        self.position().region_offset() + u16::from(self.strip)
    }
}

/// Consumer of decoded hits.
///
/// The unpacker calls [`HitSink::accept`] once per hit in expansion order,
/// then [`HitSink::cluster_done`] once for the cluster those hits came from.
/// Buffering and batching are the sink's business.
pub trait HitSink {
    /// Receives one hit.
    fn accept(&mut self, hit: HitRecord);

    /// Called after all hits of `cluster` were accepted.
    fn cluster_done(&mut self, _cluster: &Cluster) {}
}

impl HitSink for Vec<HitRecord> {
    fn accept(&mut self, hit: HitRecord) {
        self.push(hit);
    }
}

impl<S: HitSink + ?Sized> HitSink for &mut S {
    fn accept(&mut self, hit: HitRecord) {
        (**self).accept(hit);
    }

    fn cluster_done(&mut self, cluster: &Cluster) {
        (**self).cluster_done(cluster);
    }
}

/// Counts hits and clusters without keeping them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountingSink {
    /// Hits accepted.
    pub hits: u64,
    /// Clusters completed.
    pub clusters: u64,
}

impl HitSink for CountingSink {
    fn accept(&mut self, _hit: HitRecord) {
        self.hits += 1;
    }

    fn cluster_done(&mut self, _cluster: &Cluster) {
        self.clusters += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(sector: u8, channel: u8, strip: u8) -> HitRecord {
        HitRecord {
            module: ModuleId::new(7).unwrap(),
            channel,
            strip,
            region: 1,
            sector,
            delay: 12,
            cluster_size: 0,
        }
    }

    #[test]
    fn test_region_keys() {
        let h = hit(1, 5, 9);
        assert_eq!(h.region_channel(), 5);
        assert_eq!(h.region_strip(), 9);

        let h = hit(3, 127, 0);
        assert_eq!(h.region_channel(), 383);
        assert_eq!(h.region_strip(), 256);
    }

    #[test]
    fn test_vec_sink() {
        let mut sink: Vec<HitRecord> = Vec::new();
        sink.accept(hit(1, 0, 0));
        sink.accept(hit(1, 1, 1));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[1].channel, 1);
    }

    #[test]
    fn test_sink_by_reference() {
        fn feed<S: HitSink>(mut sink: S) {
            sink.accept(hit(2, 3, 4));
        }
        let mut counter = CountingSink::default();
        feed(&mut counter);
        feed(&mut counter);
        assert_eq!(counter.hits, 2);
        assert_eq!(counter.clusters, 0);
    }
}
