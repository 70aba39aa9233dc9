//! Per-VFAT and per-iEta aggregation of decoded hits.
//!
//! Counts only: occupancy per channel and strip, cluster size codes and
//! delay ranges. Rendering these as histograms is left to the caller.

use crate::cluster::Cluster;
use crate::geometry::{
    GridPosition, ModuleId, PositionMap, CHANNELS_PER_MODULE, REGION_COUNT, REGION_WIDTH,
};
use crate::hit::{HitRecord, HitSink};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of distinct cluster size codes.
pub const SIZE_CODES: usize = 8;

/// Running min/max/mean of cluster delays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DelaySummary {
    /// Clusters contributing.
    pub clusters: u64,
    /// Smallest delay seen.
    pub min: Option<u16>,
    /// Largest delay seen.
    pub max: Option<u16>,
    /// Sum of all delays.
    pub sum: u64,
}

impl DelaySummary {
    /// Adds one cluster delay.
    pub fn record(&mut self, delay: u16) {
        self.clusters += 1;
        self.sum += u64::from(delay);
        self.min = Some(self.min.map_or(delay, |m| m.min(delay)));
        self.max = Some(self.max.map_or(delay, |m| m.max(delay)));
    }

    /// Mean delay, if any cluster was recorded.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        (self.clusters > 0).then(|| self.sum as f64 / self.clusters as f64)
    }

    /// Folds another summary into this one.
    pub fn merge(&mut self, other: &Self) {
        self.clusters += other.clusters;
        self.sum += other.sum;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Counters for one VFAT.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModuleStatistics {
    /// VFAT id.
    pub module: ModuleId,
    /// Where the VFAT sits.
    pub position: GridPosition,
    /// Hits on this VFAT.
    pub hits: u64,
    /// Clusters whose leading doublet is on this VFAT.
    pub clusters: u64,
    /// Hits per local channel.
    pub channel_occupancy: Vec<u64>,
    /// Hits per strip.
    pub strip_occupancy: Vec<u64>,
    /// Clusters per size code.
    pub size_codes: [u64; SIZE_CODES],
    /// Delays of clusters starting here.
    pub delay: DelaySummary,
}

impl ModuleStatistics {
    fn new(module: ModuleId, position: GridPosition) -> Self {
        let width = usize::from(CHANNELS_PER_MODULE);
        Self {
            module,
            position,
            hits: 0,
            clusters: 0,
            channel_occupancy: vec![0; width],
            strip_occupancy: vec![0; width],
            size_codes: [0; SIZE_CODES],
            delay: DelaySummary::default(),
        }
    }
}

/// Counters for one iEta region, sectors laid side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionStatistics {
    /// iEta, `1..=8`.
    pub region: u8,
    /// Hits in the region.
    pub hits: u64,
    /// Clusters starting in the region.
    pub clusters: u64,
    /// Hits per region channel (`(iphi - 1) * 128 + channel`).
    pub channel_occupancy: Vec<u64>,
    /// Hits per region strip (`(iphi - 1) * 128 + strip`).
    pub strip_occupancy: Vec<u64>,
    /// Clusters per size code.
    pub size_codes: [u64; SIZE_CODES],
    /// Delays of clusters starting here.
    pub delay: DelaySummary,
}

impl RegionStatistics {
    fn new(region: u8) -> Self {
        let width = usize::from(REGION_WIDTH);
        Self {
            region,
            hits: 0,
            clusters: 0,
            channel_occupancy: vec![0; width],
            strip_occupancy: vec![0; width],
            size_codes: [0; SIZE_CODES],
            delay: DelaySummary::default(),
        }
    }
}

/// Hit sink accumulating module and region counters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitStatistics {
    /// One entry per VFAT, indexed by module id.
    pub modules: Vec<ModuleStatistics>,
    /// One entry per iEta, index `region - 1`.
    pub regions: Vec<RegionStatistics>,
    /// Clusters cut short at the chamber edge.
    pub truncated_clusters: u64,
    /// Clusters whose leading doublet was not on neighbouring strips.
    pub adjacency_warnings: u64,
}

impl HitStatistics {
    /// Creates empty counters for the given layout.
    #[must_use]
    pub fn new(positions: &PositionMap) -> Self {
        Self {
            modules: positions
                .iter()
                .map(|(module, position)| ModuleStatistics::new(module, position))
                .collect(),
            regions: (1..=REGION_COUNT).map(RegionStatistics::new).collect(),
            truncated_clusters: 0,
            adjacency_warnings: 0,
        }
    }

    /// Counters of one VFAT.
    #[must_use]
    pub fn module(&self, module: ModuleId) -> &ModuleStatistics {
        &self.modules[module.index()]
    }

    /// Counters of one iEta region, `1..=8`.
    #[must_use]
    pub fn region(&self, region: u8) -> Option<&RegionStatistics> {
        self.regions.get(usize::from(region).checked_sub(1)?)
    }

    /// Total hits accepted.
    #[must_use]
    pub fn total_hits(&self) -> u64 {
        self.modules.iter().map(|m| m.hits).sum()
    }

    /// Total clusters seen.
    #[must_use]
    pub fn total_clusters(&self) -> u64 {
        self.modules.iter().map(|m| m.clusters).sum()
    }

    /// Folds counters from another instance (e.g. a parallel worker).
    pub fn merge(&mut self, other: &Self) {
        for (mine, theirs) in self.modules.iter_mut().zip(&other.modules) {
            mine.hits += theirs.hits;
            mine.clusters += theirs.clusters;
            add_counts(&mut mine.channel_occupancy, &theirs.channel_occupancy);
            add_counts(&mut mine.strip_occupancy, &theirs.strip_occupancy);
            add_counts(&mut mine.size_codes, &theirs.size_codes);
            mine.delay.merge(&theirs.delay);
        }
        for (mine, theirs) in self.regions.iter_mut().zip(&other.regions) {
            mine.hits += theirs.hits;
            mine.clusters += theirs.clusters;
            add_counts(&mut mine.channel_occupancy, &theirs.channel_occupancy);
            add_counts(&mut mine.strip_occupancy, &theirs.strip_occupancy);
            add_counts(&mut mine.size_codes, &theirs.size_codes);
            mine.delay.merge(&theirs.delay);
        }
        self.truncated_clusters += other.truncated_clusters;
        self.adjacency_warnings += other.adjacency_warnings;
    }
}

fn add_counts(into: &mut [u64], from: &[u64]) {
    for (a, b) in into.iter_mut().zip(from) {
        *a += b;
    }
}

impl HitSink for HitStatistics {
    fn accept(&mut self, hit: HitRecord) {
        let module = &mut self.modules[hit.module.index()];
        module.hits += 1;
        module.channel_occupancy[usize::from(hit.channel)] += 1;
        module.strip_occupancy[usize::from(hit.strip)] += 1;

        if let Some(region) = usize::from(hit.region)
            .checked_sub(1)
            .and_then(|i| self.regions.get_mut(i))
        {
            region.hits += 1;
            region.channel_occupancy[usize::from(hit.region_channel())] += 1;
            region.strip_occupancy[usize::from(hit.region_strip())] += 1;
        }
    }

    fn cluster_done(&mut self, cluster: &Cluster) {
        let code = usize::from(cluster.size_code) % SIZE_CODES;

        let module = &mut self.modules[cluster.origin.index()];
        module.clusters += 1;
        module.size_codes[code] += 1;
        module.delay.record(cluster.delay);

        if let Some(region) = usize::from(cluster.origin_position.region)
            .checked_sub(1)
            .and_then(|i| self.regions.get_mut(i))
        {
            region.clusters += 1;
            region.size_codes[code] += 1;
            region.delay.record(cluster.delay);
        }

        if cluster.is_truncated() {
            self.truncated_clusters += 1;
        }
        if cluster.adjacency.is_some() {
            self.adjacency_warnings += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_on(positions: &PositionMap, module: u8, channels: &[u8], delay: u16) -> Cluster {
        let origin = ModuleId::new(module).unwrap();
        let origin_position = positions.position(origin);
        let hits = channels
            .iter()
            .map(|&channel| HitRecord {
                module: origin,
                channel,
                strip: channel,
                region: origin_position.region,
                sector: origin_position.sector,
                delay,
                cluster_size: 0,
            })
            .collect();
        Cluster {
            word: 0,
            size_code: 0,
            delay,
            origin,
            origin_position,
            first_channel: channels[0],
            hits,
            adjacency: None,
        }
    }

    fn feed(stats: &mut HitStatistics, cluster: &Cluster) {
        for hit in &cluster.hits {
            stats.accept(*hit);
        }
        stats.cluster_done(cluster);
    }

    #[test]
    fn test_accumulates_module_and_region() {
        let positions = PositionMap::ge11();
        let mut stats = HitStatistics::new(&positions);

        // vfat 15 sits at ieta 1, iphi 2
        let cluster = cluster_on(&positions, 15, &[4, 5], 100);
        feed(&mut stats, &cluster);

        let vfat = stats.module(ModuleId::new(15).unwrap());
        assert_eq!(vfat.hits, 2);
        assert_eq!(vfat.clusters, 1);
        assert_eq!(vfat.channel_occupancy[4], 1);
        assert_eq!(vfat.size_codes[0], 1);

        let ieta1 = stats.region(1).unwrap();
        assert_eq!(ieta1.hits, 2);
        assert_eq!(ieta1.strip_occupancy[128 + 5], 1);
        assert_eq!(ieta1.delay.min, Some(100));

        assert_eq!(stats.total_hits(), 2);
        assert_eq!(stats.total_clusters(), 1);
        assert_eq!(stats.truncated_clusters, 0);
    }

    #[test]
    fn test_delay_summary() {
        let mut d = DelaySummary::default();
        assert_eq!(d.mean(), None);
        d.record(10);
        d.record(30);
        assert_eq!(d.min, Some(10));
        assert_eq!(d.max, Some(30));
        assert!((d.mean().unwrap() - 20.0).abs() < f64::EPSILON);

        let mut other = DelaySummary::default();
        other.record(5);
        d.merge(&other);
        assert_eq!(d.min, Some(5));
        assert_eq!(d.clusters, 3);
    }

    #[test]
    fn test_merge_matches_sequential() {
        let positions = PositionMap::ge11();
        let a = cluster_on(&positions, 0, &[0, 1], 7);
        let b = cluster_on(&positions, 23, &[10, 11, 12, 13], 9);

        let mut sequential = HitStatistics::new(&positions);
        feed(&mut sequential, &a);
        feed(&mut sequential, &b);

        let mut left = HitStatistics::new(&positions);
        feed(&mut left, &a);
        let mut right = HitStatistics::new(&positions);
        feed(&mut right, &b);
        left.merge(&right);

        assert_eq!(left, sequential);
    }

    #[test]
    fn test_truncated_cluster_counted() {
        let positions = PositionMap::ge11();
        let mut stats = HitStatistics::new(&positions);
        let mut cluster = cluster_on(&positions, 16, &[126, 127], 0);
        cluster.size_code = 1;
        feed(&mut stats, &cluster);
        assert_eq!(stats.truncated_clusters, 1);
        assert_eq!(stats.module(ModuleId::new(16).unwrap()).size_codes[1], 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serializes_to_json() {
        let stats = HitStatistics::new(&PositionMap::ge11());
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"truncated_clusters\":0"));
    }
}
