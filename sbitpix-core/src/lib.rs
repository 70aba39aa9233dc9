//! sbitpix-core: Core types for GEM S-bit cluster unpacking.
//!
//! This crate provides the chamber geometry (VFAT ids and their iEta/iPhi
//! grid positions), the channel to strip map, the hit record produced by
//! cluster expansion, and the [`HitSink`] interface consumers implement.
//!

pub mod channel_map;
pub mod cluster;
pub mod error;
pub mod geometry;
pub mod hit;
pub mod statistics;

pub use channel_map::{ChannelMap, MappingEntry};
pub use cluster::{
    hits_for_size_code, AdjacencyViolation, BoundaryOverrun, Cluster, MAX_CLUSTER_HITS,
};
pub use error::{Error, MappingError, Result};
pub use geometry::{
    GridPosition, ModuleId, PositionEntry, PositionMap, CHANNELS_PER_MODULE, MODULE_COUNT,
    REGION_COUNT, REGION_WIDTH, SECTOR_COUNT,
};
pub use hit::{CountingSink, HitRecord, HitSink};
pub use statistics::{DelaySummary, HitStatistics, ModuleStatistics, RegionStatistics};
