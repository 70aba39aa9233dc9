//! Batch unpacking of S-bit words into hit sinks.

use crate::expand::{ClusterExpander, ClusterOutcome};
use rayon::prelude::*;
use sbitpix_core::{ChannelMap, HitSink, PositionMap};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Configuration for the unpacker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpackerConfig {
    /// Whether to expand large batches on the rayon pool.
    pub parallel: bool,
    /// Words per parallel work item; batches no larger than this run inline.
    pub chunk_size: usize,
}

impl Default for UnpackerConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            chunk_size: 64 * 1024,
        }
    }
}

impl UnpackerConfig {
    /// Creates a new unpacker configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to use parallel expansion.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the chunk size for parallel processing.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }
}

/// Counts of every per-word condition met while unpacking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpackSummary {
    /// Words seen.
    pub words: u64,
    /// Words skipped for an address `>= 1536`.
    pub invalid_addresses: u64,
    /// Words that produced a cluster.
    pub clusters: u64,
    /// Clusters cut short past the last sector.
    pub truncated_clusters: u64,
    /// Clusters whose doublet strips were not adjacent.
    pub adjacency_warnings: u64,
    /// Clusters that continued onto a neighbouring VFAT.
    pub module_crossings: u64,
    /// Hits produced.
    pub hits: u64,
}

impl UnpackSummary {
    /// Accounts for one outcome.
    pub fn record(&mut self, outcome: &ClusterOutcome) {
        self.words += 1;
        let Some(cluster) = outcome.cluster() else {
            self.invalid_addresses += 1;
            return;
        };
        self.clusters += 1;
        self.hits += cluster.len() as u64;
        if outcome.overrun().is_some() {
            self.truncated_clusters += 1;
        }
        if cluster.adjacency.is_some() {
            self.adjacency_warnings += 1;
        }
        if cluster.crosses_modules() {
            self.module_crossings += 1;
        }
    }

    /// Folds another summary into this one.
    pub fn merge(&mut self, other: &Self) {
        self.words += other.words;
        self.invalid_addresses += other.invalid_addresses;
        self.clusters += other.clusters;
        self.truncated_clusters += other.truncated_clusters;
        self.adjacency_warnings += other.adjacency_warnings;
        self.module_crossings += other.module_crossings;
        self.hits += other.hits;
    }
}

/// Unpacks S-bit words with shared, read-only maps.
///
/// Cloning is cheap: the maps are reference counted.
#[derive(Debug, Clone)]
pub struct SbitUnpacker {
    positions: Arc<PositionMap>,
    channels: Arc<ChannelMap>,
    config: UnpackerConfig,
}

impl SbitUnpacker {
    /// Creates an unpacker with default configuration.
    #[must_use]
    pub fn new(positions: Arc<PositionMap>, channels: Arc<ChannelMap>) -> Self {
        Self {
            positions,
            channels,
            config: UnpackerConfig::default(),
        }
    }

    /// Sets the unpacker configuration.
    #[must_use]
    pub fn with_config(mut self, config: UnpackerConfig) -> Self {
        self.config = config;
        self
    }

    /// The position map in use.
    #[must_use]
    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    /// The channel map in use.
    #[must_use]
    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    /// An expander borrowing this unpacker's maps.
    #[must_use]
    pub fn expander(&self) -> ClusterExpander<'_> {
        ClusterExpander::new(&self.positions, &self.channels)
    }

    /// Expands a single word.
    #[must_use]
    pub fn unpack_word(&self, word: u32) -> ClusterOutcome {
        self.expander().expand_word(word)
    }

    /// Expands a batch of words, keeping input order.
    #[must_use]
    pub fn unpack_words(&self, words: &[u32]) -> Vec<ClusterOutcome> {
        if self.config.parallel && words.len() > self.config.chunk_size {
            self.unpack_parallel(words)
        } else {
            self.unpack_sequential(words)
        }
    }

    fn unpack_sequential(&self, words: &[u32]) -> Vec<ClusterOutcome> {
        let expander = self.expander();
        words.iter().map(|&w| expander.expand_word(w)).collect()
    }

    fn unpack_parallel(&self, words: &[u32]) -> Vec<ClusterOutcome> {
        debug!(
            words = words.len(),
            chunk_size = self.config.chunk_size,
            "expanding in parallel"
        );
        words
            .par_chunks(self.config.chunk_size)
            .flat_map_iter(|chunk| {
                let expander = self.expander();
                chunk.iter().map(move |&w| expander.expand_word(w))
            })
            .collect()
    }

    /// Expands a batch and feeds every hit to `sink`, in input order.
    ///
    /// Per-word problems never stop the batch; they are logged and counted
    /// in the returned summary.
    pub fn unpack_into<S: HitSink + ?Sized>(&self, words: &[u32], sink: &mut S) -> UnpackSummary {
        let mut summary = UnpackSummary::default();
        for outcome in self.unpack_words(words) {
            deliver(&outcome, sink, &mut summary);
        }
        debug!(
            words = summary.words,
            hits = summary.hits,
            invalid = summary.invalid_addresses,
            "batch unpacked"
        );
        summary
    }

    /// Streams words one at a time into `sink`.
    ///
    /// Nothing is buffered, so a caller can stop feeding at any point.
    pub fn unpack_stream<I, S>(&self, words: I, sink: &mut S) -> UnpackSummary
    where
        I: IntoIterator<Item = u32>,
        S: HitSink + ?Sized,
    {
        let expander = self.expander();
        let mut summary = UnpackSummary::default();
        for word in words {
            deliver(&expander.expand_word(word), sink, &mut summary);
        }
        summary
    }
}

/// Hands one outcome to `sink` and accounts for it in `summary`.
///
/// Logs truncations and adjacency problems at `warn`. This is what the
/// unpack methods do per word; use it directly when outcomes are produced
/// elsewhere (e.g. to also write them out).
pub fn deliver<S: HitSink + ?Sized>(
    outcome: &ClusterOutcome,
    sink: &mut S,
    summary: &mut UnpackSummary,
) {
    summary.record(outcome);
    report(outcome);
    if let Some(cluster) = outcome.cluster() {
        for hit in &cluster.hits {
            sink.accept(*hit);
        }
        sink.cluster_done(cluster);
    }
}

fn report(outcome: &ClusterOutcome) {
    match outcome {
        ClusterOutcome::InvalidAddress { word, address } => {
            trace!(word, address, "skipping word with unused address");
        }
        ClusterOutcome::Truncated { overrun, .. } => {
            warn!(
                word = overrun.word,
                vfat = overrun.module.get(),
                first_channel = overrun.first_channel,
                size_code = overrun.size_code,
                ieta = overrun.region,
                iphi = overrun.sector,
                kept = overrun.emitted,
                "cluster exceeds GEB positions"
            );
        }
        ClusterOutcome::Complete(_) => {}
    }
    if let Some(adjacency) = outcome.adjacency() {
        warn!(
            vfat = adjacency.module.get(),
            channel = adjacency.first_channel,
            first_strip = adjacency.first_strip,
            second_strip = adjacency.second_strip,
            "not adjacent strips"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::DecodedHeader;
    use sbitpix_core::{CountingSink, HitRecord};

    fn unpacker() -> SbitUnpacker {
        SbitUnpacker::new(
            Arc::new(PositionMap::ge11()),
            Arc::new(ChannelMap::identity()),
        )
    }

    fn word(address: u16, size_code: u8) -> u32 {
        DecodedHeader {
            address,
            size_code,
            delay: 5,
        }
        .encode()
    }

    #[test]
    fn test_unpacker_config() {
        let config = UnpackerConfig::new()
            .with_parallel(false)
            .with_chunk_size(0);
        assert!(!config.parallel);
        assert_eq!(config.chunk_size, 1);
    }

    #[test]
    fn test_summary_counts() {
        let words = [
            word(0, 0),    // 2 hits
            word(1600, 3), // invalid
            word(63, 1),   // crosses into iphi 2
            word(191, 1),  // last doublet of iphi 3: truncated
        ];
        let mut hits: Vec<HitRecord> = Vec::new();
        let summary = unpacker().unpack_into(&words, &mut hits);

        assert_eq!(summary.words, 4);
        assert_eq!(summary.invalid_addresses, 1);
        assert_eq!(summary.clusters, 3);
        assert_eq!(summary.truncated_clusters, 1);
        assert_eq!(summary.module_crossings, 1);
        assert_eq!(summary.hits, 2 + 4 + 2);
        assert_eq!(hits.len(), 8);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let words: Vec<u32> = (0..5000u32).map(|i| (i * 7919) & 0x03FF_FFFF).collect();
        let sequential = unpacker()
            .with_config(UnpackerConfig::new().with_parallel(false))
            .unpack_words(&words);
        let parallel = unpacker()
            .with_config(UnpackerConfig::new().with_chunk_size(64))
            .unpack_words(&words);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_stream_matches_batch() {
        let words: Vec<u32> = (0..300u16)
            .map(|i| word(i * 13 % 2048, (i % 8) as u8))
            .collect();
        let u = unpacker();

        let mut batch_sink = CountingSink::default();
        let batch = u.unpack_into(&words, &mut batch_sink);
        let mut stream_sink = CountingSink::default();
        let stream = u.unpack_stream(words.iter().copied(), &mut stream_sink);

        assert_eq!(batch, stream);
        assert_eq!(batch_sink, stream_sink);
        assert_eq!(batch_sink.clusters, batch.clusters);
    }

    #[test]
    fn test_summary_merge() {
        let u = unpacker();
        let words = [word(0, 0), word(2000, 0), word(191, 7)];
        let whole = u.unpack_into(&words, &mut CountingSink::default());

        let mut left = u.unpack_into(&words[..1], &mut CountingSink::default());
        let right = u.unpack_into(&words[1..], &mut CountingSink::default());
        left.merge(&right);
        assert_eq!(left, whole);
    }
}
