//! Unpacking of whole runs: events in, hit table and statistics out.

use crate::reader::{RunFileReader, SbitEvent, WORDS_PER_EVENT};
use crate::writer::HitCsvWriter;
use crate::Result;
use sbitpix_core::HitStatistics;
use sbitpix_vfat::{deliver, SbitUnpacker, UnpackSummary};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything learned from one or more run files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run files processed, in order.
    pub files: Vec<PathBuf>,
    /// Triggers read.
    pub events: u64,
    /// Per-word counters.
    pub unpack: UnpackSummary,
    /// Occupancy, size and delay counts.
    pub statistics: HitStatistics,
}

impl RunSummary {
    fn new(unpacker: &SbitUnpacker) -> Self {
        Self {
            files: Vec::new(),
            events: 0,
            unpack: UnpackSummary::default(),
            statistics: HitStatistics::new(unpacker.positions()),
        }
    }
}

/// Feeds run files through an unpacker into statistics and, optionally, a
/// hit table.
pub struct RunProcessor<W: Write = BufWriter<File>> {
    unpacker: SbitUnpacker,
    csv: Option<HitCsvWriter<W>>,
    run: RunSummary,
}

impl<W: Write> RunProcessor<W> {
    /// Creates a processor that only accumulates statistics.
    #[must_use]
    pub fn new(unpacker: SbitUnpacker) -> Self {
        let run = RunSummary::new(&unpacker);
        Self {
            unpacker,
            csv: None,
            run,
        }
    }

    /// Also writes every hit to `csv`.
    #[must_use]
    pub fn with_csv(mut self, csv: HitCsvWriter<W>) -> Self {
        self.csv = Some(csv);
        self
    }

    /// Totals so far.
    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        &self.run
    }

    /// Reads and unpacks one run file.
    ///
    /// # Errors
    /// Fails if the file cannot be read or parsed, or the hit table cannot
    /// be written.
    pub fn process_file<P: AsRef<Path>>(&mut self, path: P) -> Result<UnpackSummary> {
        let path = path.as_ref();
        let events = RunFileReader::open(path)?.read_events()?;
        let summary = self.process_events(&events)?;
        info!(
            file = %path.display(),
            events = events.len(),
            hits = summary.hits,
            invalid = summary.invalid_addresses,
            truncated = summary.truncated_clusters,
            "run file unpacked"
        );
        self.run.files.push(path.to_path_buf());
        Ok(summary)
    }

    /// Unpacks a batch of events, in order.
    ///
    /// # Errors
    /// Fails only if the hit table cannot be written.
    pub fn process_events(&mut self, events: &[SbitEvent]) -> Result<UnpackSummary> {
        let words: Vec<u32> = events.iter().flat_map(|e| e.words).collect();
        let outcomes = self.unpacker.unpack_words(&words);

        let mut summary = UnpackSummary::default();
        for (index, outcome) in outcomes.iter().enumerate() {
            deliver(outcome, &mut self.run.statistics, &mut summary);
            if let (Some(csv), Some(cluster)) = (self.csv.as_mut(), outcome.cluster()) {
                let event = events[index / WORDS_PER_EVENT].event;
                csv.write_cluster(event, index % WORDS_PER_EVENT, cluster)?;
            }
        }
        debug!(events = events.len(), hits = summary.hits, "events unpacked");

        self.run.events += events.len() as u64;
        self.run.unpack.merge(&summary);
        Ok(summary)
    }

    /// Flushes the hit table and returns the totals with the table's writer.
    ///
    /// # Errors
    /// Fails if the hit table cannot be flushed.
    pub fn finish(self) -> Result<(RunSummary, Option<W>)> {
        let writer = self.csv.map(HitCsvWriter::finish).transpose()?;
        Ok((self.run, writer))
    }
}
