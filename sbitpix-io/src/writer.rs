//! Output writers: the flat hit table and the JSON run summary.

use crate::pipeline::RunSummary;
use crate::Result;
use sbitpix_core::Cluster;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Column names of the hit table.
pub const HIT_CSV_HEADER: &str =
    "event,slot,vfat,ieta,iphi,channel,strip,region_channel,region_strip,delay,size_code";

/// Writes decoded hits as CSV, one row per hit.
///
/// The header is written before the first row, or on [`finish`](Self::finish)
/// if no hit was ever written.
pub struct HitCsvWriter<W: Write> {
    writer: W,
    header_written: bool,
    rows: u64,
}

impl HitCsvWriter<BufWriter<File>> {
    /// Creates a buffered writer to a new file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> HitCsvWriter<W> {
    /// Wraps any writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
            rows: 0,
        }
    }

    /// Rows written so far, header excluded.
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Writes every hit of `cluster`, tagged with its trigger and slot.
    ///
    /// # Errors
    /// Returns an error if the underlying writer fails.
    pub fn write_cluster(&mut self, event: u32, slot: usize, cluster: &Cluster) -> Result<()> {
        self.ensure_header()?;
        for hit in cluster.iter() {
            writeln!(
                self.writer,
                "{},{},{},{},{},{},{},{},{},{},{}",
                event,
                slot,
                hit.module.get(),
                hit.region,
                hit.sector,
                hit.channel,
                hit.strip,
                hit.region_channel(),
                hit.region_strip(),
                hit.delay,
                hit.cluster_size
            )?;
            self.rows += 1;
        }
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the underlying writer fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the header if needed, flushes and returns the inner writer.
    ///
    /// # Errors
    /// Returns an error if the underlying writer fails.
    pub fn finish(mut self) -> Result<W> {
        self.ensure_header()?;
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn ensure_header(&mut self) -> Result<()> {
        if !self.header_written {
            writeln!(self.writer, "{HIT_CSV_HEADER}")?;
            self.header_written = true;
        }
        Ok(())
    }
}

/// Writes a run summary as pretty-printed JSON.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_summary<P: AsRef<Path>>(path: P, summary: &RunSummary) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Reads back a summary written by [`write_summary`].
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn read_summary<P: AsRef<Path>>(path: P) -> Result<RunSummary> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbitpix_core::{ChannelMap, PositionMap};
    use sbitpix_vfat::{ClusterExpander, DecodedHeader};

    fn cluster(address: u16, size_code: u8) -> Cluster {
        let positions = PositionMap::ge11();
        let channels = ChannelMap::identity();
        let word = DecodedHeader {
            address,
            size_code,
            delay: 12,
        }
        .encode();
        ClusterExpander::new(&positions, &channels)
            .expand_word(word)
            .into_cluster()
            .unwrap()
    }

    #[test]
    fn test_write_hits_csv() {
        let mut writer = HitCsvWriter::new(Vec::new());
        writer.write_cluster(3, 1, &cluster(63, 1)).unwrap();
        assert_eq!(writer.rows(), 4);

        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HIT_CSV_HEADER);
        assert_eq!(lines[1], "3,1,7,1,1,126,126,126,126,12,1");
        assert_eq!(lines[3], "3,1,15,1,2,0,0,128,128,12,1");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_header_only() {
        let writer = HitCsvWriter::new(Vec::new());
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(text.trim_end(), HIT_CSV_HEADER);
    }

    #[test]
    fn test_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.csv");
        let mut writer = HitCsvWriter::create(&path).unwrap();
        writer.write_cluster(0, 0, &cluster(0, 0)).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("0,0,7,1,1,0,0,0,0,12,0"));
        assert!(content.contains("0,0,7,1,1,1,1,1,1,12,0"));
    }
}
