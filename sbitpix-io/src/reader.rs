//! Memory-mapped file readers.
//!

use crate::{Error, Result};
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cluster words recorded per trigger.
pub const WORDS_PER_EVENT: usize = 8;

/// A memory-mapped file reader.
///
/// Uses memmap2 to efficiently access file contents without
/// loading the entire file into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file contents as text.
    ///
    /// # Errors
    /// Returns `InvalidFormat` if the file is not UTF-8.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(self.as_bytes()).map_err(|e| {
            Error::InvalidFormat(format!("{} is not text: {e}", self.path.display()))
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One row of a readout run: a trigger and the cluster words it latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbitEvent {
    /// Trigger number.
    pub event: u32,
    /// Cluster words, one per readout slot.
    pub words: [u32; WORDS_PER_EVENT],
}

impl SbitEvent {
    /// Iterates `(slot, word)` pairs.
    pub fn slots(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.words.iter().copied().enumerate()
    }
}

/// Reader for `sbitReadOut_run*.dat` files.
///
/// The first line names the columns (`evtNum/i:sbitClusterData0/i:...`, a
/// trailing `:` is accepted); every other non-blank line holds the trigger
/// number and eight words in decimal.
pub struct RunFileReader {
    reader: MappedFileReader,
}

impl RunFileReader {
    /// Opens a run file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            reader: MappedFileReader::open(path)?,
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Path of the run file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Parses every event in the file, in file order.
    ///
    /// # Errors
    /// Returns `InvalidFormat` naming the line of the first bad row.
    pub fn read_events(&self) -> Result<Vec<SbitEvent>> {
        let source = self.reader.path().display().to_string();
        let events = parse_run(self.reader.as_str()?, &source)?;
        debug!(file = %source, events = events.len(), "run file parsed");
        Ok(events)
    }
}

/// Parses the text of a run file. `source` names it in error messages.
///
/// # Errors
/// Returns `InvalidFormat` for a bad header or row.
pub fn parse_run(text: &str, source: &str) -> Result<Vec<SbitEvent>> {
    let mut lines = text.lines().enumerate();
    let Some((header_index, header)) = lines.find(|(_, l)| !l.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    check_header(header, header_index + 1, source)?;

    let rows: Vec<(usize, &str)> = lines.filter(|(_, l)| !l.trim().is_empty()).collect();
    let parsed: Vec<Result<SbitEvent>> = rows
        .par_iter()
        .map(|&(index, line)| {
            parse_row(line).map_err(|message| Error::format_at(source, index + 1, message))
        })
        .collect();
    // Collected in file order, so the error kept is the earliest one
    parsed.into_iter().collect()
}

fn check_header(header: &str, line: usize, source: &str) -> Result<()> {
    let columns: Vec<&str> = header
        .split(':')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| c.split('/').next().unwrap_or(c))
        .collect();

    let expected = WORDS_PER_EVENT + 1;
    if columns.len() != expected || !columns[0].eq_ignore_ascii_case("evtNum") {
        return Err(Error::format_at(
            source,
            line,
            format!("expected header evtNum plus {WORDS_PER_EVENT} word columns, got '{header}'"),
        ));
    }
    Ok(())
}

fn parse_row(line: &str) -> std::result::Result<SbitEvent, String> {
    let mut fields = line.split_whitespace().map(|f| {
        f.parse::<u32>().map_err(|e| format!("bad value '{f}': {e}"))
    });

    let event = fields.next().ok_or("empty row")??;
    let mut words = [0u32; WORDS_PER_EVENT];
    for (slot, word) in words.iter_mut().enumerate() {
        *word = fields
            .next()
            .ok_or_else(|| format!("missing word {slot}"))??;
    }
    if fields.next().is_some() {
        return Err(format!("more than {} columns", WORDS_PER_EVENT + 1));
    }
    Ok(SbitEvent { event, words })
}
