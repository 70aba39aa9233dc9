//! sbitpix-io: File I/O for sbitpix.
//!
//! Reads `sbitReadOut_run*.dat` run files through memory maps (memmap2),
//! loads channel map text files, and writes the decoded hit table and the
//! JSON run summary.

mod error;
pub mod mapping;
pub mod pipeline;
mod reader;
pub mod scanner;
mod writer;

pub use error::{Error, Result};
pub use mapping::{default_map_path, load_channel_map, parse_channel_map};
pub use pipeline::{RunProcessor, RunSummary};
pub use reader::{parse_run, MappedFileReader, RunFileReader, SbitEvent, WORDS_PER_EVENT};
pub use scanner::{is_run_file, RunScanner};
pub use writer::{read_summary, write_summary, HitCsvWriter, HIT_CSV_HEADER};
