//! sbitpix command-line interface.
//!
//! Unpacks S-bit readout runs into a hit table and summary counts.
#![allow(clippy::uninlined_format_args, clippy::too_many_lines)]

use clap::{Parser, Subcommand, ValueEnum};

use sbitpix_core::{ChannelMap, PositionMap};
use sbitpix_io::{
    default_map_path, load_channel_map, write_summary, HitCsvWriter, RunFileReader,
    RunProcessor, RunScanner,
};
use sbitpix_vfat::{resolve, ClusterExpander, DecodedHeader, GebType, ReadoutConfig, SbitUnpacker};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    SbitIo(#[from] sbitpix_io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] sbitpix_vfat::Error),

    #[error("no sbitReadOut_run*.dat files in {}", .0.display())]
    NoRunFiles(PathBuf),

    #[error("channel map not found: {}", .0.display())]
    MappingNotFound(PathBuf),

    #[error("cannot parse '{0}' as a cluster word")]
    InvalidWord(String),
}

/// GEB size, selecting the default channel map.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum GebArg {
    /// Long GE1/1 chamber
    Long,
    /// Short GE1/1 chamber
    Short,
}

impl From<GebArg> for GebType {
    fn from(arg: GebArg) -> Self {
        match arg {
            GebArg::Long => GebType::Long,
            GebArg::Short => GebType::Short,
        }
    }
}

/// GEM S-bit readout unpacker.
#[derive(Parser)]
#[command(name = "sbitpix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug-level logging (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack every run file in a directory
    Unpack {
        /// Directory holding sbitReadOut_run*.dat files
        input: PathBuf,

        /// GEB size, used to pick the default channel map
        #[arg(short = 't', long = "type", value_enum)]
        geb: Option<GebArg>,

        /// Channel map file; overrides the GEB default
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Directory of the standard channel maps
        #[arg(long, env = "SBITPIX_MAPPING_DIR", default_value = "mapping")]
        mapping_dir: PathBuf,

        /// Readout configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Hit table output (CSV)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run summary output (JSON)
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Expand words on a single thread
        #[arg(long)]
        sequential: bool,
    },

    /// Show the run files in a directory and their word counts
    Info {
        /// Directory holding sbitReadOut_run*.dat files
        input: PathBuf,
    },

    /// Decode cluster words given in hex (0x...) or decimal
    Decode {
        /// Cluster words
        #[arg(required = true)]
        words: Vec<String>,

        /// Also list every hit, using the identity channel map
        #[arg(short, long)]
        expand: bool,
    },
}

// RUST_LOG, when set, takes precedence over the -v default
fn log_filter(verbose: bool, env: Option<&str>) -> EnvFilter {
    match env.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => EnvFilter::new(directives),
        None if verbose => EnvFilter::new("debug"),
        None => EnvFilter::new("info"),
    }
}

fn init_logging(verbose: bool) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(verbose, env.as_deref()))
        .init();
}

fn parse_word(text: &str) -> Result<u32> {
    let trimmed = text.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|_| CliError::InvalidWord(text.to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Unpack {
            input,
            geb,
            mapping,
            mapping_dir,
            config,
            output,
            summary,
            sequential,
        } => {
            let readout = match config {
                Some(path) => ReadoutConfig::from_file(path)?,
                None => ReadoutConfig::default(),
            };
            let geb = geb.map_or(readout.geb, GebType::from);

            let map_path = mapping.unwrap_or_else(|| default_map_path(&mapping_dir, geb));
            if !map_path.is_file() {
                return Err(CliError::MappingNotFound(map_path));
            }
            let channels = load_channel_map(&map_path)?;
            for (module, channel) in channels.non_adjacent_doublets() {
                tracing::warn!(
                    vfat = module.get(),
                    channel,
                    "channel map puts a doublet on non-adjacent strips"
                );
            }

            let files = RunScanner::discover(&input)?;
            if files.is_empty() {
                return Err(CliError::NoRunFiles(input));
            }

            let mut unpacker_config = readout.unpacker;
            if sequential {
                unpacker_config = unpacker_config.with_parallel(false);
            }
            let unpacker = SbitUnpacker::new(Arc::new(readout.positions), Arc::new(channels))
                .with_config(unpacker_config);

            let start = Instant::now();
            let mut processor: RunProcessor = RunProcessor::new(unpacker);
            if let Some(path) = &output {
                processor = processor.with_csv(HitCsvWriter::create(path)?);
            }
            for file in &files {
                processor.process_file(file)?;
            }
            let (run, _) = processor.finish()?;
            let elapsed = start.elapsed();

            if let Some(path) = &summary {
                write_summary(path, &run)?;
            }

            println!(
                "Unpacked {} files in {:.2}s",
                run.files.len(),
                elapsed.as_secs_f64()
            );
            println!("Events: {}", run.events);
            println!("Words: {}", run.unpack.words);
            println!("Clusters: {}", run.unpack.clusters);
            println!("Hits: {}", run.unpack.hits);
            println!("Unused addresses: {}", run.unpack.invalid_addresses);
            println!("Truncated clusters: {}", run.unpack.truncated_clusters);
            println!("Non-adjacent doublets: {}", run.unpack.adjacency_warnings);
            println!("Clusters crossing VFATs: {}", run.unpack.module_crossings);
            if let Some(path) = &output {
                println!("Hit table: {}", path.display());
            }
            if let Some(path) = &summary {
                println!("Summary: {}", path.display());
            }
        }

        Commands::Info { input } => {
            let files = RunScanner::discover(&input)?;
            if files.is_empty() {
                return Err(CliError::NoRunFiles(input));
            }

            let mut total_events = 0usize;
            let mut total_words = 0usize;
            let mut total_unused = 0usize;
            for path in &files {
                let reader = RunFileReader::open(path)?;
                let events = reader.read_events()?;
                let words = events.len() * sbitpix_io::WORDS_PER_EVENT;
                let unused = events
                    .iter()
                    .flat_map(|e| e.words)
                    .filter(|&w| resolve(DecodedHeader::decode(w).address).is_none())
                    .count();

                println!("File: {}", path.display());
                println!("  Size: {} bytes", reader.file_size());
                println!("  Events: {}", events.len());
                println!("  Words: {} ({} unused addresses)", words, unused);

                total_events += events.len();
                total_words += words;
                total_unused += unused;
            }
            println!(
                "Total: {} files, {} events, {} words, {} unused addresses",
                files.len(),
                total_events,
                total_words,
                total_unused
            );
        }

        Commands::Decode { words, expand } => {
            let positions = PositionMap::ge11();
            let channels = ChannelMap::identity();
            let expander = ClusterExpander::new(&positions, &channels);

            for text in &words {
                let word = parse_word(text)?;
                let header = DecodedHeader::decode(word);
                println!(
                    "{:#010x}: address {} size {} ({} hits) delay {}",
                    word,
                    header.address,
                    header.size_code,
                    header.hit_count(),
                    header.delay
                );

                let Some(resolved) = resolve(header.address) else {
                    println!("  unused address, no hits");
                    continue;
                };
                println!(
                    "  {} channels ({}, {}) at {}",
                    resolved.module,
                    resolved.first_channel,
                    resolved.second_channel,
                    positions.position(resolved.module)
                );

                let outcome = expander.expand(header);
                if let Some(overrun) = outcome.overrun() {
                    println!("  {}", overrun);
                }
                if expand {
                    for hit in outcome.hits() {
                        println!(
                            "    {} channel {:>3} (ieta {}, iphi {}, region channel {})",
                            hit.module,
                            hit.channel,
                            hit.region,
                            hit.sector,
                            hit.region_channel()
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
