//! sbitpix-vfat: VFAT3 S-bit cluster word decoder and cluster expander.
//!
//! This crate turns the trigger-path cluster words read out from a GE1/1
//! chamber into per-channel hit records.
//!
//! # Key Components
//!
//! - [`DecodedHeader`] - Bit field extraction of address, size and delay
//! - [`resolve`] - Address to (VFAT, channel doublet) mapping
//! - [`ClusterExpander`] - Expansion of a cluster across VFAT boundaries
//! - [`SbitUnpacker`] - Batch driver feeding a [`HitSink`](sbitpix_core::HitSink)
//!
//! # Processing Pipeline
//!
//! 1. Decode the word into its three fields
//! 2. Resolve the address; words past the used address space yield nothing
//! 3. Expand the doublet into `2 * (size + 1)` hits, moving on to the next
//!    iPhi sector at the end of a VFAT
//! 4. Hand each hit to the sink

mod address;
mod error;
mod expand;
mod unpacker;
mod word;

pub use address::{
    resolve, ResolvedAddress, ADDRESSES_PER_MODULE, ADDRESSES_PER_REGION, VALID_ADDRESSES,
};
pub use error::{Error, Result};
pub use expand::{ClusterExpander, ClusterOutcome};
pub use unpacker::{deliver, SbitUnpacker, UnpackSummary, UnpackerConfig};
pub use word::{decode, DecodedHeader};

// Re-export core types for convenience
pub use sbitpix_core::{ChannelMap, Cluster, HitRecord, HitSink, PositionMap};

use sbitpix_core::PositionEntry;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// GEM electronics board variant. Selects the default channel map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GebType {
    /// Long chamber board.
    #[default]
    Long,
    /// Short chamber board.
    Short,
}

impl GebType {
    /// Lower-case name as used in mapping file names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }

    /// File name of the standard channel map for this board.
    #[must_use]
    pub fn default_map_file(self) -> String {
        format!("{}ChannelMap_VFAT3-HV3b-V1_VFAT3-HV3b-V2.txt", self.as_str())
    }
}

impl std::str::FromStr for GebType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "long" => Ok(Self::Long),
            "short" => Ok(Self::Short),
            other => Err(Error::ConfigError(format!(
                "unknown GEB type '{other}' (expected long or short)"
            ))),
        }
    }
}

/// Readout configuration for one chamber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadoutConfig {
    /// Board variant.
    pub geb: GebType,
    /// Batch processing settings.
    pub unpacker: UnpackerConfig,
    /// VFAT placement on the chamber.
    pub positions: PositionMap,
}

impl Default for ReadoutConfig {
    fn default() -> Self {
        Self {
            geb: GebType::default(),
            unpacker: UnpackerConfig::default(),
            positions: PositionMap::ge11(),
        }
    }
}

// Intermediate structs for the JSON schema
#[derive(Deserialize)]
struct JsonConfig {
    readout: JsonReadout,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonReadout {
    geb: GebType,
    parallel: bool,
    chunk_size: usize,
    vfat_positions: Option<Vec<JsonVfatPosition>>,
}

impl Default for JsonReadout {
    fn default() -> Self {
        let unpacker = UnpackerConfig::default();
        Self {
            geb: GebType::default(),
            parallel: unpacker.parallel,
            chunk_size: unpacker.chunk_size,
            vfat_positions: None,
        }
    }
}

#[derive(Deserialize)]
struct JsonVfatPosition {
    vfat: u32,
    ieta: u32,
    iphi: u32,
}

impl ReadoutConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// Fails if the file cannot be read, is not valid JSON, or describes an
    /// invalid layout.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig = serde_json::from_reader(reader)?;
        Self::from_json_config(json_config)
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    /// Fails if the string is not valid JSON or describes an invalid layout.
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig = serde_json::from_str(json)?;
        Self::from_json_config(json_config)
    }

    fn from_json_config(config: JsonConfig) -> Result<Self> {
        let readout = config.readout;

        if readout.chunk_size == 0 {
            return Err(Error::ConfigError("chunk_size must be positive".into()));
        }

        // Built-in GE1/1 layout unless a full table is given
        let positions = match readout.vfat_positions {
            Some(table) => PositionMap::from_entries(table.into_iter().map(|p| PositionEntry {
                module: p.vfat,
                region: p.ieta,
                sector: p.iphi,
            }))?,
            None => PositionMap::ge11(),
        };

        Ok(Self {
            geb: readout.geb,
            unpacker: UnpackerConfig::new()
                .with_parallel(readout.parallel)
                .with_chunk_size(readout.chunk_size),
            positions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbitpix_core::{GridPosition, MappingError, ModuleId};
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ReadoutConfig::default();
        assert_eq!(config.geb, GebType::Long);
        assert!(config.unpacker.parallel);
        assert_eq!(config.positions, PositionMap::ge11());
    }

    #[test]
    fn test_geb_type() {
        assert_eq!("SHORT".parse::<GebType>().unwrap(), GebType::Short);
        assert!("medium".parse::<GebType>().is_err());
        assert_eq!(
            GebType::Short.default_map_file(),
            "shortChannelMap_VFAT3-HV3b-V1_VFAT3-HV3b-V2.txt"
        );
    }

    #[test]
    fn test_json_empty_readout() {
        let config = ReadoutConfig::from_json(r#"{ "readout": {} }"#).expect("minimal config");
        assert_eq!(config, ReadoutConfig::default());
    }

    #[test]
    fn test_json_partial_config() {
        let json = r#"{ "readout": { "geb": "short", "parallel": false } }"#;
        let config = ReadoutConfig::from_json(json).expect("partial config");
        assert_eq!(config.geb, GebType::Short);
        assert!(!config.unpacker.parallel);
        assert_eq!(config.unpacker.chunk_size, UnpackerConfig::default().chunk_size);
    }

    #[test]
    fn test_json_zero_chunk_rejected() {
        let json = r#"{ "readout": { "chunk_size": 0 } }"#;
        assert!(matches!(
            ReadoutConfig::from_json(json),
            Err(Error::ConfigError(_))
        ));
    }

    fn table_json(skip: Option<u32>, swap: bool) -> String {
        let mut rows = Vec::new();
        for (module, position) in PositionMap::ge11().iter() {
            let vfat = u32::from(module.get());
            if Some(vfat) == skip {
                continue;
            }
            // Mirror the sectors when swapping
            let iphi = if swap { 4 - position.sector } else { position.sector };
            rows.push(format!(
                r#"{{"vfat": {vfat}, "ieta": {}, "iphi": {iphi}}}"#,
                position.region
            ));
        }
        format!(r#"{{ "readout": {{ "vfat_positions": [{}] }} }}"#, rows.join(","))
    }

    #[test]
    fn test_json_custom_positions() {
        let config = ReadoutConfig::from_json(&table_json(None, true)).expect("mirrored table");
        let vfat7 = ModuleId::new(7).unwrap();
        assert_eq!(config.positions.position(vfat7), GridPosition::new(1, 3).unwrap());
    }

    #[test]
    fn test_json_incomplete_positions() {
        let err = ReadoutConfig::from_json(&table_json(Some(11), false)).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedMapping(MappingError::MissingModule { module: 11 })
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "readout": {{ "geb": "short" }} }}"#).unwrap();
        file.flush().unwrap();
        let config = ReadoutConfig::from_file(file.path()).unwrap();
        assert_eq!(config.geb, GebType::Short);
    }
}
