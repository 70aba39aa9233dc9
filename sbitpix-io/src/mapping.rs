//! Channel map text files.
//!
//! The format is the one shipped with the GEM analysis tools:
//!
//! ```text
//! vfat/I:strip/I:channel/I:PanPin/I
//! 0 63 0 121
//! 0 64 1 122
//! ...
//! ```
//!
//! Columns are located by name, so their order does not matter and any
//! extra columns are ignored.

use crate::{Error, Result};
use sbitpix_core::{ChannelMap, MappingEntry};
use sbitpix_vfat::GebType;
use std::path::{Path, PathBuf};
use tracing::info;

/// Path of the standard map for `geb` inside `mapping_dir`.
#[must_use]
pub fn default_map_path(mapping_dir: &Path, geb: GebType) -> PathBuf {
    mapping_dir.join(geb.default_map_file())
}

/// Loads and validates a channel map file.
///
/// # Errors
/// Fails if the file cannot be read, is malformed, or does not describe a
/// complete one-to-one map.
pub fn load_channel_map<P: AsRef<Path>>(path: P) -> Result<ChannelMap> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let map = parse_channel_map(&text, &path.display().to_string())?;
    info!(path = %path.display(), "channel map loaded");
    Ok(map)
}

/// Parses channel map text. `source` names it in error messages.
///
/// # Errors
/// Returns `InvalidFormat` for unreadable text and `Mapping` when the
/// entries do not form a valid map.
pub fn parse_channel_map(text: &str, source: &str) -> Result<ChannelMap> {
    let entries = parse_entries(text, source)?;
    Ok(ChannelMap::from_entries(entries)?)
}

/// Parses the rows of a channel map without validating the map itself.
///
/// # Errors
/// Returns `InvalidFormat` for a bad header or row.
pub fn parse_entries(text: &str, source: &str) -> Result<Vec<MappingEntry>> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());
    let Some((header_index, header)) = lines.next() else {
        return Err(Error::InvalidFormat(format!("{source}: empty channel map")));
    };

    let columns: Vec<&str> = header
        .split(':')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| c.split('/').next().unwrap_or(c))
        .collect();
    let find = |name: &str| {
        columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                Error::format_at(source, header_index + 1, format!("no '{name}' column"))
            })
    };
    let (vfat, strip, channel) = (find("vfat")?, find("strip")?, find("channel")?);

    let mut entries = Vec::new();
    for (index, line) in lines {
        let values = line
            .split_whitespace()
            .map(str::parse::<u32>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::format_at(source, index + 1, e))?;
        if values.len() != columns.len() {
            return Err(Error::format_at(
                source,
                index + 1,
                format!("expected {} values, got {}", columns.len(), values.len()),
            ));
        }
        entries.push(MappingEntry::new(values[vfat], values[channel], values[strip]));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbitpix_core::{MappingError, ModuleId, MODULE_COUNT};
    use std::fmt::Write;

    // Strip numbers run backwards on odd VFATs
    fn map_text() -> String {
        let mut text = String::from("vfat/I:strip/I:channel/I:PanPin/I\n");
        for vfat in 0..MODULE_COUNT {
            for channel in 0..128 {
                let strip = if vfat % 2 == 1 { 127 - channel } else { channel };
                writeln!(text, "{vfat}\t{strip}\t{channel}\t{}", channel + 1).unwrap();
            }
        }
        text
    }

    #[test]
    fn test_parse_channel_map() {
        let map = parse_channel_map(&map_text(), "map").unwrap();
        let vfat0 = ModuleId::new(0).unwrap();
        let vfat1 = ModuleId::new(1).unwrap();
        assert_eq!(map.strip(vfat0, 5), 5);
        assert_eq!(map.strip(vfat1, 5), 122);
    }

    #[test]
    fn test_column_order_is_free() {
        let mut text = String::from("channel/I:vfat/I:strip/I\n");
        for vfat in 0..MODULE_COUNT {
            for channel in 0..128 {
                writeln!(text, "{channel} {vfat} {}", 127 - channel).unwrap();
            }
        }
        let map = parse_channel_map(&text, "map").unwrap();
        assert_eq!(map.strip(ModuleId::new(23).unwrap(), 0), 127);
    }

    #[test]
    fn test_missing_column() {
        let err = parse_entries("vfat/I:strip/I\n0 0\n", "map").unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(m) if m.contains("channel")));
    }

    #[test]
    fn test_bad_value() {
        let text = "vfat/I:strip/I:channel/I\n0 0 0\n0 -1 1\n";
        let Error::InvalidFormat(message) = parse_entries(text, "map").unwrap_err() else {
            panic!("expected InvalidFormat");
        };
        assert!(message.starts_with("map:3:"), "{message}");
    }

    #[test]
    fn test_incomplete_map() {
        let text: String = map_text().lines().take(100).map(|l| format!("{l}\n")).collect();
        let err = parse_channel_map(&text, "map").unwrap_err();
        assert!(matches!(err, Error::Mapping(MappingError::MissingChannel { .. })));
    }

    #[test]
    fn test_load_and_default_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = default_map_path(dir.path(), GebType::Short);
        assert!(path.ends_with("shortChannelMap_VFAT3-HV3b-V1_VFAT3-HV3b-V2.txt"));

        std::fs::write(&path, map_text()).unwrap();
        let map = load_channel_map(&path).unwrap();
        assert_eq!(map.strip(ModuleId::new(3).unwrap(), 0), 127);
        assert!(load_channel_map(dir.path().join("missing.txt")).is_err());
    }
}
