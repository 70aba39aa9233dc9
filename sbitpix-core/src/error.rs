//! Error types for sbitpix-core.

use thiserror::Error;

/// Result type alias for sbitpix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for sbitpix operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A channel map or position map failed validation at load time.
    #[error("malformed mapping: {0}")]
    MalformedMapping(#[from] MappingError),

    /// Module identifier outside `0..24`.
    #[error("invalid module id: {0}")]
    InvalidModule(u32),

    /// Grid position outside the 8x3 chamber layout.
    #[error("invalid grid position: (region {region}, sector {sector})")]
    InvalidPosition { region: u32, sector: u32 },
}

/// Validation failures for channel and position maps.
///
/// Any of these makes the map unusable; decoding must not start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// Module id outside `0..24`.
    #[error("module {module} out of range (expected 0..24)")]
    ModuleOutOfRange { module: u32 },

    /// Channel index outside `0..128`.
    #[error("module {module}: channel {channel} out of range (expected 0..128)")]
    ChannelOutOfRange { module: u32, channel: u32 },

    /// Strip index outside `0..128`.
    #[error("module {module} channel {channel}: strip {strip} out of range (expected 0..128)")]
    StripOutOfRange {
        module: u32,
        channel: u32,
        strip: u32,
    },

    /// The same (module, channel) appears twice.
    #[error("module {module}: channel {channel} mapped more than once")]
    DuplicateChannel { module: u32, channel: u32 },

    /// A (module, channel) has no strip assigned.
    #[error("module {module}: channel {channel} has no strip assigned")]
    MissingChannel { module: u32, channel: u32 },

    /// Grid position outside regions `1..=8` / sectors `1..=3`.
    #[error("module {module}: position (region {region}, sector {sector}) out of range")]
    PositionOutOfRange {
        module: u32,
        region: u32,
        sector: u32,
    },

    /// A module was given a position twice.
    #[error("module {module} positioned more than once")]
    DuplicateModule { module: u32 },

    /// Two modules share the same grid position.
    #[error("position (region {region}, sector {sector}) assigned to more than one module")]
    DuplicatePosition { region: u32, sector: u32 },

    /// A module has no grid position.
    #[error("module {module} has no grid position")]
    MissingModule { module: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GridPosition, ModuleId, PositionMap};

    #[test]
    fn test_error_sources() {
        let err = ModuleId::new(30).unwrap_err();
        assert_eq!(err.to_string(), "invalid module id: 30");

        let err = GridPosition::new(2, 5).unwrap_err();
        assert!(matches!(err, Error::InvalidPosition { region: 2, sector: 5 }));

        let mapping = PositionMap::from_entries(Vec::new()).unwrap_err();
        let err = Error::from(mapping.clone());
        assert!(matches!(&err, Error::MalformedMapping(m) if *m == mapping));
        assert!(err.to_string().starts_with("malformed mapping: "));
    }
}
