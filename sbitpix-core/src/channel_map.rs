//! Per-VFAT channel to readout strip mapping.

use crate::error::MappingError;
use crate::geometry::{ModuleId, CHANNELS_PER_MODULE, MODULE_COUNT};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const CHANNELS: usize = CHANNELS_PER_MODULE as usize;

/// One `(vfat, channel) -> strip` row of a mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MappingEntry {
    /// VFAT module id.
    pub module: u32,
    /// Local channel on the VFAT.
    pub channel: u32,
    /// Readout strip the channel is bonded to.
    pub strip: u32,
}

impl MappingEntry {
    /// Creates a mapping row.
    #[must_use]
    pub fn new(module: u32, channel: u32, strip: u32) -> Self {
        Self {
            module,
            channel,
            strip,
        }
    }
}

/// Complete, validated channel to strip lookup for all 24 VFATs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    strips: Box<[[u8; CHANNELS]; MODULE_COUNT]>,
}

impl ChannelMap {
    /// A map where every channel reads out the strip with the same index.
    #[must_use]
    pub fn identity() -> Self {
        let mut strips = Box::new([[0u8; CHANNELS]; MODULE_COUNT]);
        for module in strips.iter_mut() {
            for (channel, strip) in module.iter_mut().enumerate() {
                *strip = channel as u8;
            }
        }
        Self { strips }
    }

    /// Builds a map from mapping rows.
    ///
    /// The rows must cover every channel of every module exactly once.
    ///
    /// # Errors
    /// Returns the first out-of-range, duplicated or missing entry found.
    pub fn from_entries<I>(entries: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = MappingEntry>,
    {
        let mut slots: Box<[[Option<u8>; CHANNELS]; MODULE_COUNT]> =
            Box::new([[None; CHANNELS]; MODULE_COUNT]);

        for MappingEntry {
            module,
            channel,
            strip,
        } in entries
        {
            let m = usize::try_from(module)
                .ok()
                .filter(|&m| m < MODULE_COUNT)
                .ok_or(MappingError::ModuleOutOfRange { module })?;
            let c = usize::try_from(channel)
                .ok()
                .filter(|&c| c < CHANNELS)
                .ok_or(MappingError::ChannelOutOfRange { module, channel })?;
            let s = u8::try_from(strip)
                .ok()
                .filter(|&s| usize::from(s) < CHANNELS)
                .ok_or(MappingError::StripOutOfRange {
                    module,
                    channel,
                    strip,
                })?;

            if slots[m][c].replace(s).is_some() {
                return Err(MappingError::DuplicateChannel { module, channel });
            }
        }

        let mut strips = Box::new([[0u8; CHANNELS]; MODULE_COUNT]);
        for (m, (row, slot_row)) in strips.iter_mut().zip(slots.iter()).enumerate() {
            for (c, (strip, slot)) in row.iter_mut().zip(slot_row.iter()).enumerate() {
                *strip = slot.ok_or(MappingError::MissingChannel {
                    module: m as u32,
                    channel: c as u32,
                })?;
            }
        }

        Ok(Self { strips })
    }

    /// Strip read out by `channel` of `module`.
    ///
    /// # Panics
    /// Panics if `channel >= 128`.
    #[inline]
    #[must_use]
    pub fn strip(&self, module: ModuleId, channel: u8) -> u8 {
        self.strips[module.index()][usize::from(channel)]
    }

    /// All 128 strips of one module, indexed by channel.
    #[must_use]
    pub fn module_strips(&self, module: ModuleId) -> &[u8; CHANNELS] {
        &self.strips[module.index()]
    }

    /// Doublets `(2k, 2k+1)` whose strips are more than one apart.
    ///
    /// A non-empty result points at a suspicious mapping file; decoding
    /// still works but will emit adjacency warnings for these channels.
    #[must_use]
    pub fn non_adjacent_doublets(&self) -> Vec<(ModuleId, u8)> {
        ModuleId::all()
            .flat_map(|module| {
                let strips = self.module_strips(module);
                strips
                    .chunks_exact(2)
                    .enumerate()
                    .filter(|(_, pair)| pair[0].abs_diff(pair[1]) > 1)
                    .map(move |(k, _)| (module, (2 * k) as u8))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_entries() -> Vec<MappingEntry> {
        let mut entries = Vec::with_capacity(MODULE_COUNT * CHANNELS);
        for module in 0..MODULE_COUNT as u32 {
            for channel in 0..CHANNELS as u32 {
                // Reverse order inside each VFAT
                entries.push(MappingEntry::new(module, channel, 127 - channel));
            }
        }
        entries
    }

    #[test]
    fn test_identity_map() {
        let map = ChannelMap::identity();
        let vfat = ModuleId::new(12).unwrap();
        assert_eq!(map.strip(vfat, 0), 0);
        assert_eq!(map.strip(vfat, 127), 127);
        assert!(map.non_adjacent_doublets().is_empty());
    }

    #[test]
    fn test_from_entries() {
        let map = ChannelMap::from_entries(full_entries()).unwrap();
        let vfat = ModuleId::new(3).unwrap();
        assert_eq!(map.strip(vfat, 0), 127);
        assert_eq!(map.strip(vfat, 127), 0);
        assert!(map.non_adjacent_doublets().is_empty());
    }

    #[test]
    fn test_missing_channel() {
        let mut entries = full_entries();
        entries.retain(|e| !(e.module == 23 && e.channel == 64));
        assert_eq!(
            ChannelMap::from_entries(entries),
            Err(MappingError::MissingChannel {
                module: 23,
                channel: 64
            })
        );
    }

    #[test]
    fn test_duplicate_channel() {
        let mut entries = full_entries();
        entries.push(MappingEntry::new(2, 10, 5));
        assert_eq!(
            ChannelMap::from_entries(entries),
            Err(MappingError::DuplicateChannel {
                module: 2,
                channel: 10
            })
        );
    }

    #[test]
    fn test_out_of_range_entries() {
        let err = ChannelMap::from_entries([MappingEntry::new(24, 0, 0)]).unwrap_err();
        assert_eq!(err, MappingError::ModuleOutOfRange { module: 24 });

        let err = ChannelMap::from_entries([MappingEntry::new(0, 128, 0)]).unwrap_err();
        assert_eq!(
            err,
            MappingError::ChannelOutOfRange {
                module: 0,
                channel: 128
            }
        );

        let err = ChannelMap::from_entries([MappingEntry::new(0, 0, 300)]).unwrap_err();
        assert_eq!(
            err,
            MappingError::StripOutOfRange {
                module: 0,
                channel: 0,
                strip: 300
            }
        );
    }

    #[test]
    fn test_non_adjacent_doublets() {
        let mut entries = full_entries();
        // Swap strips of channels 1 and 2 on vfat 4: doublets (0,1) and (2,3) break
        for e in &mut entries {
            if e.module == 4 && e.channel == 1 {
                e.strip = 125;
            } else if e.module == 4 && e.channel == 2 {
                e.strip = 126;
            }
        }
        let map = ChannelMap::from_entries(entries).unwrap();
        let vfat4 = ModuleId::new(4).unwrap();
        assert_eq!(map.non_adjacent_doublets(), vec![(vfat4, 0), (vfat4, 2)]);
    }
}
