//! Chamber geometry: VFAT module ids and their (iEta, iPhi) grid positions.
//!
//! A GE1/1 chamber is read out by 24 VFATs laid out as 8 regions (iEta)
//! by 3 sectors (iPhi). [`PositionMap`] is the validated bijection between
//! the two numbering schemes.

use crate::error::MappingError;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of VFAT modules on one chamber.
pub const MODULE_COUNT: usize = 24;
/// Number of iEta regions.
pub const REGION_COUNT: u8 = 8;
/// Number of iPhi sectors per region.
pub const SECTOR_COUNT: u8 = 3;
/// Channels (and strips) handled by one VFAT.
pub const CHANNELS_PER_MODULE: u16 = 128;
/// Width of a region when its three sectors are laid side by side.
pub const REGION_WIDTH: u16 = CHANNELS_PER_MODULE * SECTOR_COUNT as u16;

/// Identifier of one VFAT module, always in `0..24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct ModuleId(u8);

impl ModuleId {
    /// Creates a module id, rejecting values outside `0..24`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidModule`] for ids `>= 24`.
    pub fn new(id: u8) -> Result<Self> {
        if usize::from(id) < MODULE_COUNT {
            Ok(Self(id))
        } else {
            Err(Error::InvalidModule(u32::from(id)))
        }
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Returns the id as an array index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Iterates over all 24 module ids in ascending order.
    pub fn all() -> impl Iterator<Item = ModuleId> {
        (0..MODULE_COUNT as u8).map(ModuleId)
    }
}

impl TryFrom<u8> for ModuleId {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        Self::new(id)
    }
}

impl From<ModuleId> for u8 {
    fn from(module: ModuleId) -> Self {
        module.0
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vfat{}", self.0)
    }
}

/// Position of a module on the chamber grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "RawGridPosition", into = "RawGridPosition")
)]
pub struct GridPosition {
    /// iEta region, `1..=8`.
    pub region: u8,
    /// iPhi sector, `1..=3`.
    pub sector: u8,
}

impl GridPosition {
    /// Creates a validated grid position.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPosition`] when region or sector is out of range.
    pub fn new(region: u8, sector: u8) -> Result<Self> {
        if (1..=REGION_COUNT).contains(&region) && (1..=SECTOR_COUNT).contains(&sector) {
            Ok(Self { region, sector })
        } else {
            Err(Error::InvalidPosition {
                region: u32::from(region),
                sector: u32::from(sector),
            })
        }
    }

    /// Dense index `0..24`, region-major.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.region - 1) * usize::from(SECTOR_COUNT) + usize::from(self.sector - 1)
    }

    /// The neighbouring sector in the same region, if there is one.
    #[inline]
    #[must_use]
    pub fn next_sector(self) -> Option<Self> {
        (self.sector < SECTOR_COUNT).then_some(Self {
            region: self.region,
            sector: self.sector + 1,
        })
    }

    /// Offset of this sector's first channel within its region.
    #[inline]
    #[must_use]
    pub fn region_offset(self) -> u16 {
        u16::from(self.sector - 1) * CHANNELS_PER_MODULE
    }
}

// Unchecked wire form; validated on the way in
#[cfg(feature = "serde")]
#[derive(Clone, Copy, Serialize, Deserialize)]
struct RawGridPosition {
    region: u8,
    sector: u8,
}

#[cfg(feature = "serde")]
impl TryFrom<RawGridPosition> for GridPosition {
    type Error = Error;

    fn try_from(raw: RawGridPosition) -> Result<Self> {
        Self::new(raw.region, raw.sector)
    }
}

#[cfg(feature = "serde")]
impl From<GridPosition> for RawGridPosition {
    fn from(position: GridPosition) -> Self {
        Self {
            region: position.region,
            sector: position.sector,
        }
    }
}

impl std::fmt::Display for GridPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(ieta {}, iphi {})", self.region, self.sector)
    }
}

/// One row of a module position table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PositionEntry {
    /// VFAT module id.
    pub module: u32,
    /// iEta region.
    pub region: u32,
    /// iPhi sector.
    pub sector: u32,
}

/// Bidirectional lookup between module ids and grid positions.
///
/// Every module has exactly one position and every position exactly one
/// module. Instances can only be built through validating constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionMap {
    positions: [GridPosition; MODULE_COUNT],
    modules: [ModuleId; MODULE_COUNT],
}

impl Default for PositionMap {
    fn default() -> Self {
        Self::ge11()
    }
}

impl PositionMap {
    /// The GE1/1 layout: `ieta = 8 - vfat % 8`, `iphi = vfat / 8 + 1`.
    #[must_use]
    pub fn ge11() -> Self {
        let mut positions = [GridPosition {
            region: 1,
            sector: 1,
        }; MODULE_COUNT];
        let mut modules = [ModuleId(0); MODULE_COUNT];
        for module in ModuleId::all() {
            let position = GridPosition {
                region: REGION_COUNT - module.get() % REGION_COUNT,
                sector: module.get() / REGION_COUNT + 1,
            };
            positions[module.index()] = position;
            modules[position.index()] = module;
        }
        Self { positions, modules }
    }

    /// Builds a map from a position table.
    ///
    /// # Errors
    /// Fails if any module or position is out of range, repeated, or if a
    /// module in `0..24` is missing.
    pub fn from_entries<I>(entries: I) -> std::result::Result<Self, MappingError>
    where
        I: IntoIterator<Item = PositionEntry>,
    {
        let mut by_module: [Option<GridPosition>; MODULE_COUNT] = [None; MODULE_COUNT];
        let mut taken = [false; MODULE_COUNT];

        for entry in entries {
            let PositionEntry {
                module,
                region,
                sector,
            } = entry;
            let slot = usize::try_from(module)
                .ok()
                .filter(|&m| m < MODULE_COUNT)
                .ok_or(MappingError::ModuleOutOfRange { module })?;

            let position = match (u8::try_from(region), u8::try_from(sector)) {
                (Ok(r), Ok(s)) => GridPosition::new(r, s).ok(),
                _ => None,
            }
            .ok_or(MappingError::PositionOutOfRange {
                module,
                region,
                sector,
            })?;

            if by_module[slot].is_some() {
                return Err(MappingError::DuplicateModule { module });
            }
            if taken[position.index()] {
                return Err(MappingError::DuplicatePosition { region, sector });
            }
            by_module[slot] = Some(position);
            taken[position.index()] = true;
        }

        let mut positions = [GridPosition {
            region: 1,
            sector: 1,
        }; MODULE_COUNT];
        let mut modules = [ModuleId(0); MODULE_COUNT];
        for module in ModuleId::all() {
            let position = by_module[module.index()].ok_or(MappingError::MissingModule {
                module: u32::from(module.get()),
            })?;
            positions[module.index()] = position;
            modules[position.index()] = module;
        }

        Ok(Self { positions, modules })
    }

    /// Grid position of a module.
    #[inline]
    #[must_use]
    pub fn position(&self, module: ModuleId) -> GridPosition {
        self.positions[module.index()]
    }

    /// Module sitting at a grid position.
    #[inline]
    #[must_use]
    pub fn module_at(&self, position: GridPosition) -> ModuleId {
        self.modules[position.index()]
    }

    /// Iterates over `(module, position)` pairs in module order.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, GridPosition)> + '_ {
        ModuleId::all().map(move |m| (m, self.positions[m.index()]))
    }

    /// Returns the table as plain entries, e.g. for serialization.
    #[must_use]
    pub fn to_entries(&self) -> Vec<PositionEntry> {
        self.iter()
            .map(|(m, p)| PositionEntry {
                module: u32::from(m.get()),
                region: u32::from(p.region),
                sector: u32::from(p.sector),
            })
            .collect()
    }
}
