//! S-bit address to (VFAT, channel doublet) resolution.
//!
//! The 1536 usable addresses form 8 blocks of 192, one per iEta with the
//! block order reversed, each split into 3 sub-blocks of 64, one per iPhi.
//! Each address names a doublet of neighbouring channels.

use sbitpix_core::ModuleId;

/// Addresses at or above this value carry no data.
pub const VALID_ADDRESSES: u16 = 1536;
/// Addresses per iEta block.
pub const ADDRESSES_PER_REGION: u16 = 192;
/// Addresses per VFAT (one per doublet).
pub const ADDRESSES_PER_MODULE: u16 = 64;

/// A VFAT and the channel doublet an address points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedAddress {
    /// VFAT holding the doublet.
    pub module: ModuleId,
    /// Even channel of the doublet.
    pub first_channel: u8,
    /// Odd channel of the doublet, `first_channel + 1`.
    pub second_channel: u8,
}

/// Resolves an S-bit address.
///
/// Returns `None` for addresses `>= 1536`, the unused part of the address
/// space.
#[must_use]
pub fn resolve(address: u16) -> Option<ResolvedAddress> {
    if address >= VALID_ADDRESSES {
        return None;
    }

    let module = 7 - address / ADDRESSES_PER_REGION
        + ((address % ADDRESSES_PER_REGION) / ADDRESSES_PER_MODULE) * 8;
    let module = ModuleId::new(u8::try_from(module).ok()?).ok()?;

    let first_channel = u8::try_from(2 * (address % ADDRESSES_PER_MODULE)).ok()?;
    Some(ResolvedAddress {
        module,
        first_channel,
        second_channel: first_channel + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbitpix_core::{PositionMap, MODULE_COUNT};

    #[test]
    fn test_first_address() {
        let r = resolve(0).unwrap();
        assert_eq!(r.module.get(), 7);
        assert_eq!((r.first_channel, r.second_channel), (0, 1));
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(resolve(1535).is_some());
        assert!(resolve(1536).is_none());
        assert!(resolve(2047).is_none());
    }

    #[test]
    fn test_block_boundaries() {
        // last doublet of the first sub-block
        let r = resolve(63).unwrap();
        assert_eq!(r.module.get(), 7);
        assert_eq!(r.first_channel, 126);

        // second sub-block of the same iEta block: +8 stride
        assert_eq!(resolve(64).unwrap().module.get(), 15);
        assert_eq!(resolve(128).unwrap().module.get(), 23);

        // next iEta block counts down
        assert_eq!(resolve(192).unwrap().module.get(), 6);
        assert_eq!(resolve(1535).unwrap().module.get(), 16);
    }

    #[test]
    fn test_each_doublet_addressed_once() {
        let mut seen = vec![[false; 64]; MODULE_COUNT];
        for address in 0..VALID_ADDRESSES {
            let r = resolve(address).unwrap();
            assert_eq!(r.first_channel % 2, 0);
            assert_eq!(r.second_channel, r.first_channel + 1);
            let slot = &mut seen[r.module.index()][usize::from(r.first_channel / 2)];
            assert!(!*slot, "address {address} resolves to a doublet seen before");
            *slot = true;
        }
        assert!(seen.iter().flatten().all(|&s| s));
    }

    #[test]
    fn test_address_blocks_follow_ge11_layout() {
        let positions = PositionMap::ge11();
        for address in 0..VALID_ADDRESSES {
            let r = resolve(address).unwrap();
            let p = positions.position(r.module);
            assert_eq!(u16::from(p.region), 1 + address / ADDRESSES_PER_REGION);
            assert_eq!(
                u16::from(p.sector),
                1 + (address % ADDRESSES_PER_REGION) / ADDRESSES_PER_MODULE
            );
            assert_eq!(resolve(address), Some(r));
        }
    }
}
