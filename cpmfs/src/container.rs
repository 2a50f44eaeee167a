// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Container layer: raw filesystem images (SSSD, hd1k) vs. the MBR-prefixed
//! combo image, and the MBR bytes themselves.

use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::alloc::Strategy;
use crate::geometry::Geometry;

pub const MBR_PREFIX_SIZE: u64 = 1024 * 1024;
pub const COMBO_SLICE_SIZE: u64 = 8 * 1024 * 1024;
pub const COMBO_SLICE_COUNT: u64 = 6;

const PARTITION_OFFSET: usize = 0x1BE;
const SIGNATURE_OFFSET: usize = 0x1FE;
const ROMWBW_HD1K_PARTITION_TYPE: u8 = 0x2E;

/// One of the three concrete on-disk formats this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Sssd,
    Hd1k,
    Combo,
}

impl Format {
    /// Geometry of the filesystem region this format exposes to `add`/`list`
    /// /`delete`/`extract` (the first slice, for combo).
    pub fn geometry(self) -> Geometry {
        match self {
            Format::Sssd => Geometry::SSSD,
            Format::Hd1k => Geometry::HD1K,
            Format::Combo => Geometry::COMBO_SLICE,
        }
    }

    /// Block allocator this format uses.
    pub fn strategy(self) -> Strategy {
        match self {
            Format::Sssd | Format::Hd1k => Strategy::Append,
            Format::Combo => Strategy::FirstFit,
        }
    }

    /// Byte offset of the addressable filesystem region within the whole
    /// image buffer.
    pub fn region_offset(self) -> u64 {
        match self {
            Format::Sssd | Format::Hd1k => 0,
            Format::Combo => MBR_PREFIX_SIZE,
        }
    }

    /// Total size of a freshly created image of this format.
    pub fn image_size(self) -> u64 {
        match self {
            Format::Sssd => Geometry::SSSD.total_bytes(),
            Format::Hd1k => Geometry::HD1K.total_bytes(),
            Format::Combo => MBR_PREFIX_SIZE + COMBO_SLICE_COUNT * COMBO_SLICE_SIZE,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct MbrPartitionEntry {
    boot_flag: u8,
    chs_start: [u8; 3],
    partition_type: u8,
    chs_end: [u8; 3],
    lba_start: U32,
    lba_count: U32,
}

/// Write the combo image's MBR: one RomWBW hd1k partition entry covering
/// everything after the 1 MiB prefix, plus the `55 AA` signature.
pub fn write_mbr(buf: &mut [u8], total_size: u64) {
    debug_assert!(buf.len() >= 512);
    let entry = MbrPartitionEntry {
        boot_flag: 0x00,
        chs_start: [0x01, 0x01, 0x00],
        partition_type: ROMWBW_HD1K_PARTITION_TYPE,
        chs_end: [0xFE, 0xFF, 0xFF],
        lba_start: U32::new(2048),
        lba_count: U32::new(((total_size - MBR_PREFIX_SIZE) / 512) as u32),
    };
    buf[PARTITION_OFFSET..PARTITION_OFFSET + size_of::<MbrPartitionEntry>()]
        .copy_from_slice(entry.as_bytes());
    buf[SIGNATURE_OFFSET] = 0x55;
    buf[SIGNATURE_OFFSET + 1] = 0xAA;
}

/// Whether `buf` carries a valid combo MBR: `55 AA` signature and a RomWBW
/// hd1k partition type at `0x1C2`.
pub fn has_combo_mbr(buf: &[u8]) -> bool {
    buf.len() >= 512
        && buf[SIGNATURE_OFFSET] == 0x55
        && buf[SIGNATURE_OFFSET + 1] == 0xAA
        && buf[PARTITION_OFFSET + 4] == ROMWBW_HD1K_PARTITION_TYPE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combo_mbr_matches_reference_byte_layout() {
        let mut buf = vec![0u8; 512];
        let total = Format::Combo.image_size();
        write_mbr(&mut buf, total);

        assert_eq!(&buf[0x1FE..0x200], &[0x55, 0xAA]);
        assert_eq!(buf[0x1C2], 0x2E);
        assert_eq!(u32::from_le_bytes(buf[0x1C6..0x1CA].try_into().unwrap()), 2048);
        assert_eq!(
            u32::from_le_bytes(buf[0x1CA..0x1CE].try_into().unwrap()),
            104_448
        );
        assert!(has_combo_mbr(&buf));
    }

    #[test]
    fn image_sizes_match_reference_constants() {
        assert_eq!(Format::Sssd.image_size(), 256_256);
        assert_eq!(Format::Hd1k.image_size(), 8_388_608);
        assert_eq!(Format::Combo.image_size(), 1_048_576 + 6 * 8_388_608);
    }
}
