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

//! Immutable per-format geometry constants.
//!
//! A [`Geometry`] carries every format-specific number the rest of the crate
//! needs (sector/block sizing, directory size, pointer width, EXM). The
//! filesystem operations in [`crate::ops`] are written once against this
//! record rather than once per format.

/// Width of a directory entry's block pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    /// SSSD: 16 one-byte pointers per entry.
    Eight,
    /// hd1k/combo: 8 two-byte little-endian pointers per entry.
    Sixteen,
}

impl PointerWidth {
    pub fn pointers_per_entry(self) -> usize {
        match self {
            PointerWidth::Eight => 16,
            PointerWidth::Sixteen => 8,
        }
    }
}

/// Immutable geometry description for one CP/M disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub sector_size: u32,
    pub sectors_per_track: u32,
    pub reserved_tracks: u32,
    pub block_size: u32,
    pub dir_entries: u32,
    pub pointer_width: PointerWidth,
    /// Extent mask: logical extents per physical directory entry, minus one.
    pub exm: u8,
}

impl Geometry {
    pub const SSSD: Geometry = Geometry {
        sector_size: 128,
        sectors_per_track: 26,
        reserved_tracks: 2,
        block_size: 1024,
        dir_entries: 64,
        pointer_width: PointerWidth::Eight,
        exm: 0,
    };

    pub const HD1K: Geometry = Geometry {
        sector_size: 512,
        sectors_per_track: 16,
        reserved_tracks: 2,
        block_size: 4096,
        dir_entries: 1024,
        pointer_width: PointerWidth::Sixteen,
        exm: 1,
    };

    /// One combo slice shares hd1k's block/directory layout but the
    /// reference tool's combo allocator advances one full extent per
    /// physical directory entry rather than two (EXM=0, not 1 — see the
    /// data model table).
    pub const COMBO_SLICE: Geometry = Geometry {
        exm: 0,
        ..Geometry::HD1K
    };

    /// Bytes occupied by the directory (rounded up to whole blocks).
    pub fn dir_bytes(&self) -> u32 {
        self.dir_entries * 32
    }

    /// Number of blocks occupied by the directory.
    pub fn dir_blocks(&self) -> u32 {
        self.dir_bytes().div_ceil(self.block_size)
    }

    /// Total on-disk footprint of this format (77 tracks for SSSD, 8 MiB for
    /// hd1k/combo slices), including the reserved boot tracks.
    pub fn total_bytes(&self) -> u64 {
        match self.pointer_width {
            PointerWidth::Eight => 77 * self.sectors_per_track as u64 * self.sector_size as u64,
            PointerWidth::Sixteen => 8 * 1024 * 1024,
        }
    }

    /// Bytes reserved for boot tracks before the directory begins.
    pub fn reserved_bytes(&self) -> u64 {
        self.reserved_tracks as u64 * self.sectors_per_track as u64 * self.sector_size as u64
    }

    /// Byte offset of directory block 0, relative to the start of this
    /// format's region (i.e. after the reserved boot tracks).
    pub fn dir_start(&self) -> u64 {
        self.reserved_bytes()
    }

    /// Byte offset of block `n`, relative to the start of this format's
    /// region.
    pub fn block_offset(&self, block: u32) -> u64 {
        self.dir_start() + block as u64 * self.block_size as u64
    }

    /// Number of 128-byte records that fit in one block.
    pub fn records_per_block(&self) -> u32 {
        self.block_size / 128
    }

    /// Number of 128-byte records covered by one physical directory entry.
    pub fn records_per_physical_extent(&self) -> u32 {
        128 * (self.exm as u32 + 1)
    }

    /// Number of blocks referenced by one physical directory entry.
    pub fn blocks_per_physical_extent(&self) -> usize {
        self.pointer_width.pointers_per_entry()
    }

    /// Total number of blocks addressable after the directory, within this
    /// format's region.
    pub fn region_blocks(&self) -> u32 {
        ((self.total_bytes() - self.reserved_bytes()) / self.block_size as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sssd_matches_reference_constants() {
        assert_eq!(Geometry::SSSD.dir_blocks(), 2);
        assert_eq!(Geometry::SSSD.total_bytes(), 256_256);
        assert_eq!(Geometry::SSSD.dir_start(), 6656);
        assert_eq!(Geometry::SSSD.records_per_block(), 8);
        assert_eq!(Geometry::SSSD.blocks_per_physical_extent(), 16);
    }

    #[test]
    fn hd1k_matches_reference_constants() {
        assert_eq!(Geometry::HD1K.dir_blocks(), 8);
        assert_eq!(Geometry::HD1K.total_bytes(), 8_388_608);
        assert_eq!(Geometry::HD1K.dir_start(), 0x4000);
        assert_eq!(Geometry::HD1K.records_per_block(), 32);
        assert_eq!(Geometry::HD1K.blocks_per_physical_extent(), 8);
        assert_eq!(Geometry::HD1K.records_per_physical_extent(), 256);
    }
}
