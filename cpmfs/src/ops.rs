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

//! Filesystem operations: `format`, `add`, `list`, `delete`, `extract`, all
//! working directly on a geometry's region within an owned byte buffer.

use std::collections::BTreeMap;

use cpmfs_err::{Error, Result};

use crate::alloc::{self, Strategy};
use crate::direntry::{self, DirEntry, Slot, ATTR_MASK, EMPTY_MARKER, SYS_BIT};
use crate::filename::{self, Name83};
use crate::geometry::Geometry;

/// Padding byte for the unused tail of a file's last block.
pub const PAD_BYTE: u8 = 0x1A;

/// Zero-fill `region` and mark every directory slot empty.
pub fn format(region: &mut [u8], geometry: &Geometry) -> Result<()> {
    if (region.len() as u64) < geometry.total_bytes() {
        return Err(Error::BadGeometry {
            needed: geometry.total_bytes() as usize,
            have: region.len(),
        });
    }
    region.fill(0);
    for i in 0..geometry.dir_entries {
        direntry::clear_entry(region, geometry.dir_start(), i);
    }
    Ok(())
}

fn live_entries(region: &[u8], geometry: &Geometry) -> Vec<DirEntry> {
    let dir_start = geometry.dir_start();
    (0..geometry.dir_entries)
        .filter_map(|i| match direntry::read_entry(region, dir_start, i, geometry.pointer_width) {
            Slot::Occupied(entry) if entry.user < 32 => Some(entry),
            _ => None,
        })
        .collect()
}

/// Add a host file to the image under `user`, normalizing `filename` to 8.3.
pub fn add(
    region: &mut [u8],
    geometry: &Geometry,
    strategy: Strategy,
    user: u8,
    filename: &str,
    data: &[u8],
    sys_attr: bool,
) -> Result<()> {
    let name83 = Name83::normalize(filename);
    let records_per_block = geometry.records_per_block();
    let block_size = geometry.block_size as usize;
    let num_records = data.len().div_ceil(128) as u32;
    let num_blocks = (data.len().div_ceil(block_size)) as u32;

    let blocks = alloc::allocate(region, geometry, geometry.dir_entries, num_blocks, strategy)?;

    for (i, &block) in blocks.iter().enumerate() {
        let start = i * block_size;
        let end = (start + block_size).min(data.len());
        let offset = geometry.block_offset(block) as usize;
        let dest = &mut region[offset..offset + block_size];
        dest.fill(PAD_BYTE);
        dest[..end - start].copy_from_slice(&data[start..end]);
    }

    let mut ext = name83.ext;
    if sys_attr {
        ext[1] |= SYS_BIT;
    }

    let pointers_per_entry = geometry.pointer_width.pointers_per_entry() as u32;
    let mut block_idx: u32 = 0;
    let mut physical_extent_num: u32 = 0;
    while block_idx < num_blocks {
        let slot = alloc::find_free_dir_entry(region, geometry, geometry.dir_entries)
            .ok_or(Error::DirectoryFull)?;

        let chunk_end = (block_idx + pointers_per_entry).min(num_blocks);
        let chunk: Vec<u16> = blocks[block_idx as usize..chunk_end as usize]
            .iter()
            .map(|&b| b as u16)
            .collect();

        let records_before = block_idx * records_per_block;
        let records_in_extent = chunk.len() as u32 * records_per_block;
        let records_covered = (records_before + records_in_extent).min(num_records);
        let records_in_last_logical = if records_covered > 0 {
            (records_covered - 1) % 128 + 1
        } else {
            0
        };
        let last_logical = if geometry.exm == 1 && records_covered > records_before + 128 {
            1
        } else {
            0
        };
        let full_extent = physical_extent_num * (geometry.exm as u32 + 1) + last_logical;

        let mut entry = DirEntry {
            user,
            name: name83.name,
            ext,
            el: 0,
            s2: 0,
            rc: records_in_last_logical as u8,
            pointers: chunk,
        };
        entry.set_full_extent(full_extent as u16);
        direntry::write_entry(region, geometry.dir_start(), slot, &entry, geometry.pointer_width);

        block_idx = chunk_end;
        physical_extent_num += 1;
    }

    Ok(())
}

/// One file as reported by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub user: u8,
    pub name: String,
    pub size: u64,
    pub blocks: u32,
}

fn identity_key(entry: &DirEntry) -> (u8, [u8; 8], [u8; 3]) {
    (entry.user, entry.masked_name(), entry.masked_ext())
}

/// Group an identity's live entries by full extent number, skipping entries
/// with non-printable names/extensions (residual garbage).
fn group_files(entries: &[DirEntry]) -> BTreeMap<(u8, [u8; 8], [u8; 3]), BTreeMap<u16, &DirEntry>> {
    let mut files: BTreeMap<(u8, [u8; 8], [u8; 3]), BTreeMap<u16, &DirEntry>> = BTreeMap::new();
    for entry in entries {
        if !entry.is_valid() {
            continue;
        }
        files
            .entry(identity_key(entry))
            .or_default()
            .insert(entry.full_extent(), entry);
    }
    files
}

/// List every file, sorted by `(user, name)`.
pub fn list(region: &[u8], geometry: &Geometry) -> Vec<Listing> {
    let entries = live_entries(region, geometry);
    let files = group_files(&entries);

    let mut listings: Vec<Listing> = files
        .into_iter()
        .map(|((user, name, ext), extents)| {
            let last = extents.values().next_back().expect("at least one extent");
            let last_extent = *extents.keys().next_back().expect("at least one extent");
            let size = last_extent as u64 * 128 * 128 + last.rc as u64 * 128;
            let blocks = extents
                .values()
                .map(|e| e.pointers.iter().filter(|&&p| p != 0).count() as u32)
                .sum();
            Listing {
                user,
                name: display_name(&name, &ext),
                size,
                blocks,
            }
        })
        .collect();

    listings.sort_by(|a, b| (a.user, &a.name).cmp(&(b.user, &b.name)));
    listings
}

fn display_name(name: &[u8; 8], ext: &[u8; 3]) -> String {
    let name83 = Name83 { name: *name, ext: *ext };
    name83.display()
}

/// Mark every live entry matching `pattern` under `user` as deleted. Returns
/// how many physical entries were marked.
pub fn delete(region: &mut [u8], geometry: &Geometry, user: u8, pattern: &str) -> u32 {
    let mask = filename::pattern_to_mask(pattern);
    let dir_start = geometry.dir_start();
    let mut marked = 0;
    for i in 0..geometry.dir_entries {
        let Slot::Occupied(entry) = direntry::read_entry(region, dir_start, i, geometry.pointer_width)
        else {
            continue;
        };
        if entry.user != user {
            continue;
        }
        let mut name11 = [0u8; 11];
        name11[..8].copy_from_slice(&entry.masked_name());
        name11[8..].copy_from_slice(&entry.masked_ext());
        if filename::matches(&mask, &name11) {
            direntry::clear_entry(region, dir_start, i);
            marked += 1;
        }
    }
    marked
}

/// Read a file's full contents, or `None` if no live entry matches.
pub fn extract(region: &[u8], geometry: &Geometry, user: u8, filename: &str) -> Option<Vec<u8>> {
    let name83 = Name83::normalize(filename);
    let entries = live_entries(region, geometry);
    let key = (user, mask_fixed(&name83.name), mask_fixed(&name83.ext));

    let files = group_files(&entries);
    let extents = files.get(&key)?;
    if extents.is_empty() {
        return None;
    }

    let last_extent = *extents.keys().next_back().expect("at least one extent");
    let last = extents[&last_extent];
    let size = last_extent as u64 * 128 * 128 + last.rc as u64 * 128;

    let mut bytes = Vec::new();
    for entry in extents.values() {
        for &block in &entry.pointers {
            if block == 0 {
                continue;
            }
            let offset = geometry.block_offset(block as u32) as usize;
            bytes.extend_from_slice(&region[offset..offset + geometry.block_size as usize]);
        }
    }
    bytes.truncate(size as usize);
    Some(bytes)
}

fn mask_fixed<const N: usize>(bytes: &[u8; N]) -> [u8; N] {
    let mut out = *bytes;
    for b in out.iter_mut() {
        *b &= ATTR_MASK;
    }
    out
}
