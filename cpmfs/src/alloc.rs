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

//! Block allocation: the append-only allocator (SSSD, single-slice hd1k) and
//! the first-fit allocator (combo), per DESIGN NOTES §9.

use std::collections::HashSet;

use cpmfs_err::{Error, Result};

use crate::direntry::{self, Slot};
use crate::geometry::Geometry;

/// Which allocator a format uses. Both coexist rather than unifying on one,
/// matching the reference tool's per-format behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Append,
    FirstFit,
}

/// First free directory entry index, or `None` if the directory is full.
pub fn find_free_dir_entry(region: &[u8], geometry: &Geometry, dir_entries: u32) -> Option<u32> {
    let dir_start = geometry.dir_start();
    (0..dir_entries).find(|&i| direntry::is_empty_slot(region, dir_start, i))
}

/// Highest block pointer referenced by any live entry, or `dir_blocks - 1` if
/// none (the reference tool's append allocator always seeds here, even on an
/// empty disk — see DESIGN NOTES §9's documented open question).
pub fn find_max_block(region: &[u8], geometry: &Geometry, dir_entries: u32) -> u32 {
    let dir_start = geometry.dir_start();
    let mut max_block = geometry.dir_blocks() - 1;
    for i in 0..dir_entries {
        let Slot::Occupied(entry) = direntry::read_entry(region, dir_start, i, geometry.pointer_width)
        else {
            continue;
        };
        for &p in &entry.pointers {
            if p != 0 && p as u32 > max_block {
                max_block = p as u32;
            }
        }
    }
    max_block
}

/// All blocks in use: the directory's own blocks plus every non-zero pointer
/// referenced by a live entry.
pub fn find_used_blocks(region: &[u8], geometry: &Geometry, dir_entries: u32) -> HashSet<u32> {
    let dir_start = geometry.dir_start();
    let mut used: HashSet<u32> = (0..geometry.dir_blocks()).collect();
    for i in 0..dir_entries {
        let Slot::Occupied(entry) = direntry::read_entry(region, dir_start, i, geometry.pointer_width)
        else {
            continue;
        };
        for &p in &entry.pointers {
            if p != 0 {
                used.insert(p as u32);
            }
        }
    }
    used
}

/// Allocate `num_blocks` blocks for a new file under `strategy`.
pub fn allocate(
    region: &[u8],
    geometry: &Geometry,
    dir_entries: u32,
    num_blocks: u32,
    strategy: Strategy,
) -> Result<Vec<u32>> {
    match strategy {
        Strategy::Append => {
            let start = find_max_block(region, geometry, dir_entries) + 1;
            let end = start + num_blocks;
            if end > geometry.region_blocks() {
                return Err(Error::NoFreeBlocks);
            }
            Ok((start..end).collect())
        }
        Strategy::FirstFit => {
            let mut used = find_used_blocks(region, geometry, dir_entries);
            let mut blocks = Vec::with_capacity(num_blocks as usize);
            for _ in 0..num_blocks {
                let block = (geometry.dir_blocks()..geometry.region_blocks())
                    .find(|b| !used.contains(b))
                    .ok_or(Error::NoFreeBlocks)?;
                used.insert(block);
                blocks.push(block);
            }
            Ok(blocks)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direntry::{write_entry, DirEntry};

    fn sssd_region() -> Vec<u8> {
        let geometry = Geometry::SSSD;
        let mut region = vec![0xE5u8; geometry.dir_start() as usize + geometry.dir_bytes() as usize];
        region.resize(geometry.total_bytes() as usize, 0);
        for i in 0..geometry.dir_entries {
            direntry::clear_entry(&mut region, geometry.dir_start(), i);
        }
        region
    }

    #[test]
    fn empty_disk_seeds_append_at_dir_blocks() {
        let region = sssd_region();
        let geometry = Geometry::SSSD;
        assert_eq!(find_max_block(&region, &geometry, geometry.dir_entries), 1);
        let blocks = allocate(&region, &geometry, geometry.dir_entries, 3, Strategy::Append).unwrap();
        assert_eq!(blocks, vec![2, 3, 4]);
    }

    #[test]
    fn first_fit_skips_blocks_in_use() {
        let geometry = Geometry::HD1K;
        let mut region = vec![0u8; geometry.total_bytes() as usize];
        for i in 0..geometry.dir_entries {
            direntry::clear_entry(&mut region, geometry.dir_start(), i);
        }
        let entry = DirEntry {
            user: 0,
            name: *b"A       ",
            ext: *b"   ",
            el: 0,
            s2: 0,
            rc: 1,
            pointers: vec![8, 9, 0, 0, 0, 0, 0, 0],
        };
        write_entry(&mut region, geometry.dir_start(), 0, &entry, geometry.pointer_width);

        let blocks = allocate(&region, &geometry, geometry.dir_entries, 2, Strategy::FirstFit).unwrap();
        assert_eq!(blocks, vec![10, 11]);
    }

    #[test]
    fn append_fails_past_region_end() {
        let region = sssd_region();
        let geometry = Geometry::SSSD;
        let result = allocate(
            &region,
            &geometry,
            geometry.dir_entries,
            geometry.region_blocks() + 1,
            Strategy::Append,
        );
        assert!(matches!(result, Err(Error::NoFreeBlocks)));
    }
}
