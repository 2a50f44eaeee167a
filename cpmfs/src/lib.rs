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

//! CP/M disk image filesystem. Operates on an owned byte buffer representing
//! a whole image; callers (the CLI) own file I/O.

pub use cpmfs_err::{Error, Result};

pub mod alloc;
pub mod container;
pub mod detect;
pub mod direntry;
pub mod filename;
pub mod geometry;
pub mod ops;

pub use container::Format;
pub use ops::Listing;

/// A CP/M image held entirely in memory: the format it was detected or
/// created as, and the full backing buffer (including any container prefix).
pub struct Disk {
    format: Format,
    buffer: Vec<u8>,
}

impl Disk {
    /// Create a freshly formatted image of `format`.
    pub fn create(format: Format) -> Result<Disk> {
        let mut buffer = vec![0u8; format.image_size() as usize];
        if let Format::Combo = format {
            container::write_mbr(&mut buffer, format.image_size());
            for slice in 0..container::COMBO_SLICE_COUNT {
                let offset = container::MBR_PREFIX_SIZE + slice * container::COMBO_SLICE_SIZE;
                let region = region_mut(&mut buffer, offset, format.geometry().total_bytes());
                ops::format(region, &format.geometry())?;
            }
        } else {
            let region = region_mut(&mut buffer, 0, format.geometry().total_bytes());
            ops::format(region, &format.geometry())?;
        }
        log::info!("created {format:?} image, {} bytes", buffer.len());
        Ok(Disk { format, buffer })
    }

    /// Load an existing image, auto-detecting its format unless `explicit`
    /// overrides detection.
    pub fn open(buffer: Vec<u8>, explicit: Option<Format>) -> Result<Disk> {
        let format = detect::resolve(&buffer, explicit)?;
        log::debug!("opened image as {format:?}, {} bytes", buffer.len());
        Ok(Disk { format, buffer })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn region(&self) -> &[u8] {
        let geometry = self.format.geometry();
        region_ref(&self.buffer, self.format.region_offset(), geometry.total_bytes())
    }

    fn region_mut(&mut self) -> &mut [u8] {
        let geometry = self.format.geometry();
        region_mut(&mut self.buffer, self.format.region_offset(), geometry.total_bytes())
    }

    /// Add a host file, normalized to 8.3, under `user`.
    pub fn add(&mut self, filename: &str, data: &[u8], sys_attr: bool, user: u8) -> Result<()> {
        let geometry = self.format.geometry();
        let strategy = self.format.strategy();
        let region = self.region_mut();
        let result = ops::add(region, &geometry, strategy, user, filename, data, sys_attr);
        match &result {
            Ok(()) => log::info!("added {filename} ({} bytes)", data.len()),
            Err(err) => log::error!("failed to add {filename}: {err}"),
        }
        result
    }

    /// List every file on the image, sorted by `(user, name)`.
    pub fn list(&self) -> Vec<Listing> {
        let geometry = self.format.geometry();
        ops::list(self.region(), &geometry)
    }

    /// Delete every live entry under `user` matching `pattern`. Returns the
    /// number of physical directory entries marked.
    pub fn delete(&mut self, pattern: &str, user: u8) -> u32 {
        let geometry = self.format.geometry();
        let region = self.region_mut();
        let marked = ops::delete(region, &geometry, user, pattern);
        log::debug!("delete {pattern}: {marked} entries marked");
        marked
    }

    /// Extract a file's full contents, or `None` if no live entry matches.
    pub fn extract(&self, filename: &str, user: u8) -> Option<Vec<u8>> {
        let geometry = self.format.geometry();
        ops::extract(self.region(), &geometry, user, filename)
    }
}

fn region_ref(buffer: &[u8], offset: u64, len: u64) -> &[u8] {
    let offset = offset as usize;
    &buffer[offset..offset + len as usize]
}

fn region_mut(buffer: &mut [u8], offset: u64, len: u64) -> &mut [u8] {
    let offset = offset as usize;
    &mut buffer[offset..offset + len as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_sssd_then_add_list_extract() {
        let mut disk = Disk::create(Format::Sssd).unwrap();
        disk.add("HELLO.COM", &vec![0u8; 2048], false, 0).unwrap();

        let listings = disk.list();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].name, "HELLO.COM");
        assert_eq!(listings[0].size, 2048);
        assert_eq!(listings[0].blocks, 2);

        let extracted = disk.extract("HELLO.COM", 0).unwrap();
        assert_eq!(extracted.len(), 2048);
    }

    #[test]
    fn combo_create_emits_valid_mbr() {
        let disk = Disk::create(Format::Combo).unwrap();
        let buffer = disk.into_bytes();
        assert_eq!(&buffer[0x1FE..0x200], &[0x55, 0xAA]);
        assert_eq!(buffer[0x1C2], 0x2E);
        assert_eq!(
            u32::from_le_bytes(buffer[0x1C6..0x1CA].try_into().unwrap()),
            2048
        );
        assert_eq!(
            u32::from_le_bytes(buffer[0x1CA..0x1CE].try_into().unwrap()),
            104_448
        );
    }

    #[test]
    fn open_detects_format_from_length() {
        let disk = Disk::create(Format::Hd1k).unwrap();
        let buffer = disk.into_bytes();
        let reopened = Disk::open(buffer, None).unwrap();
        assert_eq!(reopened.format(), Format::Hd1k);
    }

    #[test]
    fn delete_then_add_cycle_preserves_listability() {
        let mut disk = Disk::create(Format::Hd1k).unwrap();
        disk.add("A.TXT", b"x", false, 0).unwrap();
        disk.add("B.TXT", b"y", false, 0).unwrap();
        disk.delete("A.TXT", 0);

        let listings = disk.list();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].name, "B.TXT");
    }
}
