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

//! Format auto-detection by image length (and, for the combo case, the MBR
//! signature), with support for an explicit override.

use cpmfs_err::Result;

use crate::container::{has_combo_mbr, Format};

/// SSSD's tolerance band around its nominal 256,256-byte size (77 tracks of
/// 26×128-byte sectors, less reserved tracks' rounding in odd dumps).
const SSSD_SIZE_LOW: u64 = 243_000;
const SSSD_SIZE_HIGH: u64 = 260_000;

/// Identify `buf`'s format from its length and, for the combo size range,
/// its MBR. Total over all lengths: size-based detection never fails,
/// falling through to `hd1k`/`sssd` by size alone when no signature matches.
pub fn detect(buf: &[u8]) -> Result<Format> {
    let size = buf.len() as u64;

    if size == Format::Sssd.image_size() || (SSSD_SIZE_LOW < size && size < SSSD_SIZE_HIGH) {
        return Ok(Format::Sssd);
    }

    if size >= Format::Combo.image_size() && has_combo_mbr(buf) {
        return Ok(Format::Combo);
    }

    if size == Format::Hd1k.image_size() {
        return Ok(Format::Hd1k);
    }

    if size > 1_000_000 {
        Ok(Format::Hd1k)
    } else {
        Ok(Format::Sssd)
    }
}

/// Resolve the format to use: the caller's explicit choice if given,
/// otherwise auto-detection from `buf`.
pub fn resolve(buf: &[u8], explicit: Option<Format>) -> Result<Format> {
    match explicit {
        Some(format) => Ok(format),
        None => detect(buf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::write_mbr;

    #[test]
    fn detects_sssd_by_length() {
        let buf = vec![0u8; Format::Sssd.image_size() as usize];
        assert_eq!(detect(&buf).unwrap(), Format::Sssd);
    }

    #[test]
    fn detects_hd1k_by_length() {
        let buf = vec![0u8; Format::Hd1k.image_size() as usize];
        assert_eq!(detect(&buf).unwrap(), Format::Hd1k);
    }

    #[test]
    fn combo_length_without_mbr_signature_falls_back_to_hd1k() {
        let buf = vec![0u8; Format::Combo.image_size() as usize];
        assert_eq!(detect(&buf).unwrap(), Format::Hd1k);
    }

    #[test]
    fn detects_combo_by_length_and_mbr() {
        let mut buf = vec![0u8; Format::Combo.image_size() as usize];
        write_mbr(&mut buf, Format::Combo.image_size());
        assert_eq!(detect(&buf).unwrap(), Format::Combo);
    }

    #[test]
    fn combo_sized_buffer_larger_than_the_nominal_size_still_detects_by_mbr() {
        let mut buf = vec![0u8; Format::Combo.image_size() as usize + 4096];
        write_mbr(&mut buf, Format::Combo.image_size());
        assert_eq!(detect(&buf).unwrap(), Format::Combo);
    }

    #[test]
    fn near_sssd_size_falls_within_the_tolerance_band() {
        let buf = vec![0u8; 250_000];
        assert_eq!(detect(&buf).unwrap(), Format::Sssd);
    }

    #[test]
    fn unrecognized_small_length_falls_back_to_sssd() {
        let buf = vec![0u8; 12345];
        assert_eq!(detect(&buf).unwrap(), Format::Sssd);
    }

    #[test]
    fn unrecognized_large_length_falls_back_to_hd1k() {
        let buf = vec![0u8; 2_000_000];
        assert_eq!(detect(&buf).unwrap(), Format::Hd1k);
    }

    #[test]
    fn explicit_override_bypasses_detection() {
        let buf = vec![0u8; 12345];
        assert_eq!(resolve(&buf, Some(Format::Sssd)).unwrap(), Format::Sssd);
    }
}
