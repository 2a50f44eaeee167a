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

//! 8.3 filename normalization and CP/M wildcard matching.

/// An 8.3 name split into its two fixed-width, space-padded, uppercase
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Name83 {
    pub name: [u8; 8],
    pub ext: [u8; 3],
}

impl Name83 {
    /// Normalize a host filename (e.g. `"hello.com"` or `"BIG.COM"`) to 8.3:
    /// uppercase, space-padded, truncated if the name or extension is too
    /// long.
    pub fn normalize(filename: &str) -> Name83 {
        let upper = filename.to_ascii_uppercase();
        let (stem, ext) = match upper.rsplit_once('.') {
            Some((s, e)) => (s, e),
            None => (upper.as_str(), ""),
        };
        Name83 {
            name: pad_field::<8>(stem.as_bytes()),
            ext: pad_field::<3>(ext.as_bytes()),
        }
    }

    pub fn to_11(self) -> [u8; 11] {
        let mut out = [0u8; 11];
        out[..8].copy_from_slice(&self.name);
        out[8..].copy_from_slice(&self.ext);
        out
    }

    pub fn display(&self) -> String {
        let name = trim_ascii(&self.name);
        let ext = trim_ascii(&self.ext);
        if ext.is_empty() {
            name
        } else {
            format!("{name}.{ext}")
        }
    }
}

fn pad_field<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [b' '; N];
    let n = bytes.len().min(N);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

fn trim_ascii(bytes: &[u8]) -> String {
    let trimmed = bytes
        .iter()
        .rev()
        .skip_while(|&&b| b == b' ')
        .collect::<Vec<_>>();
    trimmed
        .into_iter()
        .rev()
        .map(|&b| b as char)
        .collect::<String>()
}

/// Convert a CP/M wildcard pattern (e.g. `"*.COM"`, `"A*.*"`) to an 11-char
/// mask where `*` has been expanded to `?`-fill for the rest of its field.
pub fn pattern_to_mask(pattern: &str) -> [u8; 11] {
    let upper = pattern.to_ascii_uppercase();
    let (stem, ext) = match upper.rsplit_once('.') {
        Some((s, e)) => (s, e),
        None => (upper.as_str(), ""),
    };
    let mut out = [0u8; 11];
    out[..8].copy_from_slice(&expand_field::<8>(stem.as_bytes()));
    out[8..].copy_from_slice(&expand_field::<3>(ext.as_bytes()));
    out
}

fn expand_field<const N: usize>(bytes: &[u8]) -> [u8; N] {
    if let Some(star) = bytes.iter().position(|&b| b == b'*') {
        let mut out = [b' '; N];
        let keep = star.min(N);
        out[..keep].copy_from_slice(&bytes[..keep]);
        for b in out.iter_mut().skip(keep) {
            *b = b'?';
        }
        out
    } else {
        pad_field::<N>(bytes)
    }
}

/// Match an 11-char mask (`?` wildcard) against an 11-char name.
pub fn matches(mask: &[u8; 11], name: &[u8; 11]) -> bool {
    mask.iter()
        .zip(name.iter())
        .all(|(&m, &n)| m == b'?' || m == n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_pads_and_uppercases() {
        let n = Name83::normalize("hello.c");
        assert_eq!(&n.name, b"HELLO   ");
        assert_eq!(&n.ext, b"C  ");
    }

    #[test]
    fn normalize_truncates_long_fields() {
        let n = Name83::normalize("averylongname.text");
        assert_eq!(&n.name, b"AVERYLON");
        assert_eq!(&n.ext, b"TEX");
    }

    #[test]
    fn normalize_without_extension() {
        let n = Name83::normalize("README");
        assert_eq!(&n.name, b"README  ");
        assert_eq!(&n.ext, b"   ");
    }

    #[test]
    fn star_pattern_fills_with_question_marks() {
        assert_eq!(&pattern_to_mask("*.COM"), b"????????COM");
        assert_eq!(&pattern_to_mask("A*.*"), b"A??????????");
    }

    #[test]
    fn question_mark_matches_any_char() {
        let mask = pattern_to_mask("A?LLO.CO?");
        let full = Name83::normalize("ABLLO.COM").to_11();
        assert!(matches(&mask, &full));
        let full2 = Name83::normalize("AXLLO.COX").to_11();
        assert!(matches(&mask, &full2));
        let full3 = Name83::normalize("AXLLO.DOX").to_11();
        assert!(!matches(&mask, &full3));
    }
}
