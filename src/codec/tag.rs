//! Struct member tags.
//!
//! A tag is four ASCII characters in `0x20..=0x5F`, packed on the wire as
//! 24 bits: each character minus `0x20` contributes 6 bits, first
//! character in the most significant position.
//!
//! ```text
//! "GID " -> 100111 101001 100100 000000 -> 9E 99 00
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{BlazeError, Result};

/// Packed size of a tag on the wire.
pub const TAG_SIZE: usize = 3;

const CHAR_BIAS: u8 = 0x20;
const CHAR_MAX: u8 = 0x5F;

/// A four-character struct member tag.
///
/// Lowercase ASCII letters are folded to uppercase; shorter names are
/// padded with spaces.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag([u8; 4]);

impl Tag {
    /// Build a tag from up to four characters.
    ///
    /// # Example
    ///
    /// ```
    /// use blaze_client::codec::Tag;
    ///
    /// let tag = Tag::new("gid").unwrap();
    /// assert_eq!(tag.name(), "GID");
    /// assert_eq!(tag.pack(), [0x9E, 0x99, 0x00]);
    /// ```
    pub fn new(name: &str) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 {
            return Err(BlazeError::InvalidTag(name.to_string()));
        }

        let mut chars = [b' '; 4];
        for (slot, &byte) in chars.iter_mut().zip(bytes) {
            let upper = byte.to_ascii_uppercase();
            if !(CHAR_BIAS..=CHAR_MAX).contains(&upper) {
                return Err(BlazeError::InvalidTag(name.to_string()));
            }
            *slot = upper;
        }
        Ok(Self(chars))
    }

    /// Pack into the 3-byte wire form.
    pub fn pack(&self) -> [u8; TAG_SIZE] {
        let bits = self
            .0
            .iter()
            .fold(0u32, |acc, &c| (acc << 6) | u32::from((c - CHAR_BIAS) & 0x3F));
        [(bits >> 16) as u8, (bits >> 8) as u8, bits as u8]
    }

    /// Unpack from the 3-byte wire form. Every bit pattern is a valid tag.
    pub fn unpack(packed: [u8; TAG_SIZE]) -> Self {
        let bits =
            (u32::from(packed[0]) << 16) | (u32::from(packed[1]) << 8) | u32::from(packed[2]);
        let mut chars = [0u8; 4];
        for (i, c) in chars.iter_mut().enumerate() {
            let shift = 18 - 6 * i as u32;
            *c = ((bits >> shift) & 0x3F) as u8 + CHAR_BIAS;
        }
        Self(chars)
    }

    /// All four characters, including padding.
    pub fn as_str(&self) -> &str {
        // Only 0x20..=0x5F is ever stored, which is ASCII.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// The tag name without trailing padding.
    pub fn name(&self) -> &str {
        self.as_str().trim_end_matches(' ')
    }

    /// Raw character bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl FromStr for Tag {
    type Err = BlazeError;

    fn from_str(s: &str) -> Result<Self> {
        Tag::new(s)
    }
}

impl TryFrom<&str> for Tag {
    type Error = BlazeError;

    fn try_from(s: &str) -> Result<Self> {
        Tag::new(s)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:?})", self.as_str())
    }
}
