//! MD5 content hashes
//!
//! Profiles are identified by the MD5 of their bytes, and cache keys for
//! long descriptions ("hash texts") are the MD5 of the text.

use std::fmt;

use md5::{Digest, Md5};

use crate::icc::{HEADER_SIZE, SignatureField};

/// 16-byte MD5 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; 16]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Md5::digest(bytes).into())
    }

    pub fn of_text(text: &str) -> Self {
        Self::of(text.as_bytes())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 16]
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// ICC profile ID: MD5 over the profile with flags, intent and the ID field zeroed
pub fn profile_id(data: &[u8]) -> ContentHash {
    if data.len() < HEADER_SIZE {
        return ContentHash::of(data);
    }
    let mut hasher = Md5::new();
    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&data[..HEADER_SIZE]);
    for (start, len) in [
        (SignatureField::Flags.offset(), 4),
        (SignatureField::Intent.offset(), 4),
        (84, 16),
    ] {
        header[start..start + len].fill(0);
    }
    hasher.update(header);
    hasher.update(&data[HEADER_SIZE..]);
    ContentHash(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(ContentHash::of(b"").to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            ContentHash::of_text("abc").to_hex(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn test_hash_changes_with_bytes() {
        let mut data = vec![7u8; 200];
        let a = ContentHash::of(&data);
        assert_eq!(a, ContentHash::of(&data));
        data[150] = 8;
        assert_ne!(a, ContentHash::of(&data));
    }

    #[test]
    fn test_profile_id_ignores_intent_and_flags() {
        let mut data = vec![1u8; 256];
        let id = profile_id(&data);
        data[64..68].copy_from_slice(&[0, 0, 0, 3]);
        data[44] = 0xFF;
        data[84..100].fill(0xAB);
        assert_eq!(profile_id(&data), id);
        data[200] = 0;
        assert_ne!(profile_id(&data), id);
    }
}
