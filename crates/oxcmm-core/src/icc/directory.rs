//! Tag directory reading and profile serialization
//!
//! The directory follows the header: a tag count at offset 128 and one
//! 12-byte entry (signature, offset, size) per tag starting at 132.

use super::error::IccError;
use super::header::{HEADER_SIZE, IccHeader, MIN_PROFILE_SIZE, SignatureField};
use super::types::TagSignature;
use crate::bytes::{align4, pad4, push_u32, read_u32, write_u32};

/// Size of one directory entry
pub const ENTRY_SIZE: usize = 12;

/// One entry of the tag directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagEntry {
    pub signature: TagSignature,
    pub offset: u32,
    pub size: u32,
}

impl TagEntry {
    /// Whether `offset + size` lies inside a buffer of `len` bytes
    pub fn fits(&self, len: usize) -> bool {
        (self.offset as usize)
            .checked_add(self.size as usize)
            .is_some_and(|end| end <= len)
    }

    /// The entry's payload, or the bounds error describing why not
    pub fn payload<'a>(&self, data: &'a [u8]) -> Result<&'a [u8], IccError> {
        if !self.fits(data.len()) {
            return Err(IccError::TagOutOfBounds {
                tag: self.signature.0,
                offset: self.offset,
                size: self.size,
                profile_size: data.len(),
            });
        }
        let start = self.offset as usize;
        Ok(&data[start..start + self.size as usize])
    }
}

/// Read the tag count and all directory entries.
///
/// Entries are returned even when they point outside of `data`; the
/// caller decides per tag.
pub fn read_directory(data: &[u8]) -> Result<Vec<TagEntry>, IccError> {
    let count = read_u32(data, HEADER_SIZE).ok_or(IccError::TooSmall {
        expected: MIN_PROFILE_SIZE,
        actual: data.len(),
    })?;

    let table_end = (count as usize)
        .checked_mul(ENTRY_SIZE)
        .and_then(|n| n.checked_add(MIN_PROFILE_SIZE));
    if table_end.is_none_or(|end| end > data.len()) {
        return Err(IccError::TagTableTruncated {
            count,
            actual: data.len(),
        });
    }

    let entries = (0..count as usize)
        .filter_map(|i| {
            let at = MIN_PROFILE_SIZE + i * ENTRY_SIZE;
            Some(TagEntry {
                signature: TagSignature(read_u32(data, at)?),
                offset: read_u32(data, at + 4)?,
                size: read_u32(data, at + 8)?,
            })
        })
        .collect();
    Ok(entries)
}

/// Serialize a header and tag payloads into a profile buffer.
///
/// Offsets are recomputed and payloads are 4-byte aligned. Tags whose
/// payload bytes are identical share one copy, as ICC permits. Tags with
/// empty payloads are skipped. The header size field is rewritten.
pub fn write_profile(header: &IccHeader, tags: &[(TagSignature, &[u8])]) -> Vec<u8> {
    let tags: Vec<(TagSignature, &[u8])> = tags
        .iter()
        .filter(|(_, payload)| !payload.is_empty())
        .copied()
        .collect();
    let table_size = MIN_PROFILE_SIZE + tags.len() * ENTRY_SIZE;

    let payload_size: usize = tags.iter().map(|(_, payload)| align4(payload.len())).sum();
    let mut out = Vec::with_capacity(table_size + payload_size);
    out.extend_from_slice(header.as_bytes());
    push_u32(&mut out, tags.len() as u32);
    out.resize(table_size, 0);
    pad4(&mut out);

    let mut written: Vec<(usize, &[u8])> = Vec::with_capacity(tags.len());
    for (i, &(sig, payload)) in tags.iter().enumerate() {
        let offset = match written.iter().find(|(_, p)| *p == payload) {
            Some((offset, _)) => *offset,
            None => {
                let offset = out.len();
                out.extend_from_slice(payload);
                pad4(&mut out);
                written.push((offset, payload));
                offset
            }
        };
        let at = MIN_PROFILE_SIZE + i * ENTRY_SIZE;
        write_u32(&mut out, at, sig.0);
        write_u32(&mut out, at + 4, offset as u32);
        write_u32(&mut out, at + 8, payload.len() as u32);
    }

    let size = out.len() as u32;
    write_u32(&mut out, SignatureField::Size.offset(), size);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icc::header::{ColorSpace, ProfileClass};

    fn header() -> IccHeader {
        IccHeader::new(ProfileClass::Display, ColorSpace::Rgb, ColorSpace::Xyz)
    }

    #[test]
    fn test_write_then_read_directory() {
        let text = b"text\0\0\0\0hello\0";
        let xyz = [b'X', b'Y', b'Z', b' ', 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3];
        let data = write_profile(
            &header(),
            &[
                (TagSignature::COPYRIGHT, &text[..]),
                (TagSignature::MEDIA_WHITE, &xyz[..]),
            ],
        );

        assert_eq!(read_u32(&data, 0), Some(data.len() as u32));
        assert_eq!(data.len() % 4, 0);

        let entries = read_directory(&data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].signature, TagSignature::COPYRIGHT);
        assert_eq!(entries[0].offset % 4, 0);
        assert_eq!(entries[1].offset % 4, 0);
        assert_eq!(entries[0].payload(&data).unwrap(), &text[..]);
        assert_eq!(entries[1].payload(&data).unwrap(), &xyz[..]);
    }

    #[test]
    fn test_identical_payloads_are_shared() {
        let text = b"text\0\0\0\0same\0";
        let data = write_profile(
            &header(),
            &[
                (TagSignature::COPYRIGHT, &text[..]),
                (TagSignature::DESC, &text[..]),
            ],
        );
        let entries = read_directory(&data).unwrap();
        assert_eq!(entries[0].offset, entries[1].offset);
    }

    #[test]
    fn test_out_of_bounds_entry_is_reported_per_tag() {
        let entry = TagEntry {
            signature: TagSignature::DESC,
            offset: 100,
            size: 50,
        };
        let data = [0u8; 120];
        assert!(!entry.fits(data.len()));
        assert!(matches!(
            entry.payload(&data),
            Err(IccError::TagOutOfBounds { offset: 100, .. })
        ));
    }

    #[test]
    fn test_truncated_table() {
        let mut data = write_profile(&header(), &[]);
        write_u32(&mut data, HEADER_SIZE, 1000);
        assert!(matches!(
            read_directory(&data),
            Err(IccError::TagTableTruncated { count: 1000, .. })
        ));
    }
}
