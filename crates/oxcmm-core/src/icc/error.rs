//! ICC codec error types

use std::fmt;

use crate::bytes::sig_to_string;

/// Errors raised while decoding or encoding ICC data
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IccError {
    /// Buffer is smaller than the structure being read
    TooSmall { expected: usize, actual: usize },
    /// Magic at offset 36 is not 'acsp'
    InvalidSignature(u32),
    /// Header size field exceeds the buffer
    SizeMismatch { header_size: u32, actual_size: usize },
    /// Tag directory entry points past the end of the buffer
    TagOutOfBounds {
        tag: u32,
        offset: u32,
        size: u32,
        profile_size: usize,
    },
    /// Tag directory claims more entries than fit in the buffer
    TagTableTruncated { count: u32, actual: usize },
    /// Unknown color space signature
    InvalidColorSpace(u32),
    /// Unknown device class signature
    InvalidProfileClass(u32),
    /// Rendering intent outside 0..=3
    InvalidRenderingIntent(u32),
    /// Tag payload cannot be decoded as its declared type
    CorruptedData(String),
    /// Type is valid ICC but has no decoder here
    Unsupported(String),
}

impl fmt::Display for IccError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSmall { expected, actual } => {
                write!(f, "Profile too small: expected {expected} bytes, got {actual}")
            }
            Self::InvalidSignature(sig) => {
                write!(f, "Invalid profile signature: 0x{sig:08X} (expected 'acsp')")
            }
            Self::SizeMismatch {
                header_size,
                actual_size,
            } => {
                write!(
                    f,
                    "Size mismatch: header says {header_size} bytes, data is {actual_size} bytes"
                )
            }
            Self::TagOutOfBounds {
                tag,
                offset,
                size,
                profile_size,
            } => {
                write!(
                    f,
                    "Tag '{}' out of bounds: offset {offset} + size {size} > profile size {profile_size}",
                    sig_to_string(*tag)
                )
            }
            Self::TagTableTruncated { count, actual } => {
                write!(f, "Tag table of {count} entries truncated at {actual} bytes")
            }
            Self::InvalidColorSpace(cs) => {
                write!(f, "Invalid color space: '{}'", sig_to_string(*cs))
            }
            Self::InvalidProfileClass(class) => {
                write!(f, "Invalid profile class: '{}'", sig_to_string(*class))
            }
            Self::InvalidRenderingIntent(intent) => {
                write!(f, "Invalid rendering intent: {intent}")
            }
            Self::CorruptedData(msg) => write!(f, "Corrupted data: {msg}"),
            Self::Unsupported(msg) => write!(f, "Unsupported feature: {msg}"),
        }
    }
}

impl std::error::Error for IccError {}
