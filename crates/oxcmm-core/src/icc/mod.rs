//! ICC Profile Codec
//!
//! Reads and writes the binary ICC container according to ICC.1:2022.
//!
//! # Structure
//!
//! An ICC profile consists of:
//! 1. A 128-byte header
//! 2. A tag count and a tag directory (signature, offset, size)
//! 3. Tag payloads, 4-byte aligned (may be shared)
//!
//! Multi-byte fields are big-endian on the wire; conversion to host order
//! happens in this module and nowhere else.

pub mod directory;
pub mod header;
pub mod tags;

mod error;
mod types;

pub use directory::{TagEntry, read_directory, write_profile};
pub use error::IccError;
pub use header::{
    ColorSpace, HEADER_SIZE, IccHeader, MIN_PROFILE_SIZE, PROFILE_SIGNATURE, ProfileClass,
    ProfileVersion, RenderingIntent, SignatureField,
};
pub use tags::{
    CurveData, LUT16_MAX_CHANNELS, LUT16_MAX_CLUT_SAMPLES, Lut16Data, ParametricCurveData, TagValue, TextData,
    XyzTagData,
};
pub use types::{DateTimeNumber, S15Fixed16, TagSignature, TypeSignature, U8Fixed8, XyzNumber};
