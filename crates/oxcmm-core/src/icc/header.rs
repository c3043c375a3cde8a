//! ICC Profile Header
//!
//! The header is exactly 128 bytes. It is kept as the raw big-endian block
//! so that fields unknown to this crate survive a read/write cycle
//! unchanged; typed accessors decode on demand.
//! See ICC.1:2022 Section 7.2.

use super::error::IccError;
use super::types::{DateTimeNumber, XyzNumber};
use crate::bytes::{read_u32, read_u64, write_u32, write_u64};

/// Profile file signature - must be 'acsp' (0x61637370)
pub const PROFILE_SIGNATURE: u32 = 0x61637370;

/// Size of the fixed header
pub const HEADER_SIZE: usize = 128;

/// Minimum valid profile size (header plus tag count)
pub const MIN_PROFILE_SIZE: usize = HEADER_SIZE + 4;

/// Four byte header fields addressable by [`IccHeader::signature`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureField {
    Size,
    Cmm,
    Version,
    Class,
    ColorSpace,
    Pcs,
    Magic,
    Platform,
    Flags,
    Manufacturer,
    Model,
    Intent,
    Creator,
}

impl SignatureField {
    /// Byte offset of the field inside the header
    pub const fn offset(self) -> usize {
        match self {
            Self::Size => 0,
            Self::Cmm => 4,
            Self::Version => 8,
            Self::Class => 12,
            Self::ColorSpace => 16,
            Self::Pcs => 20,
            Self::Magic => 36,
            Self::Platform => 40,
            Self::Flags => 44,
            Self::Manufacturer => 48,
            Self::Model => 52,
            Self::Intent => 64,
            Self::Creator => 80,
        }
    }
}

const DATE_OFFSET: usize = 24;
const ATTRIBUTES_OFFSET: usize = 56;
const ILLUMINANT_OFFSET: usize = 68;
const PROFILE_ID_OFFSET: usize = 84;

/// ICC Profile Header (128 bytes, wire order)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IccHeader {
    raw: [u8; HEADER_SIZE],
}

impl IccHeader {
    /// Blank v4.3 header with the magic and the D50 illuminant set
    pub fn new(class: ProfileClass, color_space: ColorSpace, pcs: ColorSpace) -> Self {
        let mut header = Self {
            raw: [0u8; HEADER_SIZE],
        };
        header.set_signature(SignatureField::Version, 0x0430_0000);
        header.set_signature(SignatureField::Class, class.to_u32());
        header.set_signature(SignatureField::ColorSpace, color_space.to_u32());
        header.set_signature(SignatureField::Pcs, pcs.to_u32());
        header.set_signature(SignatureField::Magic, PROFILE_SIGNATURE);
        header.set_illuminant(XyzNumber::D50);
        header
    }

    /// Parse header from bytes
    pub fn parse(data: &[u8]) -> Result<Self, IccError> {
        if data.len() < HEADER_SIZE {
            return Err(IccError::TooSmall {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&data[..HEADER_SIZE]);
        let header = Self { raw };

        let magic = header.signature(SignatureField::Magic);
        if magic != PROFILE_SIGNATURE {
            return Err(IccError::InvalidSignature(magic));
        }
        Ok(header)
    }

    /// Check the header against the buffer it came from
    pub fn validate(&self, data_len: usize) -> Result<(), IccError> {
        let magic = self.signature(SignatureField::Magic);
        if magic != PROFILE_SIGNATURE {
            return Err(IccError::InvalidSignature(magic));
        }
        let size = self.signature(SignatureField::Size);
        if size as usize > data_len {
            return Err(IccError::SizeMismatch {
                header_size: size,
                actual_size: data_len,
            });
        }
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.raw
    }

    /// Read a four byte field in host order
    pub fn signature(&self, field: SignatureField) -> u32 {
        read_u32(&self.raw, field.offset()).unwrap_or(0)
    }

    /// Write a four byte field given in host order
    pub fn set_signature(&mut self, field: SignatureField, value: u32) {
        write_u32(&mut self.raw, field.offset(), value);
    }

    pub fn creation_date(&self) -> DateTimeNumber {
        DateTimeNumber::from_bytes(&self.raw[DATE_OFFSET..DATE_OFFSET + 12]).unwrap_or_default()
    }

    pub fn set_creation_date(&mut self, date: DateTimeNumber) {
        self.raw[DATE_OFFSET..DATE_OFFSET + 12].copy_from_slice(&date.to_bytes());
    }

    pub fn attributes(&self) -> u64 {
        read_u64(&self.raw, ATTRIBUTES_OFFSET).unwrap_or(0)
    }

    pub fn set_attributes(&mut self, value: u64) {
        write_u64(&mut self.raw, ATTRIBUTES_OFFSET, value);
    }

    pub fn illuminant(&self) -> XyzNumber {
        XyzNumber::from_bytes(&self.raw[ILLUMINANT_OFFSET..ILLUMINANT_OFFSET + 12])
            .unwrap_or_default()
    }

    pub fn set_illuminant(&mut self, xyz: XyzNumber) {
        self.raw[ILLUMINANT_OFFSET..ILLUMINANT_OFFSET + 12].copy_from_slice(&xyz.to_bytes());
    }

    /// Stored profile ID (MD5), all zeros when absent
    pub fn profile_id(&self) -> [u8; 16] {
        let mut id = [0u8; 16];
        id.copy_from_slice(&self.raw[PROFILE_ID_OFFSET..PROFILE_ID_OFFSET + 16]);
        id
    }

    pub fn set_profile_id(&mut self, id: [u8; 16]) {
        self.raw[PROFILE_ID_OFFSET..PROFILE_ID_OFFSET + 16].copy_from_slice(&id);
    }

    pub fn version(&self) -> ProfileVersion {
        let v = self.signature(SignatureField::Version).to_be_bytes();
        ProfileVersion {
            major: v[0],
            minor: v[1] >> 4,
            patch: v[1] & 0x0F,
        }
    }

    pub fn device_class(&self) -> Result<ProfileClass, IccError> {
        ProfileClass::from_u32(self.signature(SignatureField::Class))
    }

    pub fn color_space(&self) -> Result<ColorSpace, IccError> {
        ColorSpace::from_u32(self.signature(SignatureField::ColorSpace))
    }

    pub fn pcs(&self) -> Result<ColorSpace, IccError> {
        ColorSpace::from_u32(self.signature(SignatureField::Pcs))
    }

    pub fn rendering_intent(&self) -> Result<RenderingIntent, IccError> {
        RenderingIntent::from_u32(self.signature(SignatureField::Intent))
    }
}

/// ICC Profile Version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl ProfileVersion {
    /// Check if version is at least the specified version
    pub fn at_least(&self, major: u8, minor: u8) -> bool {
        self.major > major || (self.major == major && self.minor >= minor)
    }

    pub fn is_v4(&self) -> bool {
        self.major == 4
    }

    pub fn is_v2(&self) -> bool {
        self.major == 2
    }
}

/// ICC Profile Class (Device Class)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileClass {
    /// Input device (scanner, camera)
    Input,
    /// Display device (monitor)
    Display,
    /// Output device (printer)
    Output,
    /// Device link
    DeviceLink,
    /// Color space conversion
    ColorSpace,
    /// Abstract profile
    Abstract,
    /// Named color profile
    NamedColor,
}

impl ProfileClass {
    pub fn from_u32(val: u32) -> Result<Self, IccError> {
        match &val.to_be_bytes() {
            b"scnr" => Ok(Self::Input),
            b"mntr" => Ok(Self::Display),
            b"prtr" => Ok(Self::Output),
            b"link" => Ok(Self::DeviceLink),
            b"spac" => Ok(Self::ColorSpace),
            b"abst" => Ok(Self::Abstract),
            b"nmcl" => Ok(Self::NamedColor),
            _ => Err(IccError::InvalidProfileClass(val)),
        }
    }

    pub fn to_u32(&self) -> u32 {
        u32::from_be_bytes(*match self {
            Self::Input => b"scnr",
            Self::Display => b"mntr",
            Self::Output => b"prtr",
            Self::DeviceLink => b"link",
            Self::ColorSpace => b"spac",
            Self::Abstract => b"abst",
            Self::NamedColor => b"nmcl",
        })
    }
}

/// ICC Color Space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Xyz,
    Lab,
    Luv,
    YCbCr,
    Yxy,
    Rgb,
    Gray,
    Hsv,
    Hls,
    Cmyk,
    Cmy,
    /// n-color space with 2..=15 channels ('2CLR'..'FCLR')
    Color(u8),
}

impl ColorSpace {
    pub fn from_u32(val: u32) -> Result<Self, IccError> {
        let bytes = val.to_be_bytes();
        match &bytes {
            b"XYZ " => Ok(Self::Xyz),
            b"Lab " => Ok(Self::Lab),
            b"Luv " => Ok(Self::Luv),
            b"YCbr" => Ok(Self::YCbCr),
            b"Yxy " => Ok(Self::Yxy),
            b"RGB " => Ok(Self::Rgb),
            b"GRAY" => Ok(Self::Gray),
            b"HSV " => Ok(Self::Hsv),
            b"HLS " => Ok(Self::Hls),
            b"CMYK" => Ok(Self::Cmyk),
            b"CMY " => Ok(Self::Cmy),
            [n, b'C', b'L', b'R'] => match (*n as char).to_digit(16) {
                Some(count @ 2..=15) => Ok(Self::Color(count as u8)),
                _ => Err(IccError::InvalidColorSpace(val)),
            },
            _ => Err(IccError::InvalidColorSpace(val)),
        }
    }

    pub fn to_u32(&self) -> u32 {
        let bytes = match self {
            Self::Xyz => *b"XYZ ",
            Self::Lab => *b"Lab ",
            Self::Luv => *b"Luv ",
            Self::YCbCr => *b"YCbr",
            Self::Yxy => *b"Yxy ",
            Self::Rgb => *b"RGB ",
            Self::Gray => *b"GRAY",
            Self::Hsv => *b"HSV ",
            Self::Hls => *b"HLS ",
            Self::Cmyk => *b"CMYK",
            Self::Cmy => *b"CMY ",
            Self::Color(n) => {
                let digit = char::from_digit(u32::from(*n).clamp(2, 15), 16)
                    .map(|c| c.to_ascii_uppercase() as u8)
                    .unwrap_or(b'2');
                [digit, b'C', b'L', b'R']
            }
        };
        u32::from_be_bytes(bytes)
    }

    /// Get number of channels for this color space
    pub fn channels(&self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Xyz
            | Self::Lab
            | Self::Luv
            | Self::YCbCr
            | Self::Yxy
            | Self::Rgb
            | Self::Hsv
            | Self::Hls
            | Self::Cmy => 3,
            Self::Cmyk => 4,
            Self::Color(n) => *n as usize,
        }
    }

    /// Short per-channel names, e.g. "R", "G", "B"
    pub fn channel_names(&self) -> Vec<String> {
        let fixed: &[&str] = match self {
            Self::Gray => &["K"],
            Self::Xyz => &["X", "Y", "Z"],
            Self::Lab => &["L", "a", "b"],
            Self::Luv => &["L", "u", "v"],
            Self::YCbCr => &["Y", "Cb", "Cr"],
            Self::Yxy => &["Y", "x", "y"],
            Self::Rgb => &["R", "G", "B"],
            Self::Hsv => &["H", "S", "V"],
            Self::Hls => &["H", "L", "S"],
            Self::Cmyk => &["C", "M", "Y", "K"],
            Self::Cmy => &["C", "M", "Y"],
            Self::Color(n) => return (1..=*n).map(|i| format!("{i}")).collect(),
        };
        fixed.iter().map(|s| s.to_string()).collect()
    }
}

/// ICC Rendering Intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderingIntent {
    /// Perceptual - best for photographs
    #[default]
    Perceptual,
    /// Relative colorimetric - preserves in-gamut colors
    RelativeColorimetric,
    /// Saturation - maintains saturation
    Saturation,
    /// Absolute colorimetric - preserves white point
    AbsoluteColorimetric,
}

impl RenderingIntent {
    pub fn from_u32(val: u32) -> Result<Self, IccError> {
        match val {
            0 => Ok(Self::Perceptual),
            1 => Ok(Self::RelativeColorimetric),
            2 => Ok(Self::Saturation),
            3 => Ok(Self::AbsoluteColorimetric),
            _ => Err(IccError::InvalidRenderingIntent(val)),
        }
    }

    pub fn to_u32(&self) -> u32 {
        match self {
            Self::Perceptual => 0,
            Self::RelativeColorimetric => 1,
            Self::Saturation => 2,
            Self::AbsoluteColorimetric => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_space_channels() {
        assert_eq!(ColorSpace::Gray.channels(), 1);
        assert_eq!(ColorSpace::Rgb.channels(), 3);
        assert_eq!(ColorSpace::Cmyk.channels(), 4);
        assert_eq!(ColorSpace::Color(12).channels(), 12);
    }

    #[test]
    fn test_n_color_signatures() {
        let sig = u32::from_be_bytes(*b"ACLR");
        let cs = ColorSpace::from_u32(sig).unwrap();
        assert_eq!(cs, ColorSpace::Color(10));
        assert_eq!(cs.to_u32(), sig);
        assert!(ColorSpace::from_u32(u32::from_be_bytes(*b"1CLR")).is_err());
    }

    #[test]
    fn test_profile_class_roundtrip() {
        for class in [
            ProfileClass::Input,
            ProfileClass::Display,
            ProfileClass::Output,
            ProfileClass::DeviceLink,
        ] {
            let back = ProfileClass::from_u32(class.to_u32()).unwrap();
            assert_eq!(class, back);
        }
    }

    #[test]
    fn test_rendering_intent() {
        for i in 0..4 {
            let intent = RenderingIntent::from_u32(i).unwrap();
            assert_eq!(intent.to_u32(), i);
        }
        assert!(RenderingIntent::from_u32(4).is_err());
    }

    #[test]
    fn test_header_fields_are_big_endian() {
        let mut header = IccHeader::new(ProfileClass::Display, ColorSpace::Rgb, ColorSpace::Xyz);
        assert_eq!(&header.as_bytes()[16..20], b"RGB ");
        assert_eq!(&header.as_bytes()[36..40], b"acsp");
        assert_eq!(header.version().major, 4);

        header.set_signature(SignatureField::Intent, 2);
        assert_eq!(&header.as_bytes()[64..68], &[0, 0, 0, 2]);
        assert_eq!(
            header.rendering_intent().unwrap(),
            RenderingIntent::Saturation
        );

        let parsed = IccHeader::parse(header.as_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let raw = [0u8; HEADER_SIZE];
        assert!(matches!(
            IccHeader::parse(&raw),
            Err(IccError::InvalidSignature(0))
        ));
        assert!(IccHeader::parse(&raw[..64]).is_err());
    }

    #[test]
    fn test_profile_version() {
        let v2 = ProfileVersion {
            major: 2,
            minor: 4,
            patch: 0,
        };
        assert!(v2.is_v2());
        assert!(v2.at_least(2, 4));
        assert!(!v2.at_least(2, 5));
    }
}
