//! ICC basic number and signature types

use std::fmt;

use crate::bytes::{read_i32, read_u16, sig_to_string};

/// ICC tag signature (4-byte ASCII code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagSignature(pub u32);

impl TagSignature {
    /// Create from 4 ASCII characters
    pub const fn from_bytes(b: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(b))
    }

    pub const A2B0: Self = Self::from_bytes(*b"A2B0");
    pub const A2B1: Self = Self::from_bytes(*b"A2B1");
    pub const B2A0: Self = Self::from_bytes(*b"B2A0");
    pub const BLUE_COLORANT: Self = Self::from_bytes(*b"bXYZ");
    pub const BLUE_TRC: Self = Self::from_bytes(*b"bTRC");
    pub const COPYRIGHT: Self = Self::from_bytes(*b"cprt");
    pub const DESC: Self = Self::from_bytes(*b"desc");
    pub const DMDD: Self = Self::from_bytes(*b"dmdd");
    pub const DMND: Self = Self::from_bytes(*b"dmnd");
    pub const GRAY_TRC: Self = Self::from_bytes(*b"kTRC");
    pub const GREEN_COLORANT: Self = Self::from_bytes(*b"gXYZ");
    pub const GREEN_TRC: Self = Self::from_bytes(*b"gTRC");
    pub const MEDIA_WHITE: Self = Self::from_bytes(*b"wtpt");
    pub const MEDIA_BLACK: Self = Self::from_bytes(*b"bkpt");
    pub const RED_COLORANT: Self = Self::from_bytes(*b"rXYZ");
    pub const RED_TRC: Self = Self::from_bytes(*b"rTRC");
    pub const TECH: Self = Self::from_bytes(*b"tech");
}

impl fmt::Display for TagSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&sig_to_string(self.0))
    }
}

/// Type signatures for ICC tag data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeSignature(pub u32);

impl TypeSignature {
    pub const fn from_bytes(b: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(b))
    }

    /// Read the type signature from the first four bytes of a tag payload
    pub fn of_payload(payload: &[u8]) -> Option<Self> {
        crate::bytes::read_u32(payload, 0).map(Self)
    }

    pub const XYZ: Self = Self::from_bytes(*b"XYZ ");
    pub const CURVE: Self = Self::from_bytes(*b"curv");
    pub const PARA: Self = Self::from_bytes(*b"para");
    pub const TEXT: Self = Self::from_bytes(*b"text");
    pub const DESC: Self = Self::from_bytes(*b"desc");
    pub const MLUC: Self = Self::from_bytes(*b"mluc");
    pub const LUT8: Self = Self::from_bytes(*b"mft1");
    pub const LUT16: Self = Self::from_bytes(*b"mft2");
    pub const SIG: Self = Self::from_bytes(*b"sig ");
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&sig_to_string(self.0))
    }
}

/// s15Fixed16Number - 16.16 fixed point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct S15Fixed16(pub i32);

impl S15Fixed16 {
    pub fn from_f64(val: f64) -> Self {
        Self((val * 65536.0).round() as i32)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 65536.0
    }

    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

/// u8Fixed8Number - unsigned 8.8 fixed point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct U8Fixed8(pub u16);

impl U8Fixed8 {
    pub fn from_f64(val: f64) -> Self {
        Self((val * 256.0).round().clamp(0.0, u16::MAX as f64) as u16)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 256.0
    }
}

/// XYZNumber - ICC XYZ value (3 x s15Fixed16)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XyzNumber {
    pub x: S15Fixed16,
    pub y: S15Fixed16,
    pub z: S15Fixed16,
}

impl XyzNumber {
    /// D50 PCS illuminant as encoded in profile headers
    pub const D50: Self = Self {
        x: S15Fixed16(0x0000_F6D6),
        y: S15Fixed16(0x0001_0000),
        z: S15Fixed16(0x0000_D32D),
    };

    /// Parse from 12 big-endian bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            x: S15Fixed16(read_i32(bytes, 0)?),
            y: S15Fixed16(read_i32(bytes, 4)?),
            z: S15Fixed16(read_i32(bytes, 8)?),
        })
    }

    pub fn from_f64(xyz: [f64; 3]) -> Self {
        Self {
            x: S15Fixed16::from_f64(xyz[0]),
            y: S15Fixed16::from_f64(xyz[1]),
            z: S15Fixed16::from_f64(xyz[2]),
        }
    }

    pub fn to_bytes(self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&self.x.to_be_bytes());
        out[4..8].copy_from_slice(&self.y.to_be_bytes());
        out[8..12].copy_from_slice(&self.z.to_be_bytes());
        out
    }

    pub fn to_f64(self) -> [f64; 3] {
        [self.x.to_f64(), self.y.to_f64(), self.z.to_f64()]
    }
}

/// dateTimeNumber - ICC date/time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTimeNumber {
    pub year: u16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}

impl DateTimeNumber {
    /// Parse from 12 big-endian bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            year: read_u16(bytes, 0)?,
            month: read_u16(bytes, 2)?,
            day: read_u16(bytes, 4)?,
            hour: read_u16(bytes, 6)?,
            minute: read_u16(bytes, 8)?,
            second: read_u16(bytes, 10)?,
        })
    }

    pub fn to_bytes(self) -> [u8; 12] {
        let mut out = [0u8; 12];
        for (i, v) in [
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ]
        .into_iter()
        .enumerate()
        {
            out[i * 2..i * 2 + 2].copy_from_slice(&v.to_be_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s15fixed16() {
        let one = S15Fixed16::from_f64(1.0);
        assert!((one.to_f64() - 1.0).abs() < 1e-6);

        let neg = S15Fixed16::from_f64(-1.5);
        assert!((neg.to_f64() - (-1.5)).abs() < 1e-6);
    }

    #[test]
    fn test_xyz_number() {
        // D50 white point in ICC encoding
        let bytes: [u8; 12] = [
            0x00, 0x00, 0xF6, 0xD6, // X = 0.9642
            0x00, 0x01, 0x00, 0x00, // Y = 1.0
            0x00, 0x00, 0xD3, 0x2D, // Z = 0.8249
        ];
        let xyz = XyzNumber::from_bytes(&bytes).unwrap();
        assert_eq!(xyz, XyzNumber::D50);
        assert_eq!(xyz.to_bytes(), bytes);

        let [x, y, z] = xyz.to_f64();
        assert!((x - 0.9642).abs() < 0.001);
        assert!((y - 1.0).abs() < 0.001);
        assert!((z - 0.8249).abs() < 0.001);
    }

    #[test]
    fn test_date_time() {
        let date = DateTimeNumber {
            year: 2024,
            month: 2,
            day: 29,
            hour: 13,
            minute: 5,
            second: 59,
        };
        assert_eq!(DateTimeNumber::from_bytes(&date.to_bytes()), Some(date));
        assert_eq!(DateTimeNumber::from_bytes(&[0u8; 11]), None);
    }

    #[test]
    fn test_tag_signature_display() {
        assert_eq!(TagSignature::DESC.to_string(), "desc");
        assert_eq!(TagSignature::RED_COLORANT.to_string(), "rXYZ");
        assert_eq!(TypeSignature::XYZ.to_string(), "XYZ");
    }
}
