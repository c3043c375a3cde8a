//! ICC Profile Tag Decoding
//!
//! Tags contain the actual profile data. Each tag payload has:
//! - A 4-byte type signature identifying the data format
//! - 4 reserved bytes
//! - Type-specific data
//!
//! See ICC.1:2022 Section 9.

mod curves;
mod lut16;
mod text;
mod xyz;

pub use curves::{CurveData, ParametricCurveData};
pub use lut16::{Lut16Data, MAX_CHANNELS as LUT16_MAX_CHANNELS, MAX_CLUT_SAMPLES as LUT16_MAX_CLUT_SAMPLES};
pub use text::TextData;
pub use xyz::XyzTagData;

use super::error::IccError;
use super::types::TypeSignature;
use crate::bytes::read_u32;

/// Decoded tag value
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// XYZ type data (colorants, white point)
    Xyz(XyzTagData),
    /// Curve type (TRC)
    Curve(CurveData),
    /// Parametric curve type
    ParametricCurve(ParametricCurveData),
    /// text, desc or mluc
    Text(TextData),
    /// Sampled 16-bit LUT
    Lut16(Lut16Data),
    /// signatureType, e.g. the 'tech' tag
    Signature(u32),
    /// Type without a decoder; raw payload is kept
    Unknown { type_sig: u32, data: Vec<u8> },
}

impl TagValue {
    /// Type signatures [`TagValue::decode`] understands
    pub const DECODABLE: [TypeSignature; 8] = [
        TypeSignature::XYZ,
        TypeSignature::CURVE,
        TypeSignature::PARA,
        TypeSignature::TEXT,
        TypeSignature::DESC,
        TypeSignature::MLUC,
        TypeSignature::LUT16,
        TypeSignature::SIG,
    ];

    /// Decode a full tag payload, type header included
    pub fn decode(payload: &[u8]) -> Result<Self, IccError> {
        if payload.len() < 8 {
            return Err(IccError::CorruptedData(
                "Tag data too small for header".to_string(),
            ));
        }

        let type_sig = TypeSignature(u32::from_be_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ]));
        let body = &payload[8..];

        match type_sig {
            TypeSignature::XYZ => XyzTagData::parse(body).map(Self::Xyz),
            TypeSignature::CURVE => CurveData::parse(body).map(Self::Curve),
            TypeSignature::PARA => ParametricCurveData::parse(body).map(Self::ParametricCurve),
            TypeSignature::TEXT => TextData::parse_text(body).map(Self::Text),
            TypeSignature::DESC => TextData::parse_desc(body).map(Self::Text),
            TypeSignature::MLUC => TextData::parse_mluc(body).map(Self::Text),
            TypeSignature::LUT16 => Lut16Data::parse(body).map(Self::Lut16),
            TypeSignature::SIG => read_u32(body, 0)
                .map(Self::Signature)
                .ok_or_else(|| IccError::CorruptedData("signature tag too small".into())),
            _ => Ok(Self::Unknown {
                type_sig: type_sig.0,
                data: payload.to_vec(),
            }),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn as_xyz(&self) -> Option<&XyzTagData> {
        match self {
            Self::Xyz(xyz) => Some(xyz),
            _ => None,
        }
    }

    pub fn as_curve(&self) -> Option<&CurveData> {
        match self {
            Self::Curve(curve) => Some(curve),
            _ => None,
        }
    }

    pub fn as_lut16(&self) -> Option<&Lut16Data> {
        match self {
            Self::Lut16(lut) => Some(lut),
            _ => None,
        }
    }

    /// One-line human readable rendering
    pub fn to_text(&self) -> String {
        match self {
            Self::Xyz(xyz) => xyz
                .values
                .iter()
                .map(|v| {
                    let [x, y, z] = v.to_f64();
                    format!("{x:.4} {y:.4} {z:.4}")
                })
                .collect::<Vec<_>>()
                .join("; "),
            Self::Curve(CurveData::Identity) => "identity".to_string(),
            Self::Curve(CurveData::Gamma(g)) => format!("gamma {g:.3}"),
            Self::Curve(CurveData::Table(t)) => format!("table[{}]", t.len()),
            Self::ParametricCurve(p) => format!("parametric type {} g={:.3}", p.function, p.params[0]),
            Self::Text(text) => text.text.clone(),
            Self::Lut16(lut) => format!(
                "lut16 {}->{} grid {}",
                lut.input_channels, lut.output_channels, lut.grid_points
            ),
            Self::Signature(sig) => crate::bytes::sig_to_string(*sig),
            Self::Unknown { type_sig, data } => {
                format!("{} ({} bytes)", crate::bytes::sig_to_string(*type_sig), data.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_unknown_type() {
        let data = [
            b'u', b'n', b'k', b'n', // type sig "unkn"
            0, 0, 0, 0, // reserved
            1, 2, 3, 4, // payload
        ];

        match TagValue::decode(&data).unwrap() {
            TagValue::Unknown { type_sig, data } => {
                assert_eq!(type_sig, u32::from_be_bytes(*b"unkn"));
                assert_eq!(data.len(), 12);
            }
            other => panic!("Expected Unknown tag type, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_signature() {
        let data = [b's', b'i', b'g', b' ', 0, 0, 0, 0, b'C', b'R', b'T', b' '];
        let value = TagValue::decode(&data).unwrap();
        assert_eq!(value, TagValue::Signature(u32::from_be_bytes(*b"CRT ")));
        assert_eq!(value.to_text(), "CRT");
    }

    #[test]
    fn test_decode_text_payload() {
        let payload = TextData::new("Copyright none").encode_text();
        let value = TagValue::decode(&payload).unwrap();
        assert_eq!(value.as_text(), Some("Copyright none"));
    }

    #[test]
    fn test_decode_too_small() {
        assert!(TagValue::decode(b"text").is_err());
    }
}
