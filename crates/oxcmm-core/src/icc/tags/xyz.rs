//! XYZ Tag Type
//!
//! The XYZType contains an array of XYZ values. Used for colorant tags,
//! white point, black point, etc.
//!
//! See ICC.1:2022 Section 10.31

use crate::bytes::push_u32;
use crate::icc::error::IccError;
use crate::icc::types::{TypeSignature, XyzNumber};

/// XYZ tag data - contains one or more XYZ values
#[derive(Debug, Clone, PartialEq)]
pub struct XyzTagData {
    pub values: Vec<XyzNumber>,
}

impl XyzTagData {
    /// Parse XYZ data from bytes (after type signature and reserved bytes)
    pub fn parse(data: &[u8]) -> Result<Self, IccError> {
        let values: Vec<XyzNumber> = data.chunks_exact(12).filter_map(XyzNumber::from_bytes).collect();
        if values.is_empty() {
            return Err(IccError::CorruptedData("XYZ tag too small".to_string()));
        }
        Ok(Self { values })
    }

    /// Get the first XYZ value (most common case)
    pub fn first(&self) -> Option<[f64; 3]> {
        self.values.first().map(|v| v.to_f64())
    }

    /// Encode as a complete 'XYZ ' payload including the type header
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.values.len() * 12);
        push_u32(&mut out, TypeSignature::XYZ.0);
        push_u32(&mut out, 0);
        for value in &self.values {
            out.extend_from_slice(&value.to_bytes());
        }
        out
    }
}
