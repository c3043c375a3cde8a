//! Curve Tag Types
//!
//! ICC profiles use curves for tone reproduction (TRC).
//! Two main types:
//! - curv: Simple gamma or lookup table
//! - para: Parametric curves with formula
//!
//! See ICC.1:2022 Sections 10.6 (curv) and 10.18 (para)

use crate::bytes::{push_u16, push_u32, read_i32, read_u16, read_u32};
use crate::icc::error::IccError;
use crate::icc::types::{TypeSignature, U8Fixed8};

/// Curve tag data (curv type)
#[derive(Debug, Clone, PartialEq)]
pub enum CurveData {
    /// Identity curve (count = 0)
    Identity,
    /// Simple gamma (count = 1, value is u8Fixed8)
    Gamma(f64),
    /// Lookup table (count > 1, values are u16)
    Table(Vec<u16>),
}

impl CurveData {
    /// Parse curve data from bytes (after type signature and reserved bytes)
    pub fn parse(data: &[u8]) -> Result<Self, IccError> {
        let count = read_u32(data, 0)
            .ok_or_else(|| IccError::CorruptedData("Curve tag too small".to_string()))?
            as usize;

        match count {
            0 => Ok(CurveData::Identity),
            1 => {
                let raw = read_u16(data, 4)
                    .ok_or_else(|| IccError::CorruptedData("Curve gamma value missing".to_string()))?;
                Ok(CurveData::Gamma(U8Fixed8(raw).to_f64()))
            }
            _ => {
                let required_len = count.saturating_mul(2).saturating_add(4);
                if data.len() < required_len {
                    return Err(IccError::CorruptedData(format!(
                        "Curve table too small: need {} bytes, have {}",
                        required_len,
                        data.len()
                    )));
                }
                let table = data[4..required_len]
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                Ok(CurveData::Table(table))
            }
        }
    }

    /// Evaluate the curve at a given input (0.0 to 1.0)
    pub fn eval(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);

        match self {
            CurveData::Identity => x,
            CurveData::Gamma(g) => x.powf(*g),
            CurveData::Table(table) => {
                let Some(last) = table.len().checked_sub(1) else {
                    return x;
                };
                if last == 0 {
                    return table[0] as f64 / 65535.0;
                }

                // Linear interpolation in the table
                let pos = x * last as f64;
                let idx = (pos.floor() as usize).min(last - 1);
                let frac = pos - idx as f64;
                let v0 = table[idx] as f64;
                let v1 = table[idx + 1] as f64;
                (v0 + frac * (v1 - v0)) / 65535.0
            }
        }
    }

    /// Encode as a complete 'curv' payload including the type header
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_u32(&mut out, TypeSignature::CURVE.0);
        push_u32(&mut out, 0);
        match self {
            CurveData::Identity => push_u32(&mut out, 0),
            CurveData::Gamma(g) => {
                push_u32(&mut out, 1);
                push_u16(&mut out, U8Fixed8::from_f64(*g).0);
            }
            CurveData::Table(table) => {
                push_u32(&mut out, table.len() as u32);
                for v in table {
                    push_u16(&mut out, *v);
                }
            }
        }
        out
    }
}

/// Parametric curve data (para type)
#[derive(Debug, Clone, PartialEq)]
pub struct ParametricCurveData {
    /// ICC function type 0..=4
    pub function: u16,
    /// g, a, b, c, d, e, f; unused trailing parameters are zero
    pub params: [f64; 7],
}

impl ParametricCurveData {
    /// Parameter count per function type
    const PARAM_COUNT: [usize; 5] = [1, 3, 4, 5, 7];

    /// Parse parametric curve from bytes (after type signature and reserved bytes)
    pub fn parse(data: &[u8]) -> Result<Self, IccError> {
        let function = read_u16(data, 0)
            .ok_or_else(|| IccError::CorruptedData("Parametric curve too small".to_string()))?;
        let count = *Self::PARAM_COUNT.get(function as usize).ok_or_else(|| {
            IccError::CorruptedData(format!("Unknown parametric curve type: {function}"))
        })?;

        let mut params = [0.0; 7];
        for (i, slot) in params.iter_mut().take(count).enumerate() {
            let raw = read_i32(data, 4 + i * 4).ok_or_else(|| {
                IccError::CorruptedData(format!("Parametric curve type {function} truncated"))
            })?;
            *slot = raw as f64 / 65536.0;
        }
        Ok(Self { function, params })
    }

    /// Evaluate the curve at a given input
    pub fn eval(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        let [g, a, b, c, d, e, f] = self.params;
        let threshold = if a.abs() > 1e-10 { -b / a } else { 0.0 };
        match self.function {
            0 => x.powf(g),
            1 if x >= threshold => (a * x + b).max(0.0).powf(g),
            1 => 0.0,
            2 if x >= threshold => (a * x + b).max(0.0).powf(g) + c,
            2 => c,
            3 if x >= d => (a * x + b).max(0.0).powf(g),
            3 => c * x,
            4 if x >= d => (a * x + b).max(0.0).powf(g) + e,
            4 => c * x + f,
            _ => x,
        }
    }
}
