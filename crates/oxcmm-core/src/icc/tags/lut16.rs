//! lut16Type (mft2)
//!
//! Used to store sampled device-link transforms. Only identity matrix and
//! identity one-dimensional tables are written; the CLUT carries the
//! whole transform.
//!
//! See ICC.1:2022 Section 10.10

use crate::bytes::{push_u16, push_u32, read_u16};
use crate::icc::error::IccError;
use crate::icc::types::{S15Fixed16, TypeSignature};

/// Most input or output channels a lut16 table carries
pub const MAX_CHANNELS: usize = 15;

/// Most CLUT samples this codec writes or samples, `nodes * channels`
pub const MAX_CLUT_SAMPLES: usize = 1 << 24;

/// Sampled multi-dimensional table
#[derive(Debug, Clone, PartialEq)]
pub struct Lut16Data {
    pub input_channels: u8,
    pub output_channels: u8,
    pub grid_points: u8,
    /// Row-major CLUT; the last input channel varies fastest
    pub clut: Vec<u16>,
}

impl Lut16Data {
    /// Number of CLUT nodes
    pub fn node_count(&self) -> usize {
        (self.grid_points as usize).saturating_pow(self.input_channels as u32)
    }

    /// Output values stored at the node with grid `indices`
    pub fn node(&self, indices: &[usize]) -> Option<&[u16]> {
        if indices.len() != self.input_channels as usize {
            return None;
        }
        let grid = self.grid_points as usize;
        let mut flat = 0usize;
        for &i in indices {
            if i >= grid {
                return None;
            }
            flat = flat * grid + i;
        }
        let out = self.output_channels as usize;
        self.clut.get(flat * out..(flat + 1) * out)
    }

    /// Parse from bytes (after type signature and reserved bytes)
    pub fn parse(data: &[u8]) -> Result<Self, IccError> {
        if data.len() < 44 {
            return Err(IccError::CorruptedData("lut16 header too small".into()));
        }
        let (input_channels, output_channels, grid_points) = (data[0], data[1], data[2]);
        let table_in = read_u16(data, 40).unwrap_or(0) as usize;
        let table_out = read_u16(data, 42).unwrap_or(0) as usize;

        let lut = Self {
            input_channels,
            output_channels,
            grid_points,
            clut: Vec::new(),
        };
        let clut_len = lut.node_count().saturating_mul(output_channels as usize);
        let clut_start = 44 + input_channels as usize * table_in * 2;
        let clut_end = clut_start.saturating_add(clut_len.saturating_mul(2));
        let total = clut_end.saturating_add(output_channels as usize * table_out * 2);
        if data.len() < total {
            return Err(IccError::CorruptedData(format!(
                "lut16 needs {total} bytes, have {}",
                data.len()
            )));
        }
        let clut = data[clut_start..clut_end]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        Ok(Self { clut, ..lut })
    }

    /// Encode as a complete 'mft2' payload including the type header
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(52 + self.clut.len() * 2);
        push_u32(&mut out, TypeSignature::LUT16.0);
        push_u32(&mut out, 0);
        out.extend_from_slice(&[self.input_channels, self.output_channels, self.grid_points, 0]);
        for row in 0..3 {
            for col in 0..3 {
                let v = if row == col { 1.0 } else { 0.0 };
                out.extend_from_slice(&S15Fixed16::from_f64(v).to_be_bytes());
            }
        }
        push_u16(&mut out, 2);
        push_u16(&mut out, 2);
        for _ in 0..self.input_channels {
            push_u16(&mut out, 0);
            push_u16(&mut out, u16::MAX);
        }
        for v in &self.clut {
            push_u16(&mut out, *v);
        }
        for _ in 0..self.output_channels {
            push_u16(&mut out, 0);
            push_u16(&mut out, u16::MAX);
        }
        out
    }
}
