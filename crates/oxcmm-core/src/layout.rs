//! Pixel layout descriptors
//!
//! A [`PixelLayout`] packs the channel count, color channel offset, sample
//! type and storage flags into one `u32`:
//!
//! | Bits | Field |
//! |------|-------|
//! | 0..16 | channel count |
//! | 16..24 | offset of the first color channel |
//! | 24..28 | [`DataType`] |
//! | 28 | channel order reversed (swap) |
//! | 29 | planar storage |
//! | 30 | flavor: values inverted |
//! | 31 | samples in non-host byte order |
//!
//! [`PixelMask`] is derived from a layout and the image size and is what
//! the accessors actually consult.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::icc::ColorSpace;

/// Sample type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    U8,
    U16,
    U32,
    Half,
    F32,
    F64,
}

impl DataType {
    /// Bytes per sample
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::Half => 2,
            Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    pub const fn bits(self) -> u32 {
        match self {
            Self::U8 => 0,
            Self::U16 => 1,
            Self::U32 => 2,
            Self::Half => 3,
            Self::F32 => 4,
            Self::F64 => 5,
        }
    }

    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::U8),
            1 => Some(Self::U16),
            2 => Some(Self::U32),
            3 => Some(Self::Half),
            4 => Some(Self::F32),
            5 => Some(Self::F64),
            _ => None,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::Half | Self::F32 | Self::F64)
    }

    /// Invert one host order sample in place: `max - v` for integers,
    /// `1 - v` for floats
    pub fn invert_sample(self, sample: &mut [u8]) {
        match self {
            Self::U8 => sample[0] = u8::MAX - sample[0],
            Self::U16 => {
                let v = u16::from_ne_bytes([sample[0], sample[1]]);
                sample.copy_from_slice(&(u16::MAX - v).to_ne_bytes());
            }
            Self::U32 => {
                let v = u32::from_ne_bytes([sample[0], sample[1], sample[2], sample[3]]);
                sample.copy_from_slice(&(u32::MAX - v).to_ne_bytes());
            }
            Self::Half => {
                let v = half::f16::from_ne_bytes([sample[0], sample[1]]);
                sample.copy_from_slice(&half::f16::from_f32(1.0 - v.to_f32()).to_ne_bytes());
            }
            Self::F32 => {
                let v = f32::from_ne_bytes([sample[0], sample[1], sample[2], sample[3]]);
                sample.copy_from_slice(&(1.0 - v).to_ne_bytes());
            }
            Self::F64 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(sample);
                sample.copy_from_slice(&(1.0 - f64::from_ne_bytes(bytes)).to_ne_bytes());
            }
        }
    }
}

/// What a channel carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Undefined,
    Other,
    Lightness,
    Color,
    ColorLightness,
    ColorLightnessPremultiplied,
    Alpha,
    PremultipliedAlpha,
}

impl ChannelType {
    pub const fn is_premultiplied(self) -> bool {
        matches!(self, Self::ColorLightnessPremultiplied | Self::PremultipliedAlpha)
    }

    pub const fn is_alpha(self) -> bool {
        matches!(self, Self::Alpha | Self::PremultipliedAlpha)
    }

    /// Whether a channel of this type can stand in where `required` is asked for
    pub fn satisfies(self, required: ChannelType) -> bool {
        match required {
            Self::Undefined => true,
            Self::Lightness => matches!(
                self,
                Self::Lightness | Self::ColorLightness | Self::ColorLightnessPremultiplied
            ),
            Self::Color => matches!(
                self,
                Self::Color | Self::ColorLightness | Self::ColorLightnessPremultiplied
            ),
            other => self == other,
        }
    }
}

/// Channel types of an image in logical order: color channels, then extras
pub fn channel_types(
    space: Option<ColorSpace>,
    color_channels: usize,
    channels: usize,
) -> Vec<ChannelType> {
    use ChannelType::{Color, ColorLightness, Lightness, Other};
    let color: Vec<ChannelType> = match space {
        Some(ColorSpace::Lab | ColorSpace::Luv | ColorSpace::YCbCr | ColorSpace::Yxy) => {
            vec![Lightness, Color, Color]
        }
        Some(ColorSpace::Hsv | ColorSpace::Hls) => vec![Color, Color, Lightness],
        _ => vec![ColorLightness; color_channels],
    };
    (0..channels)
        .map(|i| match color.get(i) {
            Some(&t) if i < color_channels => t,
            _ if i < color_channels => ColorLightness,
            _ => Other,
        })
        .collect()
}

/// Packed pixel layout
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixelLayout(u32);

impl PixelLayout {
    pub const SWAP: u32 = 1 << 28;
    pub const PLANAR: u32 = 1 << 29;
    pub const FLAVOR: u32 = 1 << 30;
    pub const BYTE_SWAP: u32 = 1 << 31;

    const STORAGE: u32 = Self::SWAP | Self::PLANAR | Self::FLAVOR | Self::BYTE_SWAP;

    pub const fn new(channels: u32, data_type: DataType) -> Self {
        Self((channels & 0xFFFF) | (data_type.bits() << 24))
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn with_color_offset(self, offset: u32) -> Self {
        Self((self.0 & !(0xFF << 16)) | ((offset & 0xFF) << 16))
    }

    const fn with_flag(self, flag: u32, on: bool) -> Self {
        if on { Self(self.0 | flag) } else { Self(self.0 & !flag) }
    }

    pub const fn with_swap(self, on: bool) -> Self {
        self.with_flag(Self::SWAP, on)
    }

    pub const fn with_planar(self, on: bool) -> Self {
        self.with_flag(Self::PLANAR, on)
    }

    pub const fn with_flavor(self, on: bool) -> Self {
        self.with_flag(Self::FLAVOR, on)
    }

    pub const fn with_byte_swap(self, on: bool) -> Self {
        self.with_flag(Self::BYTE_SWAP, on)
    }

    pub const fn channels(self) -> usize {
        (self.0 & 0xFFFF) as usize
    }

    pub const fn color_offset(self) -> usize {
        ((self.0 >> 16) & 0xFF) as usize
    }

    pub const fn data_type(self) -> Option<DataType> {
        DataType::from_bits((self.0 >> 24) & 0xF)
    }

    pub const fn is_swapped(self) -> bool {
        self.0 & Self::SWAP != 0
    }

    pub const fn is_planar(self) -> bool {
        self.0 & Self::PLANAR != 0
    }

    pub const fn is_flavor(self) -> bool {
        self.0 & Self::FLAVOR != 0
    }

    pub const fn is_byte_swapped(self) -> bool {
        self.0 & Self::BYTE_SWAP != 0
    }

    /// Bytes per sample, 0 for an unknown data type
    pub const fn sample_size(self) -> usize {
        match self.data_type() {
            Some(t) => t.size(),
            None => 0,
        }
    }

    pub const fn pixel_size(self) -> usize {
        self.channels() * self.sample_size()
    }

    /// The layout accessors hand out: interleaved, logical order, host bytes,
    /// values not inverted
    pub const fn normalized(self) -> Self {
        Self(self.0 & !Self::STORAGE).with_color_offset(0)
    }

    pub fn to_text(self) -> String {
        let mut text = format!("{}x", self.channels());
        match self.data_type() {
            Some(t) => text.push_str(&format!("{t:?}").to_lowercase()),
            None => text.push('?'),
        }
        if self.color_offset() > 0 {
            text.push_str(&format!("+{}", self.color_offset()));
        }
        for (flag, name) in [
            (Self::PLANAR, " planar"),
            (Self::SWAP, " swap"),
            (Self::FLAVOR, " flavor"),
            (Self::BYTE_SWAP, " byteswap"),
        ] {
            if self.0 & flag != 0 {
                text.push_str(name);
            }
        }
        text
    }
}

impl fmt::Debug for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PixelLayout({:#010x}: {})", self.0, self.to_text())
    }
}

impl fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Sample addressing derived from a layout.
///
/// Steps are counted in samples. The sample of logical channel `c` at
/// `(x, y)` lives at `y * line_step + x * pixel_step + positions[c] * channel_step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelMask {
    pub pixel_step: usize,
    pub channel_step: usize,
    pub line_step: usize,
    pub sample_size: usize,
    /// Storage position of each logical channel
    pub positions: Vec<usize>,
}

impl PixelMask {
    pub fn new(
        layout: PixelLayout,
        color_channels: usize,
        width: usize,
        height: usize,
    ) -> Result<Self> {
        let channels = layout.channels();
        let data_type = layout
            .data_type()
            .ok_or_else(|| Error::InvalidLayout(format!("unknown data type in {layout:?}")))?;
        if channels == 0 {
            return Err(Error::InvalidLayout("no channels".into()));
        }
        let offset = layout.color_offset();
        if offset + color_channels > channels {
            return Err(Error::InvalidLayout(format!(
                "{color_channels} color channels at offset {offset} exceed {channels} channels"
            )));
        }

        let mut positions: Vec<usize> = (0..color_channels).map(|i| offset + i).collect();
        if layout.is_swapped() {
            positions.reverse();
        }
        positions.extend((0..channels).filter(|p| *p < offset || *p >= offset + color_channels));

        let overflow = || Error::InvalidLayout(format!("{width}x{height} {layout} overflows"));
        let (pixel_step, channel_step, line_step) = if layout.is_planar() {
            (1, width.checked_mul(height).ok_or_else(overflow)?, width)
        } else {
            (channels, 1, width.checked_mul(channels).ok_or_else(overflow)?)
        };
        Ok(Self {
            pixel_step,
            channel_step,
            line_step,
            sample_size: data_type.size(),
            positions,
        })
    }

    /// Sample index of a logical channel
    pub fn sample_index(&self, x: usize, y: usize, channel: usize) -> usize {
        y * self.line_step + x * self.pixel_step + self.positions[channel] * self.channel_step
    }
}
