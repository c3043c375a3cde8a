//! Images with layout aware accessors
//!
//! Storage may be planar, channel swapped or in foreign byte order. Every
//! accessor hands out and takes samples interleaved, in logical channel
//! order (color channels first), in host byte order and with flavored
//! (inverted) values flipped back, i.e. in the layout returned by
//! [`PixelLayout::normalized`].

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::layout::{ChannelType, DataType, PixelLayout, PixelMask, channel_types};
use crate::object::{NameKind, Object, ObjectKind, Struct};
use crate::profile::Profile;

/// Region of interest in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }
}

/// Row-major matrix of normalized pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Array2d {
    width: usize,
    height: usize,
    pixel_size: usize,
    data: Vec<u8>,
}

impl Array2d {
    pub fn new(width: usize, height: usize, pixel_size: usize) -> Self {
        Self {
            width,
            height,
            pixel_size,
            data: vec![0; width * height * pixel_size],
        }
    }

    pub fn from_vec(width: usize, height: usize, pixel_size: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width * height * pixel_size;
        if data.len() != expected {
            return Err(Error::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixel_size,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let len = self.width * self.pixel_size;
        &self.data[y * len..(y + 1) * len]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let len = self.width * self.pixel_size;
        &mut self.data[y * len..(y + 1) * len]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// Pixel buffer with a layout and a profile
pub struct Image {
    object: Object,
    width: usize,
    height: usize,
    layout: PixelLayout,
    mask: PixelMask,
    color_channels: usize,
    /// Set for flavored layouts
    inverted: Option<DataType>,
    channel_types: RwLock<Vec<ChannelType>>,
    profile: Arc<Profile>,
    data: RwLock<Vec<u8>>,
}

impl Image {
    /// Create an image, zero filled when no buffer is given.
    ///
    /// The buffer length must match the layout exactly.
    pub fn create(
        width: usize,
        height: usize,
        buffer: Option<Vec<u8>>,
        layout: PixelLayout,
        profile: Arc<Profile>,
    ) -> Result<Arc<Image>> {
        let color_channels = profile.channel_count().min(layout.channels());
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(layout.pixel_size()))
            .ok_or_else(|| Error::InvalidLayout(format!("{width}x{height} {layout} overflows")))?;
        let mask = PixelMask::new(layout, color_channels, width, height)?;
        let data = match buffer {
            Some(data) if data.len() != expected => {
                return Err(Error::BufferSize {
                    expected,
                    actual: data.len(),
                });
            }
            Some(data) => data,
            None => vec![0; expected],
        };
        let types = channel_types(profile.color_space().ok(), color_channels, layout.channels());

        let object = Object::new(ObjectKind::Image);
        object.set_name(NameKind::Nick, format!("{width}x{height} {layout}"));
        tracing::debug!(id = object.id(), width, height, %layout, "image created");
        Ok(Arc::new(Self {
            object,
            width,
            height,
            layout,
            mask,
            color_channels,
            inverted: layout.data_type().filter(|_| layout.is_flavor()),
            channel_types: RwLock::new(types),
            profile,
            data: RwLock::new(data),
        }))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn mask(&self) -> &PixelMask {
        &self.mask
    }

    pub fn profile(&self) -> &Arc<Profile> {
        &self.profile
    }

    pub fn color_channels(&self) -> usize {
        self.color_channels
    }

    pub fn channel_types(&self) -> Vec<ChannelType> {
        self.channel_types.read().clone()
    }

    /// Override the derived channel types, e.g. to mark an alpha channel
    pub fn set_channel_types(&self, types: &[ChannelType]) -> Result<()> {
        if types.len() != self.layout.channels() {
            return Err(Error::InvalidLayout(format!(
                "{} channel types for {} channels",
                types.len(),
                self.layout.channels()
            )));
        }
        *self.channel_types.write() = types.to_vec();
        Ok(())
    }

    /// Bytes of one pixel as handed out by the accessors
    pub fn pixel_size(&self) -> usize {
        self.layout.pixel_size()
    }

    /// Whether the pixel lies inside the image
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    fn check_span(&self, x: usize, y: usize, count: usize) -> Result<()> {
        if y >= self.height || x >= self.width || count > self.width - x {
            return Err(Error::OutOfRange(format!(
                "{count} pixels at ({x}, {y}) in {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    fn gather(&self, data: &[u8], x: usize, y: usize, count: usize, out: &mut [u8]) {
        let ss = self.mask.sample_size;
        let channels = self.mask.positions.len();
        let swap = self.layout.is_byte_swapped();
        for i in 0..count {
            for c in 0..channels {
                let src = self.mask.sample_index(x + i, y, c) * ss;
                let dst = (i * channels + c) * ss;
                let sample = &mut out[dst..dst + ss];
                sample.copy_from_slice(&data[src..src + ss]);
                if swap {
                    sample.reverse();
                }
                if let Some(data_type) = self.inverted {
                    data_type.invert_sample(sample);
                }
            }
        }
    }

    fn scatter(&self, data: &mut [u8], x: usize, y: usize, count: usize, src: &[u8]) {
        let ss = self.mask.sample_size;
        let channels = self.mask.positions.len();
        let swap = self.layout.is_byte_swapped();
        for i in 0..count {
            for c in 0..channels {
                let dst = self.mask.sample_index(x + i, y, c) * ss;
                let from = (i * channels + c) * ss;
                let sample = &mut data[dst..dst + ss];
                sample.copy_from_slice(&src[from..from + ss]);
                if let Some(data_type) = self.inverted {
                    data_type.invert_sample(sample);
                }
                if swap {
                    sample.reverse();
                }
            }
        }
    }

    /// Read `count` pixels of row `y` starting at `x` into `out`
    pub fn read_span(&self, x: usize, y: usize, count: usize, out: &mut [u8]) -> Result<()> {
        self.check_span(x, y, count)?;
        let expected = count * self.pixel_size();
        if out.len() < expected {
            return Err(Error::BufferSize {
                expected,
                actual: out.len(),
            });
        }
        self.gather(&self.data.read(), x, y, count, out);
        Ok(())
    }

    /// Write `count` pixels of row `y` starting at `x` from `src`
    pub fn write_span(&self, x: usize, y: usize, count: usize, src: &[u8]) -> Result<()> {
        self.check_span(x, y, count)?;
        let expected = count * self.pixel_size();
        if src.len() < expected {
            return Err(Error::BufferSize {
                expected,
                actual: src.len(),
            });
        }
        self.scatter(&mut self.data.write(), x, y, count, src);
        Ok(())
    }

    pub fn pixel(&self, x: usize, y: usize) -> Result<Vec<u8>> {
        let mut out = vec![0; self.pixel_size()];
        self.read_span(x, y, 1, &mut out)?;
        Ok(out)
    }

    pub fn set_pixel(&self, x: usize, y: usize, samples: &[u8]) -> Result<()> {
        self.write_span(x, y, 1, samples)
    }

    pub fn line(&self, y: usize) -> Result<Vec<u8>> {
        let mut out = vec![0; self.width * self.pixel_size()];
        self.read_span(0, y, self.width, &mut out)?;
        Ok(out)
    }

    pub fn set_line(&self, y: usize, samples: &[u8]) -> Result<()> {
        self.write_span(0, y, self.width, samples)
    }

    /// Row-major block of `width` x `height` pixels
    pub fn tile(&self, x: usize, y: usize, width: usize, height: usize) -> Result<Vec<u8>> {
        Ok(self.fill_array(Rect::new(x, y, width, height))?.into_vec())
    }

    /// Copy a region out of the image
    pub fn fill_array(&self, roi: Rect) -> Result<Array2d> {
        if roi.y + roi.height > self.height {
            return Err(Error::OutOfRange(format!("rows {}..{}", roi.y, roi.y + roi.height)));
        }
        let mut array = Array2d::new(roi.width, roi.height, self.pixel_size());
        if roi.width == 0 {
            return Ok(array);
        }
        self.check_span(roi.x, roi.y, roi.width)?;
        let data = self.data.read();
        for row in 0..roi.height {
            self.gather(&data, roi.x, roi.y + row, roi.width, array.row_mut(row));
        }
        Ok(array)
    }

    /// Copy an array into the region of the image it covers
    pub fn read_array(&self, roi: Rect, array: &Array2d) -> Result<()> {
        if array.width < roi.width || array.height < roi.height || array.pixel_size != self.pixel_size() {
            return Err(Error::BufferSize {
                expected: roi.width * roi.height * self.pixel_size(),
                actual: array.data.len(),
            });
        }
        if roi.y + roi.height > self.height {
            return Err(Error::OutOfRange(format!("rows {}..{}", roi.y, roi.y + roi.height)));
        }
        if roi.width == 0 {
            return Ok(());
        }
        self.check_span(roi.x, roi.y, roi.width)?;
        let mut data = self.data.write();
        for row in 0..roi.height {
            self.scatter(&mut data, roi.x, roi.y + row, roi.width, array.row(row));
        }
        Ok(())
    }

    /// Raw storage bytes in the image's own layout
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl Struct for Image {
    fn object(&self) -> &Object {
        &self.object
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("id", &self.object.id())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .finish()
    }
}
