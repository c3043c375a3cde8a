//! Pixel access tickets
//!
//! A [`PixelAccess`] describes which pixels one pull through a conversion
//! should produce: a start coordinate plus a table of relative steps. The
//! same table replays from any start, which is how a conversion walks an
//! image block by block.

use std::any::Any;
use std::fmt;

use crate::conversion::PixelBlock;
use crate::image::{Image, Rect};
use crate::object::{Object, ObjectKind, Struct};

/// Shape of the block one pull produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// A single pixel
    Point,
    /// One scanline of the image width
    Line,
    /// A row-major tile
    Tile { width: usize, height: usize },
}

/// Buffers kept for reuse between pulls
const MAX_POOLED: usize = 4;

pub struct PixelAccess {
    object: Object,
    kind: AccessKind,
    start: (usize, usize),
    /// Advance applied after visiting each pixel
    steps: Vec<(isize, isize)>,
    index: usize,
    bounds: (usize, usize),
    block: Option<PixelBlock>,
    pool: Vec<Vec<u8>>,
    user_data: Option<Box<dyn Any + Send + Sync>>,
}

fn step_table(kind: AccessKind, image_width: usize) -> Vec<(isize, isize)> {
    match kind {
        AccessKind::Point => vec![(0, 0)],
        AccessKind::Line => vec![(1, 0); image_width],
        AccessKind::Tile { width, height } => {
            let back = -(width as isize - 1);
            let mut steps = Vec::with_capacity(width * height);
            for _ in 0..height {
                steps.extend(std::iter::repeat_n((1, 0), width.saturating_sub(1)));
                steps.push((back, 1));
            }
            steps
        }
    }
}

impl PixelAccess {
    /// Ticket starting at `(x, y)` of `image`.
    ///
    /// Tile sides of zero are taken as one, so every block covers a pixel.
    pub fn create(x: usize, y: usize, image: &Image, kind: AccessKind) -> Self {
        let kind = match kind {
            AccessKind::Tile { width, height } => AccessKind::Tile {
                width: width.max(1),
                height: height.max(1),
            },
            other => other,
        };
        Self {
            object: Object::new(ObjectKind::PixelAccess),
            kind,
            start: (x, y),
            steps: step_table(kind, image.width()),
            index: 0,
            bounds: (image.width(), image.height()),
            block: None,
            pool: Vec::new(),
            user_data: None,
        }
    }

    pub fn kind(&self) -> AccessKind {
        self.kind
    }

    pub fn start(&self) -> (usize, usize) {
        self.start
    }

    pub fn pixels_per_block(&self) -> usize {
        self.steps.len()
    }

    /// Width and height of the image the ticket was made for
    pub fn bounds(&self) -> (usize, usize) {
        self.bounds
    }

    /// Index of the next step `next_position` will take
    pub fn index(&self) -> usize {
        self.index
    }

    /// Replay the step table from a new start
    pub fn reset(&mut self, x: usize, y: usize) {
        self.start = (x, y);
        self.index = 0;
    }

    /// Absolute coordinates of the whole block, in step order
    pub fn positions(&self) -> impl Iterator<Item = (isize, isize)> + '_ {
        let start = (self.start.0 as isize, self.start.1 as isize);
        self.steps.iter().scan(start, |cur, step| {
            let here = *cur;
            cur.0 += step.0;
            cur.1 += step.1;
            Some(here)
        })
    }

    /// Walk the table one pixel at a time; `None` once it is exhausted
    pub fn next_position(&mut self) -> Option<(isize, isize)> {
        let position = self.positions().nth(self.index)?;
        self.index += 1;
        Some(position)
    }

    /// Whether the current start lies inside the image
    pub fn in_bounds(&self) -> bool {
        self.start.0 < self.bounds.0 && self.start.1 < self.bounds.1
    }

    /// Region the block covers, clipped to the image
    pub fn region(&self) -> Rect {
        let (x, y) = self.start;
        let (width, height) = match self.kind {
            AccessKind::Point => (1, 1),
            AccessKind::Line => (self.bounds.0, 1),
            AccessKind::Tile { width, height } => (width, height),
        };
        Rect::new(
            x,
            y,
            width.min(self.bounds.0.saturating_sub(x)),
            height.min(self.bounds.1.saturating_sub(y)),
        )
    }

    /// Move the start to the next block; false past the last one
    pub fn advance(&mut self) -> bool {
        let (x, y) = self.start;
        let (width, height) = self.bounds;
        let next = match self.kind {
            AccessKind::Point if x + 1 < width => (x + 1, y),
            AccessKind::Point => (0, y + 1),
            AccessKind::Line => (x, y + 1),
            AccessKind::Tile { width: tw, .. } if x + tw < width => (x + tw, y),
            AccessKind::Tile { height: th, .. } => (0, y + th),
        };
        self.reset(next.0, next.1);
        next.1 < height
    }

    /// Take the block the last pull left behind
    pub fn take_block(&mut self) -> Option<PixelBlock> {
        self.block.take()
    }

    pub fn block(&self) -> Option<&PixelBlock> {
        self.block.as_ref()
    }

    pub fn set_block(&mut self, block: PixelBlock) {
        self.block = Some(block);
    }

    /// A zeroed buffer of `len` bytes, reusing a recycled allocation
    pub fn take_buffer(&mut self, len: usize) -> Vec<u8> {
        let mut buffer = self.pool.pop().unwrap_or_default();
        buffer.clear();
        buffer.resize(len, 0);
        buffer
    }

    /// Hand a no longer needed buffer back for reuse
    pub fn recycle(&mut self, buffer: Vec<u8>) {
        if self.pool.len() < MAX_POOLED {
            self.pool.push(buffer);
        }
    }

    pub fn set_user_data(&mut self, data: Box<dyn Any + Send + Sync>) {
        self.user_data = Some(data);
    }

    pub fn user_data<T: Any>(&self) -> Option<&T> {
        self.user_data.as_ref()?.downcast_ref::<T>()
    }
}

impl Struct for PixelAccess {
    fn object(&self) -> &Object {
        &self.object
    }
}

impl fmt::Debug for PixelAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelAccess")
            .field("kind", &self.kind)
            .field("start", &self.start)
            .field("pixels_per_block", &self.pixels_per_block())
            .field("index", &self.index)
            .finish()
    }
}
