//! Linear filter chains and their execution
//!
//! A [`Conversion`] is a chain of filter nodes from an input image root to
//! an output node. Execution is pull based: the output node's factory asks
//! its upstream node for a block, which recurses up to the root, and every
//! node transforms the block on the way back.
//!
//! ```text
//! root --> icc_color --> output
//!   ^                      |
//!   +------ pull ----------+
//! ```

use std::fmt::{self, Write as _};
use std::sync::Arc;

use crate::cache::{self, CacheKey};
use crate::connector::connector_match;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::filters;
use crate::icc::{
    LUT16_MAX_CHANNELS, LUT16_MAX_CLUT_SAMPLES, Lut16Data, ProfileClass, RenderingIntent, SignatureField,
    TagSignature, TextData,
};
use crate::image::Image;
use crate::layout::{DataType, PixelLayout};
use crate::module::{Api, CmmApi, ColorLink, LinkRequest, ModuleCode, ModuleRegistry};
use crate::node::FilterNode;
use crate::object::{NameKind, Object, ObjectKind, Struct, copy_as};
use crate::options::Options;
use crate::pixel_access::{AccessKind, PixelAccess};
use crate::profile::Profile;
use crate::tag::Tag;

/// Outcome of one pull
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feedback {
    /// The ticket now holds a block
    Produced,
    /// Nothing left to produce at this position
    End,
    /// Hard error with a positive code
    Failed(i32),
}

impl Feedback {
    /// Integer form: 0 produced, negative end, positive error
    pub fn code(self) -> i32 {
        match self {
            Self::Produced => 0,
            Self::End => -1,
            Self::Failed(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Produced,
            c if c < 0 => Self::End,
            c => Self::Failed(c),
        }
    }
}

/// Samples produced by one pull, interleaved and in host order
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBlock {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl PixelBlock {
    pub fn pixels(&self) -> usize {
        self.width * self.height
    }
}

/// A cached color link with the layouts it was built for
pub struct LinkContext {
    object: Object,
    cmm: ModuleCode,
    api: Arc<dyn CmmApi>,
    link: Box<dyn ColorLink>,
    input_layout: PixelLayout,
    output_layout: PixelLayout,
    hash_text: String,
}

/// Cache key text of a link:
/// `<cmm> <intent> <in hash>:<in layout> <out hash>:<out layout>`
pub fn link_hash_text(
    cmm: ModuleCode,
    intent: RenderingIntent,
    input: &Profile,
    input_layout: PixelLayout,
    output: &Profile,
    output_layout: PixelLayout,
) -> String {
    format!(
        "{cmm} {} {}:{:x} {}:{:x}",
        intent.to_u32(),
        input.hash(),
        input_layout.bits(),
        output.hash(),
        output_layout.bits()
    )
}

impl LinkContext {
    /// Link from the conversion cache, built by `cmm` on a miss
    pub fn obtain(
        cmm: &Api,
        input: &Profile,
        input_layout: PixelLayout,
        output: &Profile,
        output_layout: PixelLayout,
        intent: RenderingIntent,
        options: &Options,
    ) -> Result<Arc<LinkContext>> {
        let api = cmm
            .as_cmm()
            .cloned()
            .ok_or_else(|| Error::ApiNotFound(format!("a CMM in module '{}'", cmm.module())))?;
        let hash_text = link_hash_text(cmm.module(), intent, input, input_layout, output, output_layout);
        let key = CacheKey::from_hash_text(&hash_text);
        cache::service().conversions.get_or_try_insert_with(key, || {
            let input_bytes = input.to_memory();
            let output_bytes = output.to_memory();
            let request = LinkRequest {
                input: &input_bytes,
                output: &output_bytes,
                input_layout,
                output_layout,
                intent,
                options,
            };
            let link = api.create_link(&request)?;
            tracing::debug!(%hash_text, "color link created");
            let object = Object::new(ObjectKind::ColorLink);
            object.set_name(NameKind::Nick, cmm.module().as_str());
            Ok(Arc::new(LinkContext {
                object,
                cmm: cmm.module(),
                api: api.clone(),
                link,
                input_layout,
                output_layout,
                hash_text: hash_text.clone(),
            }))
        })
    }

    pub fn cmm(&self) -> ModuleCode {
        self.cmm
    }

    pub fn cmm_api(&self) -> &Arc<dyn CmmApi> {
        &self.api
    }

    pub fn input_layout(&self) -> PixelLayout {
        self.input_layout
    }

    pub fn output_layout(&self) -> PixelLayout {
        self.output_layout
    }

    pub fn hash_text(&self) -> &str {
        &self.hash_text
    }

    pub fn convert(&self, src: &[u8], dst: &mut [u8], pixels: usize) -> Result<()> {
        let expected_src = pixels * self.input_layout.pixel_size();
        let expected_dst = pixels * self.output_layout.pixel_size();
        if src.len() < expected_src {
            return Err(Error::BufferSize {
                expected: expected_src,
                actual: src.len(),
            });
        }
        if dst.len() < expected_dst {
            return Err(Error::BufferSize {
                expected: expected_dst,
                actual: dst.len(),
            });
        }
        self.link.convert(src, dst, pixels)
    }
}

impl Struct for LinkContext {
    fn object(&self) -> &Object {
        &self.object
    }
}

impl fmt::Debug for LinkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkContext")
            .field("cmm", &self.cmm)
            .field("hash_text", &self.hash_text)
            .finish()
    }
}

/// Which end of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSide {
    Input,
    Output,
}

/// A linear chain of filter nodes
pub struct Conversion {
    object: Object,
    chain: Vec<Arc<FilterNode>>,
    output: Option<usize>,
}

impl Default for Conversion {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversion {
    pub fn new() -> Self {
        Self {
            object: Object::new(ObjectKind::Conversion),
            chain: Vec::new(),
            output: None,
        }
    }

    /// Start the chain at an image root; replaces any previous chain
    pub fn set_input(&mut self, root: Arc<FilterNode>) -> Result<()> {
        if root.socket(0).and_then(|s| s.image()).is_none() {
            return Err(Error::NoInputImage);
        }
        self.release_chain();
        self.chain.push(root);
        Ok(())
    }

    fn release_chain(&mut self) {
        for node in self.chain.drain(..).skip(1) {
            if let Some(plug) = node.plug(0) {
                plug.release();
            }
        }
        self.output = None;
    }

    /// Append a node, connecting its first plug to the tail's first socket.
    ///
    /// On error the chain is left as it was.
    pub fn filter_add(&mut self, node: Arc<FilterNode>) -> Result<()> {
        let tail = self.chain.last().ok_or(Error::NoInputImage)?;
        if self.output.is_some() {
            return Err(Error::NonLinearChain("the chain already ends in an output".into()));
        }
        let connectors = node.filter().connectors();
        if connectors.plugs.len() > 1 || connectors.sockets.len() > 1 {
            return Err(Error::NonLinearChain(format!(
                "'{}' has {} inputs and {} outputs",
                node.filter().registration(),
                connectors.plugs.len(),
                connectors.sockets.len()
            )));
        }
        let plug = node
            .plug(0)
            .ok_or_else(|| Error::ConnectorMismatch(format!("'{}' has no input", node.filter().name())))?;
        let socket = tail
            .socket(0)
            .ok_or_else(|| Error::ConnectorMismatch(format!("'{}' has no output", tail.filter().name())))?;
        if !connector_match(tail, 0, plug.connector()) {
            return Err(Error::ConnectorMismatch(format!(
                "'{}' cannot feed '{}'",
                tail.filter().name(),
                node.filter().name()
            )));
        }
        plug.connect(&socket)?;
        self.chain.push(node);
        Ok(())
    }

    /// Append the node that ends the chain
    pub fn set_output(&mut self, node: Arc<FilterNode>) -> Result<()> {
        self.filter_add(node)?;
        self.output = Some(self.chain.len() - 1);
        Ok(())
    }

    /// Build `root -> icc_color -> output` between two images.
    ///
    /// `options` override the ICC color filter's defaults.
    pub fn create_basic_pixels(
        input: Arc<Image>,
        output: Arc<Image>,
        options: Option<&Options>,
        registry: &Arc<ModuleRegistry>,
    ) -> Result<Conversion> {
        let root = FilterNode::create(&Filter::new(filters::ROOT_PATTERN, None, None, registry)?);
        if let Some(socket) = root.socket(0) {
            socket.set_image(Some(input));
        }
        let icc = FilterNode::create(&Filter::new(filters::ICC_COLOR_PATTERN, None, options, registry)?);
        let out = FilterNode::create(&Filter::new(filters::OUTPUT_PATTERN, None, None, registry)?);
        if let Some(socket) = out.socket(0) {
            socket.set_image(Some(output));
        }

        let mut conversion = Conversion::new();
        conversion.set_input(root)?;
        conversion.filter_add(icc)?;
        conversion.set_output(out)?;
        Ok(conversion)
    }

    fn last_node(&self) -> Option<&Arc<FilterNode>> {
        match self.output {
            Some(index) => self.chain.get(index),
            None => self.chain.last(),
        }
    }

    /// Pull one block through the chain into `ticket`
    pub fn run_pixels(&self, ticket: &mut PixelAccess) -> Feedback {
        match self.last_node() {
            Some(node) => node.run(ticket),
            None => Feedback::Failed(Error::NoInputImage.code()),
        }
    }

    /// Blocks from the ticket's start to the end of the image.
    ///
    /// The iterator stops after the last block or after the first error.
    pub fn blocks<'a>(&'a self, ticket: &'a mut PixelAccess) -> Blocks<'a> {
        Blocks {
            conversion: self,
            ticket,
            done: false,
        }
    }

    /// Convert a single pixel of the input image
    pub fn get_one_pixel(&self, x: usize, y: usize) -> Result<Vec<u8>> {
        let input = self.image(ImageSide::Input).ok_or(Error::NoInputImage)?;
        let mut ticket = PixelAccess::create(x, y, &input, AccessKind::Point);
        match self.run_pixels(&mut ticket) {
            Feedback::Produced => ticket
                .take_block()
                .map(|block| block.data)
                .ok_or_else(|| self.feedback_error(Feedback::Failed(Error::NoInputImage.code()))),
            Feedback::End => Err(Error::OutOfRange(format!("pixel ({x}, {y})"))),
            failed => Err(self.feedback_error(failed)),
        }
    }

    fn feedback_error(&self, feedback: Feedback) -> Error {
        Error::Feedback {
            filter: self
                .last_node()
                .map(|n| n.filter().registration().to_string())
                .unwrap_or_default(),
            code: feedback.code(),
        }
    }

    pub fn image(&self, side: ImageSide) -> Option<Arc<Image>> {
        let node = match side {
            ImageSide::Input => self.chain.first(),
            ImageSide::Output => self.output.and_then(|i| self.chain.get(i)),
        }?;
        node.socket(0)?.image()
    }

    pub fn node(&self, index: usize) -> Option<Arc<FilterNode>> {
        self.chain.get(index).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.chain.len()
    }

    /// Graphviz dot text of the chain
    pub fn to_text(&self) -> String {
        let mut dot = String::from("digraph conversion {\n  rankdir=LR;\n");
        for node in &self.chain {
            let _ = writeln!(
                dot,
                "  n{} [shape=record, label=\"{}|{}\"];",
                node.id(),
                node.filter().name(),
                node.filter().registration()
            );
        }
        for pair in self.chain.windows(2) {
            let _ = writeln!(dot, "  n{} -> n{} [label=\"0 -> 0\"];", pair[0].id(), pair[1].id());
        }
        dot.push_str("}\n");
        dot
    }

    /// Text identifying the chain: filters with options plus both images
    pub fn hash_text(&self) -> String {
        let mut text = String::new();
        for (i, node) in self.chain.iter().enumerate() {
            if i > 0 {
                text.push_str(" -> ");
            }
            let _ = write!(text, "{} {}", node.filter().registration(), node.options());
        }
        for side in [ImageSide::Input, ImageSide::Output] {
            if let Some(image) = self.image(side) {
                let _ = write!(text, " {}:{:x}", image.profile().hash(), image.layout().bits());
            }
        }
        text
    }

    fn link_context(&self) -> Result<Arc<LinkContext>> {
        for node in &self.chain {
            if let Some(context) = node.context()? {
                if context.object().kind() == ObjectKind::ColorLink {
                    return copy_as::<LinkContext>(&context, ObjectKind::ColorLink);
                }
            }
        }
        Err(Error::ApiNotFound("a color link in the conversion".into()))
    }

    /// Sample the chain's color link into a device link profile.
    ///
    /// Every input channel is sampled on `grid_points` nodes over `0..=1`;
    /// the result is stored as an `mft2` `A2B0` tag. Tables larger than
    /// [`LUT16_MAX_CLUT_SAMPLES`] are refused.
    pub fn to_device_link(&self, grid_points: u8) -> Result<Arc<Profile>> {
        if grid_points < 2 {
            return Err(Error::OutOfRange(format!("{grid_points} grid points")));
        }
        let input = self.image(ImageSide::Input).ok_or(Error::NoInputImage)?;
        let output = self
            .image(ImageSide::Output)
            .ok_or_else(|| Error::InvalidProfile("conversion has no output image".into()))?;
        let context = self.link_context()?;
        let in_space = input.profile().color_space()?;
        let out_space = output.profile().color_space()?;
        let in_channels = in_space.channels();
        let out_channels = out_space.channels();
        for channels in [in_channels, out_channels] {
            if !(1..=LUT16_MAX_CHANNELS).contains(&channels) {
                return Err(Error::OutOfRange(format!("{channels} channels in a lut16 table")));
            }
        }
        let grid = grid_points as usize;
        let nodes = grid
            .checked_pow(in_channels as u32)
            .filter(|n| n.saturating_mul(in_channels.max(out_channels)) <= LUT16_MAX_CLUT_SAMPLES)
            .ok_or_else(|| {
                Error::OutOfRange(format!("{grid_points} grid points over {in_channels} channels"))
            })?;
        let intent = match self
            .chain
            .iter()
            .find(|n| n.options().get(filters::RENDERING_INTENT).is_some())
        {
            Some(node) => filters::rendering_intent(node.options())?,
            None => RenderingIntent::default(),
        };

        let in_bytes = input.profile().to_memory();
        let out_bytes = output.profile().to_memory();
        let options = Options::new();
        let request = LinkRequest {
            input: &in_bytes,
            output: &out_bytes,
            input_layout: PixelLayout::new(in_channels as u32, DataType::F32),
            output_layout: PixelLayout::new(out_channels as u32, DataType::F32),
            intent,
            options: &options,
        };
        let link = context.cmm_api().create_link(&request)?;

        let mut src = Vec::with_capacity(nodes * in_channels);
        for index in 0..nodes {
            let mut rest = index;
            let mut coords = vec![0f32; in_channels];
            for coord in coords.iter_mut().rev() {
                *coord = (rest % grid) as f32 / (grid - 1) as f32;
                rest /= grid;
            }
            src.extend_from_slice(&coords);
        }
        let mut dst = vec![0f32; nodes * out_channels];
        link.convert(
            bytemuck::cast_slice(&src),
            bytemuck::cast_slice_mut(&mut dst),
            nodes,
        )?;
        let clut = dst
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 65535.0).round() as u16)
            .collect();
        let lut = Lut16Data {
            input_channels: in_channels as u8,
            output_channels: out_channels as u8,
            grid_points,
            clut,
        };

        let profile = Profile::from_signature(in_space);
        profile.set_signature(SignatureField::Class, ProfileClass::DeviceLink.to_u32());
        profile.set_signature(SignatureField::Pcs, out_space.to_u32());
        profile.set_signature(SignatureField::Intent, intent.to_u32());
        let description = format!(
            "{} -> {}",
            input.profile().text(NameKind::Name),
            output.profile().text(NameKind::Name)
        );
        profile.add_tag(Tag::new(TagSignature::DESC, TextData::new(description).encode_mluc()), None);
        profile.add_tag(Tag::new(TagSignature::A2B0, lut.encode()), None);
        let data = profile.to_memory();
        tracing::debug!(size = data.len(), grid_points, cmm = %context.cmm(), "device link sampled");
        Ok(profile)
    }
}

impl Struct for Conversion {
    fn object(&self) -> &Object {
        &self.object
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversion")
            .field("id", &self.object.id())
            .field("chain", &self.chain)
            .field("output", &self.output)
            .finish()
    }
}

/// Iterator over the blocks of a conversion
pub struct Blocks<'a> {
    conversion: &'a Conversion,
    ticket: &'a mut PixelAccess,
    done: bool,
}

impl Iterator for Blocks<'_> {
    type Item = Result<PixelBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || !self.ticket.in_bounds() {
            return None;
        }
        match self.conversion.run_pixels(self.ticket) {
            Feedback::Produced => {
                let block = self.ticket.take_block();
                self.done = !self.ticket.advance();
                match block {
                    Some(block) => Some(Ok(block)),
                    None => {
                        self.done = true;
                        Some(Err(self.conversion.feedback_error(Feedback::Failed(
                            Error::NoInputImage.code(),
                        ))))
                    }
                }
            }
            Feedback::End => {
                self.done = true;
                None
            }
            failed => {
                self.done = true;
                Some(Err(self.conversion.feedback_error(failed)))
            }
        }
    }
}

impl std::iter::FusedIterator for Blocks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_codes() {
        assert_eq!(Feedback::Produced.code(), 0);
        assert!(Feedback::End.code() < 0);
        assert_eq!(Feedback::Failed(7).code(), 7);
        for feedback in [Feedback::Produced, Feedback::End, Feedback::Failed(3)] {
            assert_eq!(Feedback::from_code(feedback.code()), feedback);
        }
    }

    #[test]
    fn test_empty_conversion() {
        let conversion = Conversion::new();
        assert_eq!(conversion.node_count(), 0);
        assert!(conversion.image(ImageSide::Input).is_none());
        assert!(matches!(conversion.get_one_pixel(0, 0), Err(Error::NoInputImage)));
        assert_eq!(conversion.to_text(), "digraph conversion {\n  rankdir=LR;\n}\n");
    }
}
