//! One trait per API kind

use std::sync::Arc;

use crate::connector::Connectors;
use crate::conversion::Feedback;
use crate::error::Result;
use crate::icc::{ColorSpace, RenderingIntent, TagValue, TypeSignature};
use crate::layout::{DataType, PixelLayout};
use crate::node::FilterNode;
use crate::object::Struct;
use crate::options::Options;
use crate::pixel_access::PixelAccess;

/// A capability an API is asked about before it is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Reads profiles of this ICC major version
    ProfileFormat(u32),
    /// Decodes this tag type
    TagTypeRead(TypeSignature),
    /// Encodes this tag type
    TagTypeWrite(TypeSignature),
    /// Processes samples of this type
    DataType(DataType),
    /// Handles this data color space
    ColorSpace(ColorSpace),
}

impl Capability {
    /// `(query, value)` pair passed through the module ABI
    pub fn to_raw(self) -> (u32, u32) {
        match self {
            Self::ProfileFormat(version) => (1, version),
            Self::TagTypeRead(sig) => (2, sig.0),
            Self::TagTypeWrite(sig) => (3, sig.0),
            Self::DataType(data_type) => (4, data_type.bits()),
            Self::ColorSpace(space) => (5, space.to_u32()),
        }
    }

    pub fn from_raw(query: u32, value: u32) -> Option<Self> {
        match query {
            1 => Some(Self::ProfileFormat(value)),
            2 => Some(Self::TagTypeRead(TypeSignature(value))),
            3 => Some(Self::TagTypeWrite(TypeSignature(value))),
            4 => DataType::from_bits(value).map(Self::DataType),
            5 => ColorSpace::from_u32(value).ok().map(Self::ColorSpace),
            _ => None,
        }
    }
}

/// Everything a CMM needs to build a link
#[derive(Debug, Clone, Copy)]
pub struct LinkRequest<'a> {
    /// Serialized source profile
    pub input: &'a [u8],
    /// Serialized destination profile
    pub output: &'a [u8],
    /// Interleaved, host order layout of the source samples
    pub input_layout: PixelLayout,
    /// Interleaved, host order layout of the destination samples
    pub output_layout: PixelLayout,
    pub intent: RenderingIntent,
    pub options: &'a Options,
}

/// A ready to run profile to profile transform
pub trait ColorLink: Send + Sync {
    /// Convert `pixels` pixels from `src` into `dst`
    fn convert(&self, src: &[u8], dst: &mut [u8], pixels: usize) -> Result<()>;
}

/// Profile transform API (kind 1)
pub trait CmmApi: Send + Sync {
    fn registration(&self) -> &str;
    fn can_handle(&self, query: Capability) -> bool;
    fn create_link(&self, request: &LinkRequest<'_>) -> Result<Box<dyn ColorLink>>;
}

/// Monitor API (kind 2)
pub trait MonitorApi: Send + Sync {
    fn registration(&self) -> &str;
    fn can_handle(&self, query: Capability) -> bool;
    /// Number of attached monitors
    fn count(&self) -> usize;
    /// Profile bytes of a monitor
    fn profile(&self, index: usize) -> Option<Vec<u8>>;
}

/// Tag codec API (kind 3)
pub trait TagCodecApi: Send + Sync {
    fn registration(&self) -> &str;
    fn can_handle(&self, query: Capability) -> bool;
    /// Decode a complete tag payload, type header included
    fn decode(&self, payload: &[u8]) -> Result<TagValue>;
}

/// Connection change delivered to a node's factory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// A plug of this node or a plug requesting one of its sockets got connected
    Connected,
    /// Such a connection went away
    Released,
}

/// Filter factory API (kind 4)
pub trait FilterFactory: Send + Sync {
    /// Slash separated registration, e.g. `org/oxcmm/imaging/root`
    fn registration(&self) -> &str;

    fn name(&self) -> &str;

    fn category(&self) -> &str;

    fn can_handle(&self, query: Capability) -> bool {
        let _ = query;
        true
    }

    fn connectors(&self) -> &Connectors;

    fn default_options(&self) -> Options {
        Options::new()
    }

    /// Backend data created on a node's first run
    fn create_context(&self, node: &FilterNode) -> Result<Option<Arc<dyn Struct>>> {
        let _ = node;
        Ok(None)
    }

    /// Produce the block described by `ticket`, pulling from upstream as needed
    fn run(&self, node: &FilterNode, ticket: &mut PixelAccess) -> Feedback;

    fn on_signal(&self, node: &FilterNode, signal: Signal) {
        let _ = (node, signal);
    }
}
