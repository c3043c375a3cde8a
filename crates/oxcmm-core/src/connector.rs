//! Plug and socket descriptors
//!
//! A [`Connector`] describes what one endpoint of a filter accepts or
//! produces. Descriptors are built once by a factory and never change.

use crate::layout::{ChannelType, DataType, PixelLayout};
use crate::node::FilterNode;

/// Capabilities of one plug or socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connector {
    pub nick: String,
    pub name: String,
    /// Registration style type, e.g. `//imaging/data`
    pub connector_type: String,
    pub is_plug: bool,
    pub data_types: Vec<DataType>,
    pub max_color_offset: usize,
    pub min_channels: usize,
    pub max_channels: usize,
    pub min_color_channels: usize,
    pub max_color_channels: usize,
    pub can_planar: bool,
    pub can_interwoven: bool,
    pub can_swap: bool,
    pub can_swap_bytes: bool,
    pub can_revert: bool,
    pub can_premultiplied_alpha: bool,
    pub can_nonpremultiplied_alpha: bool,
    pub can_subpixel: bool,
    /// Channel types that must be present
    pub channel_types: Vec<ChannelType>,
    pub id: u32,
    pub is_mandatory: bool,
}

pub const IMAGING_DATA: &str = "//imaging/data";

const ALL_DATA_TYPES: [DataType; 6] = [
    DataType::U8,
    DataType::U16,
    DataType::U32,
    DataType::Half,
    DataType::F32,
    DataType::F64,
];

impl Connector {
    fn template(nick: &str, is_plug: bool) -> Self {
        Self {
            nick: nick.to_string(),
            name: nick.to_string(),
            connector_type: IMAGING_DATA.to_string(),
            is_plug,
            data_types: ALL_DATA_TYPES.to_vec(),
            max_color_offset: 0xFF,
            min_channels: 1,
            max_channels: 0xFFFF,
            min_color_channels: 1,
            max_color_channels: 0xFFFF,
            can_planar: true,
            can_interwoven: true,
            can_swap: true,
            can_swap_bytes: true,
            can_revert: true,
            can_premultiplied_alpha: true,
            can_nonpremultiplied_alpha: true,
            can_subpixel: false,
            channel_types: Vec::new(),
            id: 0,
            is_mandatory: true,
        }
    }

    /// Input endpoint accepting any image data
    pub fn plug(nick: &str) -> Self {
        Self::template(nick, true)
    }

    /// Output endpoint producing any image data
    pub fn socket(nick: &str) -> Self {
        Self::template(nick, false)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_data_types(mut self, types: &[DataType]) -> Self {
        self.data_types = types.to_vec();
        self
    }

    pub fn with_channels(mut self, min: usize, max: usize) -> Self {
        self.min_channels = min;
        self.max_channels = max;
        self
    }

    pub fn with_color_channels(mut self, min: usize, max: usize) -> Self {
        self.min_color_channels = min;
        self.max_color_channels = max;
        self
    }

    pub fn with_channel_types(mut self, types: &[ChannelType]) -> Self {
        self.channel_types = types.to_vec();
        self
    }

    /// Accept only interleaved host-order samples in logical order
    pub fn interleaved_only(mut self) -> Self {
        self.can_planar = false;
        self.can_swap = false;
        self.can_swap_bytes = false;
        self.can_revert = false;
        self
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_mandatory = false;
        self
    }

    /// Whether a layout's storage flags are acceptable
    pub fn accepts_layout(&self, layout: PixelLayout) -> bool {
        (layout.is_planar() && self.can_planar || !layout.is_planar() && self.can_interwoven)
            && (!layout.is_swapped() || self.can_swap)
            && (!layout.is_byte_swapped() || self.can_swap_bytes)
            && (!layout.is_flavor() || self.can_revert)
            && layout.color_offset() <= self.max_color_offset
    }
}

/// The endpoint set of a filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connectors {
    pub plugs: Vec<Connector>,
    /// Additional plugs allowed beyond the static ones
    pub extra_plugs: usize,
    pub sockets: Vec<Connector>,
    pub extra_sockets: usize,
}

impl Connectors {
    pub fn new(plugs: Vec<Connector>, sockets: Vec<Connector>) -> Self {
        Self {
            plugs,
            extra_plugs: 0,
            sockets,
            extra_sockets: 0,
        }
    }

    /// Number of plugs a node gets.
    ///
    /// The last static plug doubles as the template of the extra ones, so
    /// it is not counted twice when extras are allowed.
    pub fn plug_count(&self) -> usize {
        endpoint_count(self.plugs.len(), self.extra_plugs)
    }

    pub fn socket_count(&self) -> usize {
        endpoint_count(self.sockets.len(), self.extra_sockets)
    }

    /// Descriptor of plug `index`, falling back to the extra template
    pub fn plug(&self, index: usize) -> Option<&Connector> {
        descriptor(&self.plugs, index, self.plug_count())
    }

    pub fn socket(&self, index: usize) -> Option<&Connector> {
        descriptor(&self.sockets, index, self.socket_count())
    }
}

fn endpoint_count(statics: usize, extra: usize) -> usize {
    if extra > 0 { (statics + extra).saturating_sub(1) } else { statics }
}

fn descriptor(list: &[Connector], index: usize, count: usize) -> Option<&Connector> {
    if index >= count {
        return None;
    }
    list.get(index).or_else(|| list.last())
}

/// What a socket hands out: from its image if attached, else its template
#[derive(Debug, Clone, PartialEq, Eq)]
struct Produced {
    channels: usize,
    color_channels: usize,
    data_type: Option<DataType>,
    layout: Option<PixelLayout>,
    channel_types: Vec<ChannelType>,
}

fn produced(node: &FilterNode, output_index: usize) -> Option<Produced> {
    let socket = node.socket(output_index)?;
    if let Some(image) = socket.image() {
        let layout = image.layout();
        return Some(Produced {
            channels: layout.channels(),
            color_channels: image.color_channels(),
            data_type: layout.data_type(),
            layout: Some(layout),
            channel_types: image.channel_types().to_vec(),
        });
    }
    let template = socket.connector();
    let channels = template.min_channels.max(template.channel_types.len());
    let mut channel_types = template.channel_types.clone();
    channel_types.resize(channels, ChannelType::ColorLightness);
    Some(Produced {
        channels,
        color_channels: template.min_color_channels,
        data_type: template.data_types.first().copied(),
        layout: None,
        channel_types,
    })
}

/// Check that output `output_index` of `node_a` fits connector `b`.
///
/// The checks run in a fixed order and stop at the first failure, which
/// is traced with its reason.
pub fn connector_match(node_a: &FilterNode, output_index: usize, b: &Connector) -> bool {
    match mismatch(node_a, output_index, b) {
        None => true,
        Some(reason) => {
            tracing::debug!(node = node_a.id(), output_index, plug = %b.nick, reason, "connector mismatch");
            false
        }
    }
}

fn mismatch(node_a: &FilterNode, output_index: usize, b: &Connector) -> Option<&'static str> {
    if !b.is_plug {
        return Some("not a plug");
    }
    let Some(a) = produced(node_a, output_index) else {
        return Some("no such socket");
    };
    if a.channels < b.min_channels || a.channels > b.max_channels {
        return Some("channel count out of range");
    }
    if a.color_channels < b.min_color_channels || a.color_channels > b.max_color_channels {
        return Some("color channel count out of range");
    }
    match a.data_type {
        Some(t) if b.data_types.contains(&t) => {}
        _ => return Some("data type not accepted"),
    }
    if let Some(layout) = a.layout {
        if !b.accepts_layout(layout) {
            return Some("storage layout not accepted");
        }
    }
    if !b
        .channel_types
        .iter()
        .all(|required| a.channel_types.iter().any(|t| t.satisfies(*required)))
    {
        return Some("required channel type missing");
    }
    let premultiplied = a.channel_types.iter().any(|t| t.is_premultiplied());
    let has_alpha = a.channel_types.iter().any(|t| t.is_alpha());
    if premultiplied && !b.can_premultiplied_alpha {
        return Some("premultiplied alpha not accepted");
    }
    if has_alpha && !premultiplied && !b.can_nonpremultiplied_alpha {
        return Some("straight alpha not accepted");
    }
    None
}
