use crate::connector::{Connector, Connectors};
use crate::conversion::{Feedback, PixelBlock};
use crate::error::Error;
use crate::message::report;
use crate::module::FilterFactory;
use crate::node::FilterNode;
use crate::object::Struct;
use crate::pixel_access::PixelAccess;

use super::ROOT_REGISTRATION;

/// Source of a chain: hands out blocks of the image on its socket
pub struct RootFilter {
    connectors: Connectors,
}

impl RootFilter {
    pub fn new() -> Self {
        Self {
            connectors: Connectors::new(Vec::new(), vec![Connector::socket("image").with_name("Image")]),
        }
    }
}

impl Default for RootFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterFactory for RootFilter {
    fn registration(&self) -> &str {
        ROOT_REGISTRATION
    }

    fn name(&self) -> &str {
        "Root image"
    }

    fn category(&self) -> &str {
        "Image/Simple Image[in]"
    }

    fn connectors(&self) -> &Connectors {
        &self.connectors
    }

    fn run(&self, node: &FilterNode, ticket: &mut PixelAccess) -> Feedback {
        let Some(image) = node.socket(0).and_then(|s| s.image()) else {
            report!(Error, Some(node.object()), "root without image");
            return Feedback::Failed(Error::NoInputImage.code());
        };
        if !ticket.in_bounds() {
            return Feedback::End;
        }

        let region = ticket.region();
        let pixel_size = image.pixel_size();
        let row_len = region.width * pixel_size;
        let mut data = ticket.take_buffer(row_len * region.height);
        for row in 0..region.height {
            let span = &mut data[row * row_len..(row + 1) * row_len];
            if let Err(e) = image.read_span(region.x, region.y + row, region.width, span) {
                report!(Error, Some(node.object()), "reading {:?}: {}", region, e);
                return Feedback::Failed(e.code());
            }
        }
        ticket.set_block(PixelBlock {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            layout: image.layout().normalized(),
            data,
        });
        Feedback::Produced
    }
}
