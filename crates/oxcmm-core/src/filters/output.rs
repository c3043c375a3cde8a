use crate::connector::{Connector, Connectors};
use crate::conversion::Feedback;
use crate::error::Error;
use crate::message::report;
use crate::module::FilterFactory;
use crate::node::FilterNode;
use crate::object::Struct;
use crate::pixel_access::PixelAccess;

use super::OUTPUT_REGISTRATION;

/// End of a chain: stores pulled blocks into the image on its socket.
///
/// The block stays in the ticket for the caller.
pub struct OutputFilter {
    connectors: Connectors,
}

impl OutputFilter {
    pub fn new() -> Self {
        Self {
            connectors: Connectors::new(
                vec![Connector::plug("image").with_name("Image")],
                vec![Connector::socket("image").with_name("Image")],
            ),
        }
    }
}

impl Default for OutputFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterFactory for OutputFilter {
    fn registration(&self) -> &str {
        OUTPUT_REGISTRATION
    }

    fn name(&self) -> &str {
        "Output image"
    }

    fn category(&self) -> &str {
        "Image/Simple Image[out]"
    }

    fn connectors(&self) -> &Connectors {
        &self.connectors
    }

    fn run(&self, node: &FilterNode, ticket: &mut PixelAccess) -> Feedback {
        let feedback = node.pull_upstream(0, ticket);
        if feedback != Feedback::Produced {
            return feedback;
        }
        let Some(image) = node.socket(0).and_then(|s| s.image()) else {
            return feedback;
        };
        let Some(block) = ticket.block() else {
            return Feedback::Failed(Error::NoInputImage.code());
        };
        if block.layout != image.layout().normalized() {
            let e = Error::InvalidLayout(format!("block {} for image {}", block.layout, image.layout()));
            report!(Error, Some(node.object()), "{}", e);
            return Feedback::Failed(e.code());
        }

        let row_len = block.width * image.pixel_size();
        for row in 0..block.height {
            let span = &block.data[row * row_len..(row + 1) * row_len];
            if let Err(e) = image.write_span(block.x, block.y + row, block.width, span) {
                report!(Error, Some(node.object()), "writing row {}: {}", block.y + row, e);
                return Feedback::Failed(e.code());
            }
        }
        Feedback::Produced
    }
}
