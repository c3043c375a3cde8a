use std::sync::Arc;

use serde_json::{Map, json};

use crate::connector::{Connector, Connectors};
use crate::conversion::{Feedback, LinkContext, PixelBlock};
use crate::error::{Error, Result};
use crate::message::report;
use crate::module::{ApiKind, Capability, FilterFactory, ModuleCode};
use crate::node::FilterNode;
use crate::object::{ObjectKind, Struct, copy_as};
use crate::options::Options;
use crate::pixel_access::PixelAccess;

use super::{CMM, ICC_COLOR_REGISTRATION, RENDERING_INTENT};

/// Converts blocks between the profiles of the chain's input and output
/// images through a link from a CMM module
pub struct IccColorFilter {
    connectors: Connectors,
}

impl IccColorFilter {
    pub fn new() -> Self {
        Self {
            connectors: Connectors::new(
                vec![Connector::plug("image").with_name("Image")],
                vec![Connector::socket("image").with_name("Image")],
            ),
        }
    }
}

impl Default for IccColorFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn link_of(node: &FilterNode) -> Result<Arc<LinkContext>> {
    let context = node
        .context()?
        .ok_or_else(|| Error::Transform("no color link".into()))?;
    copy_as::<LinkContext>(&context, ObjectKind::ColorLink)
}

impl FilterFactory for IccColorFilter {
    fn registration(&self) -> &str {
        ICC_COLOR_REGISTRATION
    }

    fn name(&self) -> &str {
        "ICC color"
    }

    fn category(&self) -> &str {
        "Color/CMM/ICC"
    }

    fn connectors(&self) -> &Connectors {
        &self.connectors
    }

    fn default_options(&self) -> Options {
        let mut tree = Map::new();
        tree.insert(RENDERING_INTENT.to_string(), json!(0));
        tree.insert(CMM.to_string(), json!(""));
        Options::from(tree)
    }

    fn create_context(&self, node: &FilterNode) -> Result<Option<Arc<dyn Struct>>> {
        let input = node.upstream_image(0).ok_or(Error::NoInputImage)?;
        let output = node
            .downstream_image(0)
            .ok_or_else(|| Error::InvalidProfile("no output image downstream".into()))?;
        let options = node.options();
        let intent = super::rendering_intent(options)?;
        let required = options.get_str(CMM).and_then(ModuleCode::parse);

        let input_layout = input.layout().normalized();
        let output_layout = output.layout().normalized();
        let mut queries = Vec::new();
        if let Some(data_type) = input_layout.data_type() {
            queries.push(Capability::DataType(data_type));
        }
        if let Ok(space) = input.profile().color_space() {
            queries.push(Capability::ColorSpace(space));
        }
        let cmm = node
            .filter()
            .registry()
            .get_api_with(ApiKind::ProfileTransform, required, None, &queries)
            .ok_or_else(|| Error::ApiNotFound(format!("a CMM for {input_layout}")))?;

        let link = LinkContext::obtain(
            &cmm,
            input.profile(),
            input_layout,
            output.profile(),
            output_layout,
            intent,
            options,
        )?;
        Ok(Some(link))
    }

    fn run(&self, node: &FilterNode, ticket: &mut PixelAccess) -> Feedback {
        let feedback = node.pull_upstream(0, ticket);
        if feedback != Feedback::Produced {
            return feedback;
        }
        let link = match link_of(node) {
            Ok(link) => link,
            Err(e) => {
                report!(Error, Some(node.object()), "{}", e);
                return Feedback::Failed(e.code());
            }
        };
        let Some(block) = ticket.take_block() else {
            return Feedback::Failed(Error::NoInputImage.code());
        };
        if block.layout != link.input_layout() {
            let e = Error::InvalidLayout(format!("block {} for link {}", block.layout, link.input_layout()));
            report!(Error, Some(node.object()), "{}", e);
            return Feedback::Failed(e.code());
        }

        let pixels = block.pixels();
        let mut data = ticket.take_buffer(pixels * link.output_layout().pixel_size());
        if let Err(e) = link.convert(&block.data, &mut data, pixels) {
            report!(Error, Some(node.object()), "conversion failed: {}", e);
            return Feedback::Failed(e.code());
        }
        let PixelBlock { x, y, width, height, data: input, .. } = block;
        ticket.recycle(input);
        ticket.set_block(PixelBlock {
            x,
            y,
            width,
            height,
            layout: link.output_layout(),
            data,
        });
        Feedback::Produced
    }
}
