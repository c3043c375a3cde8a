//! Executors behind a [`ColorLink`]

use std::sync::Arc;

use bytemuck::Pod;
use moxcms::{TransformExecutor, TransformOptions};
use oxcmm_core::error::{Error, Result};
use oxcmm_core::module::{ColorLink, LinkRequest};
use oxcmm_core::{DataType, PixelLayout};

use crate::profiles::{self, ProfileShape};

/// moxcms errors only carry a debug rendering
pub(crate) fn cms_error(e: moxcms::CmsError) -> Error {
    Error::Transform(format!("{:?}", e))
}

enum Executor {
    U8(Arc<moxcms::Transform8BitExecutor>),
    U16(Arc<moxcms::Transform16BitExecutor>),
    F32(Arc<moxcms::TransformF32BitExecutor>),
}

pub(crate) struct MoxLink {
    executor: Executor,
    input: PixelLayout,
    output: PixelLayout,
}

fn moxcms_layout(shape: &ProfileShape, layout: PixelLayout) -> Result<moxcms::Layout> {
    match (shape.color_channels, layout.channels()) {
        (1, 1) => Ok(moxcms::Layout::Gray),
        (1, 2) => Ok(moxcms::Layout::GrayAlpha),
        (3, 3) => Ok(moxcms::Layout::Rgb),
        (3, 4) => Ok(moxcms::Layout::Rgba),
        (color, channels) => Err(Error::InvalidLayout(format!(
            "{channels} channels for a {color} channel profile"
        ))),
    }
}

fn intent(intent: oxcmm_core::icc::RenderingIntent) -> moxcms::RenderingIntent {
    use oxcmm_core::icc::RenderingIntent;
    match intent {
        RenderingIntent::Perceptual => moxcms::RenderingIntent::Perceptual,
        RenderingIntent::RelativeColorimetric => moxcms::RenderingIntent::RelativeColorimetric,
        RenderingIntent::Saturation => moxcms::RenderingIntent::Saturation,
        RenderingIntent::AbsoluteColorimetric => moxcms::RenderingIntent::AbsoluteColorimetric,
    }
}

impl MoxLink {
    pub(crate) fn new(request: &LinkRequest<'_>) -> Result<Self> {
        let source = profiles::load(request.input)?;
        let target = profiles::load(request.output)?;
        let src_layout = moxcms_layout(&source, request.input_layout)?;
        let dst_layout = moxcms_layout(&target, request.output_layout)?;

        let mut options = TransformOptions {
            rendering_intent: intent(request.intent),
            ..Default::default()
        };
        if let Some(value) = request.options.get_bool(crate::PREFER_FIXED_POINT) {
            options.prefer_fixed_point = value;
        }
        if let Some(value) = request.options.get_bool(crate::ALLOW_CICP_TRANSFER) {
            options.allow_use_cicp_transfer = value;
        }

        let src = &source.profile;
        let dst = &target.profile;
        let executor = match (request.input_layout.data_type(), request.output_layout.data_type()) {
            (Some(DataType::U8), Some(DataType::U8)) => Executor::U8(Arc::from(
                src.create_transform_8bit(src_layout, dst, dst_layout, options)
                    .map_err(cms_error)?,
            )),
            (Some(DataType::U16), Some(DataType::U16)) => Executor::U16(Arc::from(
                src.create_transform_16bit(src_layout, dst, dst_layout, options)
                    .map_err(cms_error)?,
            )),
            (Some(DataType::F32), Some(DataType::F32)) => Executor::F32(Arc::from(
                src.create_transform_f32(src_layout, dst, dst_layout, options)
                    .map_err(cms_error)?,
            )),
            (a, b) => {
                return Err(Error::InvalidLayout(format!(
                    "moxcms cannot convert {a:?} samples into {b:?}"
                )));
            }
        };
        tracing::debug!(
            input = %request.input_layout,
            output = %request.output_layout,
            ?src_layout,
            ?dst_layout,
            "moxcms link created"
        );
        Ok(Self {
            executor,
            input: request.input_layout,
            output: request.output_layout,
        })
    }
}

/// Run on the caller's buffers when aligned, through copies otherwise
fn run<T: Pod + Default>(
    executor: &(dyn TransformExecutor<T> + Send + Sync),
    src: &[u8],
    dst: &mut [u8],
) -> Result<()> {
    if let (Ok(s), Ok(d)) = (
        bytemuck::try_cast_slice::<u8, T>(src),
        bytemuck::try_cast_slice_mut::<u8, T>(dst),
    ) {
        return executor.transform(s, d).map_err(cms_error);
    }
    let s: Vec<T> = bytemuck::pod_collect_to_vec(src);
    let mut d = vec![T::zeroed(); dst.len() / size_of::<T>()];
    executor.transform(&s, &mut d).map_err(cms_error)?;
    dst.copy_from_slice(bytemuck::cast_slice(&d));
    Ok(())
}

impl ColorLink for MoxLink {
    fn convert(&self, src: &[u8], dst: &mut [u8], pixels: usize) -> Result<()> {
        let src_len = pixels * self.input.pixel_size();
        let dst_len = pixels * self.output.pixel_size();
        if src.len() < src_len {
            return Err(Error::BufferSize {
                expected: src_len,
                actual: src.len(),
            });
        }
        if dst.len() < dst_len {
            return Err(Error::BufferSize {
                expected: dst_len,
                actual: dst.len(),
            });
        }
        let (src, dst) = (&src[..src_len], &mut dst[..dst_len]);
        match &self.executor {
            Executor::U8(t) => t.transform(src, dst).map_err(cms_error),
            Executor::U16(t) => run::<u16>(t.as_ref(), src, dst),
            Executor::F32(t) => run::<f32>(t.as_ref(), src, dst),
        }
    }
}
