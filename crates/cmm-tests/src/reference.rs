//! Direct moxcms calls to compare conversions against

use moxcms::{ColorProfile, Layout, RenderingIntent, TransformOptions};

/// Convert interleaved 8-bit RGB between two serialized profiles with
/// moxcms alone
pub fn transform_moxcms(
    src_profile_data: &[u8],
    dst_profile_data: &[u8],
    intent: RenderingIntent,
    src_pixels: &[u8],
) -> Result<Vec<u8>, String> {
    let src_profile =
        ColorProfile::new_from_slice(src_profile_data).map_err(|e| format!("moxcms src profile: {:?}", e))?;
    let dst_profile =
        ColorProfile::new_from_slice(dst_profile_data).map_err(|e| format!("moxcms dst profile: {:?}", e))?;

    let options = TransformOptions {
        rendering_intent: intent,
        ..Default::default()
    };
    let transform = src_profile
        .create_transform_8bit(Layout::Rgb, &dst_profile, Layout::Rgb, options)
        .map_err(|e| format!("moxcms transform: {:?}", e))?;

    let mut dst_pixels = vec![0u8; src_pixels.len()];
    transform
        .transform(src_pixels, &mut dst_pixels)
        .map_err(|e| format!("moxcms execute: {:?}", e))?;
    Ok(dst_pixels)
}
