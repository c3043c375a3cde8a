//! Profile bytes to moxcms profiles

use moxcms::{ColorProfile, DataColorSpace};
use oxcmm_core::error::{Error, Result};
use oxcmm_core::icc::ColorSpace;
use oxcmm_core::{Profile, ProfileFlags};

use crate::link::cms_error;

pub(crate) struct ProfileShape {
    pub profile: ColorProfile,
    pub color_channels: usize,
}

/// Parse serialized profile bytes.
///
/// A profile without tags only names a color space; it stands for sRGB or
/// a gamma 2.2 gray.
pub(crate) fn load(bytes: &[u8]) -> Result<ProfileShape> {
    let parsed = Profile::from_memory(bytes, ProfileFlags::NO_CACHE)?;
    let profile = if parsed.tag_count() == 0 {
        match parsed.color_space()? {
            ColorSpace::Rgb => ColorProfile::new_srgb(),
            ColorSpace::Gray => ColorProfile::new_gray_with_gamma(2.2),
            other => {
                return Err(Error::InvalidProfile(format!(
                    "no built-in moxcms profile for bare {other:?}"
                )));
            }
        }
    } else {
        ColorProfile::new_from_slice(bytes).map_err(cms_error)?
    };

    let color_channels = match profile.color_space {
        DataColorSpace::Rgb => 3,
        DataColorSpace::Gray => 1,
        other => {
            return Err(Error::InvalidProfile(format!(
                "moxcms module handles RGB and gray, not {other:?}"
            )));
        }
    };
    Ok(ProfileShape {
        profile,
        color_channels,
    })
}
