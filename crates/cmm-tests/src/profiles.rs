//! Synthetic ICC profiles
//!
//! Matrix/TRC profiles built with the core codec, with D50 adapted
//! colorants as found in the published profiles.

use std::sync::Arc;

use oxcmm_core::icc::{
    ColorSpace, CurveData, ProfileClass, SignatureField, TagSignature, TextData, XyzNumber, XyzTagData,
};
use oxcmm_core::{Profile, ProfileFlags, Tag};

pub const SRGB_COLORANTS: [[f64; 3]; 3] = [
    [0.4361, 0.2225, 0.0139],
    [0.3851, 0.7169, 0.0971],
    [0.1431, 0.0606, 0.7141],
];

pub const DISPLAY_P3_COLORANTS: [[f64; 3]; 3] = [
    [0.5151, 0.2412, -0.0011],
    [0.2919, 0.6922, 0.0419],
    [0.1571, 0.0666, 0.7841],
];

const D50: [f64; 3] = [0.9642, 1.0, 0.8249];

fn xyz(value: [f64; 3]) -> Vec<u8> {
    XyzTagData {
        values: vec![XyzNumber::from_f64(value)],
    }
    .encode()
}

/// The sRGB transfer curve sampled on 1024 points
pub fn srgb_curve() -> CurveData {
    CurveData::Table(
        (0..1024)
            .map(|i| {
                let v = i as f64 / 1023.0;
                let linear = if v <= 0.04045 { v / 12.92 } else { ((v + 0.055) / 1.055).powf(2.4) };
                (linear * 65535.0).round() as u16
            })
            .collect(),
    )
}

/// A display class RGB profile from colorants and one curve for all channels
pub fn matrix_shaper(description: &str, colorants: [[f64; 3]; 3], curve: &CurveData) -> Arc<Profile> {
    let profile = Profile::from_signature(ColorSpace::Rgb);
    profile.set_signature(SignatureField::Class, ProfileClass::Display.to_u32());
    let trc = curve.encode();
    let tags = [
        (TagSignature::DESC, TextData::new(description).encode_mluc()),
        (TagSignature::MEDIA_WHITE, xyz(D50)),
        (TagSignature::RED_COLORANT, xyz(colorants[0])),
        (TagSignature::GREEN_COLORANT, xyz(colorants[1])),
        (TagSignature::BLUE_COLORANT, xyz(colorants[2])),
        (TagSignature::RED_TRC, trc.clone()),
        (TagSignature::GREEN_TRC, trc.clone()),
        (TagSignature::BLUE_TRC, trc),
    ];
    for (signature, payload) in tags {
        profile.add_tag(Tag::new(signature, payload), None);
    }
    profile
}

pub fn srgb() -> Arc<Profile> {
    matrix_shaper("sRGB synthetic", SRGB_COLORANTS, &srgb_curve())
}

pub fn display_p3() -> Arc<Profile> {
    matrix_shaper("Display P3 synthetic", DISPLAY_P3_COLORANTS, &srgb_curve())
}

/// A gray profile with a gamma curve
pub fn gray(gamma: f64) -> Arc<Profile> {
    let profile = Profile::from_signature(ColorSpace::Gray);
    profile.set_signature(SignatureField::Class, ProfileClass::Display.to_u32());
    profile.add_tag(
        Tag::new(TagSignature::DESC, TextData::new(format!("Gray {gamma}")).encode_mluc()),
        None,
    );
    profile.add_tag(Tag::new(TagSignature::MEDIA_WHITE, xyz(D50)), None);
    profile.add_tag(Tag::new(TagSignature::GRAY_TRC, CurveData::Gamma(gamma).encode()), None);
    profile
}

/// Serialized profile whose directory entry `index` claims `size` bytes,
/// reaching past the end of the buffer when large
pub fn with_tag_size(profile: &Profile, index: usize, size: u32) -> Vec<u8> {
    let mut data = profile.to_memory();
    let at = 128 + 4 + index * 12 + 8;
    data[at..at + 4].copy_from_slice(&size.to_be_bytes());
    data
}

/// Parse without touching the process-wide cache
pub fn reopen(data: &[u8]) -> oxcmm_core::Result<Arc<Profile>> {
    Profile::from_memory(data, ProfileFlags::NO_CACHE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxcmm_core::NameKind;

    #[test]
    fn test_matrix_shaper_layout() {
        let profile = srgb();
        assert_eq!(profile.tag_count(), 8);
        assert_eq!(profile.text(NameKind::Description), "sRGB synthetic");
        let reopened = reopen(&profile.to_memory()).unwrap();
        assert_eq!(reopened.tag_count(), 8);
        assert_eq!(reopened.color_space().unwrap(), ColorSpace::Rgb);
    }
}
