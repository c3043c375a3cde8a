//! # oxcmm-moxcms
//!
//! CMM module for oxcmm backed by [moxcms](https://docs.rs/moxcms).
//!
//! Register it in-process:
//!
//! ```
//! use std::sync::Arc;
//! use oxcmm_core::{Config, ModuleRegistry};
//!
//! let registry = Arc::new(ModuleRegistry::new(&Config::default()));
//! registry.register_static(oxcmm_core::filters::module());
//! registry.register_static(oxcmm_moxcms::module());
//! ```
//!
//! or install the cdylib as `libmoxc_cmm_module.so` (`.dylib`, `.dll`) in a
//! configured module path; it exports the [`ffi::moxc_cmm_module`] table.
//!
//! Handles RGB and gray data as 8-bit, 16-bit and float samples with an
//! optional trailing alpha channel. Links read two boolean options:
//! [`PREFER_FIXED_POINT`] and [`ALLOW_CICP_TRANSFER`].

pub mod ffi;
mod link;
mod profiles;

use std::sync::Arc;

use oxcmm_core::error::Result;
use oxcmm_core::icc::ColorSpace;
use oxcmm_core::module::{ApiEntry, Capability, CmmApi, ColorLink, LinkRequest};
use oxcmm_core::{DataType, Module, ModuleCode};

pub const MODULE_CODE: ModuleCode = ModuleCode::new(*b"moxc");

pub const REGISTRATION: &str = "org/oxcmm/cmm/moxcms";

/// Option key: use fixed point math where moxcms offers it
pub const PREFER_FIXED_POINT: &str = "prefer_fixed_point";

/// Option key: let CICP data in profiles override their curves
pub const ALLOW_CICP_TRANSFER: &str = "allow_use_cicp_transfer";

/// moxcms profile transform API
#[derive(Debug, Default, Clone, Copy)]
pub struct MoxCmm;

impl CmmApi for MoxCmm {
    fn registration(&self) -> &str {
        REGISTRATION
    }

    fn can_handle(&self, query: Capability) -> bool {
        match query {
            Capability::ProfileFormat(major) => (2..=4).contains(&major),
            Capability::DataType(data_type) => {
                matches!(data_type, DataType::U8 | DataType::U16 | DataType::F32)
            }
            Capability::ColorSpace(space) => matches!(space, ColorSpace::Rgb | ColorSpace::Gray),
            Capability::TagTypeRead(_) | Capability::TagTypeWrite(_) => false,
        }
    }

    fn create_link(&self, request: &LinkRequest<'_>) -> Result<Box<dyn ColorLink>> {
        Ok(Box::new(link::MoxLink::new(request)?))
    }
}

/// The module for static registration
pub fn module() -> Module {
    Module::new(MODULE_CODE, "moxcms", env!("CARGO_PKG_VERSION")).with_api(ApiEntry::Cmm(Arc::new(MoxCmm)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxcmm_core::icc::{
        CurveData, ProfileClass, RenderingIntent, SignatureField, TagSignature, TextData, XyzNumber, XyzTagData,
    };
    use oxcmm_core::{Options, PixelLayout, Profile, Tag};

    /// Display P3 as a matrix/TRC profile with D50 adapted colorants
    fn display_p3() -> Vec<u8> {
        let profile = Profile::from_signature(ColorSpace::Rgb);
        profile.set_signature(SignatureField::Class, ProfileClass::Display.to_u32());
        let srgb_curve: Vec<u16> = (0..1024)
            .map(|i| {
                let v = i as f64 / 1023.0;
                let linear = if v <= 0.04045 { v / 12.92 } else { ((v + 0.055) / 1.055).powf(2.4) };
                (linear * 65535.0).round() as u16
            })
            .collect();
        let xyz = |v: [f64; 3]| {
            XyzTagData {
                values: vec![XyzNumber::from_f64(v)],
            }
            .encode()
        };
        let tags = [
            (TagSignature::DESC, TextData::new("Display P3").encode_mluc()),
            (TagSignature::MEDIA_WHITE, xyz([0.9642, 1.0, 0.8249])),
            (TagSignature::RED_COLORANT, xyz([0.5151, 0.2412, -0.0011])),
            (TagSignature::GREEN_COLORANT, xyz([0.2919, 0.6922, 0.0419])),
            (TagSignature::BLUE_COLORANT, xyz([0.1571, 0.0666, 0.7841])),
            (TagSignature::RED_TRC, CurveData::Table(srgb_curve.clone()).encode()),
            (TagSignature::GREEN_TRC, CurveData::Table(srgb_curve.clone()).encode()),
            (TagSignature::BLUE_TRC, CurveData::Table(srgb_curve).encode()),
        ];
        for (signature, payload) in tags {
            profile.add_tag(Tag::new(signature, payload), None);
        }
        profile.to_memory()
    }

    fn link(input: &[u8], output: &[u8], layout: PixelLayout) -> Box<dyn ColorLink> {
        let options = Options::new();
        MoxCmm
            .create_link(&LinkRequest {
                input,
                output,
                input_layout: layout,
                output_layout: layout,
                intent: RenderingIntent::Perceptual,
                options: &options,
            })
            .unwrap()
    }

    #[test]
    fn test_capabilities() {
        assert!(MoxCmm.can_handle(Capability::DataType(DataType::U16)));
        assert!(!MoxCmm.can_handle(Capability::DataType(DataType::F64)));
        assert!(!MoxCmm.can_handle(Capability::ColorSpace(ColorSpace::Cmyk)));
        assert_eq!(module().code(), MODULE_CODE);
    }

    #[test]
    fn test_srgb_identity_u8() {
        let srgb = Profile::from_signature(ColorSpace::Rgb).to_memory();
        let link = link(&srgb, &srgb, PixelLayout::new(3, DataType::U8));
        let src = [0u8, 0, 0, 255, 255, 255, 200, 100, 50];
        let mut dst = [0u8; 9];
        link.convert(&src, &mut dst, 3).unwrap();
        for (a, b) in src.iter().zip(&dst) {
            assert!(a.abs_diff(*b) <= 1, "{src:?} -> {dst:?}");
        }
    }

    #[test]
    fn test_srgb_red_into_p3() {
        let srgb = Profile::from_signature(ColorSpace::Rgb).to_memory();
        let p3 = display_p3();
        let link = link(&srgb, &p3, PixelLayout::new(3, DataType::U8));
        let mut dst = [0u8; 3];
        link.convert(&[255, 0, 0], &mut dst, 1).unwrap();
        // sRGB red sits inside P3: less red, some green
        assert!((228..=240).contains(&dst[0]), "{dst:?}");
        assert!((40..=60).contains(&dst[1]), "{dst:?}");
        assert!(dst[2] <= 45, "{dst:?}");
    }

    #[test]
    fn test_alpha_and_float_samples() {
        let srgb = Profile::from_signature(ColorSpace::Rgb).to_memory();
        let layout = PixelLayout::new(4, DataType::F32);
        let link = link(&srgb, &srgb, layout);
        let src: Vec<u8> = [0.25f32, 0.5, 0.75, 0.5].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let mut dst = vec![0u8; 16];
        link.convert(&src, &mut dst, 1).unwrap();
        let out: Vec<f32> = dst
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        for (a, b) in [0.25f32, 0.5, 0.75, 0.5].iter().zip(&out) {
            assert!((a - b).abs() < 0.01, "{out:?}");
        }
    }

    #[test]
    fn test_u16_gray() {
        let gray = Profile::from_signature(ColorSpace::Gray).to_memory();
        let link = link(&gray, &gray, PixelLayout::new(1, DataType::U16));
        let src: Vec<u8> = [0u16, 32768, 65535].iter().flat_map(|v| v.to_ne_bytes()).collect();
        // odd offset forces the copying path
        let mut dst = vec![0u8; 7];
        link.convert(&src, &mut dst[1..], 3).unwrap();
        let out: Vec<u16> = dst[1..].chunks_exact(2).map(|c| u16::from_ne_bytes([c[0], c[1]])).collect();
        assert!(out[0] < 64 && out[2] > 65470, "{out:?}");
        assert!(out[1].abs_diff(32768) < 256, "{out:?}");
    }

    #[test]
    fn test_mixed_data_types_rejected() {
        let srgb = Profile::from_signature(ColorSpace::Rgb).to_memory();
        let options = Options::new();
        let result = MoxCmm.create_link(&LinkRequest {
            input: &srgb,
            output: &srgb,
            input_layout: PixelLayout::new(3, DataType::U8),
            output_layout: PixelLayout::new(3, DataType::U16),
            intent: RenderingIntent::Perceptual,
            options: &options,
        });
        assert!(result.is_err());
    }
}
