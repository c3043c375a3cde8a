//! Built-in module
//!
//! Provides the three filters a basic pixel conversion is made of and the
//! tag codec for the types the ICC codec understands:
//!
//! | Registration | Role |
//! |--------------|------|
//! | `org/oxcmm/imaging/root` | reads blocks from the input image |
//! | `org/oxcmm/imaging/icc_color` | converts blocks through a CMM link |
//! | `org/oxcmm/imaging/output` | writes blocks into the output image |
//! | `org/oxcmm/icc/tag_codec` | decodes tag payloads |

mod icc_color;
mod output;
mod root;
mod tag_codec;

use std::sync::Arc;

pub use icc_color::IccColorFilter;
pub use output::OutputFilter;
pub use root::RootFilter;
pub use tag_codec::BuiltinTagCodec;

use crate::error::{Error, Result};
use crate::icc::RenderingIntent;
use crate::module::{ApiEntry, Module, ModuleCode};
use crate::options::Options;

pub const MODULE_CODE: ModuleCode = ModuleCode::new(*b"oxcm");

pub const ROOT_REGISTRATION: &str = "org/oxcmm/imaging/root";
pub const ICC_COLOR_REGISTRATION: &str = "org/oxcmm/imaging/icc_color";
pub const OUTPUT_REGISTRATION: &str = "org/oxcmm/imaging/output";
pub const TAG_CODEC_REGISTRATION: &str = "org/oxcmm/icc/tag_codec";

pub const ROOT_PATTERN: &str = "//imaging/root";
pub const ICC_COLOR_PATTERN: &str = "//imaging/icc_color";
pub const OUTPUT_PATTERN: &str = "//imaging/output";

/// Option key of the rendering intent number
pub const RENDERING_INTENT: &str = "rendering_intent";
/// Option key of a preferred CMM module code, empty for any
pub const CMM: &str = "cmm";

/// Rendering intent of a filter's options, perceptual when unset
pub fn rendering_intent(options: &Options) -> Result<RenderingIntent> {
    let Some(value) = options.get_i64(RENDERING_INTENT) else {
        return Ok(RenderingIntent::default());
    };
    let number = u32::try_from(value).map_err(|_| Error::OutOfRange(format!("rendering intent {value}")))?;
    Ok(RenderingIntent::from_u32(number)?)
}

/// The built-in module with all of its APIs
pub fn module() -> Module {
    Module::new(MODULE_CODE, "oxcmm built-ins", crate::VERSION)
        .with_api(ApiEntry::TagCodec(Arc::new(BuiltinTagCodec)))
        .with_api(ApiEntry::Filter(Arc::new(RootFilter::new())))
        .with_api(ApiEntry::Filter(Arc::new(IccColorFilter::new())))
        .with_api(ApiEntry::Filter(Arc::new(OutputFilter::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ApiKind, registration_match};

    #[test]
    fn test_module_contents() {
        let module = module();
        assert_eq!(module.code(), MODULE_CODE);
        let filters: Vec<String> = module
            .apis()
            .filter(|api| api.kind() == ApiKind::FilterFactory)
            .map(|api| api.registration().to_string())
            .collect();
        assert_eq!(filters.len(), 3);
        for pattern in [ROOT_PATTERN, ICC_COLOR_PATTERN, OUTPUT_PATTERN] {
            let hits = filters
                .iter()
                .filter(|r| registration_match(r, pattern, Some(ApiKind::FilterFactory)) > 0)
                .count();
            assert_eq!(hits, 1, "{pattern}");
        }
    }

    #[test]
    fn test_rendering_intent_option() {
        let mut options = Options::new();
        assert_eq!(rendering_intent(&options).unwrap(), RenderingIntent::Perceptual);
        options.set(RENDERING_INTENT, 2).unwrap();
        assert_eq!(rendering_intent(&options).unwrap(), RenderingIntent::Saturation);
        // negative numbers must not wrap into a valid intent
        options.set(RENDERING_INTENT, -4294967295i64).unwrap();
        assert!(matches!(rendering_intent(&options), Err(Error::OutOfRange(_))));
        options.set(RENDERING_INTENT, 7).unwrap();
        assert!(matches!(rendering_intent(&options), Err(Error::Icc(_))));
    }
}
