//! # oxcmm - Oxidized Color Management Modules
//!
//! A color management engine built around three pieces:
//!
//! - an ICC profile codec with content hashing and tag level access
//! - a registry of backend modules (CMMs, monitor profile sources, tag
//!   codecs, graph filters), static or loaded from shared libraries
//! - a pull based filter graph moving pixel blocks from an input image
//!   through color conversion into an output image
//!
//! Color math lives in modules. The `oxcmm-moxcms` crate provides a CMM
//! backed by moxcms.
//!
//! ## Quick Start
//!
//! ```
//! use oxcmm_core::{Conversion, DataType, Image, PixelLayout, Profile};
//! use oxcmm_core::icc::ColorSpace;
//!
//! let srgb = Profile::from_signature(ColorSpace::Rgb);
//! let layout = PixelLayout::new(3, DataType::U8);
//! let input = Image::create(4, 4, Some(vec![128; 48]), layout, srgb.clone()).unwrap();
//! let output = Image::create(4, 4, None, layout, srgb).unwrap();
//!
//! let registry = oxcmm_core::module::global();
//! let conversion = Conversion::create_basic_pixels(input, output, None, &registry).unwrap();
//! assert_eq!(conversion.node_count(), 3);
//! assert!(conversion.to_text().starts_with("digraph"));
//! ```

pub mod bytes;
pub mod cache;
pub mod config;
pub mod connector;
pub mod conversion;
pub mod error;
pub mod filter;
pub mod filters;
pub mod hash;
pub mod icc;
pub mod image;
pub mod layout;
pub mod message;
pub mod module;
pub mod node;
pub mod object;
pub mod options;
pub mod pixel_access;
pub mod profile;
pub mod tag;

use std::sync::Arc;

pub use cache::{CacheKey, CachePolicy, CacheService};
pub use config::Config;
pub use connector::{Connector, Connectors};
pub use conversion::{Conversion, Feedback, ImageSide, LinkContext, PixelBlock};
pub use error::{Error, Result};
pub use filter::Filter;
pub use hash::ContentHash;
pub use image::{Array2d, Image, Rect};
pub use layout::{ChannelType, DataType, PixelLayout, PixelMask};
pub use message::{MessageLevel, set_message_func};
pub use module::{Api, ApiKind, Capability, Module, ModuleCode, ModuleRegistry};
pub use node::{FilterNode, Plug, PlugStatus, Socket};
pub use object::{NameKind, Object, ObjectKind, Struct};
pub use options::Options;
pub use pixel_access::{AccessKind, PixelAccess};
pub use profile::{Profile, ProfileDefault, ProfileFlags};
pub use tag::Tag;

/// Version of oxcmm
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install `config`, start the cache service with its policy and rebuild
/// the global registry from it
pub fn init(config: Config) -> Arc<ModuleRegistry> {
    let policy = config.cache_policy;
    config::install(config);
    cache::init(policy);
    module::reset_global();
    let registry = module::global();
    tracing::info!(version = VERSION, ?policy, "oxcmm initialized");
    registry
}

/// Drop the global registry and every cached handle
pub fn shutdown() {
    module::reset_global();
    cache::shutdown();
    tracing::info!("oxcmm shut down");
}
