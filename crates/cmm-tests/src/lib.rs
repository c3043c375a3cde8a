//! # cmm-tests
//!
//! Integration tests and benchmarks for oxcmm.
//!
//! This crate provides:
//! - synthetic ICC profiles built with the core codec
//! - seeded pixel patterns
//! - registries wired with the built-in filters and the moxcms module
//! - direct moxcms conversions to compare against
//!
//! ## Test Categories
//!
//! 1. **Profiles**: codec round trips, hashing, corrupted directories
//! 2. **Graph**: connector matching, chain building, API selection
//! 3. **Pipeline**: end-to-end conversions through moxcms, static and
//!    through the module ABI
//! 4. **Engine**: configuration, lifecycle, diagnostics

pub mod patterns;
pub mod profiles;
pub mod reference;

use std::sync::{Arc, Once};

use oxcmm_core::{Config, Module, ModuleRegistry};

pub use patterns::{TestPattern, generate_pattern, max_sample_diff, pattern_image};

/// Registry with the built-in filters and `modules`
pub fn registry_with(modules: impl IntoIterator<Item = Module>) -> Arc<ModuleRegistry> {
    let registry = Arc::new(ModuleRegistry::new(&Config::default()));
    registry.register_static(oxcmm_core::filters::module());
    for module in modules {
        registry.register_static(module);
    }
    registry
}

/// Registry with the built-in filters and moxcms registered in-process
pub fn moxcms_registry() -> Arc<ModuleRegistry> {
    registry_with([oxcmm_moxcms::module()])
}

/// Registry reaching moxcms through its exported C table
pub fn moxcms_abi_registry() -> Arc<ModuleRegistry> {
    // The table is a static of a linked crate, valid for the whole run.
    let module = unsafe { Module::from_raw(&oxcmm_moxcms::ffi::moxc_cmm_module, None) }
        .expect("exported moxcms table validates");
    registry_with([module])
}

/// Route `tracing` output to the test writer, once per process.
///
/// Filtered by `RUST_LOG`, quiet by default.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
