//! Process-wide engine state: configuration, lifecycle and diagnostics
//!
//! These tests swap globals, so each one holds `SERIAL` for its duration.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use oxcmm_core::config::{self, CACHE_LIMIT_ENV, MODULE_MARKER, MODULE_PATH_ENV};
use oxcmm_core::message::Origin;
use oxcmm_core::{
    CacheKey, CachePolicy, Config, Filter, MessageLevel, ObjectKind, Options, cache, filters, module,
    set_message_func,
};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> std::sync::MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn empty_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("oxcmm-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_init_and_shutdown() {
    let _guard = serial();
    let dir = empty_dir("engine");
    let config = Config {
        module_paths: vec![dir.clone()],
        cache_policy: CachePolicy::MaxEntries(2),
        ..Config::default()
    };

    let registry = oxcmm_core::init(config);
    assert_eq!(config::current().module_paths, vec![dir.clone()]);
    assert!(registry.module(filters::MODULE_CODE).is_some());
    assert_eq!(registry.modules().len(), 1);
    assert!(Arc::ptr_eq(&registry, &module::global()));

    let service = cache::service();
    assert_eq!(service.conversions.policy(), CachePolicy::MaxEntries(2));
    assert_eq!(service.modules.policy(), CachePolicy::Unbounded);
    service
        .profiles_by_hash
        .insert(CacheKey::literal("kept"), oxcmm_core::Profile::from_signature(oxcmm_core::icc::ColorSpace::Rgb));

    oxcmm_core::shutdown();
    // a fresh service starts empty
    let restarted = cache::service();
    assert!(!Arc::ptr_eq(&service, &restarted));
    assert!(restarted.profiles_by_hash.is_empty());
    assert!(service.profiles_by_hash.is_empty());

    // the registry is rebuilt with the built-ins
    assert!(module::global().module(filters::MODULE_CODE).is_some());

    oxcmm_core::shutdown();
    oxcmm_core::shutdown();
    config::install(Config::default());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn test_configured_filter_options() {
    let _guard = serial();
    let config = Config::from_json_str(
        r#"{ "options": { "org": { "oxcmm": { "imaging": { "icc_color": { "rendering_intent": 3 } } } } } }"#,
    )
    .unwrap();
    let registry = oxcmm_core::init(config);

    let filter = Filter::new(filters::ICC_COLOR_PATTERN, None, None, &registry).unwrap();
    assert_eq!(filter.options().get_i64(filters::RENDERING_INTENT), Some(3));
    // defaults without configured values survive
    assert_eq!(filter.options().get_str(filters::CMM), Some(""));

    let mut overrides = Options::new();
    overrides.set(filters::RENDERING_INTENT, 2).unwrap();
    let filter = Filter::new(filters::ICC_COLOR_PATTERN, None, Some(&overrides), &registry).unwrap();
    assert_eq!(filter.options().get_i64(filters::RENDERING_INTENT), Some(2));

    oxcmm_core::init(Config::default());
    let filter = Filter::new(filters::ICC_COLOR_PATTERN, None, None, &module::global()).unwrap();
    assert_eq!(filter.options().get_i64(filters::RENDERING_INTENT), Some(0));
}

#[test]
fn test_environment_overlay() {
    let _guard = serial();
    let dir = empty_dir("env");
    // SERIAL keeps other tests of this binary off the environment
    unsafe {
        std::env::set_var(MODULE_PATH_ENV, &dir);
        std::env::set_var(CACHE_LIMIT_ENV, "5");
    }
    let config = Config::from_json_str(r#"{ "module_paths": ["/opt/oxcmm"] }"#).unwrap().with_env();
    assert_eq!(config.module_paths, vec![dir.clone(), PathBuf::from("/opt/oxcmm")]);
    assert_eq!(config.cache_policy, CachePolicy::MaxEntries(5));
    assert_eq!(config.module_marker, MODULE_MARKER);

    unsafe {
        std::env::set_var(CACHE_LIMIT_ENV, "plenty");
    }
    assert_eq!(Config::from_env().cache_policy, CachePolicy::Unbounded);

    unsafe {
        std::env::remove_var(MODULE_PATH_ENV);
        std::env::remove_var(CACHE_LIMIT_ENV);
    }
    assert!(Config::from_env().module_paths.is_empty());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn test_config_json_shape() {
    let config = Config::from_json_str(r#"{ "cache_policy": "unbounded", "module_marker": "_plugin" }"#).unwrap();
    assert_eq!(config.module_marker, "_plugin");
    let text = config.to_json_string().unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["module_marker"], "_plugin");
    assert_eq!(Config::from_json_str(&text).unwrap(), config);

    assert!(Config::from_json_str("{ not json").is_err());
}

#[test]
fn test_message_hook() {
    let _guard = serial();
    let seen: Arc<Mutex<Vec<(MessageLevel, Option<Origin>, String)>>> = Arc::default();
    let sink = seen.clone();
    set_message_func(Some(Arc::new(move |level: MessageLevel, origin: Option<&Origin>, text: &str| {
        sink.lock().unwrap().push((level, origin.cloned(), text.to_string()));
    })));

    let missing = PathBuf::from("/nonexistent/oxcmm-modules");
    let found = module::discover(std::slice::from_ref(&missing), MODULE_MARKER, None);
    assert!(found.is_empty());

    // a conversion without any CMM reports from its color node
    let registry = cmm_tests::registry_with([]);
    let input = cmm_tests::pattern_image(
        cmm_tests::TestPattern::Flat(1),
        (2, 2),
        3,
        cmm_tests::profiles::srgb(),
    );
    let output = oxcmm_core::Image::create(2, 2, None, input.layout(), cmm_tests::profiles::srgb()).unwrap();
    let conversion = oxcmm_core::Conversion::create_basic_pixels(input, output, None, &registry).unwrap();
    assert!(conversion.get_one_pixel(0, 0).is_err());

    set_message_func(None);
    let seen = seen.lock().unwrap();
    let warning = seen
        .iter()
        .find(|(level, _, _)| *level == MessageLevel::Warning)
        .expect("unreadable module path reported");
    assert!(warning.1.is_none());
    assert!(warning.2.contains("oxcmm-modules"));

    assert!(seen.iter().any(|(level, origin, _)| {
        *level == MessageLevel::Error && origin.as_ref().map(|o| o.kind) == Some(ObjectKind::FilterNode)
    }));
}
