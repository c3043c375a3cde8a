//! API selection over static and dynamically loaded modules

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;

use super::{Api, ApiKind, Capability, Module, ModuleCode, loader, registration_match};
use crate::cache::{self, CacheKey};
use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::message::report;

/// The modules one engine instance selects APIs from.
///
/// Static modules are searched before dynamic ones. Dynamic modules are
/// discovered from the configured paths on the first API lookup, or
/// opened explicitly with [`ModuleRegistry::open`].
pub struct ModuleRegistry {
    paths: Vec<PathBuf>,
    marker: String,
    statics: RwLock<Vec<Arc<Module>>>,
    dynamic: RwLock<Vec<Arc<Module>>>,
    scanned: OnceCell<()>,
}

impl ModuleRegistry {
    /// Empty registry searching the module paths of `config`
    pub fn new(config: &Config) -> Self {
        Self {
            paths: config.module_paths.clone(),
            marker: config.module_marker.clone(),
            statics: RwLock::new(Vec::new()),
            dynamic: RwLock::new(Vec::new()),
            scanned: OnceCell::new(),
        }
    }

    /// Register an in-process module
    pub fn register_static(&self, module: Module) -> Arc<Module> {
        let module = Arc::new(module);
        tracing::debug!(code = %module.code(), apis = module.api_count(), "static module registered");
        self.statics.write().push(module.clone());
        module
    }

    /// Module libraries in the configured paths
    pub fn discover(&self, required: Option<ModuleCode>) -> Vec<PathBuf> {
        loader::discover(&self.paths, &self.marker, required)
    }

    /// Open a module library.
    ///
    /// Libraries are shared process-wide by module code, so opening the
    /// same code twice returns the first module.
    pub fn open(&self, path: &Path) -> Result<Arc<Module>> {
        let code = loader::module_code_from_path(path, &self.marker)
            .ok_or_else(|| Error::Module(format!("{} is not a module library", path.display())))?;
        let module = cache::service()
            .modules
            .get_or_try_insert_with(CacheKey::literal(code.as_str()), || {
                loader::open(path, &self.marker).map(Arc::new)
            })?;

        let mut dynamic = self.dynamic.write();
        if !dynamic.iter().any(|m| Arc::ptr_eq(m, &module)) {
            dynamic.push(module.clone());
        }
        Ok(module)
    }

    fn ensure_scanned(&self) {
        self.scanned.get_or_init(|| {
            for path in self.discover(None) {
                if let Err(e) = self.open(&path) {
                    report!(Warning, None, "skipping module {}: {}", path.display(), e);
                }
            }
        });
    }

    /// Static modules followed by dynamic ones
    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.ensure_scanned();
        let mut modules = self.statics.read().clone();
        modules.extend(self.dynamic.read().iter().cloned());
        modules
    }

    pub fn module(&self, code: ModuleCode) -> Option<Arc<Module>> {
        self.modules().into_iter().find(|m| m.code() == code)
    }

    /// Select an API of `kind`, see [`ModuleRegistry::get_api_with`]
    pub fn get_api(&self, kind: ApiKind, required: Option<ModuleCode>, pattern: Option<&str>) -> Option<Api> {
        self.get_api_with(kind, required, pattern, &[])
    }

    /// Select an API of `kind` answering yes to every query.
    ///
    /// Filter factories must match `pattern`; an API of the `required`
    /// module wins, else the best ranked one, the first on ties. For other
    /// kinds the pattern is not consulted: the `required` module wins, else
    /// the last candidate seen.
    pub fn get_api_with(
        &self,
        kind: ApiKind,
        required: Option<ModuleCode>,
        pattern: Option<&str>,
        queries: &[Capability],
    ) -> Option<Api> {
        let modules = self.modules();
        let candidates = modules
            .iter()
            .flat_map(|m| m.apis().collect::<Vec<_>>())
            .filter(|api| api.kind() == kind)
            .filter(|api| queries.iter().all(|q| api.entry().can_handle(*q)));

        let selected = if kind == ApiKind::FilterFactory {
            let pattern = pattern.unwrap_or("");
            let mut best: Option<(u32, Api)> = None;
            let mut best_required: Option<(u32, Api)> = None;
            for api in candidates {
                let rank = registration_match(api.registration(), pattern, Some(kind));
                if rank == 0 {
                    continue;
                }
                let slot = if required == Some(api.module()) {
                    &mut best_required
                } else {
                    &mut best
                };
                if slot.as_ref().is_none_or(|(r, _)| rank > *r) {
                    *slot = Some((rank, api));
                }
            }
            best_required.or(best).map(|(_, api)| api)
        } else {
            let mut fallback = None;
            let mut exact = None;
            for api in candidates {
                if required == Some(api.module()) {
                    exact = Some(api);
                    break;
                }
                fallback = Some(api);
            }
            exact.or(fallback)
        };

        match &selected {
            Some(api) => {
                tracing::trace!(?kind, module = %api.module(), registration = api.registration(), "api selected")
            }
            None => tracing::debug!(?kind, ?pattern, "no api matches"),
        }
        selected
    }

    /// Every filter factory matching `pattern`, best rank first
    pub fn filter_registrations(&self, pattern: &str) -> Vec<Api> {
        let mut ranked: Vec<(u32, Api)> = self
            .modules()
            .iter()
            .flat_map(|m| m.apis().collect::<Vec<_>>())
            .filter(|api| api.kind() == ApiKind::FilterFactory)
            .map(|api| (registration_match(api.registration(), pattern, Some(ApiKind::FilterFactory)), api))
            .filter(|(rank, _)| *rank > 0)
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.into_iter().map(|(_, api)| api).collect()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("paths", &self.paths)
            .field("statics", &self.statics.read().len())
            .field("dynamic", &self.dynamic.read().len())
            .finish()
    }
}

static GLOBAL: Lazy<RwLock<Option<Arc<ModuleRegistry>>>> = Lazy::new(|| RwLock::new(None));

/// Process-wide registry with the built-in filters, built from the current
/// configuration on first use
pub fn global() -> Arc<ModuleRegistry> {
    if let Some(registry) = GLOBAL.read().as_ref() {
        return registry.clone();
    }
    let mut slot = GLOBAL.write();
    slot.get_or_insert_with(|| {
        let registry = ModuleRegistry::new(&config::current());
        registry.register_static(crate::filters::module());
        Arc::new(registry)
    })
    .clone()
}

/// Drop the process-wide registry; the next [`global`] call rebuilds it
pub fn reset_global() {
    GLOBAL.write().take();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{Connector, Connectors};
    use crate::conversion::Feedback;
    use crate::error::Result as CmmResult;
    use crate::layout::DataType;
    use crate::module::{ApiEntry, CmmApi, ColorLink, FilterFactory, LinkRequest};
    use crate::node::FilterNode;
    use crate::pixel_access::PixelAccess;

    struct Named {
        registration: &'static str,
        connectors: Connectors,
    }

    impl FilterFactory for Named {
        fn registration(&self) -> &str {
            self.registration
        }
        fn name(&self) -> &str {
            self.registration
        }
        fn category(&self) -> &str {
            "Test"
        }
        fn connectors(&self) -> &Connectors {
            &self.connectors
        }
        fn run(&self, _node: &FilterNode, _ticket: &mut PixelAccess) -> Feedback {
            Feedback::End
        }
    }

    fn filter(registration: &'static str) -> ApiEntry {
        ApiEntry::Filter(Arc::new(Named {
            registration,
            connectors: Connectors::new(vec![Connector::plug("in")], vec![Connector::socket("out")]),
        }))
    }

    struct Cmm {
        float: bool,
    }

    impl CmmApi for Cmm {
        fn registration(&self) -> &str {
            "org/oxcmm/cmm/test"
        }
        fn can_handle(&self, query: Capability) -> bool {
            match query {
                Capability::DataType(t) => self.float || !t.is_float(),
                _ => true,
            }
        }
        fn create_link(&self, _request: &LinkRequest<'_>) -> CmmResult<Box<dyn ColorLink>> {
            Err(Error::Transform("test cmm".into()))
        }
    }

    fn code(text: &str) -> ModuleCode {
        ModuleCode::parse(text).unwrap()
    }

    fn registry() -> ModuleRegistry {
        let registry = ModuleRegistry::new(&Config::default());
        registry.register_static(
            Module::new(code("aaaa"), "a", "1")
                .with_api(filter("org/oxcmm/imaging/scale"))
                .with_api(ApiEntry::Cmm(Arc::new(Cmm { float: true }))),
        );
        registry.register_static(
            Module::new(code("bbbb"), "b", "1")
                .with_api(filter("org/oxcmm/imaging/scale.fast"))
                .with_api(ApiEntry::Cmm(Arc::new(Cmm { float: false }))),
        );
        registry
    }

    #[test]
    fn test_filter_best_rank_wins() {
        let registry = registry();
        let api = registry
            .get_api(ApiKind::FilterFactory, None, Some("//imaging/scale.fast"))
            .unwrap();
        assert_eq!(api.module(), code("bbbb"));

        // equal rank: first seen
        let api = registry.get_api(ApiKind::FilterFactory, None, Some("//imaging/scale")).unwrap();
        assert_eq!(api.module(), code("aaaa"));

        let api = registry
            .get_api(ApiKind::FilterFactory, Some(code("bbbb")), Some("//imaging/scale"))
            .unwrap();
        assert_eq!(api.module(), code("bbbb"));

        assert!(registry.get_api(ApiKind::FilterFactory, None, Some("//imaging/blur")).is_none());
    }

    #[test]
    fn test_required_module_picks_its_best_rank() {
        let registry = registry();
        registry.register_static(
            Module::new(code("cccc"), "c", "1")
                .with_api(filter("org/oxcmm/imaging/scale"))
                .with_api(filter("org/oxcmm/imaging/scale.fast")),
        );
        let api = registry
            .get_api(ApiKind::FilterFactory, Some(code("cccc")), Some("//imaging/scale._fast"))
            .unwrap();
        assert_eq!(api.module(), code("cccc"));
        assert_eq!(api.registration(), "org/oxcmm/imaging/scale.fast");
    }

    #[test]
    fn test_other_kinds_prefer_code_then_last() {
        let registry = registry();
        let api = registry.get_api(ApiKind::ProfileTransform, None, None).unwrap();
        assert_eq!(api.module(), code("bbbb"));
        let api = registry.get_api(ApiKind::ProfileTransform, Some(code("aaaa")), None).unwrap();
        assert_eq!(api.module(), code("aaaa"));
        let api = registry.get_api(ApiKind::ProfileTransform, Some(code("zzzz")), None).unwrap();
        assert_eq!(api.module(), code("bbbb"));
        assert!(registry.get_api(ApiKind::Monitor, None, None).is_none());
    }

    #[test]
    fn test_capability_queries_filter_candidates() {
        let registry = registry();
        let api = registry
            .get_api_with(ApiKind::ProfileTransform, None, None, &[Capability::DataType(DataType::F32)])
            .unwrap();
        assert_eq!(api.module(), code("aaaa"));
    }

    #[test]
    fn test_filter_registrations_ranked() {
        let registry = registry();
        let found: Vec<String> = registry
            .filter_registrations("//imaging/scale._fast")
            .iter()
            .map(|api| api.registration().to_string())
            .collect();
        assert_eq!(found, vec!["org/oxcmm/imaging/scale.fast", "org/oxcmm/imaging/scale"]);
    }

    #[test]
    fn test_open_non_library() {
        let registry = registry();
        assert!(matches!(registry.open(Path::new("readme.txt")), Err(Error::Module(_))));
        assert_eq!(registry.modules().len(), 2);
    }

    #[test]
    fn test_global_has_builtins() {
        let registry = global();
        assert!(registry.module(crate::filters::MODULE_CODE).is_some());
    }
}
