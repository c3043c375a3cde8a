//! Filter templates resolved from modules

use std::fmt;
use std::sync::Arc;

use crate::config;
use crate::connector::Connectors;
use crate::error::{Error, Result};
use crate::module::{ApiKind, FilterFactory, ModuleCode, ModuleRegistry};
use crate::object::{NameKind, Object, ObjectKind, Struct};
use crate::options::Options;

/// A filter factory together with its effective options.
///
/// Nodes are instantiated from a filter with [`crate::node::FilterNode::create`];
/// many nodes may share one filter.
pub struct Filter {
    object: Object,
    registration: String,
    module: ModuleCode,
    factory: Arc<dyn FilterFactory>,
    options: Options,
    registry: Arc<ModuleRegistry>,
}

/// Option path of a registration: its segments without dot keys.
///
/// `org/oxcmm/imaging/icc_color.oxcm` configures under
/// `org/oxcmm/imaging/icc_color`.
pub fn option_path(registration: &str) -> String {
    registration
        .split('/')
        .map(|segment| segment.split('.').next().unwrap_or(segment))
        .collect::<Vec<_>>()
        .join("/")
}

impl Filter {
    /// Resolve the best filter factory for `pattern`.
    ///
    /// Effective options are the factory defaults, then the configured
    /// options at the filter's option path, then `overrides`.
    pub fn new(
        pattern: &str,
        required: Option<ModuleCode>,
        overrides: Option<&Options>,
        registry: &Arc<ModuleRegistry>,
    ) -> Result<Arc<Filter>> {
        let api = registry
            .get_api(ApiKind::FilterFactory, required, Some(pattern))
            .ok_or_else(|| Error::ApiNotFound(format!("a filter matching '{pattern}'")))?;
        let factory = api
            .as_filter()
            .cloned()
            .ok_or_else(|| Error::ApiNotFound(format!("a filter matching '{pattern}'")))?;

        let registration = factory.registration().to_string();
        let configured = config::current().options.subtree(&option_path(&registration));
        let mut options = factory.default_options().combine(&configured);
        if let Some(overrides) = overrides {
            options = options.combine(overrides);
        }

        let object = Object::new(ObjectKind::Filter);
        object.set_name(NameKind::Nick, factory.name());
        object.set_name(NameKind::Name, registration.as_str());
        object.set_name(NameKind::Description, factory.category());
        tracing::debug!(%registration, module = %api.module(), "filter resolved");
        Ok(Arc::new(Self {
            object,
            registration,
            module: api.module(),
            factory,
            options,
            registry: registry.clone(),
        }))
    }

    pub fn registration(&self) -> &str {
        &self.registration
    }

    pub fn name(&self) -> &str {
        self.factory.name()
    }

    pub fn category(&self) -> &str {
        self.factory.category()
    }

    pub fn module(&self) -> ModuleCode {
        self.module
    }

    pub fn factory(&self) -> &Arc<dyn FilterFactory> {
        &self.factory
    }

    pub fn connectors(&self) -> &Connectors {
        self.factory.connectors()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Registry the filter was resolved from; backends are looked up there too
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }
}

impl Struct for Filter {
    fn object(&self) -> &Object {
        &self.object
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("registration", &self.registration)
            .field("module", &self.module)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::filters;

    #[test]
    fn test_option_path() {
        assert_eq!(option_path("org/oxcmm/imaging/icc_color.oxcm"), "org/oxcmm/imaging/icc_color");
        assert_eq!(option_path("a.b/c"), "a/c");
    }

    #[test]
    fn test_overrides_win_over_defaults() {
        let registry = Arc::new(ModuleRegistry::new(&Config::default()));
        registry.register_static(filters::module());

        let filter = Filter::new("//imaging/icc_color", None, None, &registry).unwrap();
        assert_eq!(filter.options().get_i64("rendering_intent"), Some(0));
        assert_eq!(filter.module(), filters::MODULE_CODE);

        let overrides = Options::from_json_str(r#"{"rendering_intent": 1}"#).unwrap();
        let filter = Filter::new("//imaging/icc_color", None, Some(&overrides), &registry).unwrap();
        assert_eq!(filter.options().get_i64("rendering_intent"), Some(1));
        assert_eq!(filter.name(), "ICC color");
    }

    #[test]
    fn test_unknown_pattern() {
        let registry = Arc::new(ModuleRegistry::new(&Config::default()));
        registry.register_static(filters::module());
        let result = Filter::new("//imaging/unknown", None, None, &registry);
        assert!(matches!(result, Err(Error::ApiNotFound(_))));
    }
}
