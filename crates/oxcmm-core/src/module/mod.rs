//! Backend modules
//!
//! A module bundles one or more APIs under a four character code. Each
//! API kind is a trait:
//!
//! | Kind | Trait | Purpose |
//! |------|-------|---------|
//! | 1 | [`CmmApi`] | profile to profile color links |
//! | 2 | [`MonitorApi`] | monitor profiles |
//! | 3 | [`TagCodecApi`] | tag payload decoding |
//! | 4 | [`FilterFactory`] | graph filters |
//!
//! Modules are either registered in-process with
//! [`ModuleRegistry::register_static`] or loaded from shared libraries
//! exporting a [`abi::RawModuleInfo`] table, which is validated before any
//! of its function pointers is wrapped.

pub mod abi;
mod api;
mod loader;
mod registration;
mod registry;

use std::fmt;
use std::sync::Arc;

pub use api::{
    Capability, CmmApi, ColorLink, FilterFactory, LinkRequest, MonitorApi, Signal, TagCodecApi,
};
pub use loader::{discover, module_code_from_path};
pub use registration::registration_match;
pub use registry::{ModuleRegistry, global, reset_global};

use crate::object::{NameKind, Object, ObjectKind, Struct};

/// Four character module code, e.g. `moxc`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleCode([u8; 4]);

impl ModuleCode {
    pub const fn new(code: [u8; 4]) -> Self {
        Self(code)
    }

    /// Code from text of exactly four ASCII characters
    pub fn parse(text: &str) -> Option<Self> {
        let bytes: [u8; 4] = text.as_bytes().try_into().ok()?;
        bytes.iter().all(|b| b.is_ascii_graphic()).then_some(Self(bytes))
    }

    pub fn as_bytes(&self) -> [u8; 4] {
        self.0
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Display for ModuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ModuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleCode({})", self.as_str())
    }
}

/// API kind discriminant, shared with the module ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKind {
    ProfileTransform,
    Monitor,
    TagCodec,
    FilterFactory,
}

impl ApiKind {
    pub const fn number(self) -> u32 {
        match self {
            Self::ProfileTransform => 1,
            Self::Monitor => 2,
            Self::TagCodec => 3,
            Self::FilterFactory => 4,
        }
    }

    pub const fn from_number(number: u32) -> Option<Self> {
        match number {
            1 => Some(Self::ProfileTransform),
            2 => Some(Self::Monitor),
            3 => Some(Self::TagCodec),
            4 => Some(Self::FilterFactory),
            _ => None,
        }
    }
}

/// One API implementation
#[derive(Clone)]
pub enum ApiEntry {
    Cmm(Arc<dyn CmmApi>),
    Monitor(Arc<dyn MonitorApi>),
    TagCodec(Arc<dyn TagCodecApi>),
    Filter(Arc<dyn FilterFactory>),
}

impl ApiEntry {
    pub fn kind(&self) -> ApiKind {
        match self {
            Self::Cmm(_) => ApiKind::ProfileTransform,
            Self::Monitor(_) => ApiKind::Monitor,
            Self::TagCodec(_) => ApiKind::TagCodec,
            Self::Filter(_) => ApiKind::FilterFactory,
        }
    }

    pub fn registration(&self) -> &str {
        match self {
            Self::Cmm(api) => api.registration(),
            Self::Monitor(api) => api.registration(),
            Self::TagCodec(api) => api.registration(),
            Self::Filter(api) => api.registration(),
        }
    }

    pub fn can_handle(&self, query: Capability) -> bool {
        match self {
            Self::Cmm(api) => api.can_handle(query),
            Self::Monitor(api) => api.can_handle(query),
            Self::TagCodec(api) => api.can_handle(query),
            Self::Filter(api) => api.can_handle(query),
        }
    }
}

impl fmt::Debug for ApiEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind(), self.registration())
    }
}

/// An API together with the module providing it
#[derive(Debug, Clone)]
pub struct Api {
    module: ModuleCode,
    entry: ApiEntry,
}

impl Api {
    pub fn module(&self) -> ModuleCode {
        self.module
    }

    pub fn kind(&self) -> ApiKind {
        self.entry.kind()
    }

    pub fn registration(&self) -> &str {
        self.entry.registration()
    }

    pub fn entry(&self) -> &ApiEntry {
        &self.entry
    }

    pub fn as_cmm(&self) -> Option<&Arc<dyn CmmApi>> {
        match &self.entry {
            ApiEntry::Cmm(api) => Some(api),
            _ => None,
        }
    }

    pub fn as_monitor(&self) -> Option<&Arc<dyn MonitorApi>> {
        match &self.entry {
            ApiEntry::Monitor(api) => Some(api),
            _ => None,
        }
    }

    pub fn as_tag_codec(&self) -> Option<&Arc<dyn TagCodecApi>> {
        match &self.entry {
            ApiEntry::TagCodec(api) => Some(api),
            _ => None,
        }
    }

    pub fn as_filter(&self) -> Option<&Arc<dyn FilterFactory>> {
        match &self.entry {
            ApiEntry::Filter(api) => Some(api),
            _ => None,
        }
    }
}

/// A loaded or statically registered module
pub struct Module {
    object: Object,
    code: ModuleCode,
    version: String,
    apis: Vec<ApiEntry>,
    // Keeps the code behind dynamic API tables mapped.
    library: Option<Arc<libloading::Library>>,
}

impl Module {
    pub fn new(code: ModuleCode, name: impl Into<String>, version: impl Into<String>) -> Self {
        let object = Object::new(ObjectKind::Module);
        object.set_name(NameKind::Nick, code.as_str());
        object.set_name(NameKind::Name, name);
        Self {
            object,
            code,
            version: version.into(),
            apis: Vec::new(),
            library: None,
        }
    }

    pub fn with_api(mut self, api: ApiEntry) -> Self {
        self.apis.push(api);
        self
    }

    pub(crate) fn with_library(mut self, library: Arc<libloading::Library>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn code(&self) -> ModuleCode {
        self.code
    }

    pub fn name(&self) -> String {
        self.object.name(NameKind::Name).unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn apis(&self) -> impl Iterator<Item = Api> + '_ {
        self.apis.iter().map(|entry| Api {
            module: self.code,
            entry: entry.clone(),
        })
    }

    pub fn api_count(&self) -> usize {
        self.apis.len()
    }

    /// Whether the module lives in a shared library
    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }
}

impl Struct for Module {
    fn object(&self) -> &Object {
        &self.object
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("code", &self.code)
            .field("version", &self.version)
            .field("apis", &self.apis)
            .field("dynamic", &self.is_dynamic())
            .finish()
    }
}
