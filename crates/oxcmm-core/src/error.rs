//! Error types for oxcmm

use thiserror::Error;

use crate::icc::IccError;
use crate::object::ObjectKind;

/// Result type for oxcmm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in oxcmm operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Malformed profile bytes
    #[error("ICC codec error: {0}")]
    Icc(#[from] IccError),

    /// Invalid profile structure or request
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// A handle carried an unexpected type tag
    #[error("Wrong object kind: expected {expected:?}, got {actual:?}")]
    WrongObjectKind {
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// Module could not be opened or used
    #[error("Module error: {0}")]
    Module(String),

    /// A module table failed validation
    #[error("Module '{code}' violates the module ABI: {reason}")]
    ModuleAbi { code: String, reason: String },

    /// No module provides the requested capability
    #[error("No module provides {0}")]
    ApiNotFound(String),

    /// A filter with several static inputs or outputs was added to a chain
    #[error("Filter chain must stay linear: {0}")]
    NonLinearChain(String),

    /// A filter was appended before the input image root
    #[error("An input image filter must be added first")]
    NoInputImage,

    /// Plug and socket capabilities do not fit
    #[error("Connector mismatch: {0}")]
    ConnectorMismatch(String),

    /// The plug went through release and cannot be reused
    #[error("Plug was released and cannot reconnect")]
    PlugReleased,

    /// Pixel layout cannot describe the requested buffer
    #[error("Invalid pixel layout: {0}")]
    InvalidLayout(String),

    /// Buffer size mismatch
    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// Coordinate or index outside of the addressed object
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Backend transform failed
    #[error("Transform error: {0}")]
    Transform(String),

    /// Pixel pull reported a hard error
    #[error("Filter '{filter}' failed with feedback code {code}")]
    Feedback { filter: String, code: i32 },

    /// Configuration could not be read
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Dynamic library error
    #[error("Library loading error: {0}")]
    Library(#[from] libloading::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Non-zero integer status for this error.
    ///
    /// `0` is reserved for success, so every variant maps to a positive code.
    pub fn code(&self) -> i32 {
        match self {
            Self::Icc(_) => 1,
            Self::InvalidProfile(_) => 2,
            Self::WrongObjectKind { .. } => 3,
            Self::Module(_) => 4,
            Self::ModuleAbi { .. } => 5,
            Self::ApiNotFound(_) => 6,
            Self::NonLinearChain(_) => 7,
            Self::NoInputImage => 8,
            Self::ConnectorMismatch(_) => 9,
            Self::PlugReleased => 10,
            Self::InvalidLayout(_) => 11,
            Self::BufferSize { .. } => 12,
            Self::OutOfRange(_) => 13,
            Self::Transform(_) => 14,
            Self::Feedback { code, .. } => (*code).max(1),
            Self::Config(_) => 16,
            Self::Json(_) => 17,
            Self::Library(_) => 18,
            Self::Io(_) => 19,
        }
    }
}
