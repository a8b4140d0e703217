//! Error types for the scripting crate

use crate::interface::ScriptId;
use otsrv_config::XmlError;
use otsrv_core::ServerError;

/// Script-specific error types
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Script body failed to compile or its top level raised
    #[error("Failed to load script {name}: {message}")]
    LoadError { name: String, message: String },

    /// Script loaded but does not define the entry function
    #[error("Event {event} not found in script {name}")]
    EventNotFound { name: String, event: String },

    /// No script is bound under this id
    #[error("Unknown script id {0}")]
    UnknownScript(ScriptId),

    /// Node tag is not one this registry handles
    #[error("Not a module node: {0}")]
    NotModuleNode(String),

    /// Module configuration error
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Document error
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// Lua runtime error
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    /// File I/O error
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while configuring or binding a module record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("Missing type for module.")]
    MissingType,

    #[error("Invalid type for module: {0}")]
    InvalidType(String),

    #[error("Missing byte for module typed recvbyte.")]
    MissingByte,

    #[error("Invalid {attribute} for module: {value}")]
    InvalidNumber {
        attribute: &'static str,
        value: String,
    },

    /// Binding attempted on a record without a type
    #[error("Module has no type")]
    Unconfigured,

    /// Script id 0 means "unbound" and cannot be bound
    #[error("Cannot bind module to script id 0")]
    UnboundScript,
}

impl From<ScriptError> for ServerError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::Io(e) => ServerError::Io(e),
            other => ServerError::Script(other.to_string()),
        }
    }
}

/// Result type for scripting operations
pub type Result<T> = std::result::Result<T, ScriptError>;
