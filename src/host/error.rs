use crate::host::{config::ConfigError, marshal::MarshalError};
use thiserror::Error;

pub type HostResult<T> = Result<T, HostError>;

/// Everything the host reports through the diagnostics channel. None of
/// these ever propagate out of a node.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Script file '{name}' not found.")]
    NotFound { name: String },
    #[error("Error reading '{path}'.")]
    Read { path: String },
    #[error("Error compiling '{path}':\n{details}")]
    Compile { path: String, details: String },
    #[error("Error running '{path}':\n{details}")]
    ModuleRun { path: String, details: String },
    #[error("Error calling '{handler}':\n{details}")]
    HandlerInvocation {
        handler: String,
        inlet: usize,
        details: String,
    },
    #[error("Function '{name}' is private.")]
    PrivateHandler { name: String },
    #[error(transparent)]
    Marshal(#[from] MarshalError),
    #[error("Outlet index {index} out of range (node has {outlets} outlets)")]
    OutletRange { index: i64, outlets: usize },
    #[error("Inlet index {index} out of range (node has {inlets} inlets)")]
    InletRange { index: usize, inlets: usize },
    #[error("Must specify source file.")]
    MissingSource,
    #[error("Error setting property '{name}'.")]
    SetProperty { name: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
