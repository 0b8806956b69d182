use crate::language::{source::SourceFile, span::Span};
use crate::runtime::value::Value;
use std::rc::Rc;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A value raised with `throw`.
    #[error("Uncaught {value}")]
    Thrown { value: Value },
    #[error("{name} is not defined")]
    UnknownSymbol { name: String },
    #[error("Assignment to constant variable `{name}`")]
    ImmutableBinding { name: String },
    #[error("TypeError: {message}")]
    TypeMismatch { message: String },
    #[error("TypeError: {name} is not a function")]
    NotCallable { name: String },
    #[error("Operation not supported: {message}")]
    Unsupported { message: String },
    #[error("RangeError: {message}")]
    Panic { message: String },
}

impl RuntimeError {
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch {
            message: message.into(),
        }
    }

    /// The value a `catch` clause binds for this error.
    pub fn into_caught_value(self) -> Value {
        match self {
            RuntimeError::Thrown { value } => value,
            other => Value::from(other.to_string()),
        }
    }
}

/// Where an error first surfaced in script source.
#[derive(Debug, Clone)]
pub struct ErrorSite {
    pub source: Rc<SourceFile>,
    pub span: Span,
}

/// A runtime error that escaped every `try` and reached the host boundary.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Uncaught {
    pub error: RuntimeError,
    pub site: Option<ErrorSite>,
}

impl Uncaught {
    pub fn thrown_value(&self) -> Option<&Value> {
        match &self.error {
            RuntimeError::Thrown { value } => Some(value),
            _ => None,
        }
    }
}
