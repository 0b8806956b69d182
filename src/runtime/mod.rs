pub mod builtins;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod value;

pub use interpreter::{Interpreter, ScriptHost};
