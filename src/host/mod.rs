//! The scripting host: everything between a graph delivering messages and
//! the interpreter running handlers.

pub mod atom;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod loader;
pub mod marshal;
pub mod message;
pub mod node;
pub mod outbound;
pub mod registry;

pub use atom::Atom;
pub use config::HostConfig;
pub use dispatch::DispatchOutcome;
pub use error::{HostError, HostResult};
pub use message::{Message, MessageKind};
pub use node::ScriptNode;
