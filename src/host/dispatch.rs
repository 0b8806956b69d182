use crate::host::{
    message::{Message, MessageKind},
    registry::{HandlerRegistry, CATCH_ALL},
};
use crate::runtime::value::FunctionRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Resolving,
    Invoking,
}

/// The handler chosen for one message.
#[derive(Debug, Clone)]
pub enum Resolution {
    Invoke { handler: String, function: FunctionRef },
    /// The specific handler exists but is marked private.
    Private { handler: String },
    Drop,
}

/// How a single `receive` call ended. Failures have already been reported
/// through the node's log when this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled { handler: String },
    Failed { handler: String },
    Private { handler: String },
    Dropped,
    /// A host command (`compile`, `setprop`, ...) was executed.
    Command,
    /// The inlet does not exist.
    Rejected,
}

/// Handler names to try for `message`, most specific first.
pub fn candidates(message: &Message) -> Vec<&str> {
    let specific: &[&str] = match &message.kind {
        MessageKind::Bang => &["bang"],
        MessageKind::Float => &["msg_float"],
        MessageKind::Int => &["msg_int", "msg_float"],
        MessageKind::Symbol => &["symbol"],
        MessageKind::List => &["list"],
        MessageKind::Custom(name) if name == "loadbang" => &[],
        MessageKind::Custom(name) => return vec![name.as_str(), CATCH_ALL],
    };
    let mut names = specific.to_vec();
    names.push(CATCH_ALL);
    names
}

pub fn resolve(registry: &HandlerRegistry, message: &Message) -> Resolution {
    for name in candidates(message) {
        let Some(entry) = registry.get(name) else {
            continue;
        };
        if let Some(function) = registry.dispatchable(name) {
            return Resolution::Invoke {
                handler: name.to_string(),
                function: function.clone(),
            };
        }
        if entry.is_private() {
            return Resolution::Private {
                handler: name.to_string(),
            };
        }
    }
    Resolution::Drop
}

/// Tracks where the node is in `Idle -> Resolving -> Invoking -> Idle`.
#[derive(Debug)]
pub struct Dispatcher {
    phase: Phase,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self { phase: Phase::Idle }
    }
}

impl Dispatcher {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn begin(&mut self) {
        debug_assert_eq!(self.phase, Phase::Idle);
        self.phase = Phase::Resolving;
    }

    pub fn invoking(&mut self) {
        debug_assert_eq!(self.phase, Phase::Resolving);
        self.phase = Phase::Invoking;
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::atom::Atom;

    #[test]
    fn candidate_order_per_kind() {
        assert_eq!(candidates(&Message::bang()), vec!["bang", "anything"]);
        assert_eq!(candidates(&Message::int(3)), vec!["msg_int", "msg_float", "anything"]);
        assert_eq!(
            candidates(&Message::custom("foo", vec![Atom::Float(1.0)])),
            vec!["foo", "anything"]
        );
    }

    #[test]
    fn inbound_loadbang_only_reaches_the_catch_all() {
        assert_eq!(candidates(&Message::custom("loadbang", vec![])), vec!["anything"]);
    }

    #[test]
    fn empty_registry_drops() {
        let registry = HandlerRegistry::default();
        assert!(matches!(resolve(&registry, &Message::bang()), Resolution::Drop));
    }

    #[test]
    fn phases_cycle_back_to_idle() {
        let mut dispatcher = Dispatcher::default();
        dispatcher.begin();
        assert_eq!(dispatcher.phase(), Phase::Resolving);
        dispatcher.invoking();
        assert_eq!(dispatcher.phase(), Phase::Invoking);
        dispatcher.finish();
        assert_eq!(dispatcher.phase(), Phase::Idle);
    }
}
