use crate::host::marshal::OutletMessage;
use std::{cell::RefCell, fmt, rc::Rc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Outlet(usize),
    /// A receiver addressed by name with `messnamed`.
    Named(String),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Outlet(index) => write!(f, "outlet {index}"),
            Destination::Named(name) => write!(f, "send {name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEnvelope {
    pub destination: Destination,
    pub message: OutletMessage,
}

impl fmt::Display for OutboundEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.destination, self.message)
    }
}

/// The graph a node is patched into.
pub trait Graph {
    fn deliver(&mut self, envelope: OutboundEnvelope);

    /// The script changed its port counts.
    fn ports_changed(&mut self, _inlets: usize, _outlets: usize) {}

    /// A script finished loading; `loadbang` follows immediately.
    fn load_complete(&mut self, _path: &str) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    Delivered(OutboundEnvelope),
    PortsChanged { inlets: usize, outlets: usize },
    LoadComplete(String),
}

/// Keeps every event in a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingGraph {
    events: Rc<RefCell<Vec<GraphEvent>>>,
}

impl RecordingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.borrow().clone()
    }

    pub fn delivered(&self) -> Vec<OutboundEnvelope> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                GraphEvent::Delivered(envelope) => Some(envelope.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl Graph for RecordingGraph {
    fn deliver(&mut self, envelope: OutboundEnvelope) {
        self.events.borrow_mut().push(GraphEvent::Delivered(envelope));
    }

    fn ports_changed(&mut self, inlets: usize, outlets: usize) {
        self.events
            .borrow_mut()
            .push(GraphEvent::PortsChanged { inlets, outlets });
    }

    fn load_complete(&mut self, path: &str) {
        self.events
            .borrow_mut()
            .push(GraphEvent::LoadComplete(path.to_string()));
    }
}
