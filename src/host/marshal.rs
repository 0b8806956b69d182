use crate::host::atom::{write_atoms, Atom};
use crate::runtime::value::{format_number, ArrayRef, Value};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("Cannot send a value of type {kind} through {destination}")]
    Unsupported {
        kind: &'static str,
        destination: &'static str,
    },
    #[error("Outlet index must be a number, got {kind}")]
    OutletIndex { kind: &'static str },
    #[error("Receiver name must be a string, got {kind}")]
    ReceiverName { kind: &'static str },
    #[error("Cannot send an array that contains itself through {destination}")]
    Cyclic { destination: &'static str },
}

/// What an `outlet` or `messnamed` call hands to the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum OutletMessage {
    Bang,
    Float(f64),
    Symbol(String),
    List(Vec<Atom>),
}

impl OutletMessage {
    /// The payload as script values again, in order.
    pub fn to_values(&self) -> Vec<Value> {
        match self {
            OutletMessage::Bang => Vec::new(),
            OutletMessage::Float(value) => vec![Value::Number(*value)],
            OutletMessage::Symbol(text) => vec![Value::from(text.as_str())],
            OutletMessage::List(atoms) => atoms_to_values(atoms),
        }
    }
}

impl fmt::Display for OutletMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutletMessage::Bang => write!(f, "bang"),
            OutletMessage::Float(value) => write!(f, "float {}", format_number(*value)),
            OutletMessage::Symbol(text) => write!(f, "symbol {text}"),
            OutletMessage::List(atoms) => {
                write!(f, "list")?;
                if !atoms.is_empty() {
                    write!(f, " ")?;
                    write_atoms(f, atoms)?;
                }
                Ok(())
            }
        }
    }
}

pub fn atom_to_value(atom: &Atom) -> Value {
    match atom {
        Atom::Float(value) => Value::Number(*value),
        Atom::Symbol(text) => Value::from(text.as_str()),
        Atom::List(items) => Value::from(atoms_to_values(items)),
    }
}

pub fn atoms_to_values(atoms: &[Atom]) -> Vec<Value> {
    atoms.iter().map(atom_to_value).collect()
}

/// Shapes outbound arguments into one message. `Ok(None)` means there is
/// nothing to send.
pub fn shape_payload(
    values: &[Value],
    destination: &'static str,
) -> Result<Option<OutletMessage>, MarshalError> {
    match values {
        [] => Ok(None),
        [Value::Number(value)] => Ok(Some(OutletMessage::Float(*value))),
        [Value::String(text)] if &**text == "bang" => Ok(Some(OutletMessage::Bang)),
        [Value::String(text)] => Ok(Some(OutletMessage::Symbol(text.to_string()))),
        _ => {
            let mut atoms = Vec::new();
            let mut visiting = HashSet::new();
            for value in values {
                flatten_into(value, destination, &mut visiting, &mut atoms)?;
            }
            if atoms.is_empty() {
                Ok(None)
            } else {
                Ok(Some(OutletMessage::List(atoms)))
            }
        }
    }
}

fn flatten_into(
    value: &Value,
    destination: &'static str,
    visiting: &mut HashSet<*const ()>,
    atoms: &mut Vec<Atom>,
) -> Result<(), MarshalError> {
    match value {
        Value::Number(number) => atoms.push(Atom::Float(*number)),
        Value::String(text) => atoms.push(Atom::Symbol(text.to_string())),
        Value::Array(items) => flatten_array(items, destination, visiting, atoms)?,
        other => {
            return Err(MarshalError::Unsupported {
                kind: other.type_of(),
                destination,
            })
        }
    }
    Ok(())
}

fn flatten_array(
    items: &ArrayRef,
    destination: &'static str,
    visiting: &mut HashSet<*const ()>,
    atoms: &mut Vec<Atom>,
) -> Result<(), MarshalError> {
    let ptr = Rc::as_ptr(items).cast::<()>();
    if !visiting.insert(ptr) {
        return Err(MarshalError::Cyclic { destination });
    }
    for item in items.borrow().iter() {
        flatten_into(item, destination, visiting, atoms)?;
    }
    visiting.remove(&ptr);
    Ok(())
}
