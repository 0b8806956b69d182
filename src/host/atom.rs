use crate::runtime::value::format_number;
use nom::{combinator::all_consuming, number::complete::recognize_float};
use std::fmt;

/// A single value as it travels over the graph's wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Float(f64),
    Symbol(String),
    /// Nested list. Only produced by embedders; the textual form never nests.
    List(Vec<Atom>),
}

impl Atom {
    pub fn symbol(text: impl Into<String>) -> Self {
        Atom::Symbol(text.into())
    }

    /// Types a bare word: anything that is entirely a decimal number is a
    /// float, everything else a symbol.
    pub fn from_word(word: &str) -> Self {
        let numeric =
            all_consuming(recognize_float::<&str, nom::error::Error<&str>>)(word).is_ok();
        match word.parse::<f64>() {
            Ok(value) if numeric => Atom::Float(value),
            _ => Atom::Symbol(word.to_string()),
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Atom::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Atom::Symbol(text) => Some(text),
            _ => None,
        }
    }
}

impl From<f64> for Atom {
    fn from(value: f64) -> Self {
        Atom::Float(value)
    }
}

impl From<&str> for Atom {
    fn from(value: &str) -> Self {
        Atom::Symbol(value.to_string())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Float(value) => write!(f, "{}", format_number(*value)),
            Atom::Symbol(text) => write!(f, "{text}"),
            Atom::List(items) => {
                write!(f, "[")?;
                write_atoms(f, items)?;
                write!(f, "]")
            }
        }
    }
}

/// Writes atoms separated by single spaces.
pub fn write_atoms(f: &mut fmt::Formatter<'_>, atoms: &[Atom]) -> fmt::Result {
    for (idx, atom) in atoms.iter().enumerate() {
        if idx > 0 {
            write!(f, " ")?;
        }
        write!(f, "{atom}")?;
    }
    Ok(())
}
