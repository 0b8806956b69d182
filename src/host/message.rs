use crate::host::atom::{write_atoms, Atom};
use nom::{
    bytes::complete::is_not,
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, opt},
    multi::separated_list0,
    sequence::{delimited, terminated},
    IResult,
};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Bang,
    Float,
    Int,
    Symbol,
    List,
    /// Any other leading symbol, carried verbatim.
    Custom(String),
}

/// An inbound event before it is routed to a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub args: Vec<Atom>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Malformed message `{input}`")]
pub struct MessageParseError {
    pub input: String,
}

impl Message {
    pub fn new(kind: MessageKind, args: Vec<Atom>) -> Self {
        Self { kind, args }
    }

    pub fn bang() -> Self {
        Self::new(MessageKind::Bang, Vec::new())
    }

    pub fn float(value: f64) -> Self {
        Self::new(MessageKind::Float, vec![Atom::Float(value)])
    }

    pub fn int(value: i64) -> Self {
        Self::new(MessageKind::Int, vec![Atom::Float(value as f64)])
    }

    pub fn symbol(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Symbol, vec![Atom::Symbol(text.into())])
    }

    pub fn list(atoms: Vec<Atom>) -> Self {
        Self::new(MessageKind::List, atoms)
    }

    pub fn custom(selector: impl Into<String>, args: Vec<Atom>) -> Self {
        Self::new(MessageKind::Custom(selector.into()), args)
    }

    /// Builds a message from raw atoms the way the graph types them: the
    /// leading atom decides the selector.
    pub fn from_atoms(atoms: Vec<Atom>) -> Self {
        let mut rest = atoms.into_iter();
        match rest.next() {
            None => Self::bang(),
            Some(Atom::Float(value)) => {
                let tail: Vec<Atom> = rest.collect();
                if tail.is_empty() {
                    Self::float(value)
                } else {
                    let mut all = Vec::with_capacity(tail.len() + 1);
                    all.push(Atom::Float(value));
                    all.extend(tail);
                    Self::list(all)
                }
            }
            Some(Atom::List(items)) => {
                let mut all = vec![Atom::List(items)];
                all.extend(rest);
                Self::list(all)
            }
            Some(Atom::Symbol(selector)) => Self::with_selector(&selector, rest.collect()),
        }
    }

    pub fn with_selector(selector: &str, args: Vec<Atom>) -> Self {
        match selector {
            "bang" => Self::bang(),
            "float" => Self::float(args.first().and_then(Atom::as_float).unwrap_or(0.0)),
            "int" => Self::int(args.first().and_then(Atom::as_float).unwrap_or(0.0) as i64),
            "symbol" => Self::symbol(args.first().and_then(Atom::as_symbol).unwrap_or("")),
            "list" => match args.as_slice() {
                [] => Self::bang(),
                [Atom::Float(value)] => Self::float(*value),
                [Atom::Symbol(text)] => Self::symbol(text.clone()),
                _ => Self::list(args),
            },
            other => Self::custom(other, args),
        }
    }

    /// Parses the textual form, e.g. `foo 1 bar`, `1 2 3;` or `bang`.
    pub fn parse(text: &str) -> Result<Self, MessageParseError> {
        match all_consuming(message_atoms)(text) {
            Ok((_, atoms)) => Ok(Self::from_atoms(atoms)),
            Err(_) => Err(MessageParseError {
                input: text.to_string(),
            }),
        }
    }

    /// The wire selector.
    pub fn selector(&self) -> &str {
        match &self.kind {
            MessageKind::Bang => "bang",
            MessageKind::Float => "float",
            MessageKind::Int => "int",
            MessageKind::Symbol => "symbol",
            MessageKind::List => "list",
            MessageKind::Custom(name) => name,
        }
    }
}

impl Message {
    /// The name scripts see in `messagename`: the selector, except that
    /// numbers report the handler they are meant for.
    pub fn handler_name(&self) -> &str {
        match &self.kind {
            MessageKind::Float => "msg_float",
            MessageKind::Int => "msg_int",
            _ => self.selector(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector())?;
        if !self.args.is_empty() {
            write!(f, " ")?;
            write_atoms(f, &self.args)?;
        }
        Ok(())
    }
}

fn atom(input: &str) -> IResult<&str, Atom> {
    map(is_not(" \t\r\n;"), Atom::from_word)(input)
}

fn message_atoms(input: &str) -> IResult<&str, Vec<Atom>> {
    terminated(
        delimited(multispace0, separated_list0(multispace1, atom), multispace0),
        opt(terminated(char(';'), multispace0)),
    )(input)
}
