use crate::runtime::combinators::{Combinator, term::Term};
use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

/// Where a continuation entry sits in the term being read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Nothing was pending when the entry was pushed.  A top level frame keeps collecting
    /// arguments across units until it fires.
    TopLevel,

    /// The entry is filling the function position of a backtick application.  Frames with this
    /// origin belong to that application and only ever take its one operand.
    Operator,

    /// The entry is filling the operand position of a pending frame.
    Operand,

    /// The entry is an item of an open group.
    Group,
}

impl Origin {
    pub fn name(self) -> &'static str {
        match self {
            Origin::TopLevel => "top",
            Origin::Operator => "operator",
            Origin::Operand => "operand",
            Origin::Group => "group",
        }
    }

    pub fn from_name(name: &str) -> Option<Origin> {
        match name {
            "top" => Some(Origin::TopLevel),
            "operator" => Some(Origin::Operator),
            "operand" => Some(Origin::Operand),
            "group" => Some(Origin::Group),
            _ => None,
        }
    }
}

/// A partially applied combinator waiting for the rest of its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContinuationFrame {
    pub combinator: Combinator,

    /// Always fewer than the combinator's arity.
    pub collected: Vec<Rc<Term>>,

    pub origin: Origin,
}

impl ContinuationFrame {
    /// The term this frame stands for if it never receives another argument.
    pub fn partial_term(&self) -> Rc<Term> {
        Term::from_spine(
            Term::combinator(self.combinator),
            self.collected.iter().cloned(),
        )
    }
}

/// An entry on the continuation stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Continuation {
    /// A backtick was read and its function is still to come.
    Operator { origin: Origin },

    Frame(ContinuationFrame),

    /// An open parenthesis and the items read so far.
    Group { items: Vec<Rc<Term>>, origin: Origin },
}

impl Continuation {
    pub fn is_top_level_frame(&self) -> bool {
        matches!(self, Continuation::Frame(frame) if frame.origin == Origin::TopLevel)
    }

    /// The origin a new entry gets when pushed on top of this one.
    pub fn child_origin(entry: Option<&Continuation>) -> Origin {
        match entry {
            None => Origin::TopLevel,
            Some(Continuation::Operator { .. }) => Origin::Operator,
            Some(Continuation::Frame(_)) => Origin::Operand,
            Some(Continuation::Group { .. }) => Origin::Group,
        }
    }
}

/// Entries print in the dump's `cont` line format.
impl Display for Continuation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Continuation::Operator { origin } => write!(f, "operator {}", origin.name()),
            Continuation::Frame(frame) => {
                write!(f, "frame {} {}", frame.origin.name(), frame.combinator.symbol())?;

                for arg in &frame.collected {
                    write!(f, " {}", arg)?;
                }

                Ok(())
            }
            Continuation::Group { items, origin } => {
                write!(f, "group {}", origin.name())?;

                for item in items {
                    write!(f, " {}", item)?;
                }

                Ok(())
            }
        }
    }
}
