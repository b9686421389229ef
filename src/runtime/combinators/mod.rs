use crate::runtime::combinators::term::Term;
use serde::Deserialize;
use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

/// Module for the application tree of combinator terms.
pub mod term;

/// Module for the records kept on the continuation stack while terms are parsed and applied.
pub mod continuation;

/// Module for the character driven reducer.
pub mod reducer;

/// The base combinators the machine knows how to fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Combinator {
    I,
    K,
    S,
    B,
    C,
    W,
    M,
    T,
}

impl Display for Combinator {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl Combinator {
    /// Every base combinator, in the order they are listed by `combinators`.
    pub const ALL: [Combinator; 8] = [
        Combinator::I,
        Combinator::K,
        Combinator::S,
        Combinator::B,
        Combinator::C,
        Combinator::W,
        Combinator::M,
        Combinator::T,
    ];

    /// The single character the combinator is written as.
    pub fn symbol(self) -> char {
        match self {
            Combinator::I => 'i',
            Combinator::K => 'k',
            Combinator::S => 's',
            Combinator::B => 'b',
            Combinator::C => 'c',
            Combinator::W => 'w',
            Combinator::M => 'm',
            Combinator::T => 't',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Combinator> {
        Combinator::ALL
            .iter()
            .copied()
            .find(|combinator| combinator.symbol() == symbol)
    }

    /// How many arguments have to be collected before the rule fires.
    pub fn arity(self) -> usize {
        match self {
            Combinator::I | Combinator::M => 1,
            Combinator::K | Combinator::W | Combinator::T => 2,
            Combinator::S | Combinator::B | Combinator::C => 3,
        }
    }

    /// The rewrite rule in readable form.
    pub fn rule(self) -> &'static str {
        match self {
            Combinator::I => "i x = x",
            Combinator::K => "k x y = x",
            Combinator::S => "s x y z = x z (y z)",
            Combinator::B => "b x y z = x (y z)",
            Combinator::C => "c x y z = x z y",
            Combinator::W => "w x y = x y y",
            Combinator::M => "m x = x x",
            Combinator::T => "t x y = y x",
        }
    }

    /// Fire the rule.  The caller guarantees exactly `arity` arguments.
    pub fn fire(self, args: &[Rc<Term>]) -> Rc<Term> {
        let arg = |index: usize| args[index].clone();

        match self {
            Combinator::I => arg(0),
            Combinator::K => arg(0),
            Combinator::S => Term::apply(
                Term::apply(arg(0), arg(2)),
                Term::apply(arg(1), arg(2)),
            ),
            Combinator::B => Term::apply(arg(0), Term::apply(arg(1), arg(2))),
            Combinator::C => Term::apply(Term::apply(arg(0), arg(2)), arg(1)),
            Combinator::W => Term::apply(Term::apply(arg(0), arg(1)), arg(1)),
            Combinator::M => Term::apply(arg(0), arg(0)),
            Combinator::T => Term::apply(arg(1), arg(0)),
        }
    }
}

/// Which combinators are loaded into the core dictionary at boot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CombinatorBase {
    Ski,
    Bckw,
    #[default]
    Birds,
}

impl CombinatorBase {
    pub fn combinators(self) -> &'static [Combinator] {
        match self {
            CombinatorBase::Ski => &[Combinator::S, Combinator::K, Combinator::I],
            CombinatorBase::Bckw => &[Combinator::B, Combinator::C, Combinator::K, Combinator::W],
            CombinatorBase::Birds => &Combinator::ALL,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CombinatorBase::Ski => "ski",
            CombinatorBase::Bckw => "bckw",
            CombinatorBase::Birds => "birds",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::data_structures::cell::Cell;

    fn atom(name: &str) -> Rc<Term> {
        Term::atom(Cell::Unresolved(name.to_string()))
    }

    #[test]
    fn rules_rearrange_their_arguments() {
        let (x, y, z) = (atom("x"), atom("y"), atom("z"));
        let args = [x, y, z];

        assert_eq!(Combinator::S.fire(&args).to_string(), "` ` ?x ?z ` ?y ?z");
        assert_eq!(Combinator::B.fire(&args).to_string(), "` ?x ` ?y ?z");
        assert_eq!(Combinator::C.fire(&args).to_string(), "` ` ?x ?z ?y");
        assert_eq!(Combinator::W.fire(&args[..2]).to_string(), "` ` ?x ?y ?y");
        assert_eq!(Combinator::T.fire(&args[..2]).to_string(), "` ?y ?x");
        assert_eq!(Combinator::M.fire(&args[..1]).to_string(), "` ?x ?x");
    }

    #[test]
    fn symbols_round_trip() {
        for combinator in Combinator::ALL {
            assert_eq!(Combinator::from_symbol(combinator.symbol()), Some(combinator));
        }

        assert_eq!(Combinator::from_symbol('x'), None);
    }
}
