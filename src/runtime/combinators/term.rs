use crate::runtime::{combinators::Combinator, data_structures::cell::Cell};
use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

/// A combinator term.  Backtick prefix notation and parenthesized groups both build this same
/// binary application tree.  Subterms are shared, firing a rule never copies its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    /// A leaf, usually a combinator but any cell can be carried as data.
    Atom(Cell),

    /// Apply the left term to the right one.
    App(Rc<Term>, Rc<Term>),
}

/// Terms print in prefix backtick notation with every token separated by a space, which is also
/// the form the dump parser reads back.
impl Display for Term {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut pending: Vec<&Term> = vec![self];
        let mut first = true;

        while let Some(term) = pending.pop() {
            if !first {
                write!(f, " ")?;
            }

            first = false;

            match term {
                Term::Atom(cell) => write!(f, "{}", cell)?,
                Term::App(function, argument) => {
                    write!(f, "`")?;
                    pending.push(argument.as_ref());
                    pending.push(function.as_ref());
                }
            }
        }

        Ok(())
    }
}

impl Term {
    pub fn atom(cell: Cell) -> Rc<Term> {
        Rc::new(Term::Atom(cell))
    }

    pub fn combinator(combinator: Combinator) -> Rc<Term> {
        Term::atom(Cell::Combinator(combinator))
    }

    pub fn apply(function: Rc<Term>, argument: Rc<Term>) -> Rc<Term> {
        Rc::new(Term::App(function, argument))
    }

    /// Rebuild an application from its head and arguments, left associatively.
    pub fn from_spine(head: Rc<Term>, args: impl IntoIterator<Item = Rc<Term>>) -> Rc<Term> {
        args.into_iter().fold(head, Term::apply)
    }

    /// Split an application into the term at the bottom of its left spine and the arguments
    /// applied to it, first argument first.
    pub fn spine(term: &Rc<Term>) -> (Rc<Term>, Vec<Rc<Term>>) {
        let mut args = Vec::new();
        let mut head = term.clone();

        loop {
            let next = match head.as_ref() {
                Term::App(function, argument) => {
                    args.push(argument.clone());
                    function.clone()
                }
                Term::Atom(_) => break,
            };

            head = next;
        }

        args.reverse();
        (head, args)
    }

    /// The combinator this term is, if it is a bare combinator atom.
    pub fn as_combinator(&self) -> Option<Combinator> {
        match self {
            Term::Atom(Cell::Combinator(combinator)) => Some(*combinator),
            _ => None,
        }
    }

    /// The cell this term is, if it is an atom.
    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Term::Atom(cell) => Some(cell),
            Term::App(_, _) => None,
        }
    }

    /// A term is a function value when there is a combinator at the head of its spine.
    pub fn is_function(term: &Rc<Term>) -> bool {
        let (head, _) = Term::spine(term);
        head.as_combinator().is_some()
    }

    /// Read one term in prefix notation from a stream of whitespace separated tokens.  Returns
    /// None if the tokens run out early or a token is not a cell literal.
    pub fn parse<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<Rc<Term>> {
        // Each open application is waiting for either its function or its argument.
        let mut open: Vec<Option<Rc<Term>>> = Vec::new();

        loop {
            let token = tokens.next()?;

            if token == "`" {
                open.push(None);
                continue;
            }

            let mut value = Term::atom(Cell::parse_literal(token)?);

            loop {
                match open.pop() {
                    None => return Some(value),
                    Some(None) => {
                        open.push(Some(value));
                        break;
                    }
                    Some(Some(function)) => value = Term::apply(function, value),
                }
            }
        }
    }

    /// Parse tokens that hold exactly one term and nothing after it.
    pub fn parse_exact<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Option<Rc<Term>> {
        let mut tokens = tokens.into_iter();
        let term = Term::parse(&mut tokens)?;

        match tokens.next() {
            Some(_) => None,
            None => Some(term),
        }
    }
}
