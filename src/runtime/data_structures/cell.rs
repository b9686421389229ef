use crate::{
    lang::tokenizing::parse_integer,
    runtime::{
        combinators::Combinator,
        error::{self, ErrorKind, machine_error},
    },
};
use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

/// Key of a word in the dictionary's arena.  Ids are never reused, so a reference compiled into a
/// body keeps its word after the name is rebound or forgotten.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WordId(pub usize);

impl Display for WordId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reference to a word.  The name is the one the word was defined under and is carried only so
/// the cell can be printed without a dictionary.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WordRef {
    pub id: WordId,
    pub name: Rc<str>,
}

/// The uniform value of the machine.  Everything on the stacks, in memory and at the leaves of
/// combinator terms is a cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Cell {
    Int(i64),
    Address(usize),
    WordRef(WordRef),
    Combinator(Combinator),
    Unresolved(String),
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Int(0)
    }
}

/// Cells print as their literal form, `42`, `@12`, `'dup#3`, `<k>` or `?a`.
impl Display for Cell {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Cell::Int(value) => write!(f, "{}", value),
            Cell::Address(address) => write!(f, "@{}", address),
            Cell::WordRef(word) => write!(f, "'{}#{}", word.name, word.id),
            Cell::Combinator(combinator) => write!(f, "<{}>", combinator.symbol()),
            Cell::Unresolved(text) => write!(f, "?{}", text),
        }
    }
}

impl Cell {
    pub fn word_ref(id: WordId, name: &str) -> Cell {
        Cell::WordRef(WordRef {
            id,
            name: Rc::from(name),
        })
    }

    /// The flag value for true.
    pub fn truth(flag: bool) -> Cell {
        Cell::Int(if flag { -1 } else { 0 })
    }

    /// The name of the cell's kind, used in type mismatch reports.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Cell::Int(_) => "integer",
            Cell::Address(_) => "address",
            Cell::WordRef(_) => "word",
            Cell::Combinator(_) => "combinator",
            Cell::Unresolved(_) => "unresolved",
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Cell::Int(0))
    }

    pub fn as_int(&self) -> error::Result<i64> {
        match self {
            Cell::Int(value) => Ok(*value),
            other => machine_error(ErrorKind::mismatch("integer", other.kind_name())),
        }
    }

    /// Read the cell as a memory address below `limit`.  Non-negative integers are accepted as
    /// addresses.
    pub fn as_address(&self, limit: usize) -> error::Result<usize> {
        let address = match self {
            Cell::Address(address) => *address,
            Cell::Int(value) if *value >= 0 => *value as usize,
            Cell::Int(value) => return machine_error(ErrorKind::InvalidAddress(*value)),
            other => return machine_error(ErrorKind::mismatch("address", other.kind_name())),
        };

        if address >= limit {
            return machine_error(ErrorKind::InvalidAddress(address_as_i64(address)));
        }

        Ok(address)
    }

    /// Parse a cell literal as written by Display.  Plain numbers are integers.
    pub fn parse_literal(text: &str) -> Option<Cell> {
        if let Some(address) = text.strip_prefix('@') {
            if !address.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }

            return address.parse::<usize>().ok().map(Cell::Address);
        }

        if let Some(word) = text.strip_prefix('\'') {
            let (name, id) = word.rsplit_once('#')?;

            if name.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }

            return Some(Cell::word_ref(WordId(id.parse().ok()?), name));
        }

        if let Some(inner) = text.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')) {
            let mut chars = inner.chars();

            return match (chars.next(), chars.next()) {
                (Some(symbol), None) => Combinator::from_symbol(symbol).map(Cell::Combinator),
                _ => None,
            };
        }

        if let Some(unresolved) = text.strip_prefix('?') {
            if unresolved.is_empty() {
                return None;
            }

            return Some(Cell::Unresolved(unresolved.to_string()));
        }

        parse_integer(text).map(Cell::Int)
    }
}

/// Addresses are reported as integers, saturating for the marker addresses past i64::MAX.
pub fn address_as_i64(address: usize) -> i64 {
    i64::try_from(address).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_read_back() {
        for text in ["42", "-3", "@12", "'dup#3", "'a#b#7", "<k>", "?a", "?#"] {
            let cell = Cell::parse_literal(text).unwrap();
            assert_eq!(cell.to_string(), text);
        }
    }

    #[test]
    fn bad_literals_are_rejected() {
        for text in ["@", "@-1", "'#3", "'dup", "'dup#x", "<q>", "<kk>", "?", "x"] {
            assert_eq!(Cell::parse_literal(text), None, "{}", text);
        }
    }

    #[test]
    fn integers_can_be_addresses() {
        assert_eq!(Cell::Int(3).as_address(4), Ok(3));
        assert_eq!(
            Cell::Int(-1).as_address(4).unwrap_err().kind(),
            &ErrorKind::InvalidAddress(-1)
        );
        assert_eq!(
            Cell::Address(4).as_address(4).unwrap_err().kind(),
            &ErrorKind::InvalidAddress(4)
        );
    }
}
