use crate::runtime::{
    combinators::term::Term,
    data_structures::{cell::Cell, memory_image::MemoryImage},
    error,
};
use std::rc::Rc;

/// Module for the outer interpreter and the threaded code inner interpreter.
pub mod evaluator;

/// What a primitive can see of the machine while it runs.
pub trait Machine {
    fn image(&self) -> &MemoryImage;

    fn image_mut(&mut self) -> &mut MemoryImage;

    fn push(&mut self, cell: Cell) -> error::Result<()> {
        self.image_mut().data.push(cell)
    }

    fn pop(&mut self) -> error::Result<Cell> {
        self.image_mut().data.pop()
    }

    fn pop_as_int(&mut self) -> error::Result<i64> {
        self.pop()?.as_int()
    }

    /// Pop a cell and check it is an address inside memory.
    fn pop_as_address(&mut self) -> error::Result<usize> {
        let size = self.image().size();
        self.pop()?.as_address(size)
    }

    /// Send bytes to the session's output.
    fn write(&mut self, bytes: &[u8]) -> error::Result<()>;

    /// Pull one character from the session's input.
    fn read_char(&mut self) -> error::Result<Option<char>>;

    /// Hand a value to the combinator reducer at the current point of the term.
    fn deliver(&mut self, value: Rc<Term>) -> error::Result<()>;

    /// Take a bare pending combinator off the continuation stack.
    fn take_bare_combinator(&mut self) -> error::Result<Cell>;
}
