use crate::runtime::error::{self, ErrorKind, machine_error};

/// Records enough of a stack's history to put it back the way it was.  Only values popped below
/// the starting depth need to be kept, anything above it is simply truncated away.
#[derive(Clone, Debug)]
struct Journal<T> {
    floor: usize,
    dropped: Vec<T>,
}

/// A bounded LIFO stack.  Used for the data, return and continuation stacks of the machine.
///
/// Popping an empty stack fails with a stack underflow, pushing past the capacity fails with a
/// stack overflow naming the stack.
#[derive(Clone, Debug)]
pub struct Stack<T: Clone> {
    name: &'static str,
    items: Vec<T>,
    capacity: usize,
    journal: Option<Journal<T>>,
}

impl<T: Clone> Stack<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Stack {
            name,
            items: Vec::new(),
            capacity,
            journal: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The items bottom to top.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn push(&mut self, value: T) -> error::Result<()> {
        if self.items.len() >= self.capacity {
            return machine_error(ErrorKind::StackOverflow(self.name));
        }

        self.items.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> error::Result<T> {
        let value = match self.items.pop() {
            Some(value) => value,
            None => return machine_error(ErrorKind::StackUnderflow),
        };

        if let Some(journal) = &mut self.journal
            && self.items.len() < journal.floor
        {
            journal.floor = self.items.len();
            journal.dropped.push(value.clone());
        }

        Ok(value)
    }

    /// The top value, without removing it.
    pub fn top(&self) -> Option<&T> {
        self.items.last()
    }

    /// Get a copy of the value `index` places down from the top, 0 being the top.
    pub fn pick(&self, index: usize) -> error::Result<T> {
        if index >= self.items.len() {
            return machine_error(ErrorKind::StackUnderflow);
        }

        Ok(self.items[self.items.len() - 1 - index].clone())
    }

    /// Start recording changes so they can be undone with [`Stack::rollback`].
    pub fn checkpoint(&mut self) {
        self.journal = Some(Journal {
            floor: self.items.len(),
            dropped: Vec::new(),
        });
    }

    /// Keep the changes made since the checkpoint.
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Put the stack back the way it was at the checkpoint.
    pub fn rollback(&mut self) {
        if let Some(journal) = self.journal.take() {
            self.items.truncate(journal.floor);
            self.items.extend(journal.dropped.into_iter().rev());
        }
    }

    /// Drop everything above `depth`.
    pub fn truncate(&mut self, depth: usize) {
        self.items.truncate(depth);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.journal = None;
    }

    /// Keep only the items matching the predicate.
    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
    }

    /// Replace the whole contents, failing if they do not fit.
    pub fn replace(&mut self, items: Vec<T>) -> error::Result<()> {
        if items.len() > self.capacity {
            return machine_error(ErrorKind::StackOverflow(self.name));
        }

        self.items = items;
        self.journal = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_restores_popped_and_pushed_values() {
        let mut stack = Stack::new("Data", 8);

        for value in 1..=4 {
            stack.push(value).unwrap();
        }

        stack.checkpoint();
        assert_eq!(stack.pop().unwrap(), 4);
        assert_eq!(stack.pop().unwrap(), 3);
        stack.push(10).unwrap();
        stack.push(11).unwrap();
        assert_eq!(stack.pop().unwrap(), 11);
        assert_eq!(stack.pop().unwrap(), 10);
        assert_eq!(stack.pop().unwrap(), 2);
        stack.rollback();

        assert_eq!(stack.items(), &[1, 2, 3, 4]);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut stack = Stack::new("Return", 1);

        stack.push(1).unwrap();
        assert_eq!(
            stack.push(2).unwrap_err().kind(),
            &ErrorKind::StackOverflow("Return")
        );
        assert_eq!(stack.pop().unwrap(), 1);
        assert_eq!(stack.pop().unwrap_err().kind(), &ErrorKind::StackUnderflow);
    }
}
