use crate::{
    lang::source_buffer::SourceBuffer,
    runtime::{
        combinators::{
            continuation::{Continuation, ContinuationFrame, Origin},
            term::Term,
        },
        data_structures::{
            cell::Cell,
            dictionary::Dictionary,
            memory_image::{MemoryImage, Mode},
        },
        error::{self, ErrorKind, machine_error},
        terminal::Interrupt,
    },
};
use std::rc::Rc;
use tracing::{debug, trace};

/// How a call to [`Reducer::feed`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedEnd {
    /// Every character of the unit was consumed.
    EndOfUnit,

    /// A `#` was read.  The machine is back in token mode and the rest of the unit is still in
    /// the buffer.
    LeftCombinatorMode,
}

/// Work items for normalization, kept on an explicit stack instead of the host call stack.
enum Task {
    Reduce(Rc<Term>),

    /// Collect the last `count` results as the arguments of `head`.
    Rebuild { head: Rc<Term>, count: usize },
}

/// Reduces combinator terms as they are read, one character at a time.  Half read applications
/// and partially applied combinators live on the image's continuation stack, so a term can be
/// split over any number of units.
pub struct Reducer<'a> {
    image: &'a mut MemoryImage,
    interrupt: &'a Interrupt,
}

impl<'a> Reducer<'a> {
    pub fn new(image: &'a mut MemoryImage, interrupt: &'a Interrupt) -> Reducer<'a> {
        Reducer { image, interrupt }
    }

    /// Read characters from the buffer until it runs out or a `#` switches back to token mode.
    pub fn feed(&mut self, buffer: &mut SourceBuffer) -> error::Result<FeedEnd> {
        loop {
            let location = buffer.location().clone();

            let Some(next) = buffer.next_char() else {
                return Ok(FeedEnd::EndOfUnit);
            };

            if next == '#' {
                self.image.mode = Mode::Forth;
                debug!("Left combinator mode.");
                return Ok(FeedEnd::LeftCombinatorMode);
            }

            self.interrupt.check()?;
            self.read_symbol(next).map_err(|error| error.or_at(&location))?;
        }
    }

    /// Process one character of a term.  If it fails, the continuation stack goes back to the way
    /// it was, minus any half read syntax, so only pending top level frames survive.
    pub fn read_symbol(&mut self, symbol: char) -> error::Result<()> {
        self.guarded(|reducer| reducer.symbol(symbol))
    }

    /// Deliver a value as if it had just been read at the current position of the term.
    pub fn deliver(&mut self, value: Rc<Term>) -> error::Result<()> {
        self.guarded(|reducer| reducer.deliver_value(value))
    }

    /// Take back a bare combinator pending at top level as a cell.
    pub fn take_bare_combinator(&mut self) -> error::Result<Cell> {
        match self.image.continuations.top() {
            None => machine_error(ErrorKind::StackUnderflow),
            Some(Continuation::Frame(frame))
                if frame.origin == Origin::TopLevel && frame.collected.is_empty() =>
            {
                let combinator = frame.combinator;
                let _ = self.image.continuations.pop()?;
                Ok(Cell::Combinator(combinator))
            }
            Some(_) => machine_error(ErrorKind::ArityError(
                "the pending term is not a bare combinator".to_string(),
            )),
        }
    }

    fn guarded(
        &mut self,
        action: impl FnOnce(&mut Reducer<'a>) -> error::Result<()>,
    ) -> error::Result<()> {
        self.image.continuations.checkpoint();

        match action(self) {
            Ok(()) => {
                self.image.continuations.commit();
                Ok(())
            }
            Err(error) => {
                self.image.continuations.rollback();
                self.image
                    .continuations
                    .retain(Continuation::is_top_level_frame);
                Err(error)
            }
        }
    }

    fn symbol(&mut self, symbol: char) -> error::Result<()> {
        match symbol {
            _ if symbol.is_whitespace() => Ok(()),

            '`' => {
                let origin = Continuation::child_origin(self.image.continuations.top());
                self.image.continuations.push(Continuation::Operator { origin })
            }

            '(' => {
                let origin = Continuation::child_origin(self.image.continuations.top());
                self.image.continuations.push(Continuation::Group {
                    items: Vec::new(),
                    origin,
                })
            }

            ')' => {
                let items = match self.image.continuations.pop() {
                    Ok(Continuation::Group { items, .. }) => items,
                    _ => return machine_error(ErrorKind::ArityError("unmatched )".to_string())),
                };

                let value = fold_group(items)?;
                let value = self.normalize(value)?;

                self.deliver_value(value)
            }

            _ => {
                let value = resolve_symbol(&self.image.dictionary, symbol);
                self.deliver_value(value)
            }
        }
    }

    /// Hand a value to whatever is waiting for it on top of the continuation stack.  Firing a
    /// frame produces a new value that is handed further down, until something keeps it.
    fn deliver_value(&mut self, value: Rc<Term>) -> error::Result<()> {
        let mut value = value;

        loop {
            let Some(top) = self.image.continuations.top() else {
                return self.deliver_to_top_level(value);
            };

            match top {
                Continuation::Operator { .. } => {
                    let _ = self.image.continuations.pop()?;
                    let frame = frame_for(&value, Origin::Operator)?;

                    return self.image.continuations.push(Continuation::Frame(frame));
                }

                Continuation::Frame(_) => {
                    let Continuation::Frame(mut frame) = self.image.continuations.pop()? else {
                        return machine_error(ErrorKind::StackUnderflow);
                    };

                    frame.collected.push(value);

                    if frame.collected.len() == frame.combinator.arity() {
                        value = self.fire(&frame)?;
                        continue;
                    }

                    if frame.origin == Origin::TopLevel {
                        return self.image.continuations.push(Continuation::Frame(frame));
                    }

                    value = frame.partial_term();
                }

                Continuation::Group { .. } => {
                    let Continuation::Group { mut items, origin } =
                        self.image.continuations.pop()?
                    else {
                        return machine_error(ErrorKind::StackUnderflow);
                    };

                    items.push(value);

                    return self
                        .image
                        .continuations
                        .push(Continuation::Group { items, origin });
                }
            }
        }
    }

    /// Nothing is waiting.  Functions stay pending as a top level frame, anything else is a
    /// result and goes to the data stack.
    fn deliver_to_top_level(&mut self, value: Rc<Term>) -> error::Result<()> {
        if Term::is_function(&value) {
            let frame = frame_for(&value, Origin::TopLevel)?;
            return self.image.continuations.push(Continuation::Frame(frame));
        }

        match value.as_cell() {
            Some(cell) => self.image.data.push(cell.clone()),
            None => machine_error(ErrorKind::ArityError(format!(
                "can not apply a non-function in {}",
                value
            ))),
        }
    }

    fn fire(&mut self, frame: &ContinuationFrame) -> error::Result<Rc<Term>> {
        self.step()?;
        trace!(combinator = %frame.combinator, "Fired combinator.");

        let result = frame.combinator.fire(&frame.collected);
        self.normalize(result)
    }

    /// Spend one unit of fuel and give an interrupt a chance.
    fn step(&mut self) -> error::Result<()> {
        self.interrupt.check()?;
        self.image.fuel.consume()
    }

    /// Reduce a term to full normal form, leftmost outermost redex first.  Every firing costs one
    /// unit of fuel.
    pub fn normalize(&mut self, term: Rc<Term>) -> error::Result<Rc<Term>> {
        let mut tasks = vec![Task::Reduce(term)];
        let mut results: Vec<Rc<Term>> = Vec::new();

        while let Some(task) = tasks.pop() {
            match task {
                Task::Reduce(term) => {
                    let mut current = term;

                    loop {
                        let (head, mut args) = Term::spine(&current);

                        let Some(combinator) = head.as_combinator() else {
                            if !args.is_empty() {
                                return machine_error(ErrorKind::ArityError(format!(
                                    "{} is not a function",
                                    head
                                )));
                            }

                            results.push(current);
                            break;
                        };

                        if args.len() >= combinator.arity() {
                            self.step()?;
                            trace!(%combinator, "Fired combinator.");

                            let rest = args.split_off(combinator.arity());
                            current = Term::from_spine(combinator.fire(&args), rest);
                            continue;
                        }

                        tasks.push(Task::Rebuild {
                            head,
                            count: args.len(),
                        });

                        tasks.extend(args.into_iter().rev().map(Task::Reduce));
                        break;
                    }
                }

                Task::Rebuild { head, count } => {
                    let args = results.split_off(results.len() - count);
                    results.push(Term::from_spine(head, args));
                }
            }
        }

        match results.pop() {
            Some(result) => Ok(result),
            None => machine_error(ErrorKind::ArityError("empty term".to_string())),
        }
    }
}

/// Start a frame for a function value.  Its arguments so far become the collected arguments.
fn frame_for(value: &Rc<Term>, origin: Origin) -> error::Result<ContinuationFrame> {
    let (head, collected) = Term::spine(value);

    let Some(combinator) = head.as_combinator() else {
        return machine_error(ErrorKind::ArityError(format!("{} is not a function", head)));
    };

    if collected.len() >= combinator.arity() {
        return machine_error(ErrorKind::ArityError(format!(
            "{} is not in normal form",
            value
        )));
    }

    Ok(ContinuationFrame {
        combinator,
        collected,
        origin,
    })
}

/// Juxtaposition inside a group associates to the left.
fn fold_group(items: Vec<Rc<Term>>) -> error::Result<Rc<Term>> {
    let mut items = items.into_iter();

    let Some(first) = items.next() else {
        return machine_error(ErrorKind::ArityError("empty group".to_string()));
    };

    Ok(Term::from_spine(first, items))
}

/// A symbol names a word whose body is a combinator or a term.  Anything else is carried as an
/// unresolved atom.
pub fn resolve_symbol(dictionary: &Dictionary, symbol: char) -> Rc<Term> {
    let mut name = [0u8; 4];
    let name = symbol.encode_utf8(&mut name);

    match dictionary.lookup(name).and_then(|word| word.function_value()) {
        Some(value) => value,
        None => Term::atom(Cell::Unresolved(name.to_string())),
    }
}

/// Pending pieces of a term being parsed without reducing it.
enum Pending {
    Backtick(Option<Rc<Term>>),
    Group(Vec<Rc<Term>>),
}

/// Parse a complete term written in combinator syntax, without reducing it.  Used by `bird` to
/// read the body of a new word.
pub fn parse_term(dictionary: &Dictionary, text: &str) -> error::Result<Rc<Term>> {
    let mut open: Vec<Pending> = Vec::new();
    let mut result: Option<Rc<Term>> = None;

    for symbol in text.chars() {
        let value = match symbol {
            _ if symbol.is_whitespace() => continue,
            '`' => {
                open.push(Pending::Backtick(None));
                continue;
            }
            '(' => {
                open.push(Pending::Group(Vec::new()));
                continue;
            }
            ')' => match open.pop() {
                Some(Pending::Group(items)) => fold_group(items)?,
                _ => return machine_error(ErrorKind::ArityError("unmatched )".to_string())),
            },
            _ => resolve_symbol(dictionary, symbol),
        };

        let mut value = value;

        loop {
            match open.pop() {
                None => {
                    if result.is_some() {
                        return machine_error(ErrorKind::ArityError(format!(
                            "{} holds more than one term",
                            text
                        )));
                    }

                    result = Some(value);
                    break;
                }
                Some(Pending::Backtick(None)) => {
                    open.push(Pending::Backtick(Some(value)));
                    break;
                }
                Some(Pending::Backtick(Some(function))) => value = Term::apply(function, value),
                Some(Pending::Group(mut items)) => {
                    items.push(value);
                    open.push(Pending::Group(items));
                    break;
                }
            }
        }
    }

    match (open.is_empty(), result) {
        (true, Some(term)) => Ok(term),
        _ => machine_error(ErrorKind::ArityError(format!("{} is not a complete term", text))),
    }
}
