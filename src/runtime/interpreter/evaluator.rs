use crate::{
    lang::{
        source_buffer::{SourceBuffer, SourceLocation},
        tokenizing::{Token, next_token},
    },
    runtime::{
        built_ins::{primitives::Primitive, stack_machine},
        combinators::{
            reducer::{FeedEnd, Reducer, parse_term},
            term::Term,
        },
        data_structures::{
            cell::{Cell, WordId},
            dictionary::{StackEffect, WordBody},
            memory_image::{Definition, MemoryImage, Mode, RETURN_TO_INTERPRETER},
        },
        error::{self, CallStack, ErrorKind, machine_error},
        interpreter::Machine,
        session::io::{InputSource, OutputSink},
        terminal::Interrupt,
    },
};
use std::rc::Rc;
use tracing::{debug, trace};

/// Where control goes when `exit` pops the return stack.
enum Return {
    /// Back to the token loop.
    Interpreter,

    /// Resume threaded code at the address.
    To(usize),
}

/// What a token turns into while a definition is open.
enum Compiled {
    Cell(Cell),
    Finish,
    Suspend,
    Tick,
    Immediate(WordId),
    Rejected(ErrorKind),
}

/// Whether threaded code carries on after a word.
#[derive(PartialEq, Eq)]
enum Flow {
    Next,
    Returned,
}

/// The outer interpreter.  Splits an input unit into tokens, resolves them against the dictionary
/// and runs them, compiles colon definitions, and runs composed words as threaded code.  In
/// combinator mode the unit is handed to the reducer instead.
pub struct Evaluator<'a> {
    image: &'a mut MemoryImage,
    input: &'a mut dyn InputSource,
    output: &'a mut dyn OutputSink,
    interrupt: &'a Interrupt,

    /// The composed words currently running.
    call_stack: CallStack,

    bye: bool,
}

impl Machine for Evaluator<'_> {
    fn image(&self) -> &MemoryImage {
        &*self.image
    }

    fn image_mut(&mut self) -> &mut MemoryImage {
        &mut *self.image
    }

    fn write(&mut self, bytes: &[u8]) -> error::Result<()> {
        self.output.write_output(bytes)
    }

    fn read_char(&mut self) -> error::Result<Option<char>> {
        self.input.next_char()
    }

    fn deliver(&mut self, value: Rc<Term>) -> error::Result<()> {
        Reducer::new(self.image, self.interrupt).deliver(value)
    }

    fn take_bare_combinator(&mut self) -> error::Result<Cell> {
        Reducer::new(self.image, self.interrupt).take_bare_combinator()
    }
}

impl<'a> Evaluator<'a> {
    pub fn new(
        image: &'a mut MemoryImage,
        input: &'a mut dyn InputSource,
        output: &'a mut dyn OutputSink,
        interrupt: &'a Interrupt,
    ) -> Evaluator<'a> {
        Evaluator {
            image,
            input,
            output,
            interrupt,
            call_stack: CallStack::new(),
            bye: false,
        }
    }

    /// Did the unit run `bye`?
    pub fn bye_requested(&self) -> bool {
        self.bye
    }

    /// Evaluate one input unit.  The first failure aborts the rest of the unit, anything done
    /// before it stays done.
    pub fn eval_unit(&mut self, unit: &str, start: SourceLocation) -> error::Result<()> {
        let mut buffer = SourceBuffer::new(start, unit);

        while !self.bye {
            match self.image.mode {
                Mode::Forth => {
                    let Some(token) = next_token(&mut buffer) else {
                        break;
                    };

                    self.interrupt
                        .check()
                        .and_then(|_| self.eval_token(&token, &mut buffer))
                        .map_err(|error| error.or_at(token.location()))?;
                }

                Mode::Combinator => {
                    let end = Reducer::new(self.image, self.interrupt).feed(&mut buffer)?;

                    if end == FeedEnd::EndOfUnit {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn eval_token(&mut self, token: &Token, buffer: &mut SourceBuffer) -> error::Result<()> {
        trace!(token = token.text(), "Dispatching token.");

        if self
            .image
            .compiling
            .as_ref()
            .is_some_and(|definition| !definition.suspended)
        {
            return self.compile_token(token, buffer);
        }

        let Some(word) = self.image.dictionary.lookup(token.text()) else {
            return match token.number() {
                Some(value) => self.push(Cell::Int(value)),
                None => machine_error(ErrorKind::UnknownToken(token.text().to_string())),
            };
        };

        match &word.body {
            WordBody::Primitive(primitive) if primitive.is_syntax() => {
                let primitive = *primitive;
                self.execute_syntax(primitive, buffer)
            }
            _ => {
                let id = word.id;
                self.execute_word(id)
            }
        }
    }

    /// Add a token to the open definition.  Immediate words run instead.  Unknown tokens, syntax
    /// words and failing immediate words throw the whole definition away.
    fn compile_token(&mut self, token: &Token, buffer: &mut SourceBuffer) -> error::Result<()> {
        let text = token.text();

        let compiled = match self.image.dictionary.lookup(text) {
            Some(word) => match &word.body {
                WordBody::Primitive(Primitive::Semicolon) => Compiled::Finish,
                WordBody::Primitive(Primitive::LeftBracket) => Compiled::Suspend,
                WordBody::Primitive(Primitive::Tick) => Compiled::Tick,
                WordBody::Primitive(primitive) if primitive.is_syntax() => {
                    Compiled::Rejected(ErrorKind::InvalidWordUse {
                        word: text.to_string(),
                        reason: "it can not be compiled into a definition".to_string(),
                    })
                }
                _ if word.immediate => Compiled::Immediate(word.id),
                _ => Compiled::Cell(word.reference()),
            },
            None => match token.number() {
                Some(value) => Compiled::Cell(Cell::Int(value)),
                None => Compiled::Rejected(ErrorKind::UnknownToken(text.to_string())),
            },
        };

        let result = match compiled {
            Compiled::Cell(cell) => {
                self.append(vec![cell]);
                Ok(())
            }
            Compiled::Finish => return self.finish_definition(token.location()),
            Compiled::Suspend => {
                if let Some(definition) = &mut self.image.compiling {
                    definition.suspended = true;
                }

                Ok(())
            }
            Compiled::Tick => self.tick(buffer).and_then(|reference| {
                let lit = self.image.primitive_word(Primitive::Lit)?;
                self.append(vec![lit, reference]);
                Ok(())
            }),
            Compiled::Immediate(id) => self.execute_word(id),
            Compiled::Rejected(kind) => machine_error(kind),
        };

        if result.is_err()
            && let Some(definition) = self.image.compiling.take()
        {
            debug!(name = definition.name.as_str(), "Discarded definition.");
        }

        result
    }

    fn append(&mut self, cells: Vec<Cell>) {
        if let Some(definition) = &mut self.image.compiling {
            definition.body.extend(cells);
        }
    }

    /// Read a word name from the unit and make a reference to it.
    fn tick(&mut self, buffer: &mut SourceBuffer) -> error::Result<Cell> {
        let name = expect_token(buffer, Primitive::Tick, "a name")?;

        match self.image.dictionary.lookup(name.text()) {
            Some(word) => Ok(word.reference()),
            None => machine_error(ErrorKind::UnknownToken(name.text().to_string()))
                .map_err(|error| error.or_at(name.location())),
        }
    }

    /// Lay the open definition into memory behind a trailing `exit` and bind its name.
    fn finish_definition(&mut self, location: &SourceLocation) -> error::Result<()> {
        let Some(definition) = self.image.compiling.take() else {
            return machine_error(ErrorKind::InvalidWordUse {
                word: Primitive::Semicolon.name().to_string(),
                reason: "nothing is being compiled".to_string(),
            });
        };

        let effect = self.image.dictionary.composed_effect(&definition.body);
        let mut cells = definition.body;
        cells.push(self.image.primitive_word(Primitive::Exit)?);

        let entry = self.image.compile(&cells)?;
        let body = WordBody::Composed {
            entry,
            len: cells.len(),
        };

        let defined = self.image.dictionary.define(
            &definition.name,
            body,
            effect,
            true,
            "",
            location.clone(),
        );

        if let Err(error) = defined {
            self.image.release_to(entry);
            return Err(error);
        }

        Ok(())
    }

    /// Run one of the words that read ahead in the unit or change how it is read.
    fn execute_syntax(
        &mut self,
        primitive: Primitive,
        buffer: &mut SourceBuffer,
    ) -> error::Result<()> {
        match primitive {
            Primitive::Colon => {
                if self.image.compiling.is_some() {
                    return machine_error(ErrorKind::InvalidWordUse {
                        word: primitive.name().to_string(),
                        reason: "a definition is already open".to_string(),
                    });
                }

                let name = expect_token(buffer, primitive, "a name")?;

                debug!(name = name.text(), "Started definition.");
                self.image.compiling = Some(Definition::new(name.text()));

                Ok(())
            }

            Primitive::Semicolon | Primitive::LeftBracket => {
                let reason = if self.image.compiling.is_some() {
                    "the definition is suspended until ]"
                } else {
                    "nothing is being compiled"
                };

                machine_error(ErrorKind::InvalidWordUse {
                    word: primitive.name().to_string(),
                    reason: reason.to_string(),
                })
            }

            Primitive::RightBracket => match &mut self.image.compiling {
                Some(definition) if definition.suspended => {
                    definition.suspended = false;
                    Ok(())
                }
                _ => machine_error(ErrorKind::InvalidWordUse {
                    word: primitive.name().to_string(),
                    reason: "no definition is suspended".to_string(),
                }),
            },

            Primitive::Tick => {
                let reference = self.tick(buffer)?;
                self.push(reference)
            }

            Primitive::Forget => {
                let name = expect_token(buffer, primitive, "a name")?;

                let _ = self
                    .image
                    .dictionary
                    .undefine(name.text())
                    .map_err(|error| error.or_at(name.location()))?;

                Ok(())
            }

            Primitive::Immutable | Primitive::Immediate => {
                let Some(id) = self.image.dictionary.last_defined() else {
                    return machine_error(ErrorKind::InvalidWordUse {
                        word: primitive.name().to_string(),
                        reason: "no word has been defined".to_string(),
                    });
                };

                match primitive {
                    Primitive::Immutable => self.image.dictionary.seal_word(id),
                    _ => self.image.dictionary.make_immediate(id),
                }
            }

            Primitive::Alias => {
                let new_name = expect_token(buffer, primitive, "a new name")?;
                let old_name = expect_token(buffer, primitive, "an existing name")?;

                let Some(word) = self.image.dictionary.lookup(old_name.text()) else {
                    return machine_error(ErrorKind::UnknownToken(old_name.text().to_string()))
                        .map_err(|error| error.or_at(old_name.location()));
                };

                let (body, effect) = (word.body.clone(), word.effect);
                let (description, immediate) = (word.description.clone(), word.immediate);

                let id = self
                    .image
                    .dictionary
                    .define(
                        new_name.text(),
                        body,
                        effect,
                        true,
                        &description,
                        new_name.location().clone(),
                    )
                    .map_err(|error| error.or_at(new_name.location()))?;

                if immediate {
                    self.image.dictionary.make_immediate(id)?;
                }

                Ok(())
            }

            Primitive::Bird => {
                let name = expect_token(buffer, primitive, "a name")?;
                let source = expect_token(buffer, primitive, "a term")?;

                let term = parse_term(&self.image.dictionary, source.text())
                    .map_err(|error| error.or_at(source.location()))?;
                let term = Reducer::new(self.image, self.interrupt)
                    .normalize(term)
                    .map_err(|error| error.or_at(source.location()))?;

                let description = term.to_string();

                let _ = self
                    .image
                    .dictionary
                    .define(
                        name.text(),
                        WordBody::Term(term),
                        StackEffect::Variadic,
                        true,
                        &description,
                        name.location().clone(),
                    )
                    .map_err(|error| error.or_at(name.location()))?;

                Ok(())
            }

            Primitive::Combinators => {
                debug!("Entered combinator mode.");
                self.image.mode = Mode::Combinator;
                Ok(())
            }

            Primitive::Bye => {
                self.bye = true;
                Ok(())
            }

            other => machine_error(ErrorKind::InvalidWordUse {
                word: other.name().to_string(),
                reason: "it is not a syntax word".to_string(),
            }),
        }
    }

    /// Execute a word from the outer interpreter.
    fn execute_word(&mut self, id: WordId) -> error::Result<()> {
        let word = self.image.dictionary.word(id)?;
        let name = word.name.clone();

        match word.body.clone() {
            WordBody::Primitive(Primitive::Exit) => match self.pop_return()? {
                Return::Interpreter => Ok(()),
                Return::To(address) => self.call(&name, address),
            },
            WordBody::Primitive(Primitive::Lit | Primitive::Branch | Primitive::ZeroBranch) => {
                machine_error(ErrorKind::InvalidWordUse {
                    word: name,
                    reason: "it only runs inside a definition".to_string(),
                })
            }
            WordBody::Primitive(Primitive::Execute) => {
                let id = self.pop_word_ref()?;
                self.execute_word(id)
            }
            WordBody::Primitive(primitive) if primitive.is_syntax() => {
                machine_error(ErrorKind::InvalidWordUse {
                    word: name,
                    reason: "it can only be used directly".to_string(),
                })
            }
            WordBody::Primitive(primitive) => self.execute_primitive(primitive),
            WordBody::Composed { entry, .. } => self.call(&name, entry),
            WordBody::Combinator(combinator) => self.deliver(Term::combinator(combinator)),
            WordBody::Term(term) => self.deliver(term),
        }
    }

    /// Run a primitive so that a failure leaves both stacks as they were.
    fn execute_primitive(&mut self, primitive: Primitive) -> error::Result<()> {
        self.image.data.checkpoint();
        self.image.returns.checkpoint();

        let result = stack_machine::execute(primitive, self);

        if result.is_ok() {
            self.image.data.commit();
            self.image.returns.commit();
        } else {
            self.image.data.rollback();
            self.image.returns.rollback();
        }

        result
    }

    /// Enter threaded code from the outer interpreter.  On failure the return stack is cut back
    /// to where it was, the data stack keeps whatever the code did.
    fn call(&mut self, name: &str, entry: usize) -> error::Result<()> {
        let depth = self.image.returns.len();
        let calls = self.call_stack.len();

        self.image
            .returns
            .push(Cell::Address(RETURN_TO_INTERPRETER))?;
        self.call_stack.push(name.to_string());

        let result = self.run_threaded(entry);

        if let Err(error) = result {
            let error = error.with_call_stack(&self.call_stack);

            self.image.returns.truncate(depth);
            self.call_stack.truncate(calls);

            return Err(error);
        }

        Ok(())
    }

    /// The inner interpreter.  Every cell costs one unit of fuel.  Literals are pushed, word
    /// references are run, composed words nest through the return stack.
    fn run_threaded(&mut self, entry: usize) -> error::Result<()> {
        let mut ip = entry;

        loop {
            self.interrupt.check()?;
            self.image.fuel.consume()?;

            let cell = self.image.read(ip)?;
            ip += 1;

            let Cell::WordRef(reference) = cell else {
                self.push(cell)?;
                continue;
            };

            if self.run_threaded_word(reference.id, &mut ip)? == Flow::Returned {
                return Ok(());
            }
        }
    }

    /// Run one word of threaded code.  `ip` already points past the word's cell, words that read
    /// inline cells move it on.
    fn run_threaded_word(&mut self, id: WordId, ip: &mut usize) -> error::Result<Flow> {
        let word = self.image.dictionary.word(id)?;

        match word.body.clone() {
            WordBody::Primitive(Primitive::Exit) => {
                let target = self.pop_return()?;
                let _ = self.call_stack.pop();

                match target {
                    Return::Interpreter => return Ok(Flow::Returned),
                    Return::To(address) => *ip = address,
                }
            }
            WordBody::Primitive(Primitive::Lit) => {
                let cell = self.image.read(*ip)?;

                self.push(cell)?;
                *ip += 1;
            }
            WordBody::Primitive(Primitive::Branch) => *ip = self.branch_target(*ip)?,
            WordBody::Primitive(Primitive::ZeroBranch) => {
                let target = self.branch_target(*ip)?;

                *ip = if self.pop()?.is_zero() { target } else { *ip + 1 };
            }
            WordBody::Primitive(Primitive::Execute) => {
                let id = self.pop_word_ref()?;
                return self.run_threaded_word(id, ip);
            }
            WordBody::Primitive(primitive) if primitive.is_syntax() => {
                return machine_error(ErrorKind::InvalidWordUse {
                    word: primitive.name().to_string(),
                    reason: "it can not run inside a definition".to_string(),
                });
            }
            WordBody::Primitive(primitive) => self.execute_primitive(primitive)?,
            WordBody::Composed { entry, .. } => {
                let name = word.name.clone();

                self.image.returns.push(Cell::Address(*ip))?;
                self.call_stack.push(name);
                *ip = entry;
            }
            WordBody::Combinator(combinator) => self.deliver(Term::combinator(combinator))?,
            WordBody::Term(term) => self.deliver(term)?,
        }

        Ok(Flow::Next)
    }

    /// Where a branch at `ip` lands.  The offset is the cell at `ip`, counted from the cell after
    /// it.
    fn branch_target(&self, ip: usize) -> error::Result<usize> {
        let offset = self.image.read(ip)?.as_int()?;
        let target = ip as i128 + 1 + offset as i128;

        match usize::try_from(target) {
            Ok(target) => Ok(target),
            Err(_) => machine_error(ErrorKind::InvalidAddress(
                i64::try_from(target).unwrap_or(i64::MIN),
            )),
        }
    }

    /// Pop the word reference `execute` runs.  Anything else is left on the stack.
    fn pop_word_ref(&mut self) -> error::Result<WordId> {
        let id = match self.image.data.top() {
            Some(Cell::WordRef(reference)) => reference.id,
            Some(other) => return machine_error(ErrorKind::mismatch("word", other.kind_name())),
            None => return machine_error(ErrorKind::StackUnderflow),
        };

        let _ = self.pop()?;
        Ok(id)
    }

    fn pop_return(&mut self) -> error::Result<Return> {
        let Ok(cell) = self.image.returns.pop() else {
            return machine_error(ErrorKind::ReturnStackEmpty);
        };

        match cell {
            Cell::Address(RETURN_TO_INTERPRETER) => Ok(Return::Interpreter),
            Cell::Address(address) => Ok(Return::To(address)),
            Cell::Int(value) if value >= 0 => Ok(Return::To(value as usize)),
            Cell::Int(value) => machine_error(ErrorKind::InvalidAddress(value)),
            other => machine_error(ErrorKind::mismatch("address", other.kind_name())),
        }
    }
}

/// Read the token a syntax word needs.
fn expect_token(
    buffer: &mut SourceBuffer,
    primitive: Primitive,
    what: &str,
) -> error::Result<Token> {
    match next_token(buffer) {
        Some(token) => Ok(token),
        None => machine_error(ErrorKind::InvalidWordUse {
            word: primitive.name().to_string(),
            reason: format!("expected {}", what),
        }),
    }
}
