use crate::{
    lang::source_buffer::SourceLocation,
    runtime::{
        built_ins::primitives::Primitive,
        combinators::{Combinator, term::Term},
        data_structures::cell::{Cell, WordId},
        error::{self, ErrorKind, machine_error},
    },
};
use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    rc::Rc,
};
use tracing::debug;

/// What a word does to the data stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StackEffect {
    /// The word always takes `inputs` values and leaves `outputs` values.
    Fixed { inputs: usize, outputs: usize },

    /// The number of values the word touches depends on what it finds at run time.
    Variadic,

    /// The word hands a combinator to the reducer.  It fires once `arity` arguments have been
    /// applied to it; what that does to the data stack depends on the rest of the term.
    Combinator { arity: usize },
}

impl StackEffect {
    /// The number of inputs, or of combinator arguments.  None for variadic words.
    pub fn arity(&self) -> Option<usize> {
        match self {
            StackEffect::Fixed { inputs, .. } => Some(*inputs),
            StackEffect::Combinator { arity } => Some(*arity),
            StackEffect::Variadic => None,
        }
    }
}

impl Display for StackEffect {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            StackEffect::Fixed { inputs, outputs } => write!(f, "({} -- {})", inputs, outputs),
            StackEffect::Variadic => write!(f, "(*)"),
            StackEffect::Combinator { arity } => write!(f, "({} args)", arity),
        }
    }
}

/// What runs when a word is executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WordBody {
    /// A native stack machine operation.
    Primitive(Primitive),

    /// A sequence of cells compiled into memory, ending with a reference to `exit`.
    Composed { entry: usize, len: usize },

    /// A base combinator, delivered to the reducer.
    Combinator(Combinator),

    /// A combinator term in normal form, delivered to the reducer.
    Term(Rc<Term>),
}

/// Which side of the dictionary a word was defined in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Loaded at boot, never changes.
    Core,

    /// Defined during the session.
    User,
}

/// The information stored in the dictionary for each word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Word {
    pub id: WordId,
    pub name: String,
    pub effect: StackEffect,
    pub body: WordBody,
    pub partition: Partition,

    /// Mutable words may be rebound or forgotten.  Core words are never mutable.
    pub mutable: bool,

    /// Immediate words run while a definition is being compiled instead of being compiled into it.
    pub immediate: bool,

    /// A simple description of the word.
    pub description: String,

    /// Where the word was defined.
    pub location: SourceLocation,
}

impl Word {
    /// A cell that refers to this word.
    pub fn reference(&self) -> Cell {
        Cell::word_ref(self.id, &self.name)
    }

    /// The term the word stands for, if it is a combinator or a term.
    pub fn function_value(&self) -> Option<Rc<Term>> {
        match &self.body {
            WordBody::Combinator(combinator) => Some(Term::combinator(*combinator)),
            WordBody::Term(term) => Some(term.clone()),
            WordBody::Primitive(_) | WordBody::Composed { .. } => None,
        }
    }

    /// The flag used in listings and dumps.
    pub fn flag(&self) -> &'static str {
        match (self.partition, self.mutable) {
            (Partition::Core, _) => "core",
            (Partition::User, true) => "mutable",
            (Partition::User, false) => "immutable",
        }
    }
}

/// The dictionary of the machine.  Every word ever defined is kept in an append only arena and
/// addressed by its id.  Names are bound to ids in two partitions, the core set fixed at boot
/// and the user set that can be redefined.  Lookups search the user partition first.
#[derive(Clone, Debug)]
pub struct Dictionary {
    words: Vec<Word>,
    core: HashMap<String, WordId>,
    user: HashMap<String, WordId>,
    sealed: bool,
    permit_shadowing: bool,
    last_defined: Option<WordId>,
}

/// List the bound words, sorted by name.
impl Display for Dictionary {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        let bound = self.bound_words();
        let max_size = bound.iter().map(|word| word.name.len()).max().unwrap_or(0);

        writeln!(formatter, "{} words defined.", bound.len())?;

        for word in bound {
            writeln!(
                formatter,
                "{:width$}  {:9}  {:8}  {}",
                word.name,
                word.flag(),
                word.effect.to_string(),
                word.description,
                width = max_size
            )?;
        }

        Ok(())
    }
}

impl Dictionary {
    pub fn new(permit_shadowing: bool) -> Dictionary {
        Dictionary {
            words: Vec::new(),
            core: HashMap::new(),
            user: HashMap::new(),
            sealed: false,
            permit_shadowing,
            last_defined: None,
        }
    }

    /// Close the core partition.  Done once at boot.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Add a word to the core partition.  Only possible before the dictionary is sealed.
    pub fn define_core(
        &mut self,
        name: &str,
        body: WordBody,
        effect: StackEffect,
        description: &str,
        location: SourceLocation,
    ) -> error::Result<WordId> {
        if self.sealed || self.core.contains_key(name) {
            return machine_error(ErrorKind::RedefinitionError(name.to_string()));
        }

        let id = self.push_word(name, body, effect, Partition::Core, false, description, location);
        let _ = self.core.insert(name.to_string(), id);

        Ok(id)
    }

    /// Bind a name in the user partition.  Fails if the name belongs to an immutable word, which
    /// is every core word unless shadowing is permitted.
    pub fn define(
        &mut self,
        name: &str,
        body: WordBody,
        effect: StackEffect,
        mutable: bool,
        description: &str,
        location: SourceLocation,
    ) -> error::Result<WordId> {
        if self.core.contains_key(name) && !self.permit_shadowing {
            return machine_error(ErrorKind::RedefinitionError(name.to_string()));
        }

        if let Some(existing) = self.user.get(name)
            && !self.words[existing.0].mutable
        {
            return machine_error(ErrorKind::RedefinitionError(name.to_string()));
        }

        let id = self.push_word(name, body, effect, Partition::User, mutable, description, location);
        let _ = self.user.insert(name.to_string(), id);
        self.last_defined = Some(id);

        debug!(name, id = id.0, %effect, "Defined word.");

        Ok(id)
    }

    /// Remove a mutable user binding.  The word stays in the arena for any body that refers to it,
    /// and a core word of the same name becomes visible again.
    pub fn undefine(&mut self, name: &str) -> error::Result<WordId> {
        match self.user.get(name) {
            Some(id) if self.words[id.0].mutable => {
                let id = *id;
                let _ = self.user.remove(name);

                if self.last_defined == Some(id) {
                    self.last_defined = None;
                }

                debug!(name, id = id.0, "Forgot word.");
                Ok(id)
            }
            Some(_) => machine_error(ErrorKind::RedefinitionError(name.to_string())),
            None if self.core.contains_key(name) => {
                machine_error(ErrorKind::RedefinitionError(name.to_string()))
            }
            None => machine_error(ErrorKind::UnknownToken(name.to_string())),
        }
    }

    /// Mark a user word immutable.  Its name can no longer be rebound or forgotten.
    pub fn seal_word(&mut self, id: WordId) -> error::Result<()> {
        let word = self.word_mut(id)?;

        if word.partition == Partition::Core {
            return Ok(());
        }

        word.mutable = false;
        Ok(())
    }

    /// Mark a user word immediate, so that it runs when it is met while compiling.
    pub fn make_immediate(&mut self, id: WordId) -> error::Result<()> {
        let word = self.word_mut(id)?;

        if word.partition == Partition::Core {
            return machine_error(ErrorKind::RedefinitionError(word.name.clone()));
        }

        word.immediate = true;
        Ok(())
    }

    /// The most recent user definition that is still bound.
    pub fn last_defined(&self) -> Option<WordId> {
        self.last_defined
    }

    /// Find the word a name is bound to, user partition first.
    pub fn lookup(&self, name: &str) -> Option<&Word> {
        self.user
            .get(name)
            .or_else(|| self.core.get(name))
            .map(|id| &self.words[id.0])
    }

    /// Find a word in the core partition only.
    pub fn lookup_core(&self, name: &str) -> Option<&Word> {
        self.core.get(name).map(|id| &self.words[id.0])
    }

    pub fn word(&self, id: WordId) -> error::Result<&Word> {
        match self.words.get(id.0) {
            Some(word) => Ok(word),
            None => machine_error(ErrorKind::UnknownToken(format!("#{}", id))),
        }
    }

    fn word_mut(&mut self, id: WordId) -> error::Result<&mut Word> {
        match self.words.get_mut(id.0) {
            Some(word) => Ok(word),
            None => machine_error(ErrorKind::UnknownToken(format!("#{}", id))),
        }
    }

    /// Every word ever defined, in id order.
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Is the word currently bound to its name?
    pub fn is_bound(&self, id: WordId) -> bool {
        let Some(word) = self.words.get(id.0) else {
            return false;
        };

        let partition = match word.partition {
            Partition::Core => &self.core,
            Partition::User => &self.user,
        };

        partition.get(&word.name) == Some(&id)
    }

    /// The words reachable by name, sorted by name.  A shadowed core word is not listed.
    pub fn bound_words(&self) -> Vec<&Word> {
        let mut bound: Vec<&Word> = self
            .user
            .values()
            .chain(
                self.core
                    .iter()
                    .filter(|(name, _)| !self.user.contains_key(*name))
                    .map(|(_, id)| id),
            )
            .map(|id| &self.words[id.0])
            .collect();

        bound.sort_by(|a, b| a.name.cmp(&b.name));
        bound
    }

    /// Work out the stack effect of a composed body by walking it once.  Literals push one value,
    /// `lit` pushes the cell after it, word references apply their own effect.  Any variadic or
    /// combinator word, a branch, or an explicit `exit` makes the whole body variadic.
    pub fn composed_effect(&self, body: &[Cell]) -> StackEffect {
        let mut inputs = 0;
        let mut depth = 0;
        let mut cells = body.iter();

        while let Some(cell) = cells.next() {
            let effect = match cell {
                Cell::WordRef(reference) => match self.words.get(reference.id.0) {
                    Some(Word {
                        body: WordBody::Primitive(Primitive::Exit),
                        ..
                    }) => return StackEffect::Variadic,
                    Some(Word {
                        body: WordBody::Primitive(Primitive::Lit),
                        ..
                    }) => {
                        let _ = cells.next();

                        StackEffect::Fixed {
                            inputs: 0,
                            outputs: 1,
                        }
                    }
                    Some(word) => word.effect,
                    None => return StackEffect::Variadic,
                },
                _ => StackEffect::Fixed {
                    inputs: 0,
                    outputs: 1,
                },
            };

            match effect {
                StackEffect::Fixed {
                    inputs: needed,
                    outputs,
                } => {
                    if depth < needed {
                        inputs += needed - depth;
                        depth = 0;
                    } else {
                        depth -= needed;
                    }

                    depth += outputs;
                }
                StackEffect::Variadic | StackEffect::Combinator { .. } => {
                    return StackEffect::Variadic;
                }
            }
        }

        StackEffect::Fixed {
            inputs,
            outputs: depth,
        }
    }

    /// Put a word back into the arena while restoring a dump.  Words must arrive in id order.
    pub fn restore_word(&mut self, word: Word, bound: bool, line: usize) -> error::Result<()> {
        if word.id.0 != self.words.len() {
            return machine_error(ErrorKind::malformed(
                line,
                format!("word id {} out of order", word.id),
            ));
        }

        if bound {
            let partition = match word.partition {
                Partition::Core => &mut self.core,
                Partition::User => &mut self.user,
            };

            if partition.insert(word.name.clone(), word.id).is_some() {
                return machine_error(ErrorKind::malformed(
                    line,
                    format!("{} is bound twice", word.name),
                ));
            }
        }

        self.words.push(word);
        Ok(())
    }

    /// Restore the word `immutable` and `immediate` apply to.  It has to be a bound user word.
    pub fn restore_last_defined(&mut self, last: Option<WordId>, line: usize) -> error::Result<()> {
        if let Some(id) = last {
            let user_word = self
                .words
                .get(id.0)
                .is_some_and(|word| word.partition == Partition::User);

            if !user_word || !self.is_bound(id) {
                return machine_error(ErrorKind::malformed(
                    line,
                    format!("word {} is not a bound user word", id),
                ));
            }
        }

        self.last_defined = last;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn push_word(
        &mut self,
        name: &str,
        body: WordBody,
        effect: StackEffect,
        partition: Partition,
        mutable: bool,
        description: &str,
        location: SourceLocation,
    ) -> WordId {
        let id = WordId(self.words.len());

        self.words.push(Word {
            id,
            name: name.to_string(),
            effect,
            body,
            partition,
            mutable,
            immediate: false,
            description: description.to_string(),
            location,
        });

        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booted() -> Dictionary {
        let mut dictionary = Dictionary::new(false);

        for primitive in [Primitive::Dup, Primitive::Add, Primitive::Exit] {
            dictionary
                .define_core(
                    primitive.name(),
                    WordBody::Primitive(primitive),
                    primitive.effect(),
                    primitive.description(),
                    SourceLocation::new(),
                )
                .unwrap();
        }

        dictionary.seal();
        dictionary
    }

    fn body(entry: usize) -> WordBody {
        WordBody::Composed { entry, len: 1 }
    }

    #[test]
    fn core_is_closed_after_sealing() {
        let mut dictionary = booted();

        let result = dictionary.define_core(
            "drop",
            WordBody::Primitive(Primitive::Drop),
            Primitive::Drop.effect(),
            "",
            SourceLocation::new(),
        );

        assert_eq!(
            result.unwrap_err().kind(),
            &ErrorKind::RedefinitionError("drop".to_string())
        );
    }

    #[test]
    fn core_names_can_not_be_rebound_without_shadowing() {
        let mut dictionary = booted();
        let effect = StackEffect::Variadic;

        assert!(
            dictionary
                .define("dup", body(0), effect, true, "", SourceLocation::new())
                .is_err()
        );
        assert_eq!(dictionary.lookup("dup").unwrap().partition, Partition::Core);
    }

    #[test]
    fn shadowed_core_word_returns_after_forget() {
        let mut dictionary = booted();
        dictionary.permit_shadowing = true;

        let id = dictionary
            .define("dup", body(0), StackEffect::Variadic, true, "", SourceLocation::new())
            .unwrap();

        assert_eq!(dictionary.lookup("dup").unwrap().id, id);
        assert_eq!(dictionary.undefine("dup").unwrap(), id);
        assert_eq!(dictionary.lookup("dup").unwrap().partition, Partition::Core);
        assert!(!dictionary.is_bound(id));
        assert!(dictionary.word(id).is_ok());
    }

    #[test]
    fn immutable_user_words_stay_put() {
        let mut dictionary = booted();
        let effect = StackEffect::Variadic;
        let id = dictionary
            .define("square", body(0), effect, true, "", SourceLocation::new())
            .unwrap();

        dictionary.seal_word(id).unwrap();

        assert!(
            dictionary
                .define("square", body(4), effect, true, "", SourceLocation::new())
                .is_err()
        );
        assert_eq!(
            dictionary.undefine("square").unwrap_err().kind(),
            &ErrorKind::RedefinitionError("square".to_string())
        );
        assert_eq!(
            dictionary.undefine("cube").unwrap_err().kind(),
            &ErrorKind::UnknownToken("cube".to_string())
        );
    }

    #[test]
    fn effects_are_derived_from_bodies() {
        let dictionary = booted();
        let dup = dictionary.lookup("dup").unwrap().reference();
        let add = dictionary.lookup("+").unwrap().reference();
        let exit = dictionary.lookup("exit").unwrap().reference();

        assert_eq!(
            dictionary.composed_effect(&[dup.clone(), add.clone()]),
            StackEffect::Fixed {
                inputs: 1,
                outputs: 1
            }
        );
        assert_eq!(
            dictionary.composed_effect(&[Cell::Int(1), add.clone(), add.clone()]),
            StackEffect::Fixed {
                inputs: 2,
                outputs: 1
            }
        );
        assert_eq!(dictionary.composed_effect(&[dup, exit]), StackEffect::Variadic);
    }
}
