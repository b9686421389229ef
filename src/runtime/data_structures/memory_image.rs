use crate::{
    config::Config,
    location_here,
    runtime::{
        built_ins::primitives::Primitive,
        combinators::{CombinatorBase, continuation::Continuation},
        data_structures::{
            cell::{Cell, WordId, address_as_i64},
            cell_stack::Stack,
            dictionary::{Dictionary, StackEffect, WordBody},
        },
        error::{self, ErrorKind, machine_error},
    },
};
use serde::Deserialize;
use tracing::debug;

/// The return address pushed when the outer interpreter enters a composed word.  When `exit`
/// pops it control goes back to the token loop.
pub const RETURN_TO_INTERPRETER: usize = usize::MAX;

/// How the session reads its input units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Whitespace separated tokens resolved against the dictionary.
    #[default]
    Forth,

    /// Characters fed one at a time to the combinator reducer.
    Combinator,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Forth => "forth",
            Mode::Combinator => "combinator",
        }
    }

    pub fn from_name(name: &str) -> Option<Mode> {
        match name {
            "forth" => Some(Mode::Forth),
            "combinator" => Some(Mode::Combinator),
            _ => None,
        }
    }
}

/// The reduction and execution budget.  Refilled at the start of every input unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fuel {
    remaining: u64,
    budget: u64,
}

impl Fuel {
    pub fn new(budget: u64) -> Fuel {
        Fuel {
            remaining: budget,
            budget,
        }
    }

    pub fn restored(remaining: u64, budget: u64) -> Fuel {
        Fuel { remaining, budget }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Spend one unit, failing once the budget is gone.
    pub fn consume(&mut self) -> error::Result<()> {
        if self.remaining == 0 {
            return machine_error(ErrorKind::StepBudgetExceeded(self.budget));
        }

        self.remaining -= 1;
        Ok(())
    }

    pub fn refill(&mut self) {
        self.remaining = self.budget;
    }
}

/// The sizes of the image's stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub memory: usize,
    pub data: usize,
    pub returns: usize,
    pub continuations: usize,
}

impl Limits {
    /// The largest size any store may have.
    pub const MAX: usize = 1 << 24;

    pub fn from_config(config: &Config) -> Limits {
        Limits {
            memory: config.memory_cells,
            data: config.data_capacity,
            returns: config.return_capacity,
            continuations: config.continuation_capacity,
        }
    }

    /// Is every store within [`Limits::MAX`]?
    pub fn within_max(&self) -> bool {
        [self.memory, self.data, self.returns, self.continuations]
            .iter()
            .all(|size| *size <= Limits::MAX)
    }
}

/// A colon definition that has been opened but not yet finished.  It survives across units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub body: Vec<Cell>,

    /// Set between `[` and `]`, while tokens run instead of being compiled.
    pub suspended: bool,
}

impl Definition {
    pub fn new(name: &str) -> Definition {
        Definition {
            name: name.to_string(),
            body: Vec::new(),
            suspended: false,
        }
    }
}

/// All of the state of one machine.  The dictionary, the flat cell memory that composed bodies
/// are compiled into, the three stacks and the fuel counter.
#[derive(Clone, Debug)]
pub struct MemoryImage {
    pub dictionary: Dictionary,
    memory: Vec<Cell>,
    here: usize,
    pub data: Stack<Cell>,
    pub returns: Stack<Cell>,
    pub continuations: Stack<Continuation>,
    pub fuel: Fuel,
    pub mode: Mode,

    /// The definition being compiled, if any.
    pub compiling: Option<Definition>,
}

impl MemoryImage {
    /// An image with empty stores and an empty, unsealed dictionary.
    pub fn empty(limits: Limits, permit_shadowing: bool, fuel: Fuel, mode: Mode) -> MemoryImage {
        MemoryImage {
            dictionary: Dictionary::new(permit_shadowing),
            memory: vec![Cell::default(); limits.memory],
            here: 0,
            data: Stack::new("Data", limits.data),
            returns: Stack::new("Return", limits.returns),
            continuations: Stack::new("Continuation", limits.continuations),
            fuel,
            mode,
            compiling: None,
        }
    }

    /// Create the image a new session starts with.  The core dictionary holds every primitive and
    /// the combinators of the configured base set, and is then sealed.
    pub fn boot(config: &Config) -> error::Result<MemoryImage> {
        let limits = Limits::from_config(config);

        if !limits.within_max() {
            return machine_error(ErrorKind::Io(format!(
                "Invalid configuration: stores are limited to {} cells",
                Limits::MAX
            )));
        }

        let mut image = MemoryImage::empty(
            limits,
            config.permit_shadowing,
            Fuel::new(config.fuel),
            config.mode,
        );

        for primitive in Primitive::ALL {
            let _ = image.dictionary.define_core(
                primitive.name(),
                WordBody::Primitive(*primitive),
                primitive.effect(),
                primitive.description(),
                location_here!(),
            )?;
        }

        register_combinators(&mut image.dictionary, config.base)?;
        image.dictionary.seal();

        debug!(
            words = image.dictionary.words().len(),
            base = config.base.name(),
            "Booted memory image."
        );

        Ok(image)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            memory: self.memory.len(),
            data: self.data.capacity(),
            returns: self.returns.capacity(),
            continuations: self.continuations.capacity(),
        }
    }

    /// The number of memory cells.
    pub fn size(&self) -> usize {
        self.memory.len()
    }

    pub fn here(&self) -> usize {
        self.here
    }

    pub fn read(&self, address: usize) -> error::Result<Cell> {
        match self.memory.get(address) {
            Some(cell) => Ok(cell.clone()),
            None => machine_error(ErrorKind::InvalidAddress(address_as_i64(address))),
        }
    }

    pub fn write(&mut self, address: usize, cell: Cell) -> error::Result<()> {
        match self.memory.get_mut(address) {
            Some(slot) => {
                *slot = cell;
                Ok(())
            }
            None => machine_error(ErrorKind::InvalidAddress(address_as_i64(address))),
        }
    }

    /// Move `here` by `count` cells.  It has to stay within memory.
    pub fn allot(&mut self, count: i64) -> error::Result<()> {
        let target = i128::from(self.here as i64) + i128::from(count);

        if target < 0 || target > self.memory.len() as i128 {
            return machine_error(ErrorKind::InvalidAddress(
                i64::try_from(target).unwrap_or(i64::MAX),
            ));
        }

        self.here = target as usize;
        Ok(())
    }

    /// Lay cells into memory at `here`, returning the address of the first one.
    pub fn compile(&mut self, cells: &[Cell]) -> error::Result<usize> {
        let entry = self.here;

        if entry + cells.len() > self.memory.len() {
            return machine_error(ErrorKind::InvalidAddress(address_as_i64(
                entry + cells.len(),
            )));
        }

        for (offset, cell) in cells.iter().enumerate() {
            self.memory[entry + offset] = cell.clone();
        }

        self.here = entry + cells.len();
        Ok(entry)
    }

    /// Give back cells at the top of the compiled area.  Used when a definition can not be bound.
    pub fn release_to(&mut self, address: usize) {
        if address <= self.here {
            self.here = address;
        }
    }

    pub fn set_here(&mut self, here: usize) -> error::Result<()> {
        if here > self.memory.len() {
            return machine_error(ErrorKind::InvalidAddress(address_as_i64(here)));
        }

        self.here = here;
        Ok(())
    }

    /// The cells of memory, address 0 first.
    pub fn memory(&self) -> &[Cell] {
        &self.memory
    }

    /// A reference to the core word of a primitive.  `exit` ends every composed body and `lit`
    /// fronts compiled word references.
    pub fn primitive_word(&self, primitive: Primitive) -> error::Result<Cell> {
        match self.dictionary.lookup_core(primitive.name()) {
            Some(word) => Ok(word.reference()),
            None => machine_error(ErrorKind::UnknownToken(primitive.name().to_string())),
        }
    }

    /// Check that a word reference names the word it claims to.
    pub fn resolves(&self, id: WordId, name: &str) -> bool {
        matches!(self.dictionary.word(id), Ok(word) if word.name == name)
    }
}

fn register_combinators(dictionary: &mut Dictionary, base: CombinatorBase) -> error::Result<()> {
    for combinator in base.combinators() {
        let _ = dictionary.define_core(
            &combinator.symbol().to_string(),
            WordBody::Combinator(*combinator),
            StackEffect::Combinator {
                arity: combinator.arity(),
            },
            combinator.rule(),
            location_here!(),
        )?;
    }

    Ok(())
}
