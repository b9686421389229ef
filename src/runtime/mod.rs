/// The cells, stacks, dictionary and memory image the machine runs over.
pub mod data_structures;

/// Module for the primitive words and their native implementations.
pub mod built_ins;

/// Combinators, terms and the reducer that applies them.
pub mod combinators;

/// Module for defining the error reporting of the machine.
pub mod error;

/// Module for the Forth side of the machine.  The evaluator reads tokens, compiles definitions
/// and runs threaded code.
pub mod interpreter;

/// Text dumps of a memory image.
pub mod serializer;

/// The REPL session that owns an image and feeds it input units.
pub mod session;

/// Interrupt handling and terminal queries.
pub mod terminal;
