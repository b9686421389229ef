/// Module contains the Cell enumeration, the one value type of the machine.  Every memory slot and
/// stack entry is a cell.
pub mod cell;

/// A bounded stack with checkpoints, used for the data, return and continuation stacks.
pub mod cell_stack;

/// The dictionary module provides the word arena and its core and user bindings.
pub mod dictionary;

/// The memory image, everything a session needs to carry on from where it stopped.
pub mod memory_image;
