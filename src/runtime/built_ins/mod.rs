/// The table of primitive words.
pub mod primitives;

/// Native implementations of the machine primitives.
pub mod stack_machine;
