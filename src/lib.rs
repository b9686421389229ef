/// Module for walking input units and splitting them into tokens.
#[macro_use]
pub mod lang;

/// Module for the runtime: the memory image, the evaluator, the reducer and the session that
/// drives them.
pub mod runtime;

/// Settings read from a TOML file and the command line.
pub mod config;
