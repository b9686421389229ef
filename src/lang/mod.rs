/// Module for walking an input unit character by character while tracking locations.
pub mod source_buffer;

/// Module for splitting an input unit into whitespace delimited tokens.
pub mod tokenizing;
