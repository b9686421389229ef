use core::str::Chars;
use std::fmt::{self, Display, Formatter};

/// The location in an input unit where a token or combinator symbol was found.  Carried by errors
/// so the session can point at the failing token.
///
/// This is a read-only structure.  Use the field accessor methods to get the values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// A description of the input.  Units typed at the REPL are tagged "\<repl\>", script files use
    /// their path.
    path: String,

    /// The 1 based line number within the input.
    line: usize,

    /// The 1 based column number within the input.
    column: usize,
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::new()
    }
}

/// Used for error reporting to show where in the input an error originated.
impl Display for SourceLocation {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} ({}, {})", self.path, self.line, self.column)
    }
}

impl SourceLocation {
    /// Create a new SourceLocation with default values.
    pub fn new() -> SourceLocation {
        SourceLocation {
            path: "unspecified".to_string(),
            line: 1,
            column: 1,
        }
    }

    /// Create a new SourceLocation at the start of the named input.
    pub fn new_from_path(path: &str) -> Self {
        SourceLocation {
            path: path.to_owned(),
            line: 1,
            column: 1,
        }
    }

    /// Create a new SourceLocation with all of the needed information.  This is useful in
    /// conjunction with the location_here! macro.
    pub fn new_from_info(path: &str, line: usize, column: usize) -> Self {
        SourceLocation {
            path: path.to_owned(),
            line,
            column,
        }
    }

    /// Move this location down to the given line, keeping the path.  The session uses this to
    /// number the units it reads.
    pub fn at_line(&self, line: usize) -> Self {
        SourceLocation {
            path: self.path.clone(),
            line,
            column: 1,
        }
    }

    /// The description of the input.
    pub fn path(&self) -> &String {
        &self.path
    }

    /// The 1 based line number.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The 1 based column number.
    pub fn column(&self) -> usize {
        self.column
    }
}

/// Helper macro to get the location of the macro invocation.  Native words record where in the
/// Rust code they were registered.
#[macro_export]
macro_rules! location_here {
    () => {
        $crate::lang::source_buffer::SourceLocation::new_from_info(
            file!(),
            line!() as usize,
            column!() as usize,
        )
    };
}

/// A forward only cursor over one input unit.  As characters are consumed the location of the
/// cursor is maintained, so both the tokenizer and the combinator reducer can tag what they read.
///
/// The buffer only borrows the text, it is expected to outlive the SourceBuffer.
pub struct SourceBuffer<'a> {
    /// The characters still to be read.
    chars: Chars<'a>,

    /// The logical location of the cursor.
    location: SourceLocation,

    /// A character that has been peeked at but not yet consumed.
    current: Option<char>,
}

impl<'a> SourceBuffer<'a> {
    /// Create a new SourceBuffer positioned at the start of `source`.
    pub fn new(start: SourceLocation, source: &'a str) -> Self {
        SourceBuffer {
            chars: source.chars(),
            location: start,
            current: None,
        }
    }

    /// The location the cursor is at.
    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// Take a peek at the next character without consuming it.
    pub fn peek_next(&mut self) -> Option<char> {
        if self.current.is_none() {
            self.current = self.chars.next();
        }

        self.current
    }

    /// Get and consume the next character.
    pub fn next_char(&mut self) -> Option<char> {
        let next = match self.current.take() {
            Some(current) => Some(current),
            None => self.chars.next(),
        };

        if let Some(next_char) = next {
            self.increment_location(next_char);
        }

        next
    }

    /// Everything not yet consumed, including a peeked character.
    pub fn rest(self) -> String {
        let mut rest = String::new();

        if let Some(current) = self.current {
            rest.push(current);
        }

        rest.extend(self.chars);
        rest
    }

    /// Skip over any whitespace, stopping at the next visible character or the end of input.
    pub fn skip_whitespace(&mut self) {
        while let Some(next) = self.peek_next() {
            if !next.is_whitespace() {
                break;
            }

            let _ = self.next_char();
        }
    }

    /// Advance one column for regular characters.  Reset the column to 1 and increment the line
    /// for new line characters.
    fn increment_location(&mut self, next: char) {
        if next == '\n' {
            self.location.line += 1;
            self.location.column = 1;
        } else {
            self.location.column += 1;
        }
    }
}
