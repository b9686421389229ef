use crate::runtime::error;
use std::{
    collections::VecDeque,
    io::{BufRead, Cursor, Write},
};

/// Where a session pulls its input from.  Units are read a line at a time by the session, while
/// `key` pulls single characters from the same stream.
pub trait InputSource {
    /// The next input unit without its line ending, None at the end of input.
    fn next_unit(&mut self) -> error::Result<Option<String>>;

    /// The next single character, None at the end of input.
    fn next_char(&mut self) -> error::Result<Option<char>>;
}

/// Where a session's output goes.
pub trait OutputSink {
    fn write_output(&mut self, bytes: &[u8]) -> error::Result<()>;

    fn flush_output(&mut self) -> error::Result<()> {
        Ok(())
    }
}

impl<W: Write> OutputSink for W {
    fn write_output(&mut self, bytes: &[u8]) -> error::Result<()> {
        self.write_all(bytes)?;
        Ok(())
    }

    fn flush_output(&mut self) -> error::Result<()> {
        self.flush()?;
        Ok(())
    }
}

/// Line oriented input over any buffered reader, stdin or a script file for instance.
pub struct LineSource<R: BufRead> {
    reader: R,

    /// Characters of a line that `key` has started to consume.
    pending: VecDeque<char>,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        LineSource {
            reader,
            pending: VecDeque::new(),
        }
    }

    fn read_line(&mut self) -> error::Result<Option<String>> {
        let mut line = String::new();

        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        Ok(Some(line))
    }
}

impl<R: BufRead> InputSource for LineSource<R> {
    fn next_unit(&mut self) -> error::Result<Option<String>> {
        let line = if self.pending.is_empty() {
            match self.read_line()? {
                Some(line) => line,
                None => return Ok(None),
            }
        } else {
            self.pending.drain(..).collect()
        };

        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn next_char(&mut self) -> error::Result<Option<char>> {
        if self.pending.is_empty() {
            match self.read_line()? {
                Some(line) => self.pending.extend(line.chars()),
                None => return Ok(None),
            }
        }

        Ok(self.pending.pop_front())
    }
}

/// In memory input, used by default and by tests.
pub type ScriptedInput = LineSource<Cursor<Vec<u8>>>;

impl ScriptedInput {
    pub fn from_text(text: &str) -> ScriptedInput {
        LineSource::new(Cursor::new(text.as_bytes().to_vec()))
    }

    /// No input at all, `key` sees the end of input straight away.
    pub fn empty() -> ScriptedInput {
        ScriptedInput::from_text("")
    }
}
