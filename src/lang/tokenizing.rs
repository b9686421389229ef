use crate::lang::source_buffer::{SourceBuffer, SourceLocation};
use std::fmt::{self, Debug, Display, Formatter};

/// A token is a whitespace delimited run of characters from one input unit, along with where it
/// started.  Whether it names a word or is a number is decided later by the evaluator, because the
/// dictionary is always consulted first.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    location: SourceLocation,
    text: String,
}

/// Make sure that the tokens are nicely printable for error messages.
impl Display for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Include the location when debugging.
impl Debug for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.text)
    }
}

impl Token {
    pub fn new(location: SourceLocation, text: String) -> Token {
        Token { location, text }
    }

    /// Where the token starts.
    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// The raw text of the token.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attempt to read the token as an integer literal.  Decimal with an optional sign, or
    /// hexadecimal with a `0x` prefix.  Literals that do not fit in an i64 are not numbers.
    pub fn number(&self) -> Option<i64> {
        parse_integer(&self.text)
    }
}

/// Read an integer literal, see [`Token::number`].
pub fn parse_integer(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    if digits.is_empty() {
        return None;
    }

    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        i128::from_str_radix(hex, 16).ok()?
    } else {
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        digits.parse::<i128>().ok()?
    };

    let value = if negative { -magnitude } else { magnitude };

    i64::try_from(value).ok()
}

/// Read the next token from the buffer, None once only whitespace is left.  The buffer is left
/// just past the token so the caller can switch to reading characters.
pub fn next_token(buffer: &mut SourceBuffer) -> Option<Token> {
    buffer.skip_whitespace();

    let location = buffer.location().clone();
    let mut text = String::new();

    while let Some(next) = buffer.peek_next() {
        if next.is_whitespace() {
            break;
        }

        text.push(next);
        let _ = buffer.next_char();
    }

    if text.is_empty() {
        return None;
    }

    Some(Token::new(location, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut buffer = SourceBuffer::new(SourceLocation::new_from_path("<test>"), source);
        let mut tokens = Vec::new();

        while let Some(token) = next_token(&mut buffer) {
            tokens.push(token);
        }

        tokens
    }

    fn texts(source: &str) -> Vec<String> {
        tokens(source).iter().map(|token| token.text().to_string()).collect()
    }

    #[test]
    fn splits_on_any_whitespace() {
        assert_eq!(texts("  1 2\t+\n  . "), vec!["1", "2", "+", "."]);
        assert!(texts("   ").is_empty());
    }

    #[test]
    fn tokens_know_their_column() {
        let tokens = tokens("dup  swap");

        assert_eq!(tokens[0].location().column(), 1);
        assert_eq!(tokens[1].location().column(), 6);
    }

    #[test]
    fn integer_literals() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("-7"), Some(-7));
        assert_eq!(parse_integer("0x1f"), Some(31));
        assert_eq!(parse_integer("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_integer("9223372036854775808"), None);
        assert_eq!(parse_integer("-"), None);
        assert_eq!(parse_integer("0x"), None);
        assert_eq!(parse_integer("12a"), None);
    }
}
