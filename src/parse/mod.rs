pub mod dimacs;

use crate::literal::Literal;
use std::error::Error;
use std::str::Chars;

#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct ParseError {
    pub msg: String,
    pub pos: SourcePos,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "parse error: {} at {}", self.msg, self.pos)
    }
}

impl Error for ParseError {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SourcePos {
    line: usize,
    column: usize,
}

impl SourcePos {
    fn new() -> Self {
        Self { line: 1, column: 0 }
    }

    fn advance(&mut self, len: usize) {
        self.column += len;
    }

    fn newline(&mut self) {
        self.line += 1;
        self.column = 0;
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

struct CharIterator<'a> {
    chars: Chars<'a>,
    pos: SourcePos,
    next_char: Option<char>,
}

impl<'a> CharIterator<'a> {
    fn new(content: &'a str) -> CharIterator<'a> {
        let mut chars = content.chars();
        CharIterator {
            next_char: chars.next(),
            chars,
            pos: SourcePos::new(),
        }
    }

    fn next(&mut self) -> Option<char> {
        match self.next_char {
            None => None,
            Some(c) => {
                if c == '\n' {
                    self.pos.newline()
                } else {
                    self.pos.advance(1)
                }
                self.next_char = self.chars.next();
                Some(c)
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.next_char
    }

    fn error<T>(&self, msg: String) -> Result<T, ParseError> {
        Err(ParseError { msg, pos: self.pos })
    }

    /// Reads the remaining digits of a literal, stops in front of the delimiting whitespace.
    fn read_literal(&mut self, first: char) -> Result<Literal, ParseError> {
        let signed;
        let mut value: Option<i64>;
        if first == '-' {
            signed = true;
            value = None;
        } else if let Some(digit) = first.to_digit(10) {
            signed = false;
            value = Some(i64::from(digit));
        } else {
            return self.error(format!(
                "Expect first character of literal to be a digit or `-`, were given `{}`",
                first
            ));
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                break;
            }
            self.next();
            if let Some(digit) = c.to_digit(10) {
                let next = value.unwrap_or(0) * 10 + i64::from(digit);
                if next > i64::from(i32::max_value()) {
                    return self.error("Literal exceeds the supported variable range".to_string());
                }
                value = Some(next);
            } else {
                return self.error(format!(
                    "Encountered non-digit character `{}` while parsing literal",
                    c
                ));
            }
        }
        match value {
            Some(0) if signed => self.error("Encountered negated zero".to_string()),
            #[allow(clippy::cast_possible_truncation)]
            Some(value) => Ok(Literal::new(value as u32, signed)),
            None => self.error("Expect digits following `-` character".to_string()),
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        match self.next() {
            None => self.error("Unexpected end of input".to_string()),
            Some(c) if c == expected => Ok(()),
            Some(c) => self.error(format!(
                "Expected character `{}`, but found `{}`",
                expected, c
            )),
        }
    }

    fn expect_str(&mut self, expected: &str) -> Result<(), ParseError> {
        for c in expected.chars() {
            self.expect_char(c)?;
        }
        Ok(())
    }

    fn skip_while<P>(&mut self, predicate: P)
    where
        P: Fn(&char) -> bool,
    {
        while let Some(c) = self.peek() {
            if !predicate(&c) {
                break;
            }
            self.next();
        }
    }
}
