//! Tolerant parser for near-JSON emitted by small models.
//!
//! Accepts everything strict JSON accepts plus single-quoted strings, bare
//! identifier keys, trailing commas, and the `True`/`False`/`None` literals.
//! Quotes and colons inside string values are preserved, unlike a textual
//! quote/key substitution.

use serde_json::{Map, Value};
use thiserror::Error;

const MAX_DEPTH: usize = 64;

/// Why the tolerant parser gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lenient parse failed at byte {offset}: {message}")]
pub struct LenientError {
    /// Byte offset into the input.
    pub offset: usize,
    /// What was expected.
    pub message: String,
}

/// Parse `input` into a JSON value. The whole input must be consumed.
///
/// # Errors
///
/// Returns [`LenientError`] if the input is not a single tolerant-JSON value.
pub fn parse(input: &str) -> Result<Value, LenientError> {
    let mut parser = Parser { src: input, pos: 0 };
    parser.skip_ws();
    let value = parser.value(0)?;
    parser.skip_ws();
    if parser.pos < input.len() {
        return Err(parser.error("trailing characters after value"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src.get(self.pos..).and_then(|rest| rest.chars().next())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos = self.pos.saturating_add(c.len_utf8());
        Some(c)
    }

    fn error(&self, message: &str) -> LenientError {
        LenientError {
            offset: self.pos,
            message: message.to_owned(),
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LenientError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            _ => Err(self.error(&format!("expected '{expected}'"))),
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, LenientError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        match self.peek() {
            Some('{') => self.object(depth),
            Some('[') => self.array(depth),
            Some(q @ ('"' | '\'')) => self.string(q).map(Value::String),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if is_ident_char(c) => self.literal(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Value, LenientError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }
            let key = match self.peek() {
                Some(q @ ('"' | '\'')) => self.string(q)?,
                Some(c) if is_ident_char(c) => self.identifier(),
                _ => return Err(self.error("expected object key")),
            };
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.value(depth.saturating_add(1))?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, LenientError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(']') {
                self.bump();
                return Ok(Value::Array(items));
            }
            items.push(self.value(depth.saturating_add(1))?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::Array(items)),
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<String, LenientError> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char, LenientError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('b') => Ok('\u{8}'),
            Some('f') => Ok('\u{c}'),
            Some('u') => {
                let start = self.pos;
                let end = start.saturating_add(4);
                let hex = self
                    .src
                    .get(start..end)
                    .ok_or_else(|| self.error("truncated unicode escape"))?;
                let code = u32::from_str_radix(hex, 16)
                    .map_err(|_| self.error("invalid unicode escape"))?;
                self.pos = end;
                Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
            }
            // \" \' \\ \/ and anything else map to the character itself.
            Some(c) => Ok(c),
            None => Err(self.error("unterminated escape")),
        }
    }

    fn number(&mut self) -> Result<Value, LenientError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.bump();
        }
        let token = self.src.get(start..self.pos).unwrap_or_default();
        match serde_json::from_str::<Value>(token) {
            Ok(number @ Value::Number(_)) => Ok(number),
            _ => Err(LenientError {
                offset: start,
                message: format!("invalid number '{token}'"),
            }),
        }
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        self.src.get(start..self.pos).unwrap_or_default().to_owned()
    }

    fn literal(&mut self) -> Result<Value, LenientError> {
        let start = self.pos;
        match self.identifier().as_str() {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "null" | "None" => Ok(Value::Null),
            other => Err(LenientError {
                offset: start,
                message: format!("unquoted value '{other}'"),
            }),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
