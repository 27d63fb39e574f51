//! Permissive parser for Python literal syntax.
//!
//! Models sometimes answer a function call with a Python dict instead of
//! JSON: single-quoted strings, `True`/`False`/`None`, tuples, trailing
//! commas. This parser accepts that subset and produces a JSON value.

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid literal at offset {offset}: {message}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Parse `input` as a single Python literal.
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        chars: input.char_indices().collect(),
        pos: 0,
        len: input.len(),
    };
    let value = parser.value()?;
    parser.skip_whitespace();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.len, |(offset, _)| *offset)
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        self.skip_whitespace();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected '{expected}', found '{c}'")))
            }
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_whitespace();
        match self.peek() {
            Some('{') => self.dict(),
            Some('[') => self.sequence('[', ']').map(Value::Array),
            Some('(') => self.parenthesized(),
            Some('\'') | Some('"') => self.string().map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() => self.keyword(),
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn dict(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(key) => key,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => (if b { "True" } else { "False" }).to_string(),
                _ => return Err(self.error("unsupported dict key")),
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("expected ',' or '}' in dict"));
                }
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Vec<Value>, LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(items),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error(format!("expected ',' or '{close}'")));
                }
            }
        }
    }

    /// `(x)` is just `x`; `()`, `(x,)` and `(x, y)` are tuples.
    fn parenthesized(&mut self) -> Result<Value, LiteralError> {
        self.expect('(')?;
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(Value::Array(Vec::new()));
        }
        let first = self.value()?;
        self.skip_whitespace();
        match self.bump() {
            Some(')') => Ok(first),
            Some(',') => {
                let mut items = vec![first];
                loop {
                    self.skip_whitespace();
                    if self.peek() == Some(')') {
                        self.pos += 1;
                        return Ok(Value::Array(items));
                    }
                    items.push(self.value()?);
                    self.skip_whitespace();
                    match self.bump() {
                        Some(',') => continue,
                        Some(')') => return Ok(Value::Array(items)),
                        _ => {
                            self.pos = self.pos.saturating_sub(1);
                            return Err(self.error("expected ',' or ')' in tuple"));
                        }
                    }
                }
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error("expected ',' or ')'"))
            }
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let start = self.pos;
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;

        let triple = self.chars.get(self.pos).map(|(_, c)| *c) == Some(quote)
            && self.chars.get(self.pos + 1).map(|(_, c)| *c) == Some(quote);
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                self.pos = start;
                return Err(self.error("unterminated string"));
            };
            match c {
                '\\' => self.escape(&mut out)?,
                c if c == quote && !triple => return Ok(out),
                c if c == quote && self.closes_triple(quote) => {
                    self.pos += 2;
                    return Ok(out);
                }
                '\n' if !triple => {
                    self.pos = start;
                    return Err(self.error("newline in single-quoted string"));
                }
                c => out.push(c),
            }
        }
    }

    fn closes_triple(&self, quote: char) -> bool {
        self.chars.get(self.pos).map(|(_, c)| *c) == Some(quote)
            && self.chars.get(self.pos + 1).map(|(_, c)| *c) == Some(quote)
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let Some(c) = self.bump() else {
            return Err(self.error("dangling escape"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            d @ '0'..='7' => out.push(self.octal_char(d)?),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '\n' => {}
            'x' => out.push(self.hex_char(2)?),
            'u' => out.push(self.hex_char(4)?),
            'U' => out.push(self.hex_char(8)?),
            other => {
                // Unknown escapes are kept verbatim, as Python does.
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    /// `\o`, `\oo` or `\ooo`; `first` is already consumed.
    fn octal_char(&mut self, first: char) -> Result<char, LiteralError> {
        let mut code = first.to_digit(8).unwrap_or_default();
        for _ in 0..2 {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(digit) => {
                    code = code * 8 + digit;
                    self.pos += 1;
                }
                None => break,
            }
        }
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }

    fn hex_char(&mut self, digits: usize) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid hex escape"))?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let mut text = String::new();
        if let Some(sign @ ('-' | '+')) = self.peek() {
            self.pos += 1;
            if sign == '-' {
                text.push('-');
            }
            self.skip_whitespace();
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => text.push(c),
                '_' => {}
                '.' | 'e' | 'E' => {
                    is_float = true;
                    text.push(c);
                }
                '-' | '+' if text.ends_with(['e', 'E']) => text.push(c),
                _ => break,
            }
            self.pos += 1;
        }

        let parsed = if is_float {
            text.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        } else {
            text.parse::<i64>()
                .ok()
                .map(|n| Value::Number(n.into()))
                .or_else(|| text.parse::<u64>().ok().map(|n| Value::Number(n.into())))
                // Wider than 64 bits: keep the magnitude as a float.
                .or_else(|| {
                    text.parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                })
        };

        parsed.ok_or_else(|| {
            self.pos = start;
            self.error(format!("invalid number '{text}'"))
        })
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        match word.as_str() {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            _ => {
                self.pos = start;
                Err(self.error(format!("unknown name '{word}'")))
            }
        }
    }
}
