//! Reader for the relaxed object-literal notation used by `--args`/`--upd`.
//!
//! The notation is a small superset of Python literals: mappings may spell
//! keys as bare identifiers followed by `=`, so
//! `{goto={waitUntil='networkidle0'}, waitFor=[1000]}` reads the same as the
//! fully quoted `{'goto': {'waitUntil': 'networkidle0'}, 'waitFor': [1000]}`.
//! The empty tuple `()` used as a key marks positional arguments.

use thiserror::Error;

use crate::value::{Key, Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Parses one literal, rejecting trailing input.
pub fn parse(text: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser { src: text, pos: 0 };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < text.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
            } else if ch == '#' {
                // comment to end of line
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('{') => self.mapping(),
            Some('[') => {
                self.pos += 1;
                self.sequence(']').map(Value::Seq)
            }
            Some('(') => self.tuple(),
            Some('\'') | Some('"') => self.string().map(Value::Str),
            Some(ch) if ch.is_ascii_digit() || ch == '-' || ch == '+' || ch == '.' => self.number(),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let start = self.pos;
                let ident = self.identifier();
                match ident {
                    "None" | "null" => Ok(Value::Null),
                    "True" | "true" => Ok(Value::Bool(true)),
                    "False" | "false" => Ok(Value::Bool(false)),
                    other => Err(LiteralError {
                        offset: start,
                        message: format!("unknown name '{other}'"),
                    }),
                }
            }
            Some(ch) => Err(self.error(format!("unexpected character '{ch}'"))),
        }
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }

    /// Items up to `close`; the opening bracket is already consumed.
    fn sequence(&mut self, close: char) -> Result<Vec<Value>, LiteralError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.eat(close) {
                return Ok(items);
            }
            return Err(self.error(format!("expected ',' or '{close}'")));
        }
    }

    fn tuple(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1;
        self.skip_ws();
        if self.eat(')') {
            return Ok(Value::Seq(Vec::new()));
        }
        let first = self.value()?;
        self.skip_ws();
        if self.eat(')') {
            // parenthesized expression, not a tuple
            return Ok(first);
        }
        if !self.eat(',') {
            return Err(self.error("expected ',' or ')'"));
        }
        let mut items = vec![first];
        items.extend(self.sequence(')')?);
        Ok(Value::Seq(items))
    }

    fn mapping(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Ok(Value::Map(map));
            }
            let key = self.key()?;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.eat('}') {
                return Ok(Value::Map(map));
            }
            return Err(self.error("expected ',' or '}'"));
        }
    }

    /// Reads a key together with its `:` or `=` separator.
    fn key(&mut self) -> Result<Key, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some(ch) if ch.is_alphabetic() || ch == '_') {
            let ident = self.identifier();
            self.skip_ws();
            if self.rest().starts_with('=') && !self.rest().starts_with("==") {
                self.pos += 1;
                return Ok(Key::name(ident));
            }
            self.pos = start;
        }

        let key = match self.value()? {
            Value::Str(name) => Key::Name(name),
            Value::Seq(items) if items.is_empty() => Key::Positional,
            other => {
                return Err(LiteralError {
                    offset: start,
                    message: format!("unsupported mapping key of type {}", other.kind()),
                })
            }
        };
        self.skip_ws();
        if !self.eat(':') {
            return Err(self.error("expected ':' after mapping key"));
        }
        Ok(key)
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let start = self.pos;
        let quote = match self.bump() {
            Some(q) => q,
            None => return Err(self.error("expected string")),
        };
        let triple: String = std::iter::repeat(quote).take(3).collect();
        let long = self.src[start..].starts_with(&triple);
        if long {
            self.pos = start + 3;
        }

        let mut out = String::new();
        loop {
            if long && self.rest().starts_with(&triple) {
                self.pos += 3;
                return Ok(out);
            }
            let ch = match self.bump() {
                Some(ch) => ch,
                None => {
                    return Err(LiteralError {
                        offset: start,
                        message: "unterminated string".to_string(),
                    })
                }
            };
            match ch {
                c if c == quote && !long => return Ok(out),
                '\n' if !long => {
                    return Err(LiteralError {
                        offset: start,
                        message: "unterminated string".to_string(),
                    })
                }
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let ch = match self.bump() {
            Some(ch) => ch,
            None => return Err(self.error("dangling escape")),
        };
        match ch {
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            '\n' => {}
            'x' => out.push(self.hex_char(2)?),
            'u' => out.push(self.hex_char(4)?),
            'U' => out.push(self.hex_char(8)?),
            other => {
                // unknown escapes are kept verbatim
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_char(&mut self, digits: usize) -> Result<char, LiteralError> {
        let rest = self.rest();
        let hex = rest
            .get(..digits)
            .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error(format!("expected {digits} hex digits")))?;
        let code = u32::from_str_radix(hex, 16).map_err(|e| self.error(e.to_string()))?;
        let ch = char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape"))?;
        self.pos += digits;
        Ok(ch)
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' | '_' => self.pos += 1,
                '.' => {
                    is_float = true;
                    self.pos += 1;
                }
                'e' | 'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some('-') | Some('+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        let invalid = || LiteralError {
            offset: start,
            message: format!("invalid number '{}'", &self.src[start..self.pos]),
        };
        if is_float {
            text.parse::<f64>().map(Value::Float).map_err(|_| invalid())
        } else {
            text.parse::<i64>().map(Value::Int).map_err(|_| invalid())
        }
    }
}
