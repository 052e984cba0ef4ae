//! Safe literal parser for boot-info values.
//!
//! Accepts booleans, `None`, integers (decimal, hex, octal, binary), floats,
//! quoted strings, tuples and lists. Nothing else: there are no names, calls
//! or operators beyond a leading sign, so parsing can never execute anything.

use crate::value::Value;
use thiserror::Error;

/// Maximum nesting depth of tuples/lists.
const MAX_DEPTH: usize = 64;

/// Reasons a value is not a literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("empty input")]
    Empty,

    #[error("unexpected character {ch:?} at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unknown name: {0}")]
    UnknownName(String),

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("unterminated string starting at offset {pos}")]
    UnterminatedString { pos: usize },

    #[error("trailing input at offset {pos}")]
    TrailingInput { pos: usize },

    #[error("nesting deeper than {MAX_DEPTH}")]
    TooDeep,
}

/// Parse `input` as a literal.
///
/// A bare top-level comma sequence (`1, 2`) is a tuple.
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    if parser.at_end() {
        return Err(LiteralError::Empty);
    }

    let first = parser.value(0)?;
    parser.skip_ws();

    let result = if parser.peek() == Some(',') {
        let mut items = vec![first];
        while parser.eat(',') {
            parser.skip_ws();
            if parser.at_end() {
                break;
            }
            items.push(parser.value(0)?);
            parser.skip_ws();
        }
        Value::Tuple(items)
    } else {
        first
    };

    parser.skip_ws();
    if !parser.at_end() {
        return Err(LiteralError::TrailingInput { pos: parser.pos });
    }
    Ok(result)
}

/// Coerce a raw boot-info value.
///
/// A value wrapped in one matching pair of quotes is returned verbatim without
/// the quotes. Anything else is parsed as a literal, falling back to the raw
/// text when it is not one.
pub fn coerce_value(raw: &str) -> Value {
    if let Some(inner) = strip_matching_quotes(raw) {
        return Value::Str(inner.to_string());
    }
    parse_literal(raw).unwrap_or_else(|_| Value::Str(raw.to_string()))
}

fn strip_matching_quotes(raw: &str) -> Option<&str> {
    let first = raw.chars().next()?;
    if (first == '"' || first == '\'') && raw.len() >= 2 && raw.ends_with(first) {
        Some(&raw[1..raw.len() - 1])
    } else {
        None
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
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
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(LiteralError::TooDeep);
        }
        self.skip_ws();
        let c = self.peek().ok_or(LiteralError::UnexpectedEnd)?;
        match c {
            '(' => self.sequence(')', depth),
            '[' => self.sequence(']', depth),
            '\'' | '"' => self.string(),
            '+' | '-' => self.signed(),
            c if c.is_ascii_digit() || c == '.' => self.number(),
            c if c.is_alphabetic() || c == '_' => self.name(),
            ch => Err(LiteralError::UnexpectedChar { ch, pos: self.pos }),
        }
    }

    fn sequence(&mut self, close: char, depth: usize) -> Result<Value, LiteralError> {
        self.bump();
        let mut items = Vec::new();
        let mut saw_comma = false;

        self.skip_ws();
        if !self.eat(close) {
            loop {
                items.push(self.value(depth + 1)?);
                self.skip_ws();
                match self.bump() {
                    Some(',') => {
                        saw_comma = true;
                        self.skip_ws();
                        if self.eat(close) {
                            break;
                        }
                    }
                    Some(c) if c == close => break,
                    Some(ch) => {
                        return Err(LiteralError::UnexpectedChar {
                            ch,
                            pos: self.pos - ch.len_utf8(),
                        })
                    }
                    None => return Err(LiteralError::UnexpectedEnd),
                }
            }
        }

        if close == ']' {
            return Ok(Value::List(items));
        }
        // `(x)` is grouping, `(x,)` is a one-tuple.
        if items.len() == 1 && !saw_comma {
            return Ok(items.pop().unwrap_or_default());
        }
        Ok(Value::Tuple(items))
    }

    fn string(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let quote = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
        let mut out = String::new();

        loop {
            let c = self
                .bump()
                .ok_or(LiteralError::UnterminatedString { pos: start })?;
            if c == quote {
                return Ok(Value::Str(out));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let escaped = self
                .bump()
                .ok_or(LiteralError::UnterminatedString { pos: start })?;
            match escaped {
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                'x' => {
                    let hex: String = self.rest().chars().take(2).collect();
                    let code = u8::from_str_radix(&hex, 16)
                        .map_err(|_| LiteralError::InvalidNumber(format!("\\x{}", hex)))?;
                    self.pos += hex.len();
                    out.push(char::from(code));
                }
                // Unknown escapes keep their backslash.
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn signed(&mut self) -> Result<Value, LiteralError> {
        let negative = self.bump() == Some('-');
        self.skip_ws();
        match self.peek() {
            Some(c) if c.is_ascii_digit() || c == '.' => {}
            Some(ch) => return Err(LiteralError::UnexpectedChar { ch, pos: self.pos }),
            None => return Err(LiteralError::UnexpectedEnd),
        }
        let token = self.number_token();
        parse_number(token, negative)
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let token = self.number_token();
        parse_number(token, false)
    }

    fn number_token(&mut self) -> &'a str {
        let start = self.pos;
        let radix_prefixed = {
            let rest = self.rest().as_bytes();
            rest.len() >= 2 && rest[0] == b'0' && matches!(rest[1], b'x' | b'X' | b'o' | b'O' | b'b' | b'B')
        };
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let exponent_sign =
                (c == '+' || c == '-') && (prev == 'e' || prev == 'E') && !radix_prefixed;
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                self.pos += 1;
                prev = c;
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }

    fn name(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        match &self.src[start..self.pos] {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::None),
            other => Err(LiteralError::UnknownName(other.to_string())),
        }
    }
}

fn parse_number(token: &str, negative: bool) -> Result<Value, LiteralError> {
    let invalid = || LiteralError::InvalidNumber(token.to_string());
    let sign = if negative { "-" } else { "" };

    let radix = match token.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = strip_separators(token[2..].trim_start_matches('_'), radix == 16)
            .ok_or_else(invalid)?;
        return i64::from_str_radix(&format!("{}{}", sign, digits), radix)
            .map(Value::Int)
            .map_err(|_| invalid());
    }

    let digits = strip_separators(token, false).ok_or_else(invalid)?;
    if digits.contains(['.', 'e', 'E']) {
        return digits
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(|x| Value::Float(if negative { -x } else { x }))
            .ok_or_else(invalid);
    }

    // Decimal integers may not have leading zeros unless they are all zeros.
    if digits.len() > 1 && digits.starts_with('0') && digits.chars().any(|c| c != '0') {
        return Err(invalid());
    }
    format!("{}{}", sign, digits)
        .parse::<i64>()
        .map(Value::Int)
        .map_err(|_| invalid())
}

/// Remove `_` separators, which are only allowed between two digits.
/// Hex letters count as digits only when `hex` is set.
fn strip_separators(token: &str, hex: bool) -> Option<String> {
    if token.is_empty() || token.starts_with('_') || token.ends_with('_') || token.contains("__")
    {
        return None;
    }
    let is_digit = |b: u8| if hex { b.is_ascii_hexdigit() } else { b.is_ascii_digit() };
    let bytes = token.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'_' && !(is_digit(bytes[i - 1]) && is_digit(bytes[i + 1])) {
            return None;
        }
    }
    Some(token.replace('_', ""))
}
