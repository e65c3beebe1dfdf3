//! JSON text codec over [`Variant`]/[`Json`].
//!
//! The serializer emits RFC-8259 text; non-representable kinds
//! (pointers, promises, functions, weak handles, opaque objects) emit
//! `null`, and binary-ish payloads (`Memory`, `ObjectId`, `BigInt`)
//! emit their string forms so no precision is lost to JSON numbers.
//!
//! The parser accepts the standard grammar plus a few lenient
//! extensions: `//` and `/* */` comments (on by default, disabled by
//! [`ParseOptions::strict`]), single-quoted strings, unquoted
//! identifier keys, elided values (`[1,,2]`), and the `undefined`
//! token. Failures carry the byte offset plus 1-based line and column.

use std::fmt::Write as _;
use std::{error, fmt};

use crate::map::OrdMap;
use crate::sync::Shared;
use crate::variant::{Json, Variant};

/// Deep-nesting guard for untrusted documents.
const MAX_DEPTH: usize = 512;

fn escape_into(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_value(value: &Variant, out: &mut String) {
    match value {
        Variant::Null
        | Variant::Pointer(_)
        | Variant::Promise(_)
        | Variant::Function(_)
        | Variant::Weak(_) => out.push_str("null"),
        Variant::Boolean(v) => out.push_str(if *v { "true" } else { "false" }),
        Variant::Int32(v) => {
            let _ = write!(out, "{v}");
        }
        Variant::UInt32(v) => {
            let _ = write!(out, "{v}");
        }
        Variant::Int64(v) => {
            let _ = write!(out, "{v}");
        }
        Variant::UInt64(v) => {
            let _ = write!(out, "{v}");
        }
        Variant::Float(v) => {
            if v.is_finite() {
                let _ = write!(out, "{v}");
            } else {
                out.push_str("null");
            }
        }
        Variant::Double(v) => {
            if v.is_finite() {
                let _ = write!(out, "{v}");
            } else {
                out.push_str("null");
            }
        }
        Variant::String(s) => escape_into(out, s),
        Variant::Time(t) => {
            let _ = write!(out, "{}", t.micros());
        }
        Variant::ObjectId(id) => {
            let _ = write!(out, "\"{id}\"");
        }
        Variant::Memory(m) => {
            let _ = write!(out, "\"{}\"", hex::encode(m));
        }
        Variant::BigInt(v) => {
            let _ = write!(out, "\"{v}\"");
        }
        Variant::List(list) => list.with(|items| {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }),
        Variant::Map(map) => map.with(|entries| {
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                escape_into(out, key);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }),
        Variant::Object(object) => match object.to_json() {
            Some(json) => write_value(&json.0, out),
            None => out.push_str("null"),
        },
    }
}

impl Variant {
    /// The value as JSON text.
    pub fn to_json_string(&self) -> String {
        let mut out = String::new();
        write_value(self, &mut out);
        out
    }
}

/// Parser behavior switches.
#[derive(Clone, Copy, Debug)]
pub struct ParseOptions {
    /// Accept `//` and `/* */` comments wherever whitespace is allowed.
    pub support_comments: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            support_comments: true,
        }
    }
}

impl ParseOptions {
    /// No extensions beyond the lenient core grammar.
    pub fn strict() -> Self {
        ParseOptions {
            support_comments: false,
        }
    }
}

/// A parse failure, located by byte offset and 1-based line/column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub position: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl error::Error for ParseError {}

struct RawError {
    position: usize,
    message: String,
}

fn locate(text: &str, position: usize) -> (usize, usize) {
    let prefix = &text.as_bytes()[..position.min(text.len())];
    let line = 1 + prefix.iter().filter(|b| **b == b'\n').count();
    let line_start = prefix
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    (line, position - line_start + 1)
}

struct Parser<'a> {
    text: &'a str,
    buf: &'a [u8],
    pos: usize,
    depth: usize,
    support_comments: bool,
}

impl<'a> Parser<'a> {
    fn err(&self, message: &str) -> RawError {
        RawError {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn skip_space(&mut self) {
        let mut line_comment = false;
        let mut block_comment = false;
        while self.pos < self.buf.len() {
            let ch = self.buf[self.pos];
            let mut skip = false;
            if self.support_comments {
                if line_comment {
                    skip = true;
                    if ch == b'\r' || ch == b'\n' {
                        line_comment = false;
                    }
                } else if block_comment {
                    skip = true;
                    if ch == b'/' && self.pos >= 2 && self.buf[self.pos - 1] == b'*' {
                        block_comment = false;
                    }
                } else if ch == b'/' && self.pos + 2 <= self.buf.len() {
                    match self.buf[self.pos + 1] {
                        b'/' => {
                            line_comment = true;
                            skip = true;
                            self.pos += 1;
                        }
                        b'*' => {
                            block_comment = true;
                            skip = true;
                            self.pos += 1;
                        }
                        _ => {}
                    }
                }
            }
            if !skip && !ch.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn read_hex4(&mut self) -> Result<u32, RawError> {
        if self.pos + 4 > self.buf.len() {
            return Err(self.err("string: truncated \\u escape"));
        }
        let digits = std::str::from_utf8(&self.buf[self.pos..self.pos + 4])
            .map_err(|_| self.err("string: invalid \\u escape"))?;
        let code =
            u32::from_str_radix(digits, 16).map_err(|_| self.err("string: invalid \\u escape"))?;
        self.pos += 4;
        Ok(code)
    }

    fn parse_string(&mut self) -> Result<String, RawError> {
        let quote = self.buf[self.pos];
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(ch) = self.peek() else {
                return Err(self.err("string: missing terminator"));
            };
            if ch == quote {
                self.pos += 1;
                return Ok(out);
            }
            if ch == b'\\' {
                self.pos += 1;
                let Some(escape) = self.peek() else {
                    return Err(self.err("string: missing terminator"));
                };
                match escape {
                    b'"' => {
                        out.push('"');
                        self.pos += 1;
                    }
                    b'\'' => {
                        out.push('\'');
                        self.pos += 1;
                    }
                    b'\\' => {
                        out.push('\\');
                        self.pos += 1;
                    }
                    b'/' => {
                        out.push('/');
                        self.pos += 1;
                    }
                    b'b' => {
                        out.push('\u{8}');
                        self.pos += 1;
                    }
                    b'f' => {
                        out.push('\u{c}');
                        self.pos += 1;
                    }
                    b'n' => {
                        out.push('\n');
                        self.pos += 1;
                    }
                    b'r' => {
                        out.push('\r');
                        self.pos += 1;
                    }
                    b't' => {
                        out.push('\t');
                        self.pos += 1;
                    }
                    b'u' => {
                        self.pos += 1;
                        let code = self.read_hex4()?;
                        let code = if (0xD800..0xDC00).contains(&code) {
                            // Surrogate pair: a second \uXXXX must follow.
                            if self.peek() != Some(b'\\') || self.buf.get(self.pos + 1) != Some(&b'u')
                            {
                                return Err(self.err("string: unpaired surrogate"));
                            }
                            self.pos += 2;
                            let low = self.read_hex4()?;
                            if !(0xDC00..0xE000).contains(&low) {
                                return Err(self.err("string: unpaired surrogate"));
                            }
                            0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00)
                        } else {
                            code
                        };
                        match char::from_u32(code) {
                            Some(c) => out.push(c),
                            None => return Err(self.err("string: invalid \\u escape")),
                        }
                    }
                    _ => {
                        // Unknown escape: keep the character itself.
                        let c = self.text[self.pos..]
                            .chars()
                            .next()
                            .ok_or_else(|| self.err("string: missing terminator"))?;
                        out.push(c);
                        self.pos += c.len_utf8();
                    }
                }
            } else if ch < 0x80 {
                out.push(ch as char);
                self.pos += 1;
            } else {
                let c = self.text[self.pos..]
                    .chars()
                    .next()
                    .ok_or_else(|| self.err("string: missing terminator"))?;
                out.push(c);
                self.pos += c.len_utf8();
            }
        }
    }

    fn parse_array(&mut self) -> Result<Variant, RawError> {
        self.pos += 1;
        self.skip_space();
        if self.pos == self.buf.len() {
            return Err(self.err("array: missing character ']'"));
        }
        if self.buf[self.pos] == b']' {
            self.pos += 1;
            return Ok(Variant::new_list());
        }
        let mut items: Vec<Variant> = Vec::new();
        while self.pos < self.buf.len() {
            let mut ch = self.buf[self.pos];
            if ch == b']' || ch == b',' {
                items.push(Variant::Null);
            } else {
                let item = self.parse_value()?;
                items.push(item);
                self.skip_space();
                if self.pos == self.buf.len() {
                    return Err(self.err("array: missing character ']'"));
                }
                ch = self.buf[self.pos];
            }
            if ch == b']' {
                self.pos += 1;
                return Ok(Variant::List(Shared::new(items)));
            } else if ch == b',' {
                self.pos += 1;
            } else {
                return Err(self.err("array: missing character ']'"));
            }
            self.skip_space();
            if self.pos == self.buf.len() {
                return Err(self.err("array: missing character ']'"));
            }
        }
        Err(self.err("array: missing character ']'"))
    }

    fn parse_object(&mut self) -> Result<Variant, RawError> {
        self.pos += 1;
        if self.pos == self.buf.len() {
            return Err(self.err("object: missing character '}'"));
        }
        let mut map: OrdMap<String, Variant> = OrdMap::new();
        let mut first_item = true;
        while self.pos < self.buf.len() {
            self.skip_space();
            if self.pos == self.buf.len() {
                return Err(self.err("object: missing character '}'"));
            }
            let mut ch = self.buf[self.pos];
            if ch == b'}' {
                self.pos += 1;
                return Ok(Variant::Map(Shared::new(map)));
            }
            if !first_item {
                if ch == b',' {
                    self.pos += 1;
                } else {
                    return Err(self.err("object: missing character ','"));
                }
                self.skip_space();
                if self.pos == self.buf.len() {
                    return Err(self.err("object: missing character '}'"));
                }
                ch = self.buf[self.pos];
            }
            let key = if ch == b'}' {
                self.pos += 1;
                return Ok(Variant::Map(Shared::new(map)));
            } else if ch == b'"' || ch == b'\'' {
                self.parse_string()?
            } else {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    let is_ident = c.is_ascii_alphabetic()
                        || c == b'_'
                        || (self.pos != start && c.is_ascii_digit());
                    if is_ident {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                if self.pos == start || self.pos == self.buf.len() {
                    return Err(self.err("object: missing character ':'"));
                }
                self.text[start..self.pos].to_string()
            };
            self.skip_space();
            if self.peek() != Some(b':') {
                return Err(self.err("object: missing character ':'"));
            }
            self.pos += 1;
            self.skip_space();
            if self.pos == self.buf.len() {
                return Err(self.err("object: missing item value"));
            }
            let ch = self.buf[self.pos];
            if ch == b'}' || ch == b',' {
                map.put(key, Variant::Null);
            } else {
                let value = self.parse_value()?;
                map.put(key, value);
            }
            first_item = false;
        }
        Err(self.err("object: missing character '}'"))
    }

    fn parse_token(&mut self) -> Result<Variant, RawError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            match ch {
                b'\r' | b'\n' | b' ' | b'\t' | b'/' | b']' | b'}' | b',' => break,
                _ => self.pos += 1,
            }
        }
        if self.pos == start {
            return Err(self.err("invalid token"));
        }
        let token = &self.text[start..self.pos];
        match token {
            "undefined" | "null" => return Ok(Variant::Null),
            "true" => return Ok(Variant::Boolean(true)),
            "false" => return Ok(Variant::Boolean(false)),
            _ => {}
        }
        if let Ok(v) = token.parse::<i64>() {
            return Ok(if i32::try_from(v).is_ok() {
                Variant::Int32(v as i32)
            } else {
                Variant::Int64(v)
            });
        }
        if let Ok(v) = token.parse::<f64>() {
            return Ok(Variant::Double(v));
        }
        Err(RawError {
            position: start,
            message: "invalid token".to_string(),
        })
    }

    fn parse_value(&mut self) -> Result<Variant, RawError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.err("nesting too deep"));
        }
        self.depth += 1;
        let value = self.parse_value_inner();
        self.depth -= 1;
        value
    }

    fn parse_value_inner(&mut self) -> Result<Variant, RawError> {
        self.skip_space();
        let Some(first) = self.peek() else {
            return Ok(Variant::Null);
        };
        match first {
            b'"' | b'\'' => Ok(Variant::from(self.parse_string()?)),
            b'[' => self.parse_array(),
            b'{' => self.parse_object(),
            _ => self.parse_token(),
        }
    }

    fn parse_document(&mut self) -> Result<Variant, RawError> {
        if self.buf.is_empty() {
            return Ok(Variant::Null);
        }
        let value = self.parse_value()?;
        self.skip_space();
        if self.pos != self.buf.len() {
            return Err(self.err("invalid token"));
        }
        Ok(value)
    }
}

impl Json {
    /// Parses with the default options (comments allowed).
    pub fn parse(text: &str) -> Result<Json, ParseError> {
        Self::parse_with(text, &ParseOptions::default())
    }

    pub fn parse_with(text: &str, options: &ParseOptions) -> Result<Json, ParseError> {
        let mut parser = Parser {
            text,
            buf: text.as_bytes(),
            pos: 0,
            depth: 0,
            support_comments: options.support_comments,
        };
        match parser.parse_document() {
            Ok(value) => Ok(Json(value)),
            Err(raw) => {
                let (line, column) = locate(text, raw.position);
                Err(ParseError {
                    position: raw.position,
                    line,
                    column,
                    message: raw.message,
                })
            }
        }
    }
}
