//! Streaming JSON pull reader.
//!
//! # Design
//! `JsonReader` turns a buffered byte source into a sequence of `Event`s, one
//! per `next_event` call. It only consumes the bytes of the event it returns
//! (plus leading whitespace), so a caller can stop in the middle of a document
//! (for example inside an `items` array) and resume later without buffering
//! the rest of the body. Structural validation (separators, nesting) happens
//! here; scalar decoding (string escapes, number grammar) is delegated to
//! `serde_json`.

use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// A single token of a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    Key(String),
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::StartObject => write!(f, "START_OBJECT"),
            Event::EndObject => write!(f, "END_OBJECT"),
            Event::StartArray => write!(f, "START_ARRAY"),
            Event::EndArray => write!(f, "END_ARRAY"),
            Event::Key(key) => write!(f, "KEY_NAME {key:?}"),
            Event::String(_) => write!(f, "VALUE_STRING"),
            Event::Number(_) => write!(f, "VALUE_NUMBER"),
            Event::Bool(true) => write!(f, "VALUE_TRUE"),
            Event::Bool(false) => write!(f, "VALUE_FALSE"),
            Event::Null => write!(f, "VALUE_NULL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Object,
    Array,
}

/// What the reader accepts at its current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    FirstKey,
    Key,
    FirstElement,
    Separator,
    End,
}

pub struct JsonReader<R> {
    input: R,
    scopes: Vec<Scope>,
    expect: Expect,
}

impl<R: BufRead> JsonReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            scopes: Vec::new(),
            expect: Expect::Value,
        }
    }

    /// Returns the next event, or `None` once the top-level value is complete.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            if self.expect == Expect::End {
                return Ok(None);
            }
            let byte = self.peek_significant()?.ok_or_else(unexpected_end)?;
            match self.expect {
                Expect::End => return Ok(None),
                Expect::Separator => match (self.scopes.last(), byte) {
                    (Some(Scope::Object), b',') => {
                        self.bump();
                        self.expect = Expect::Key;
                    }
                    (Some(Scope::Array), b',') => {
                        self.bump();
                        self.expect = Expect::Value;
                    }
                    (Some(Scope::Object), b'}') => return Ok(Some(self.close(Event::EndObject))),
                    (Some(Scope::Array), b']') => return Ok(Some(self.close(Event::EndArray))),
                    _ => return Err(unexpected(byte)),
                },
                Expect::FirstKey if byte == b'}' => return Ok(Some(self.close(Event::EndObject))),
                Expect::FirstKey | Expect::Key => {
                    if byte != b'"' {
                        return Err(unexpected(byte));
                    }
                    let key = self.read_string()?;
                    match self.peek_significant()? {
                        Some(b':') => self.bump(),
                        Some(other) => return Err(unexpected(other)),
                        None => return Err(unexpected_end()),
                    }
                    self.expect = Expect::Value;
                    return Ok(Some(Event::Key(key)));
                }
                Expect::FirstElement if byte == b']' => {
                    return Ok(Some(self.close(Event::EndArray)))
                }
                Expect::FirstElement | Expect::Value => return self.read_scalar_or_open(byte).map(Some),
            }
        }
    }

    /// Like `next_event`, but running out of events is a protocol failure.
    pub fn expect_event(&mut self) -> Result<Event> {
        self.next_event()?.ok_or_else(unexpected_end)
    }

    /// Discards the value that begins with `first`.
    pub fn skip_value(&mut self, first: Event) -> Result<()> {
        let mut depth = match first {
            Event::StartObject | Event::StartArray => 1usize,
            Event::EndObject | Event::EndArray | Event::Key(_) => {
                return Err(Error::protocol(format!("bad json event: {first}")))
            }
            _ => return Ok(()),
        };
        while depth > 0 {
            match self.expect_event()? {
                Event::StartObject | Event::StartArray => depth += 1,
                Event::EndObject | Event::EndArray => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// Materializes the value that begins with `first`.
    pub fn read_value(&mut self, first: Event) -> Result<Value> {
        match first {
            Event::StartObject => self.read_object_body().map(Value::Object),
            Event::StartArray => {
                let mut elements = Vec::new();
                loop {
                    match self.expect_event()? {
                        Event::EndArray => return Ok(Value::Array(elements)),
                        event => elements.push(self.read_value(event)?),
                    }
                }
            }
            Event::String(s) => Ok(Value::String(s)),
            Event::Number(n) => Ok(Value::Number(n)),
            Event::Bool(b) => Ok(Value::Bool(b)),
            Event::Null => Ok(Value::Null),
            Event::EndObject | Event::EndArray | Event::Key(_) => {
                Err(Error::protocol(format!("bad json event: {first}")))
            }
        }
    }

    /// Reads the members of an object whose `StartObject` was already consumed.
    pub fn read_object_body(&mut self) -> Result<Map<String, Value>> {
        let mut members = Map::new();
        loop {
            match self.expect_event()? {
                Event::EndObject => return Ok(members),
                Event::Key(key) => {
                    let first = self.expect_event()?;
                    let value = self.read_value(first)?;
                    members.insert(key, value);
                }
                other => return Err(Error::protocol(format!("bad json event: {other}"))),
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.input
    }

    /// Consumes the closing bracket at the cursor and leaves the scope.
    fn close(&mut self, event: Event) -> Event {
        self.bump();
        self.scopes.pop();
        self.after_value();
        event
    }

    fn after_value(&mut self) {
        self.expect = if self.scopes.is_empty() {
            Expect::End
        } else {
            Expect::Separator
        };
    }

    fn open(&mut self, scope: Scope) {
        self.scopes.push(scope);
        self.expect = match scope {
            Scope::Object => Expect::FirstKey,
            Scope::Array => Expect::FirstElement,
        };
    }

    fn read_scalar_or_open(&mut self, byte: u8) -> Result<Event> {
        let event = match byte {
            b'{' => {
                self.bump();
                self.open(Scope::Object);
                return Ok(Event::StartObject);
            }
            b'[' => {
                self.bump();
                self.open(Scope::Array);
                return Ok(Event::StartArray);
            }
            b'"' => Event::String(self.read_string()?),
            b't' => {
                self.read_literal(b"true")?;
                Event::Bool(true)
            }
            b'f' => {
                self.read_literal(b"false")?;
                Event::Bool(false)
            }
            b'n' => {
                self.read_literal(b"null")?;
                Event::Null
            }
            b'-' | b'0'..=b'9' => Event::Number(self.read_number()?),
            other => return Err(unexpected(other)),
        };
        self.after_value();
        Ok(event)
    }

    fn read_string(&mut self) -> Result<String> {
        self.bump();
        let mut raw = vec![b'"'];
        loop {
            let byte = self.next_byte()?.ok_or_else(unexpected_end)?;
            raw.push(byte);
            match byte {
                b'\\' => raw.push(self.next_byte()?.ok_or_else(unexpected_end)?),
                b'"' => break,
                _ => {}
            }
        }
        serde_json::from_slice(&raw).map_err(|e| Error::protocol(format!("invalid string: {e}")))
    }

    fn read_number(&mut self) -> Result<Number> {
        let mut raw = Vec::new();
        while let Some(byte) = self.peek()? {
            if !matches!(byte, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                break;
            }
            raw.push(byte);
            self.bump();
        }
        std::str::from_utf8(&raw)
            .ok()
            .and_then(|text| Number::from_str(text).ok())
            .ok_or_else(|| {
                Error::protocol(format!("invalid number: {}", String::from_utf8_lossy(&raw)))
            })
    }

    fn read_literal(&mut self, literal: &[u8]) -> Result<()> {
        for expected in literal {
            match self.next_byte()? {
                Some(byte) if byte == *expected => {}
                Some(byte) => return Err(unexpected(byte)),
                None => return Err(unexpected_end()),
            }
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        Ok(self.input.fill_buf()?.first().copied())
    }

    fn peek_significant(&mut self) -> Result<Option<u8>> {
        while let Some(byte) = self.peek()? {
            if !byte.is_ascii_whitespace() {
                return Ok(Some(byte));
            }
            self.bump();
        }
        Ok(None)
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.bump();
        }
        Ok(byte)
    }

    fn bump(&mut self) {
        self.input.consume(1);
    }
}

fn unexpected(byte: u8) -> Error {
    Error::protocol(format!("unexpected character {:?}", byte as char))
}

fn unexpected_end() -> Error {
    Error::protocol("unexpected end of input")
}
