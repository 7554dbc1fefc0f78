//! The flat key/value configuration document used by xm domain files.
//!
//! ```text
//! # comment
//! name = "vm1"
//! memory = 256
//! disk = [ "phy:/dev/vg/vm1,xvda,w",
//!          "file:/srv/iso/install.iso,hdc:cdrom,r" ]
//! ```
//!
//! Values are longs, strings (single, double or triple quoted, no escapes)
//! and flat lists of those. Entries keep their file order.

use std::fmt;
use std::path::Path;

use crate::error::{Result, XmError};

/// A single value in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfValue {
    Long(i64),
    Str(String),
    List(Vec<ConfValue>),
}

impl ConfValue {
    pub fn string(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// A list of strings.
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Str(s.into())).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Long(_) => "long",
            Self::Str(_) => "string",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for ConfValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(l) => write!(f, "{}", l),
            Self::Str(s) => match Quote::for_text(s).unwrap_or(Quote::Triple) {
                Quote::Double => write!(f, "\"{}\"", s),
                Quote::Single => write!(f, "'{}'", s),
                Quote::Triple => write!(f, "\"\"\"{}\"\"\"", s),
            },
            Self::List(items) => {
                f.write_str("[ ")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(" ]")
            }
        }
    }
}

/// How a string is delimited on disk. There are no escapes, so some
/// strings have no valid form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Double,
    Single,
    Triple,
}

impl Quote {
    fn for_text(s: &str) -> Option<Self> {
        if !s.contains('\n') {
            if !s.contains('"') {
                return Some(Self::Double);
            }
            if !s.contains('\'') {
                return Some(Self::Single);
            }
        }
        // A trailing quote would merge with the closing delimiter.
        if !s.contains("\"\"\"") && !s.ends_with('"') {
            return Some(Self::Triple);
        }
        None
    }
}

/// An ordered set of `key = value` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfDocument {
    entries: Vec<(String, ConfValue)>,
}

impl ConfDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse document text.
    pub fn parse(text: &str) -> Result<Self> {
        Parser::new(text).document()
    }

    /// Read and parse a file.
    pub fn read_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| XmError::io(path, e))?;
        Self::parse(&text)
    }

    /// Fail with `MalformedConfig` if some string value cannot be written
    /// in a form [`ConfDocument::parse`] reads back unchanged.
    pub fn check_writable(&self) -> Result<()> {
        for (key, value) in &self.entries {
            let items = match value {
                ConfValue::List(items) => items.as_slice(),
                single => std::slice::from_ref(single),
            };
            for item in items {
                if let ConfValue::Str(s) = item {
                    if Quote::for_text(s).is_none() {
                        return Err(XmError::malformed(
                            key.as_str(),
                            "value mixes quote characters in a way the file format cannot hold",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Serialize and write to a file, replacing it.
    pub fn write_file(&self, path: &Path) -> Result<()> {
        self.check_writable()?;
        std::fs::write(path, self.to_string()).map_err(|e| XmError::io(path, e))
    }

    pub fn get(&self, key: &str) -> Option<&ConfValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set a value. An existing key keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: ConfValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn set_long(&mut self, key: impl Into<String>, value: i64) {
        self.set(key, ConfValue::Long(value));
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, ConfValue::Str(value.into()));
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A string value, or `None` if the key is absent.
    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(ConfValue::Str(s)) => Ok(Some(s)),
            Some(other) => {
                Err(XmError::malformed(key, format!("expected a string, found a {}", other.type_name())))
            }
        }
    }

    /// A required string value.
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key)?.ok_or_else(|| XmError::malformed(key, "value is missing"))
    }

    /// A boolean: any non-zero long, or the string "1".
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(ConfValue::Long(l)) => Ok(*l != 0),
            Some(ConfValue::Str(s)) => Ok(s == "1"),
            Some(ConfValue::List(_)) => Err(XmError::malformed(key, "expected a boolean, found a list")),
        }
    }

    /// An unsigned number, given as a long or as a string with leading
    /// decimal digits.
    pub fn get_ulong(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(ConfValue::Long(l)) => {
                u64::try_from(*l).map_err(|_| XmError::malformed(key, format!("negative value {}", l)))
            }
            Some(ConfValue::Str(s)) => {
                let digits: String =
                    s.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().map_err(|_| XmError::malformed(key, format!("'{}' is not a number", s)))
            }
            Some(ConfValue::List(_)) => Err(XmError::malformed(key, "expected a number, found a list")),
        }
    }

    /// List items, or `None` if the key is absent or not a list.
    pub fn get_list(&self, key: &str) -> Option<&[ConfValue]> {
        match self.get(key) {
            Some(ConfValue::List(items)) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for ConfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            writeln!(f, "{} = {}", key, value)?;
        }
        Ok(())
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { src: text.as_bytes(), pos: 0, line: 1 }
    }

    fn error(&self, reason: impl Into<String>) -> XmError {
        XmError::ConfigSyntax { line: self.line, reason: reason.into() }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Skip spaces and tabs on the current line.
    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r')) {
            self.bump();
        }
    }

    fn skip_comment(&mut self) {
        if self.peek() == Some(b'#') {
            while !matches!(self.peek(), None | Some(b'\n')) {
                self.bump();
            }
        }
    }

    /// Skip whitespace, newlines and comments.
    fn skip_all(&mut self) {
        loop {
            self.skip_blanks();
            match self.peek() {
                Some(b'#') => self.skip_comment(),
                Some(b'\n') => {
                    self.bump();
                }
                _ => return,
            }
        }
    }

    fn document(mut self) -> Result<ConfDocument> {
        let mut doc = ConfDocument::new();
        loop {
            self.skip_all();
            if self.peek().is_none() {
                return Ok(doc);
            }
            let key = self.name()?;
            self.skip_blanks();
            if self.bump() != Some(b'=') {
                return Err(self.error(format!("expected '=' after {}", key)));
            }
            self.skip_blanks();
            let value = self.value(true)?;
            self.skip_blanks();
            if self.peek() == Some(b';') {
                self.bump();
                self.skip_blanks();
            }
            self.skip_comment();
            match self.peek() {
                None | Some(b'\n') => {}
                Some(c) => return Err(self.error(format!("unexpected '{}' after value", c as char))),
            }
            doc.set(key, value);
        }
    }

    fn name(&mut self) -> Result<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {}
            _ => return Err(self.error("expected a setting name")),
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'.') {
            self.bump();
        }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn value(&mut self, allow_list: bool) -> Result<ConfValue> {
        match self.peek() {
            Some(b'"') | Some(b'\'') => self.string().map(ConfValue::Str),
            Some(b'[') if allow_list => self.list(),
            Some(b'[') => Err(self.error("nested lists are not allowed")),
            Some(c) if c.is_ascii_digit() || c == b'-' || c == b'+' => self.long(),
            Some(c) => Err(self.error(format!("unexpected '{}' where a value was expected", c as char))),
            None => Err(self.error("missing value")),
        }
    }

    fn string(&mut self) -> Result<String> {
        let quote = self.peek().ok_or_else(|| self.error("missing string"))?;
        let triple = quote == b'"' && self.src[self.pos..].starts_with(b"\"\"\"");
        let start_line = self.line;

        if triple {
            self.pos += 3;
            let start = self.pos;
            while !self.src[self.pos..].starts_with(b"\"\"\"") {
                if self.bump().is_none() {
                    return Err(XmError::ConfigSyntax {
                        line: start_line,
                        reason: "unterminated triple-quoted string".into(),
                    });
                }
            }
            let s = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
            self.pos += 3;
            return Ok(s);
        }

        self.bump();
        let start = self.pos;
        loop {
            match self.peek() {
                Some(c) if c == quote => break,
                Some(b'\n') | None => return Err(self.error("unterminated string")),
                Some(_) => {
                    self.bump();
                }
            }
        }
        let s = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.bump();
        Ok(s)
    }

    fn long(&mut self) -> Result<ConfValue> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        text.parse::<i64>()
            .map(ConfValue::Long)
            .map_err(|_| self.error(format!("bad number '{}'", text)))
    }

    fn list(&mut self) -> Result<ConfValue> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_all();
            if self.peek() == Some(b']') {
                self.bump();
                return Ok(ConfValue::List(items));
            }
            items.push(self.value(false)?);
            self.skip_all();
            match self.bump() {
                Some(b',') => {}
                Some(b']') => return Ok(ConfValue::List(items)),
                Some(c) => return Err(self.error(format!("expected ',' or ']', found '{}'", c as char))),
                None => return Err(self.error("unterminated list")),
            }
        }
    }
}
