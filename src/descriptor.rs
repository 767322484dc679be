//! Method and field descriptor parsing.
//!
//! Descriptors are the terse type strings of the class-file format:
//! `(ILjava/lang/String;)V` declares two arguments and a void return.
//! Only `V`, `I` and `L…;` are meaningful to this interpreter; any
//! other token degrades to `Void`.

use std::sync::OnceLock;

use regex::Regex;

/// Base shape of a single descriptor token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorKind {
    Void,
    Int,
    Object(String),
}

/// One parsed argument or return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub kind: DescriptorKind,
    /// Number of `[` prefixes.
    pub array_dimensions: u32,
}

/// A method's full signature: argument list, return type, and the
/// original string kept verbatim for exact-match method lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptors {
    pub raw: String,
    pub arguments: Vec<Descriptor>,
    pub return_descriptor: Descriptor,
}

fn method_descriptor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\(([^)]*)\)(.+)$").expect("method descriptor regex"))
}

impl Descriptors {
    /// Parses a method descriptor `(ARG*)RET` or a bare field
    /// descriptor (no parentheses, no arguments).
    pub fn parse(raw: &str) -> Self {
        let (arguments, return_descriptor) = match method_descriptor_re().captures(raw) {
            Some(caps) => {
                let mut scanner = Scanner::new(caps.get(1).map_or("", |m| m.as_str()));
                let mut arguments = Vec::new();
                while !scanner.done() {
                    arguments.push(scanner.next_descriptor());
                }
                let ret = Scanner::new(caps.get(2).map_or("", |m| m.as_str())).next_descriptor();
                (arguments, ret)
            }
            None => (Vec::new(), Scanner::new(raw).next_descriptor()),
        };
        Self {
            raw: raw.to_string(),
            arguments,
            return_descriptor,
        }
    }

    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }

    pub fn returns_value(&self) -> bool {
        self.return_descriptor.kind != DescriptorKind::Void
    }
}

/// Number of arguments declared by a method descriptor, counted by
/// peeking: leading `[`s attach to the next token, `L…;` runs count
/// as one.
pub fn descriptor_count(descriptor: &str) -> usize {
    let mut scanner = Scanner::new(descriptor.strip_prefix('(').unwrap_or(descriptor));
    let mut count = 0;
    while !scanner.done() {
        scanner.next_descriptor();
        count += 1;
    }
    count
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn done(&self) -> bool {
        self.pos >= self.bytes.len() || self.bytes[self.pos] == b')'
    }

    fn next_descriptor(&mut self) -> Descriptor {
        let mut array_dimensions = 0;
        while self.pos < self.bytes.len() && self.bytes[self.pos] == b'[' {
            array_dimensions += 1;
            self.pos += 1;
        }

        let kind = match self.bytes.get(self.pos) {
            Some(b'I') => {
                self.pos += 1;
                DescriptorKind::Int
            }
            Some(b'L') => {
                self.pos += 1;
                let start = self.pos;
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b';' {
                    self.pos += 1;
                }
                let name = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                // Step past the ';' terminator when present.
                if self.pos < self.bytes.len() {
                    self.pos += 1;
                }
                DescriptorKind::Object(name)
            }
            // 'V', and every token this interpreter does not model.
            Some(_) => {
                self.pos += 1;
                DescriptorKind::Void
            }
            None => DescriptorKind::Void,
        };

        Descriptor {
            kind,
            array_dimensions,
        }
    }
}
