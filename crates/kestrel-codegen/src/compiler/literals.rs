// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session-wide string and literal-buffer tables.
//!
//! Both tables are shared by every function of a compilation and may be
//! appended to from several worker threads. Appends are keyed: interning
//! the same string, or adding an equal buffer, returns the handle of the
//! existing entry.

use num_bigint::BigInt;
use num_traits::Num;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::bytecode::{LiteralId, StringId};

/// A constant stored in a literal buffer.
#[derive(Debug, Clone, Copy)]
pub enum LiteralValue {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// A boolean
    Boolean(bool),
    /// A number
    Number(f64),
    /// An interned string
    String(StringId),
}

// Numbers compare by bit pattern so that equal buffers dedupe exactly:
// `0` and `-0` stay distinct and `NaN` equals itself.
impl PartialEq for LiteralValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LiteralValue::Undefined, LiteralValue::Undefined) => true,
            (LiteralValue::Null, LiteralValue::Null) => true,
            (LiteralValue::Boolean(a), LiteralValue::Boolean(b)) => a == b,
            (LiteralValue::Number(a), LiteralValue::Number(b)) => a.to_bits() == b.to_bits(),
            (LiteralValue::String(a), LiteralValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LiteralValue {}

impl std::hash::Hash for LiteralValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            LiteralValue::Boolean(b) => b.hash(state),
            LiteralValue::Number(n) => n.to_bits().hash(state),
            LiteralValue::String(s) => s.hash(state),
            LiteralValue::Undefined | LiteralValue::Null => {}
        }
    }
}

impl std::fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiteralValue::Undefined => f.write_str("undefined"),
            LiteralValue::Null => f.write_str("null"),
            LiteralValue::Boolean(b) => write!(f, "{}", b),
            LiteralValue::Number(n) => write!(f, "{}", n),
            LiteralValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// A constant array or object literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralBuffer {
    /// Array elements in order
    Array(Vec<LiteralValue>),
    /// Object properties in source order
    Object(Vec<(StringId, LiteralValue)>),
}

impl std::fmt::Display for LiteralBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiteralBuffer::Array(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str("]")
            }
            LiteralBuffer::Object(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Append-only interning table.
#[derive(Debug)]
struct Interner<T> {
    entries: Vec<T>,
    index: FxHashMap<T, u32>,
}

impl<T: Clone + Eq + std::hash::Hash> Interner<T> {
    fn intern(&mut self, value: &T) -> u32 {
        if let Some(&id) = self.index.get(value) {
            return id;
        }
        let id = self.entries.len() as u32;
        self.entries.push(value.clone());
        self.index.insert(value.clone(), id);
        id
    }
}

impl<T> Default for Interner<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

/// Interned strings of one compilation.
#[derive(Debug, Default)]
pub struct StringTable {
    inner: Mutex<Interner<String>>,
}

impl StringTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle of `value`, adding it on first use.
    pub fn intern(&self, value: &str) -> StringId {
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.index.get(value) {
            return StringId::from(id);
        }
        StringId::from(inner.intern(&value.to_string()))
    }

    /// Number of distinct strings.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether no string has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the strings out, indexed by [`StringId`].
    pub fn into_vec(self) -> Vec<String> {
        self.inner.into_inner().entries
    }
}

/// Literal buffers of one compilation.
#[derive(Debug, Default)]
pub struct LiteralTable {
    inner: Mutex<Interner<LiteralBuffer>>,
}

impl LiteralTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle of `buffer`, adding it if no equal buffer exists.
    pub fn add(&self, buffer: LiteralBuffer) -> LiteralId {
        LiteralId::from(self.inner.lock().intern(&buffer))
    }

    /// Number of distinct buffers.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether no buffer has been added.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the buffers out, indexed by [`LiteralId`].
    pub fn into_vec(self) -> Vec<LiteralBuffer> {
        self.inner.into_inner().entries
    }
}

/// Canonical decimal text of a BigInt literal.
///
/// Accepts decimal digits or a `0x`/`0o`/`0b` prefix, with optional `_`
/// separators. Returns `None` for malformed digits.
pub fn canonical_bigint(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(|&c| c != '_').collect();
    let (radix, body) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        Some("0o") | Some("0O") => (8, &digits[2..]),
        Some("0b") | Some("0B") => (2, &digits[2..]),
        _ => (10, digits.as_str()),
    };
    if body.is_empty() {
        return None;
    }
    BigInt::from_str_radix(body, radix).ok().map(|n| n.to_string())
}

/// Bitmask of regular expression flags; unknown flags are ignored.
pub fn regexp_flags(flags: &str) -> u8 {
    flags.chars().fold(0, |mask, flag| {
        mask | match flag {
            'g' => 1,
            'i' => 2,
            'm' => 4,
            's' => 8,
            'u' => 16,
            'y' => 32,
            _ => 0,
        }
    })
}
