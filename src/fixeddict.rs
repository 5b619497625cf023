//! Fixed-key record types used to represent deserialised bitstreams.
//!
//! A [`Record`] behaves like an ordered string-keyed map, but may be tied
//! to a [`RecordSchema`] which fixes the set of legal keys. Schemas give
//! each part of a deserialised bitstream a clear name, catch typos early
//! (an unknown key fails with [`Error::FixedDictKey`]) and drive the
//! pretty-printed string representation:
//!
//! ```text
//! ParseInfo:
//!   parse_info_prefix: 0x42424344
//!   parse_code: end_of_sequence (0x10)
//!   next_parse_offset: 0
//!   previous_parse_offset: 1234
//! ```
//!
//! Leaf values are held in the [`Value`] sum type: booleans,
//! arbitrary-precision integers, bit strings, byte strings, nested records
//! and lists. The distinguished [`Value::Auto`] variant marks a field whose
//! contents should be computed by an auto-fill pass; it can never collide
//! with a legitimate value and is rejected by the serialiser.

use std::fmt;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::{Error, Result};
use crate::io::Bits;

/// A leaf or interior value in a deserialised bitstream tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(BigInt),
    Bits(Bits),
    Bytes(Vec<u8>),
    Record(Record),
    List(Vec<Value>),
    /// Request that an auto-fill pass compute this field. Not serialisable.
    Auto,
}

impl Value {
    /// A short name for this value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Bits(_) => "bits",
            Value::Bytes(_) => "bytes",
            Value::Record(_) => "record",
            Value::List(_) => "list",
            Value::Auto => "Auto",
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Value::Auto)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a `u64`, if it is an integer in range.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_int().and_then(BigInt::to_u64)
    }

    pub fn as_bits(&self) -> Option<&Bits> {
        match self {
            Value::Bits(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Value {
                    Value::Int(BigInt::from(v))
                }
            }
        )*
    };
}

value_from_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Value {
        Value::Int(v)
    }
}

impl From<Bits> for Value {
    fn from(v: Bits) -> Value {
        Value::Bits(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Value {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Value {
        Value::Bytes(v.to_vec())
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Value {
        Value::Record(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::List(v)
    }
}

/// How a scalar entry is rendered in a record's string representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    /// Plain decimal/boolean display.
    Default,
    /// `0x…`, zero-padded to the given number of digits.
    Hex(u32),
}

/// Enumeration descriptor: `(value, variant_name)` pairs. Entries whose
/// value matches a known variant render as `name (value)`.
pub type EnumTable = &'static [(i64, &'static str)];

/// Metadata for one key of a [`RecordSchema`].
#[derive(Debug)]
pub struct Entry {
    pub key: &'static str,
    pub formatter: Formatter,
    pub variants: Option<EnumTable>,
    pub default: Option<fn() -> Value>,
}

impl Entry {
    pub const fn new(key: &'static str) -> Entry {
        Entry {
            key,
            formatter: Formatter::Default,
            variants: None,
            default: None,
        }
    }

    pub const fn formatter(mut self, formatter: Formatter) -> Entry {
        self.formatter = formatter;
        self
    }

    pub const fn variants(mut self, variants: EnumTable) -> Entry {
        self.variants = Some(variants);
        self
    }

    pub const fn default(mut self, default: fn() -> Value) -> Entry {
        self.default = Some(default);
        self
    }
}

/// The declared shape of a record type: its name and ordered key set.
#[derive(Debug)]
pub struct RecordSchema {
    pub name: &'static str,
    pub entries: &'static [Entry],
}

impl RecordSchema {
    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entry(key).is_some()
    }
}

/// An ordered mapping from string keys to [`Value`]s, optionally restricted
/// to the key set of a [`RecordSchema`].
#[derive(Debug, Clone)]
pub struct Record {
    schema: Option<&'static RecordSchema>,
    entries: Vec<(&'static str, Value)>,
}

impl Record {
    /// An empty record which accepts any key.
    pub fn untyped() -> Record {
        Record {
            schema: None,
            entries: Vec::new(),
        }
    }

    /// An empty record of the given type.
    pub fn new(schema: &'static RecordSchema) -> Record {
        Record {
            schema: Some(schema),
            entries: Vec::new(),
        }
    }

    /// A record of the given type with every defaulted entry populated.
    ///
    /// Only construction from nothing applies entry defaults; records built
    /// from existing values (deserialisation, [`Record::retype`]) are
    /// assumed to already be complete.
    pub fn with_defaults(schema: &'static RecordSchema) -> Record {
        let entries = schema
            .entries
            .iter()
            .filter_map(|e| e.default.map(|default| (e.key, default())))
            .collect();
        Record {
            schema: Some(schema),
            entries,
        }
    }

    pub fn schema(&self) -> Option<&'static RecordSchema> {
        self.schema
    }

    /// The record's type name, or `"Record"` for untyped records.
    pub fn type_name(&self) -> &'static str {
        self.schema.map_or("Record", |s| s.name)
    }

    pub fn is_type(&self, schema: &'static RecordSchema) -> bool {
        self.schema.map_or(false, |s| std::ptr::eq(s, schema))
    }

    /// Check that `key` is legal for this record's type.
    pub fn ensure_key(&self, key: &'static str) -> Result<()> {
        match self.schema {
            Some(schema) if !schema.contains(key) => Err(Error::FixedDictKey {
                key,
                record_type: schema.name,
            }),
            _ => Ok(()),
        }
    }

    /// Insert a value, returning any previous value for the key.
    pub fn insert(&mut self, key: &'static str, value: impl Into<Value>) -> Result<Option<Value>> {
        self.ensure_key(key)?;
        let value = value.into();
        for (existing, slot) in self.entries.iter_mut() {
            if *existing == key {
                return Ok(Some(std::mem::replace(slot, value)));
            }
        }
        self.entries.push((key, value));
        Ok(None)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Present keys, in schema declaration order for typed records and
    /// insertion order otherwise.
    pub fn keys(&self) -> Vec<&'static str> {
        match self.schema {
            Some(schema) => schema
                .entries
                .iter()
                .map(|e| e.key)
                .filter(|k| self.contains_key(k))
                .collect(),
            None => self.entries.iter().map(|(k, _)| *k).collect(),
        }
    }

    /// Change this record's type, keeping its entries. Fails with
    /// [`Error::FixedDictKey`] if an existing key is not legal for the new
    /// type.
    pub fn retype(&mut self, schema: &'static RecordSchema) -> Result<()> {
        for (key, _) in &self.entries {
            if !schema.contains(key) {
                return Err(Error::FixedDictKey {
                    key,
                    record_type: schema.name,
                });
            }
        }
        self.schema = Some(schema);
        Ok(())
    }
}

/// Content equality, ignoring entry order and type identity (mirroring
/// mapping semantics: two records are equal when they hold the same keys
/// and values).
impl PartialEq for Record {
    fn eq(&self, other: &Record) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).map_or(false, |o| o == v))
    }
}

impl std::ops::Index<&str> for Record {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        match self.get(key) {
            Some(value) => value,
            None => panic!("no {:?} in {}", key, self.type_name()),
        }
    }
}

fn indent(s: &str) -> String {
    s.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_scalar(value: &Value, formatter: Formatter) -> String {
    match (value, formatter) {
        (Value::Int(v), Formatter::Hex(digits)) => {
            format!("0x{:01$x}", v, digits as usize)
        }
        (Value::Bool(b), _) => b.to_string(),
        (Value::Int(v), _) => v.to_string(),
        (Value::Bits(bits), _) => {
            let mut out = String::with_capacity(2 + bits.len());
            out.push_str("0b");
            for bit in bits.iter().by_vals() {
                out.push(if bit { '1' } else { '0' });
            }
            out
        }
        (Value::Bytes(bytes), _) => {
            let mut out = String::from("0x");
            for (i, byte) in bytes.iter().enumerate() {
                if i != 0 {
                    out.push('_');
                }
                out.push_str(&format!("{:02X}", byte));
            }
            out
        }
        (Value::Auto, _) => "Auto".to_string(),
        (Value::Record(r), _) => r.to_string(),
        (Value::List(_), _) => format_value(value, None),
    }
}

fn format_value(value: &Value, entry: Option<&Entry>) -> String {
    let formatter = entry.map_or(Formatter::Default, |e| e.formatter);
    match value {
        Value::List(items) => {
            if items.iter().any(|i| matches!(i, Value::Record(_))) {
                let mut out = String::new();
                for (i, item) in items.iter().enumerate() {
                    if i != 0 {
                        out.push('\n');
                    }
                    out.push_str(&format!("{}: {}", i, format_value(item, None)));
                }
                out
            } else {
                let rendered: Vec<String> = items
                    .iter()
                    .map(|i| format_scalar(i, formatter))
                    .collect();
                format!("[{}]", rendered.join(", "))
            }
        }
        _ => {
            let rendered = format_scalar(value, formatter);
            if let (Some(variants), Some(v)) =
                (entry.and_then(|e| e.variants), value.as_int())
            {
                if let Some(v) = v.to_i64() {
                    if let Some((_, name)) = variants.iter().find(|(value, _)| *value == v) {
                        return format!("{} ({})", name, rendered);
                    }
                }
            }
            rendered
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keys beginning with an underscore are computed values and are
        // hidden from string output.
        let visible: Vec<&'static str> = self
            .keys()
            .into_iter()
            .filter(|k| !k.starts_with('_'))
            .collect();
        if visible.is_empty() {
            return write!(f, "{}", self.type_name());
        }
        writeln!(f, "{}:", self.type_name())?;
        let mut lines = Vec::with_capacity(visible.len());
        for key in visible {
            let entry = self.schema.and_then(|s| s.entry(key));
            let value = format_value(&self[key], entry);
            lines.push(indent(&format!("{}: {}", key, value)));
        }
        write!(f, "{}", lines.join("\n"))
    }
}

/// Construct a typed [`Record`] from key/value pairs:
///
/// ```ignore
/// let parse_info = record![records::PARSE_INFO;
///     "parse_code" => 0x10u8,
///     "next_parse_offset" => 0u8,
/// ];
/// ```
#[macro_export]
macro_rules! record {
    ($schema:expr $(;)?) => {
        $crate::fixeddict::Record::new(&$schema)
    };
    ($schema:expr; $($key:literal => $value:expr),+ $(,)?) => {{
        let mut record = $crate::fixeddict::Record::new(&$schema);
        $(
            record
                .insert($key, $value)
                .expect("record! key not in schema");
        )+
        record
    }};
}

/// Construct an untyped [`Record`] from key/value pairs.
#[macro_export]
macro_rules! dict {
    () => {
        $crate::fixeddict::Record::untyped()
    };
    ($($key:literal => $value:expr),+ $(,)?) => {{
        let mut record = $crate::fixeddict::Record::untyped();
        $(
            record
                .insert($key, $value)
                .expect("untyped records accept any key");
        )+
        record
    }};
}

/// Construct a [`Value::List`] from values convertible to [`Value`].
#[macro_export]
macro_rules! vlist {
    ($($value:expr),* $(,)?) => {
        $crate::fixeddict::Value::List(vec![
            $($crate::fixeddict::Value::from($value)),*
        ])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    static FRAME_SIZE: RecordSchema = RecordSchema {
        name: "FrameSize",
        entries: &[
            Entry::new("custom_dimensions_flag"),
            Entry::new("frame_width"),
            Entry::new("frame_height"),
        ],
    };

    static PARSE_INFO: RecordSchema = RecordSchema {
        name: "ParseInfo",
        entries: &[
            Entry::new("parse_info_prefix").formatter(Formatter::Hex(8)),
            Entry::new("parse_code")
                .formatter(Formatter::Hex(2))
                .variants(&[(0x10, "end_of_sequence")]),
            Entry::new("next_parse_offset"),
            Entry::new("previous_parse_offset"),
            Entry::new("_offset"),
        ],
    };

    #[test]
    fn unknown_keys_are_rejected() {
        let mut r = Record::new(&FRAME_SIZE);
        r.insert("frame_width", 1920u32).unwrap();
        assert!(matches!(
            r.insert("not_in_fixeddict", 123u32),
            Err(Error::FixedDictKey {
                key: "not_in_fixeddict",
                record_type: "FrameSize",
            })
        ));
    }

    #[test]
    fn untyped_records_accept_any_key() {
        let mut r = Record::untyped();
        r.insert("anything", true).unwrap();
        assert_eq!(r.get("anything"), Some(&Value::Bool(true)));
    }

    #[test]
    fn keys_follow_declaration_order() {
        let mut r = Record::new(&FRAME_SIZE);
        r.insert("frame_height", 1080u32).unwrap();
        r.insert("custom_dimensions_flag", true).unwrap();
        assert_eq!(r.keys(), vec!["custom_dimensions_flag", "frame_height"]);
    }

    #[test]
    fn retype_validates_keys() {
        let mut r = Record::untyped();
        r.insert("frame_width", 1920u32).unwrap();
        r.retype(&FRAME_SIZE).unwrap();
        assert_eq!(r.type_name(), "FrameSize");

        let mut r = Record::untyped();
        r.insert("bogus", 0u8).unwrap();
        assert!(r.retype(&FRAME_SIZE).is_err());
    }

    #[test]
    fn equality_ignores_order_and_type() {
        let mut a = Record::new(&FRAME_SIZE);
        a.insert("frame_width", 1920u32).unwrap();
        a.insert("frame_height", 1080u32).unwrap();

        let mut b = Record::untyped();
        b.insert("frame_height", 1080u32).unwrap();
        b.insert("frame_width", 1920u32).unwrap();

        assert_eq!(a, b);

        b.insert("frame_width", 1280u32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn display_formats_enums_and_hides_computed_values() {
        let r = record![PARSE_INFO;
            "parse_info_prefix" => 0x42424344u64,
            "parse_code" => 0x10u8,
            "next_parse_offset" => 0u8,
            "previous_parse_offset" => 1234u32,
            "_offset" => 13u8,
        ];
        assert_eq!(
            r.to_string(),
            "ParseInfo:\n\
             \x20 parse_info_prefix: 0x42424344\n\
             \x20 parse_code: end_of_sequence (0x10)\n\
             \x20 next_parse_offset: 0\n\
             \x20 previous_parse_offset: 1234"
        );
    }

    #[test]
    fn display_nests_records_with_indentation() {
        let inner = record![FRAME_SIZE; "frame_width" => 1920u32];
        let mut outer = Record::untyped();
        outer.insert("frame_size", inner).unwrap();
        assert_eq!(
            outer.to_string(),
            "Record:\n\
             \x20 frame_size: FrameSize:\n\
             \x20   frame_width: 1920"
        );
    }

    #[test]
    fn with_defaults_applies_entry_defaults() {
        static DEFAULTED: RecordSchema = RecordSchema {
            name: "Defaulted",
            entries: &[
                Entry::new("flag").default(|| Value::Bool(false)),
                Entry::new("no_default"),
            ],
        };
        let r = Record::with_defaults(&DEFAULTED);
        assert_eq!(r.get("flag"), Some(&Value::Bool(false)));
        assert!(!r.contains_key("no_default"));
    }

    #[test]
    fn display_of_scalar_lists_is_single_line() {
        let mut r = Record::untyped();
        r.insert("qindex", vlist![1u8, 2u8, 3u8]).unwrap();
        assert_eq!(r.to_string(), "Record:\n  qindex: [1, 2, 3]");
    }
}
