//! Attribute records
//!
//! A directory may return values of different native representations for a
//! single attribute. An [`AttributeRecord`] keeps three independent,
//! name-keyed buckets so none of them is dropped: strings, binary blobs and
//! anything else ("other").

use std::collections::BTreeMap;

use base64::Engine;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// One raw value as produced by a directory client.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Absent value; skipped during marshalling.
    Null,
    /// A string value.
    Text(String),
    /// A binary value.
    Binary(Vec<u8>),
    /// A value that is neither string nor binary.
    Other(Value),
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(b: Vec<u8>) -> Self {
        RawValue::Binary(b)
    }
}

/// An attribute as returned by the directory, values in server order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name: String,
    pub values: Vec<RawValue>,
}

impl RawAttribute {
    pub fn new(name: impl Into<String>, values: Vec<RawValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// A search hit or entry read, before marshalling.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    /// DN in string form, as reported by the server.
    pub dn: String,
    pub attributes: Vec<RawAttribute>,
}

impl RawEntry {
    pub fn new(dn: impl Into<String>, attributes: Vec<RawAttribute>) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }
}

/// Multi-valued attributes of one directory entry.
///
/// Every attribute name seen has a string bucket (possibly empty). Binary and
/// other buckets exist only when they hold at least one value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeRecord {
    strings: BTreeMap<String, Vec<String>>,
    binary: BTreeMap<String, Vec<Vec<u8>>>,
    other: BTreeMap<String, Vec<Value>>,
}

impl AttributeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` exists, creating its (empty) string bucket.
    pub fn ensure_attribute(&mut self, name: &str) {
        if !self.strings.contains_key(name) {
            self.strings.insert(name.to_string(), Vec::new());
        }
    }

    /// Append one value to the bucket matching its representation.
    /// Null values only register the attribute name.
    pub fn add_value(&mut self, name: &str, value: RawValue) {
        self.ensure_attribute(name);
        match value {
            RawValue::Null => {}
            RawValue::Text(s) => {
                if let Some(bucket) = self.strings.get_mut(name) {
                    bucket.push(s);
                }
            }
            RawValue::Binary(b) => self.binary.entry(name.to_string()).or_default().push(b),
            RawValue::Other(v) => self.other.entry(name.to_string()).or_default().push(v),
        }
    }

    /// Builder-style [`AttributeRecord::add_value`].
    pub fn with(mut self, name: &str, value: impl Into<RawValue>) -> Self {
        self.add_value(name, value.into());
        self
    }

    /// String values of an attribute. Falls back to a case-insensitive
    /// match on the name.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        lookup(&self.strings, name).map(Vec::as_slice)
    }

    /// First string value of an attribute.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Binary values of an attribute.
    pub fn binary(&self, name: &str) -> Option<&[Vec<u8>]> {
        lookup(&self.binary, name).map(Vec::as_slice)
    }

    /// Values that are neither string nor binary.
    pub fn other(&self, name: &str) -> Option<&[Value]> {
        lookup(&self.other, name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        lookup(&self.strings, name).is_some()
    }

    /// Attribute names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strings.keys().map(String::as_str)
    }

    /// Number of distinct attributes.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterate over string buckets.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.strings
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn binary_attributes(&self) -> &BTreeMap<String, Vec<Vec<u8>>> {
        &self.binary
    }

    pub fn other_attributes(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.other
    }
}

fn lookup<'a, V>(map: &'a BTreeMap<String, V>, name: &str) -> Option<&'a V> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

/// Serialized as `{ "attributes": {...}, "binary": {...}, "other": {...} }`
/// with binary values base64 encoded; empty side buckets are omitted.
impl Serialize for AttributeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("attributes", &self.strings)?;
        if !self.binary.is_empty() {
            let encoded: BTreeMap<&str, Vec<String>> = self
                .binary
                .iter()
                .map(|(name, values)| {
                    let values = values
                        .iter()
                        .map(|b| base64::engine::general_purpose::STANDARD.encode(b))
                        .collect();
                    (name.as_str(), values)
                })
                .collect();
            map.serialize_entry("binary", &encoded)?;
        }
        if !self.other.is_empty() {
            map.serialize_entry("other", &self.other)?;
        }
        map.end()
    }
}
