//! Distinguished names
//!
//! RFC 4514 string form, parsed into an ordered list of RDNs. Components are
//! stored root-first: for `cn=a,ou=people,dc=example` the first RDN is
//! `dc=example` and the last is `cn=a`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DirectoryError, DirectoryResult};

/// One `type=value` pair of an RDN. The value is kept unescaped.
#[derive(Debug, Clone)]
pub struct AttributeTypeAndValue {
    attr_type: String,
    value: String,
}

impl AttributeTypeAndValue {
    pub fn attr_type(&self) -> &str {
        &self.attr_type
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Relative distinguished name: one or more `type=value` pairs joined by `+`.
#[derive(Debug, Clone)]
pub struct Rdn {
    pairs: Vec<AttributeTypeAndValue>,
    /// Lowercased `(type, value)` pairs, sorted. Drives equality and ordering.
    key: Vec<(String, String)>,
}

impl Rdn {
    /// Create a single-valued RDN.
    pub fn new(attr_type: impl Into<String>, value: impl Into<String>) -> DirectoryResult<Self> {
        let attr_type = attr_type.into();
        let value = value.into();
        validate_type(&attr_type, &attr_type)?;
        Ok(Self::from_pairs(vec![AttributeTypeAndValue { attr_type, value }]))
    }

    fn from_pairs(pairs: Vec<AttributeTypeAndValue>) -> Self {
        let mut key: Vec<(String, String)> = pairs
            .iter()
            .map(|p| (p.attr_type.to_lowercase(), p.value.to_lowercase()))
            .collect();
        key.sort();
        Self { pairs, key }
    }

    pub fn pairs(&self) -> &[AttributeTypeAndValue] {
        &self.pairs
    }

    /// Type of the first pair.
    pub fn attr_type(&self) -> &str {
        &self.pairs[0].attr_type
    }

    /// Value of the first pair.
    pub fn value(&self) -> &str {
        &self.pairs[0].value
    }

    fn parse(input: &str, component: &str) -> DirectoryResult<Self> {
        let mut pairs = Vec::new();
        for raw_pair in split_unescaped(component, '+') {
            let Some((raw_type, raw_value)) = split_once_unescaped(raw_pair, '=') else {
                return Err(DirectoryError::invalid_name(
                    input,
                    format!("missing '=' in '{}'", raw_pair.trim()),
                ));
            };
            let attr_type = raw_type.trim();
            validate_type(input, attr_type)?;
            let value = unescape_value(input, trim_value(raw_value))?;
            pairs.push(AttributeTypeAndValue {
                attr_type: attr_type.to_string(),
                value,
            });
        }
        Ok(Self::from_pairs(pairs))
    }
}

impl PartialEq for Rdn {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Rdn {}

impl Hash for Rdn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Rdn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rdn {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pair) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}={}", pair.attr_type, escape_value(&pair.value))?;
        }
        Ok(())
    }
}

/// A distinguished name. Equality, hashing and ordering ignore case and
/// the order of pairs inside multi-valued RDNs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DistinguishedName {
    rdns: Vec<Rdn>,
}

impl DistinguishedName {
    /// The zero-length name addressing the root DSE.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a name from RDNs given root-first.
    pub fn from_rdns(rdns: Vec<Rdn>) -> Self {
        Self { rdns }
    }

    /// Parse an RFC 4514 string.
    pub fn parse(input: &str) -> DirectoryResult<Self> {
        if input.trim().is_empty() {
            return Ok(Self::empty());
        }

        let mut rdns = Vec::new();
        for component in split_unescaped(input, ',') {
            if component.trim().is_empty() {
                return Err(DirectoryError::invalid_name(input, "empty RDN component"));
            }
            rdns.push(Rdn::parse(input, component)?);
        }
        // String form is leaf-first
        rdns.reverse();
        Ok(Self { rdns })
    }

    /// RDNs, root-first.
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// Number of RDN components.
    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// The leaf-most RDN.
    pub fn leaf(&self) -> Option<&Rdn> {
        self.rdns.last()
    }

    /// The name with its last component dropped. A single-component name is
    /// the root of its naming context and has no parent.
    pub fn parent(&self) -> Option<Self> {
        if self.rdns.len() < 2 {
            return None;
        }
        Some(Self {
            rdns: self.rdns[..self.rdns.len() - 1].to_vec(),
        })
    }

    /// Equivalent to `other.parent() == Some(self)` without allocating.
    pub fn is_parent_of(&self, other: &Self) -> bool {
        !self.rdns.is_empty()
            && other.rdns.len() == self.rdns.len() + 1
            && other.rdns[..self.rdns.len()] == self.rdns[..]
    }

    /// True if `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
        self.rdns.len() > ancestor.rdns.len()
            && self.rdns[..ancestor.rdns.len()] == ancestor.rdns[..]
    }

    /// The name of a child entry below this one.
    pub fn child(&self, rdn: Rdn) -> Self {
        let mut rdns = self.rdns.clone();
        rdns.push(rdn);
        Self { rdns }
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{rdn}")?;
        }
        Ok(())
    }
}

impl FromStr for DistinguishedName {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DistinguishedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DistinguishedName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Conversion accepted by every operation taking a DN, so callers may pass
/// either a parsed name or its string form.
pub trait IntoDn {
    fn into_dn(self) -> DirectoryResult<DistinguishedName>;
}

impl IntoDn for DistinguishedName {
    fn into_dn(self) -> DirectoryResult<DistinguishedName> {
        Ok(self)
    }
}

impl IntoDn for &DistinguishedName {
    fn into_dn(self) -> DirectoryResult<DistinguishedName> {
        Ok(self.clone())
    }
}

impl IntoDn for &str {
    fn into_dn(self) -> DirectoryResult<DistinguishedName> {
        DistinguishedName::parse(self)
    }
}

impl IntoDn for String {
    fn into_dn(self) -> DirectoryResult<DistinguishedName> {
        DistinguishedName::parse(&self)
    }
}

impl IntoDn for &String {
    fn into_dn(self) -> DirectoryResult<DistinguishedName> {
        DistinguishedName::parse(self)
    }
}

fn validate_type(input: &str, attr_type: &str) -> DirectoryResult<()> {
    if attr_type.is_empty() {
        return Err(DirectoryError::invalid_name(input, "empty attribute type"));
    }
    let descriptor = attr_type
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && attr_type.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    let numeric_oid = attr_type
        .split('.')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if descriptor || numeric_oid {
        Ok(())
    } else {
        Err(DirectoryError::invalid_name(
            input,
            format!("invalid attribute type '{attr_type}'"),
        ))
    }
}

/// Split on `sep` where it is not preceded by an escaping backslash.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

fn split_once_unescaped(s: &str, sep: char) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some((&s[..i], &s[i + c.len_utf8()..]));
        }
    }
    None
}

/// Strip surrounding spaces, keeping a trailing space that is escaped.
fn trim_value(raw: &str) -> &str {
    let mut value = raw.trim_start();
    while let Some(rest) = value.strip_suffix(' ') {
        let backslashes = rest.chars().rev().take_while(|&c| c == '\\').count();
        if backslashes % 2 == 1 {
            break;
        }
        value = rest;
    }
    value
}

fn unescape_value(input: &str, raw: &str) -> DirectoryResult<String> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let Some(next) = chars.next() else {
            return Err(DirectoryError::invalid_name(input, "dangling escape"));
        };
        if next.is_ascii_hexdigit() {
            let low = chars
                .next()
                .filter(char::is_ascii_hexdigit)
                .ok_or_else(|| DirectoryError::invalid_name(input, "invalid hex escape"))?;
            let hex = format!("{next}{low}");
            let byte = u8::from_str_radix(&hex, 16)
                .map_err(|_| DirectoryError::invalid_name(input, "invalid hex escape"))?;
            bytes.push(byte);
        } else if matches!(
            next,
            ' ' | '"' | '#' | '+' | ',' | ';' | '<' | '=' | '>' | '\\'
        ) {
            bytes.push(next as u8);
        } else {
            return Err(DirectoryError::invalid_name(
                input,
                format!("invalid escape '\\{next}'"),
            ));
        }
    }

    String::from_utf8(bytes)
        .map_err(|_| DirectoryError::invalid_name(input, "escaped value is not valid UTF-8"))
}

/// Escape an attribute value per RFC 4514.
///
/// Characters that must be escaped:
/// - Leading or trailing SPACE (escaped as \20)
/// - Leading # (escaped as \23)
/// - Characters: , + " \ < > ; = (escaped with backslash prefix)
/// - NUL character (escaped as \00)
pub fn escape_value(value: &str) -> String {
    let count = value.chars().count();
    let mut result = String::with_capacity(value.len() * 2);

    for (i, ch) in value.chars().enumerate() {
        let is_first = i == 0;
        let is_last = i + 1 == count;

        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if is_first || is_last => result.push_str("\\20"),
            '#' if is_first => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dn(s: &str) -> DistinguishedName {
        DistinguishedName::parse(s).unwrap()
    }

    #[test]
    fn test_parse_orders_root_first() {
        let name = dn("cn=a,ou=people,dc=example");
        assert_eq!(name.len(), 3);
        assert_eq!(name.rdns()[0].attr_type(), "dc");
        assert_eq!(name.rdns()[0].value(), "example");
        assert_eq!(name.leaf().unwrap().value(), "a");
    }

    #[test]
    fn test_display_round_trips_string_form() {
        let name = dn("cn=Smith\\, John,ou=people,dc=example");
        assert_eq!(name.leaf().unwrap().value(), "Smith, John");
        assert_eq!(name.to_string(), "cn=Smith\\, John,ou=people,dc=example");
    }

    #[test]
    fn test_parent_drops_last_component() {
        let name = dn("cn=a,ou=people,dc=example");
        let parent = name.parent().unwrap();
        assert_eq!(parent.len(), 2);
        assert_eq!(parent, dn("ou=people,dc=example"));
        assert_eq!(parent.parent().unwrap(), dn("dc=example"));
        assert!(dn("dc=example").parent().is_none());
        assert!(DistinguishedName::empty().parent().is_none());
    }

    #[test]
    fn test_equality_ignores_case_and_spacing() {
        assert_eq!(dn("CN=Alice, OU=People,DC=Example"), dn("cn=alice,ou=people,dc=example"));
        assert_ne!(dn("cn=alice,dc=example"), dn("cn=bob,dc=example"));
    }

    #[test]
    fn test_multi_valued_rdn_order_insensitive() {
        let a = dn("cn=x+uid=1,dc=example");
        let b = dn("uid=1+cn=x,dc=example");
        assert_eq!(a, b);
        assert_eq!(a.leaf().unwrap().pairs().len(), 2);
    }

    #[test]
    fn test_is_parent_of_matches_parent_equality() {
        let parent = dn("ou=people,dc=example");
        let child = dn("cn=a,ou=people,dc=example");
        let grandchild = dn("cn=c,ou=sub,ou=people,dc=example");

        assert!(parent.is_parent_of(&child));
        assert_eq!(child.parent().as_ref(), Some(&parent));
        assert!(!parent.is_parent_of(&grandchild));
        assert!(!child.is_parent_of(&parent));
        assert!(grandchild.is_descendant_of(&parent));
        assert!(!parent.is_descendant_of(&parent));
    }

    #[test]
    fn test_ordering_is_root_first() {
        let mut names = vec![
            dn("cn=b,ou=people,dc=example"),
            dn("ou=people,dc=example"),
            dn("cn=a,ou=people,dc=example"),
        ];
        names.sort();
        let rendered: Vec<String> = names.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "ou=people,dc=example",
                "cn=a,ou=people,dc=example",
                "cn=b,ou=people,dc=example",
            ]
        );
    }

    #[test]
    fn test_hex_escapes_decode_utf8() {
        let name = dn("ou=\\ED\\98\\84\\EB\\8C\\80,c=kr");
        assert_eq!(name.leaf().unwrap().value(), "현대");
        let plain = dn("ou=현대,c=kr");
        assert_eq!(name, plain);
    }

    #[test]
    fn test_trailing_space_after_escaped_backslash_is_trimmed() {
        let name = dn("cn=a\\\\ ,dc=x");
        assert_eq!(name.leaf().unwrap().value(), "a\\");

        let kept = dn("cn=a\\ ,dc=x");
        assert_eq!(kept.leaf().unwrap().value(), "a ");
    }

    #[test]
    fn test_invalid_names_carry_input() {
        for input in ["cn", "cn=a,,dc=x", "=a", "c n=a", "cn=a\\", "cn=\\zq"] {
            match DistinguishedName::parse(input) {
                Err(DirectoryError::InvalidName { input: reported, .. }) => {
                    assert_eq!(reported, input)
                }
                other => panic!("expected InvalidName for {input:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_string_is_root_dse() {
        assert!(dn("").is_empty());
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value("a,b"), "a\\,b");
        assert_eq!(escape_value(" lead"), "\\20lead");
        assert_eq!(escape_value("trail "), "trail\\20");
        assert_eq!(escape_value("#hash"), "\\23hash");
        assert_eq!(escape_value("plain"), "plain");
    }

    #[test]
    fn test_into_dn_accepts_both_forms() {
        let parsed = dn("dc=example");
        assert_eq!("dc=example".into_dn().unwrap(), parsed);
        assert_eq!(String::from("dc=example").into_dn().unwrap(), parsed);
        assert_eq!((&parsed).into_dn().unwrap(), parsed);
        assert!("not a dn".into_dn().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let name = dn("cn=a,dc=example");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"cn=a,dc=example\"");
        let back: DistinguishedName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }
}
