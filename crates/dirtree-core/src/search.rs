//! Search scope and filter checks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

/// Filter matching every entry.
pub const ALL_OBJECTS_FILTER: &str = "(objectClass=*)";

/// How far below the base DN a search reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// The base entry only.
    Base,
    /// Immediate children of the base entry.
    #[serde(alias = "one")]
    OneLevel,
    /// The base entry and all its descendants.
    #[serde(alias = "sub")]
    Subtree,
}

impl SearchScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchScope::Base => "base",
            SearchScope::OneLevel => "onelevel",
            SearchScope::Subtree => "subtree",
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchScope {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base" => Ok(SearchScope::Base),
            "one" | "onelevel" => Ok(SearchScope::OneLevel),
            "sub" | "subtree" => Ok(SearchScope::Subtree),
            _ => Err(DirectoryError::invalid_configuration(format!(
                "invalid search scope '{s}', expected one of: base, onelevel, subtree"
            ))),
        }
    }
}

/// Cheap structural check of an LDAP filter string (RFC 4515).
///
/// The filter is still passed to the server verbatim; this only rejects
/// input that cannot be a filter at all, before a session is opened.
///
/// ```text
/// (cn=abc)              cn equals abc
/// (cn=abc*)             cn starts with abc
/// (&(cn=abc*)(cn=*d))   both
/// (|(cn=abc*)(cn=*d))   either
/// ```
pub fn validate_filter(filter: &str) -> DirectoryResult<()> {
    let trimmed = filter.trim();
    if !trimmed.starts_with('(') || !trimmed.ends_with(')') {
        return Err(DirectoryError::invalid_filter(
            filter,
            "filter must be enclosed in parentheses",
        ));
    }

    let mut depth: usize = 0;
    for (i, c) in trimmed.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    DirectoryError::invalid_filter(filter, "unbalanced parentheses")
                })?;
                if depth == 0 && i + 1 != trimmed.len() {
                    return Err(DirectoryError::invalid_filter(
                        filter,
                        "trailing characters after filter",
                    ));
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(DirectoryError::invalid_filter(
            filter,
            "unbalanced parentheses",
        ));
    }
    if trimmed == "()" {
        return Err(DirectoryError::invalid_filter(filter, "empty filter"));
    }
    Ok(())
}
