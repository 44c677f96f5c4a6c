//! Directory node: a DN paired with its attributes.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::attribute::AttributeRecord;
use crate::dn::DistinguishedName;
use crate::error::{DirectoryError, DirectoryResult};

/// An entry of the directory. Identity is the DN alone.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryNode {
    dn: DistinguishedName,
    attributes: AttributeRecord,
}

impl DirectoryNode {
    /// Pair a DN with its attributes.
    ///
    /// An entry without any attribute cannot come from a well-formed
    /// directory read, so an empty record is an invariant violation.
    pub fn new(dn: DistinguishedName, attributes: AttributeRecord) -> DirectoryResult<Self> {
        if attributes.is_empty() {
            return Err(DirectoryError::invariant(format!(
                "directory node '{dn}' has no attributes"
            )));
        }
        Ok(Self { dn, attributes })
    }

    pub fn dn(&self) -> &DistinguishedName {
        &self.dn
    }

    pub fn attributes(&self) -> &AttributeRecord {
        &self.attributes
    }

    pub fn into_attributes(self) -> AttributeRecord {
        self.attributes
    }

    /// DN of the parent entry, `None` at the top of a naming context.
    pub fn parent_dn(&self) -> Option<DistinguishedName> {
        self.dn.parent()
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.names()
    }

    /// True if `other` sits directly below this node.
    pub fn is_parent_of(&self, other: &DirectoryNode) -> bool {
        self.dn.is_parent_of(&other.dn)
    }
}

impl PartialEq for DirectoryNode {
    fn eq(&self, other: &Self) -> bool {
        self.dn == other.dn
    }
}

impl Eq for DirectoryNode {}

impl Hash for DirectoryNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dn.hash(state);
    }
}

impl fmt::Display for DirectoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path : {}\tAttributes : ", self.dn)?;
        for (name, values) in self.attributes.iter() {
            write!(f, "\t{}:[{}]", name, values.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(dn: &str, cn: &str) -> DirectoryNode {
        DirectoryNode::new(
            DistinguishedName::parse(dn).unwrap(),
            AttributeRecord::new().with("cn", cn),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_attributes_rejected() {
        let err = DirectoryNode::new(
            DistinguishedName::parse("dc=example").unwrap(),
            AttributeRecord::new(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "INVARIANT_VIOLATION");
    }

    #[test]
    fn test_identity_is_dn_only() {
        assert_eq!(node("cn=a,dc=example", "a"), node("CN=A,dc=example", "other"));
        assert_ne!(node("cn=a,dc=example", "a"), node("cn=b,dc=example", "a"));
    }

    #[test]
    fn test_parent_relationship() {
        let parent = node("dc=example", "example");
        let child = node("cn=a,dc=example", "a");
        assert!(parent.is_parent_of(&child));
        assert!(!child.is_parent_of(&parent));
        assert_eq!(child.parent_dn().as_ref(), Some(parent.dn()));
        assert!(parent.parent_dn().is_none());
    }

    #[test]
    fn test_display() {
        let rendered = node("cn=a,dc=example", "a").to_string();
        assert_eq!(rendered, "Path : cn=a,dc=example\tAttributes : \tcn:[a]");
    }
}
