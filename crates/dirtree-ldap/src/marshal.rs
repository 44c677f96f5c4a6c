//! Conversion of raw client results into directory nodes.
//!
//! Results are fully read from the session before they get here, so
//! marshalling never touches the network.

use dirtree_core::attribute::{AttributeRecord, RawAttribute, RawEntry};
use dirtree_core::dn::DistinguishedName;
use dirtree_core::error::DirectoryResult;
use dirtree_core::node::DirectoryNode;

/// Sort raw attribute values into an [`AttributeRecord`].
pub fn marshal_attributes(attributes: Vec<RawAttribute>) -> AttributeRecord {
    let mut record = AttributeRecord::new();
    for attribute in attributes {
        record.ensure_attribute(&attribute.name);
        for value in attribute.values {
            record.add_value(&attribute.name, value);
        }
    }
    record
}

/// Build a node from one search result. The DN must parse and the entry
/// must carry at least one attribute.
pub fn marshal_entry(entry: RawEntry) -> DirectoryResult<DirectoryNode> {
    let dn = DistinguishedName::parse(&entry.dn)?;
    DirectoryNode::new(dn, marshal_attributes(entry.attributes))
}

/// Build nodes from search results, preserving order.
pub fn marshal_entries(entries: Vec<RawEntry>) -> DirectoryResult<Vec<DirectoryNode>> {
    entries.into_iter().map(marshal_entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirtree_core::attribute::RawValue;

    #[test]
    fn test_marshal_attributes_buckets() {
        let record = marshal_attributes(vec![
            RawAttribute::new("cn", vec![RawValue::Text("Alice".into())]),
            RawAttribute::new("photo", vec![RawValue::Binary(vec![1, 2, 3])]),
            RawAttribute::new("description", vec![RawValue::Null]),
            RawAttribute::new("empty", Vec::new()),
        ]);

        assert_eq!(record.get("cn"), Some(&["Alice".to_string()][..]));
        assert_eq!(record.binary("photo"), Some(&[vec![1u8, 2, 3]][..]));
        assert_eq!(record.get("photo"), Some(&[][..]));
        assert!(record.contains("description"));
        assert!(record.contains("empty"));
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn test_marshal_entry_parses_dn() {
        let node = marshal_entry(RawEntry::new(
            "cn=alice,ou=people,dc=example,dc=com",
            vec![RawAttribute::new("cn", vec![RawValue::Text("alice".into())])],
        ))
        .unwrap();

        assert_eq!(node.dn().len(), 4);
        assert_eq!(node.attributes().first("cn"), Some("alice"));
    }

    #[test]
    fn test_marshal_entry_rejects_bad_dn() {
        let err = marshal_entry(RawEntry::new(
            "not a dn",
            vec![RawAttribute::new("cn", vec![RawValue::Text("x".into())])],
        ))
        .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_NAME");
    }

    #[test]
    fn test_marshal_entry_without_attributes_is_invariant_violation() {
        let err = marshal_entry(RawEntry::new("dc=example,dc=com", Vec::new())).unwrap_err();
        assert_eq!(err.error_code(), "INVARIANT_VIOLATION");
    }
}
