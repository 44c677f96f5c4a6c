//! Object class lookup
//!
//! Resolves the object classes of an entry to their definitions in the
//! subschema entry advertised by the root DSE.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use dirtree_core::dn::{DistinguishedName, IntoDn};
use dirtree_core::error::DirectoryResult;

use crate::service::DirectoryService;

const OBJECT_CLASS: &str = "objectClass";
const OBJECT_CLASSES: &str = "objectClasses";
const SUBSCHEMA_SUBENTRY: &str = "subschemaSubentry";
const DEFAULT_SUBSCHEMA: &str = "cn=schema";

/// One object class of an entry with its RFC 4512 definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectClassDefinition {
    /// Name as listed on the entry.
    pub name: String,
    /// The `objectClasses` value describing the class, if the schema has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

/// Names declared by a definition.
///
/// ```text
/// ( 2.5.6.6 NAME 'person' SUP top STRUCTURAL MUST ( sn $ cn ) )
/// ( 2.5.6.0 NAME ( 'top' 'anything' ) ABSTRACT MUST objectClass )
/// ```
pub fn definition_names(definition: &str) -> Vec<String> {
    let Some(name_idx) = definition.find(" NAME ") else {
        return Vec::new();
    };
    let after_name = definition[name_idx + " NAME ".len()..].trim_start();

    let names = if after_name.starts_with('(') {
        match after_name.find(')') {
            Some(end) => &after_name[1..end],
            None => return Vec::new(),
        }
    } else {
        // Single quoted name
        match after_name
            .strip_prefix('\'')
            .and_then(|rest| rest.find('\'').map(|end| &rest[..end]))
        {
            Some(name) => name,
            None => return Vec::new(),
        }
    };

    names
        .split('\'')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn find_definition<'a>(definitions: &'a [String], class: &str) -> Option<&'a String> {
    definitions.iter().find(|definition| {
        definition_names(definition)
            .iter()
            .any(|name| name.eq_ignore_ascii_case(class))
    })
}

impl DirectoryService {
    /// Object classes of the entry at `dn`, each with its schema
    /// definition.
    #[instrument(skip(self, dn))]
    pub async fn get_schema(
        &mut self,
        dn: impl IntoDn,
    ) -> DirectoryResult<Vec<ObjectClassDefinition>> {
        let dn = dn.into_dn()?;
        let classes = self.read_strings("get_schema", &dn, OBJECT_CLASS).await?;

        let subschema = self
            .read_strings("get_schema", &DistinguishedName::empty(), SUBSCHEMA_SUBENTRY)
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_SUBSCHEMA.to_string());
        let subschema = DistinguishedName::parse(&subschema)?;

        let definitions = self
            .read_strings("get_schema", &subschema, OBJECT_CLASSES)
            .await?;
        debug!(
            dn = %dn,
            subschema = %subschema,
            classes = classes.len(),
            definitions = definitions.len(),
            "Read schema"
        );

        Ok(classes
            .into_iter()
            .map(|name| {
                let definition = find_definition(&definitions, &name).cloned();
                if definition.is_none() {
                    warn!(object_class = %name, "No schema definition for object class");
                }
                ObjectClassDefinition { name, definition }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_name() {
        assert_eq!(
            definition_names("( 2.5.6.6 NAME 'person' SUP top STRUCTURAL MUST ( sn $ cn ) )"),
            vec!["person"]
        );
    }

    #[test]
    fn test_multiple_names() {
        assert_eq!(
            definition_names("( 2.5.6.0 NAME ( 'top' 'anything' ) ABSTRACT MUST objectClass )"),
            vec!["top", "anything"]
        );
    }

    #[test]
    fn test_no_name() {
        assert!(definition_names("( 1.2.3 SUP top )").is_empty());
        assert!(definition_names("( 1.2.3 NAME ( 'open'").is_empty());
    }

    #[test]
    fn test_find_definition_ignores_case() {
        let definitions = vec![
            "( 2.5.6.0 NAME 'top' ABSTRACT MUST objectClass )".to_string(),
            "( 2.5.6.6 NAME 'person' SUP top STRUCTURAL MUST ( sn $ cn ) )".to_string(),
        ];
        assert_eq!(
            find_definition(&definitions, "Person"),
            Some(&definitions[1])
        );
        assert_eq!(find_definition(&definitions, "device"), None);
    }
}
