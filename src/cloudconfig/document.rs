//! Cloud configuration documents.
//!
//! The director's cloud configuration is an ordered YAML document whose
//! `vm_extensions` section plinth reconciles: extension names are unique,
//! and merging is a set-union keyed by name. A same-name extension is
//! replaced with the new content; everything else is preserved in its
//! original order, with new names appended.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{CloudConfigError, PlinthError, Result};

/// Key of the reconciled section.
const VM_EXTENSIONS_KEY: &str = "vm_extensions";

/// One named extension record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VmExtension {
    /// Unique extension name.
    pub name: String,
    /// Provider-specific property mapping.
    #[serde(default)]
    pub cloud_properties: Value,
}

/// A parsed cloud configuration document.
///
/// The document retains every section it was parsed with (`azs`,
/// `vm_types`, `networks`, ...); only `vm_extensions` is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudConfigDocument {
    root: Value,
}

impl CloudConfigDocument {
    /// Creates an empty document.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            root: Value::Mapping(serde_yaml::Mapping::new()),
        }
    }

    /// Parses a document from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`CloudConfigError::Malformed`] if the text is not a YAML
    /// mapping.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(text).map_err(|e| {
            PlinthError::CloudConfig(CloudConfigError::Malformed {
                message: e.to_string(),
            })
        })?;

        match root {
            Value::Mapping(_) => Ok(Self { root }),
            Value::Null => Ok(Self::empty()),
            _ => Err(PlinthError::CloudConfig(CloudConfigError::Malformed {
                message: String::from("cloud config must be a YAML mapping"),
            })),
        }
    }

    /// Serializes the document back to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`CloudConfigError::Malformed`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.root).map_err(|e| {
            PlinthError::CloudConfig(CloudConfigError::Malformed {
                message: e.to_string(),
            })
        })
    }

    /// Returns true if the document has no sections at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(&self.root, Value::Mapping(m) if m.is_empty())
    }

    /// Returns the parsed `vm_extensions` section, in document order.
    #[must_use]
    pub fn vm_extensions(&self) -> Vec<VmExtension> {
        let Value::Mapping(root) = &self.root else {
            return Vec::new();
        };
        let Some(Value::Sequence(entries)) = root.get(VM_EXTENSIONS_KEY) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| serde_yaml::from_value(entry.clone()).ok())
            .collect()
    }

    /// Returns the names of all extensions, in document order.
    #[must_use]
    pub fn extension_names(&self) -> Vec<String> {
        self.vm_extensions().into_iter().map(|e| e.name).collect()
    }

    /// Merges extension records into the document, union by name.
    ///
    /// An incoming extension whose name already exists replaces that entry
    /// in place; unmatched incoming extensions are appended in their given
    /// order. Unrelated entries are untouched.
    pub fn merge_extensions(&mut self, incoming: Vec<VmExtension>) {
        let Value::Mapping(root) = &mut self.root else {
            return;
        };

        let existing = root
            .entry(Value::String(String::from(VM_EXTENSIONS_KEY)))
            .or_insert_with(|| Value::Sequence(Vec::new()));

        // A malformed section (scalar where a list belongs) is replaced.
        if !matches!(existing, Value::Sequence(_)) {
            *existing = Value::Sequence(Vec::new());
        }
        let Value::Sequence(entries) = existing else {
            return;
        };

        for extension in incoming {
            let rendered = serde_yaml::to_value(&extension)
                .unwrap_or_else(|_| Value::Mapping(serde_yaml::Mapping::new()));

            let position = entries.iter().position(|entry| {
                entry
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name == extension.name)
            });

            match position {
                Some(idx) => entries[idx] = rendered,
                None => entries.push(rendered),
            }
        }
    }
}

impl VmExtension {
    /// Creates an extension with the given name and properties.
    #[must_use]
    pub fn new(name: impl Into<String>, cloud_properties: Value) -> Self {
        Self {
            name: name.into(),
            cloud_properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(key: &str, value: &str) -> Value {
        let mut mapping = serde_yaml::Mapping::new();
        mapping.insert(
            Value::String(key.to_string()),
            Value::String(value.to_string()),
        );
        Value::Mapping(mapping)
    }

    #[test]
    fn test_parse_and_list_extensions() {
        let doc = CloudConfigDocument::from_yaml(
            "vm_extensions:\n- name: a\n  cloud_properties: {}\n- name: b\n  cloud_properties: {}\n",
        )
        .expect("parse");

        assert_eq!(doc.extension_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_merge_replaces_same_name_once() {
        let mut doc = CloudConfigDocument::from_yaml(
            "vm_extensions:\n- name: x\n  cloud_properties:\n    elbs: [old]\n- name: other\n  cloud_properties: {}\n",
        )
        .expect("parse");

        doc.merge_extensions(vec![VmExtension::new("x", props("elbs", "new"))]);

        let extensions = doc.vm_extensions();
        let x_entries: Vec<_> = extensions.iter().filter(|e| e.name == "x").collect();
        assert_eq!(x_entries.len(), 1);
        assert_eq!(x_entries[0].cloud_properties, props("elbs", "new"));

        // Unrelated entries are unaffected.
        assert!(extensions.iter().any(|e| e.name == "other"));
    }

    #[test]
    fn test_merge_appends_new_names_in_order() {
        let mut doc = CloudConfigDocument::from_yaml("vm_extensions:\n- name: base\n")
            .expect("parse");

        doc.merge_extensions(vec![
            VmExtension::new("first", Value::Null),
            VmExtension::new("second", Value::Null),
        ]);

        assert_eq!(doc.extension_names(), vec!["base", "first", "second"]);
    }

    #[test]
    fn test_merge_into_document_without_extensions_section() {
        let mut doc = CloudConfigDocument::from_yaml("azs:\n- name: z1\n").expect("parse");
        doc.merge_extensions(vec![VmExtension::new("lb", Value::Null)]);

        assert_eq!(doc.extension_names(), vec!["lb"]);
        // Other sections survive the merge.
        let yaml = doc.to_yaml().expect("serialize");
        assert!(yaml.contains("azs"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut doc = CloudConfigDocument::empty();
        let incoming = vec![VmExtension::new("x", props("k", "v"))];

        doc.merge_extensions(incoming.clone());
        let once = doc.clone();
        doc.merge_extensions(incoming);

        assert_eq!(doc, once);
    }

    #[test]
    fn test_empty_and_null_documents() {
        assert!(CloudConfigDocument::empty().is_empty());
        assert!(CloudConfigDocument::from_yaml("").expect("parse").is_empty());
    }
}
