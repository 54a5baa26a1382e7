//! Metadata profile and template documents.
//!
//! The profile maps global attribute names onto an output group and declared
//! type. The template carries attribute values that take precedence over
//! whatever a file's header says. Both are loaded once per run from JSON and
//! shared read-only between conversions.

use crate::constants::ROOT_GROUP;
use crate::error::{Result, TagError};
use crate::models::{AttributeType, GlobalAttribute};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Group and type declared for one attribute name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileEntry {
    pub name: String,
    #[serde(default = "root_group")]
    pub group: String,
    #[serde(rename = "type", default)]
    pub value_type: AttributeType,
}

fn root_group() -> String {
    ROOT_GROUP.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProfileDocument {
    Entries(Vec<ProfileEntry>),
    Wrapped { attributes: Vec<ProfileEntry> },
}

/// Attribute name to {group, type} lookup table
#[derive(Debug, Clone, Default)]
pub struct MetadataProfile {
    entries: HashMap<String, ProfileEntry>,
}

impl MetadataProfile {
    pub fn new(entries: impl IntoIterator<Item = ProfileEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();
        Self { entries }
    }

    /// Load a profile from a JSON list of `{name, group, type}` entries
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TagError::ProfileLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let profile = Self::from_json(&content).map_err(|e| TagError::ProfileLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!(
            "Loaded metadata profile with {} entries from {}",
            profile.len(),
            path.display()
        );
        Ok(profile)
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, serde_json::Error> {
        let entries = match serde_json::from_str::<ProfileDocument>(content)? {
            ProfileDocument::Entries(entries) => entries,
            ProfileDocument::Wrapped { attributes } => attributes,
        };
        Ok(Self::new(entries))
    }

    pub fn lookup(&self, name: &str) -> Option<&ProfileEntry> {
        self.entries.get(name)
    }

    /// Assign group and declared type from the profile, defaults otherwise
    pub fn resolve(&self, name: &str, value: &str) -> GlobalAttribute {
        let attribute = GlobalAttribute::new(name, value);
        match self.lookup(name) {
            Some(entry) => attribute
                .with_group(entry.group.clone())
                .with_type(entry.value_type),
            None => attribute,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TemplateAttribute {
    name: String,
    value: String,
    group: Option<String>,
    #[serde(rename = "type")]
    value_type: Option<AttributeType>,
}

#[derive(Debug, Deserialize)]
struct TemplateDocument {
    #[serde(default)]
    global_attributes: Vec<TemplateAttribute>,
}

/// Attribute overrides applied on top of file-derived attributes
#[derive(Debug, Clone, Default)]
pub struct Template {
    attributes: Vec<TemplateAttribute>,
}

impl Template {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TagError::ProfileLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let document: TemplateDocument =
            serde_json::from_str(&content).map_err(|e| TagError::ProfileLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        info!(
            "Loaded template with {} global attributes from {}",
            document.global_attributes.len(),
            path.display()
        );
        Ok(Self {
            attributes: document.global_attributes,
        })
    }

    pub fn from_attributes(attributes: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            attributes: attributes
                .into_iter()
                .map(|(name, value)| TemplateAttribute {
                    name,
                    value,
                    group: None,
                    value_type: None,
                })
                .collect(),
        }
    }

    /// Merge template attributes over file attributes; template wins on name clashes
    pub fn apply(&self, attributes: &mut Vec<GlobalAttribute>, profile: &MetadataProfile) {
        for template in &self.attributes {
            let mut resolved = profile.resolve(&template.name, &template.value);
            if let Some(group) = &template.group {
                resolved.group = group.clone();
            }
            if let Some(value_type) = template.value_type {
                resolved.declared_type = value_type;
            }

            // a header may repeat a name; every file-derived copy gives way
            let before = attributes.len();
            attributes.retain(|a| a.name != template.name);
            let replaced = before - attributes.len();
            if replaced > 0 {
                debug!(
                    "Template overrides {} file value(s) of '{}' with '{}'",
                    replaced, resolved.name, resolved.value
                );
            }
            attributes.push(resolved);
        }
    }
}

/// Check typed attributes, warning about values that do not fit their declared type
pub fn validate_attribute_types(attributes: &[GlobalAttribute]) -> usize {
    let mut mismatches = 0;
    for attribute in attributes {
        if !attribute.declared_type.accepts(&attribute.value) {
            warn!(
                "Attribute '{}' declared {:?} but value '{}' does not parse; keeping it as text",
                attribute.name, attribute.declared_type, attribute.value
            );
            mismatches += 1;
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_profile() -> MetadataProfile {
        MetadataProfile::from_json(
            r#"[
                {"name": "ptt", "group": "tag", "type": "int"},
                {"name": "deploy_lat", "group": "deployment", "type": "double"},
                {"name": "species"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_profile_resolution() {
        let profile = test_profile();
        assert_eq!(profile.len(), 3);

        let ptt = profile.resolve("ptt", "12345");
        assert_eq!(ptt.group, "tag");
        assert_eq!(ptt.declared_type, AttributeType::Int);

        let species = profile.resolve("species", "Thunnus");
        assert_eq!(species.group, ROOT_GROUP);
        assert_eq!(species.declared_type, AttributeType::String);

        let unknown = profile.resolve("unknown", "x");
        assert!(unknown.is_root());
        assert_eq!(unknown.declared_type, AttributeType::String);
    }

    #[test]
    fn test_wrapped_profile_document() {
        let profile = MetadataProfile::from_json(
            r#"{"attributes": [{"name": "ptt", "group": "tag", "type": "int"}]}"#,
        )
        .unwrap();
        assert_eq!(profile.lookup("ptt").unwrap().group, "tag");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = MetadataProfile::from_json(r#"[{"name": "ptt", "type": "complex"}]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_template_takes_precedence() {
        let profile = test_profile();
        let mut attributes = vec![
            profile.resolve("ptt", "111"),
            GlobalAttribute::new("species", "unknown"),
        ];

        let template = Template::from_attributes(vec![
            ("ptt".to_string(), "222".to_string()),
            ("project".to_string(), "TOPP".to_string()),
        ]);
        template.apply(&mut attributes, &profile);

        assert_eq!(attributes.len(), 3);
        let ptt = attributes.iter().find(|a| a.name == "ptt").unwrap();
        assert_eq!(ptt.value, "222");
        assert_eq!(ptt.group, "tag");
        assert!(attributes.iter().any(|a| a.name == "project" && a.value == "TOPP"));
    }

    #[test]
    fn test_template_replaces_repeated_header_names() {
        let profile = test_profile();
        let mut attributes = vec![
            GlobalAttribute::new("serial_number", "FILE-1"),
            GlobalAttribute::new("species", "unknown"),
            GlobalAttribute::new("serial_number", "FILE-2"),
        ];

        let template =
            Template::from_attributes(vec![("serial_number".to_string(), "TEMPLATE-9".to_string())]);
        template.apply(&mut attributes, &profile);

        let serials: Vec<&str> = attributes
            .iter()
            .filter(|a| a.name == "serial_number")
            .map(|a| a.value.as_str())
            .collect();
        assert_eq!(serials, vec!["TEMPLATE-9"]);
        assert_eq!(attributes.len(), 2);
    }

    #[test]
    fn test_validate_attribute_types() {
        let attributes = vec![
            GlobalAttribute::new("ptt", "12x").with_type(AttributeType::Int),
            GlobalAttribute::new("deploy_lat", "36.5").with_type(AttributeType::Double),
        ];
        assert_eq!(validate_attribute_types(&attributes), 1);
    }
}
