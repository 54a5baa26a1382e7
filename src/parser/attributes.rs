//! Global attribute extraction from header lines
//!
//! Header lines look like `:serial_number = "05A0001"` or
//! `Description: archival tag`. The name and value are split at the first
//! `=` or `:`, and the name is resolved against the metadata profile to pick
//! its output group and declared type.

use super::LineError;
use crate::constants::HEADER_MARKER;
use crate::models::GlobalAttribute;
use crate::profile::MetadataProfile;

/// Extracts global attributes, resolving each against a metadata profile
#[derive(Debug, Clone, Copy)]
pub struct GlobalAttributeExtractor<'a> {
    profile: &'a MetadataProfile,
}

impl<'a> GlobalAttributeExtractor<'a> {
    pub fn new(profile: &'a MetadataProfile) -> Self {
        Self { profile }
    }

    /// Parse one header line into a name/value pair
    pub fn extract(&self, line: &str) -> Result<GlobalAttribute, LineError> {
        let (name, value) =
            split_attribute(line).ok_or_else(|| LineError::MalformedAttribute(line.to_string()))?;
        Ok(self.profile.resolve(&name, &value))
    }
}

/// Split `:name = value` into trimmed, non-empty name and value
pub fn split_attribute(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    let line = line.strip_prefix(HEADER_MARKER).unwrap_or(line);
    let cleaned = line.replace('"', "");

    let (name, value) = cleaned.split_once(['=', ':'])?;
    let name = name.trim();
    let value = value.trim();

    if name.is_empty() || value.is_empty() {
        return None;
    }

    Some((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ROOT_GROUP;
    use crate::models::AttributeType;
    use crate::profile::ProfileEntry;

    #[test]
    fn test_split_equals_form() {
        assert_eq!(
            split_attribute(":serial_number = \"05A0001\""),
            Some(("serial_number".to_string(), "05A0001".to_string()))
        );
    }

    #[test]
    fn test_split_on_first_separator() {
        // '=' comes before the ':' inside the value
        assert_eq!(
            split_attribute(":deploy_time = 2005-07-10 12:00:00"),
            Some(("deploy_time".to_string(), "2005-07-10 12:00:00".to_string()))
        );
        // ':' comes first here
        assert_eq!(
            split_attribute("Description: ratio = 3"),
            Some(("Description".to_string(), "ratio = 3".to_string()))
        );
    }

    #[test]
    fn test_malformed_attributes() {
        assert_eq!(split_attribute(":no_separator"), None);
        assert_eq!(split_attribute(":empty_value ="), None);
        assert_eq!(split_attribute(": = value"), None);
    }

    #[test]
    fn test_extract_uses_profile() {
        let profile = MetadataProfile::new(vec![ProfileEntry {
            name: "ptt".to_string(),
            group: "tag".to_string(),
            value_type: AttributeType::Int,
        }]);
        let extractor = GlobalAttributeExtractor::new(&profile);

        let ptt = extractor.extract(":ptt = 57441").unwrap();
        assert_eq!(ptt.group, "tag");
        assert_eq!(ptt.declared_type, AttributeType::Int);

        let other = extractor.extract(":species = \"Thunnus orientalis\"").unwrap();
        assert_eq!(other.value, "Thunnus orientalis");
        assert_eq!(other.group, ROOT_GROUP);

        assert!(matches!(
            extractor.extract(":broken"),
            Err(LineError::MalformedAttribute(_))
        ));
    }
}
