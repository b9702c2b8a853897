use crate::adapters::memory_store::MemoryStore;
use crate::config::definitions::Definitions;
use crate::core::binder::Binder;
use crate::core::mapper::Mapper;
use crate::core::schema::ValidationIssue;
use crate::domain::model::Record;
use crate::utils::error::{ModelError, Result};
use crate::xml;

/// Binder and mapper built from one set of definitions, sharing a registry.
///
/// Records are only encoded and decoded here, so the mapper's store is an
/// in-memory one that never receives a write.
pub struct Workspace {
    binder: Binder,
    mapper: Mapper<MemoryStore>,
}

impl Workspace {
    pub fn from_definitions(definitions: &Definitions) -> Result<Self> {
        let (registry, binder) = definitions.build()?;
        let mapper = Mapper::new(MemoryStore::new(), registry);
        Ok(Self { binder, mapper })
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    pub fn mapper(&self) -> &Mapper<MemoryStore> {
        &self.mapper
    }

    /// Schema issues of an XML document; an empty list means it conforms.
    pub fn validate_document(&self, source: &str) -> Result<Vec<ValidationIssue>> {
        let element = xml::parse(source)?;
        self.binder.validate(&element)
    }

    /// XML document → instance → record.
    pub fn to_record(&self, source: &str) -> Result<Record> {
        let element = xml::parse(source)?;
        let instance = self.binder.from_element(&element)?;
        tracing::debug!("Decoded {}", instance);
        self.mapper.encode_record(&instance)
    }

    /// JSON record → instance → XML document.
    pub fn from_record(&self, source: &str, indent: bool) -> Result<String> {
        let json: serde_json::Value = serde_json::from_str(source)?;
        let record = Record::from_json(json).ok_or_else(|| ModelError::InvalidRecord {
            class: "<record>".to_string(),
            attribute: "<root>".to_string(),
            reason: "expected a JSON object".to_string(),
        })?;
        let instance = self.mapper.decode_record(&record)?;
        tracing::debug!("Decoded {}", instance);
        let element = self.binder.to_element(&instance)?;
        xml::to_string(&element, indent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PERSON: &str = r#"
[[models]]
name = "Person"
attributes = [
    { name = "first", type = "string" },
    { name = "last", type = "string", optional = true },
    { name = "born", type = "timestamp", optional = true },
]

[[schemas]]
name = "person"

[schemas.root]
tag = "person"
attributes = [
    { name = "first", mandatory = true },
    { name = "last" },
    { name = "born", type = "timestamp" },
]

[[bindings]]
schema = "person"
model = "Person"
"#;

    fn workspace() -> Workspace {
        Workspace::from_definitions(&Definitions::from_toml_str(PERSON).unwrap()).unwrap()
    }

    #[test]
    fn test_xml_to_record_and_back() {
        let workspace = workspace();
        let source = r#"<person first="Joe" born="1990-05-01T12:00:00.5Z"/>"#;
        let record = workspace.to_record(source).unwrap();
        assert_eq!(
            record.clone().into_json(),
            json!({"_typename": "person", "first": "Joe", "born": "1990-05-01T12:00:00.500000000Z"})
        );

        let text = serde_json::to_string(&record).unwrap();
        let back = workspace.from_record(&text, false).unwrap();
        assert_eq!(back, r#"<person first="Joe" born="1990-05-01T12:00:00.500Z"/>"#);
    }

    #[test]
    fn test_validate_document_reports_missing_attribute() {
        let issues = workspace().validate_document(r#"<person last="Doe"/>"#).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].to_string(), "person[first]: attribute missing");
    }

    #[test]
    fn test_from_record_rejects_non_object() {
        let err = workspace().from_record("[1, 2]", false).unwrap_err();
        assert!(matches!(err, ModelError::InvalidRecord { .. }));
        let err = workspace().from_record("{not json", false).unwrap_err();
        assert!(matches!(err, ModelError::SerializationError(_)));
    }
}
