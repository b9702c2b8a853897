use crate::core::attribute::AttributeDescriptor;
use crate::utils::error::{ModelError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A frozen model class.
///
/// The attribute list is computed once, when the class is defined: the
/// class's own descriptors in declaration order, then the inherited ones
/// (nearest ancestor first). A redeclared name shadows the inherited
/// descriptor. Instances index their value slots by position in this list.
#[derive(Debug)]
pub struct ModelClass {
    name: String,
    parent: Option<String>,
    lineage: Vec<String>,
    collection: String,
    own_count: usize,
    fields: Vec<String>,
    attributes: Vec<AttributeDescriptor>,
}

impl ModelClass {
    pub fn builder(name: &str) -> ClassBuilder {
        ClassBuilder {
            name: name.to_string(),
            parent: None,
            collection: None,
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Class names from the root ancestor down to this class.
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    pub fn is_a(&self, class: &str) -> bool {
        self.lineage.iter().any(|name| name == class)
    }

    /// Comma-joined, lowercased lineage; a prefix of every subclass's tag.
    pub fn type_tag(&self) -> String {
        self.lineage
            .iter()
            .map(|name| name.to_lowercase())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Own descriptors, or own plus inherited when `recurse` is set.
    pub fn attributes(&self, recurse: bool) -> &[AttributeDescriptor] {
        if recurse {
            &self.attributes
        } else {
            &self.attributes[..self.own_count]
        }
    }

    /// Resolves an attribute by its name, or by the field it was declared
    /// under when the two differ.
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|a| a.name() == key)
            .or_else(|| self.fields.iter().position(|f| f == key))
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeDescriptor> {
        self.index_of(key).map(|i| &self.attributes[i])
    }

    /// Like [`attribute`](Self::attribute) but failing with the class name
    /// in the error.
    pub fn require(&self, key: &str) -> Result<&AttributeDescriptor> {
        self.attribute(key).ok_or_else(|| ModelError::UnknownAttribute {
            class: self.name.clone(),
            attribute: key.to_string(),
        })
    }
}

pub struct ClassBuilder {
    name: String,
    parent: Option<String>,
    collection: Option<String>,
    attributes: Vec<(String, AttributeDescriptor)>,
}

impl ClassBuilder {
    pub fn extends(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    /// Overrides the collection name, which otherwise is the lowercased
    /// name of the root ancestor.
    pub fn collection(mut self, name: &str) -> Self {
        self.collection = Some(name.to_string());
        self
    }

    pub fn attribute(mut self, field: &str, descriptor: AttributeDescriptor) -> Self {
        self.attributes.push((field.to_string(), descriptor));
        self
    }
}

/// Owns every defined model class. Built once at start-up, then shared
/// read-only (behind an `Arc`) by binders and mappers.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    classes: HashMap<String, Arc<ModelClass>>,
    order: Vec<String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, builder: ClassBuilder) -> Result<Arc<ModelClass>> {
        let ClassBuilder {
            name,
            parent,
            collection,
            attributes,
        } = builder;

        if self.classes.contains_key(&name) {
            return Err(ModelError::DuplicateClass { name });
        }

        let parent_class = match &parent {
            Some(parent) => Some(self.class(parent)?),
            None => None,
        };

        let mut fields = Vec::with_capacity(attributes.len());
        let mut frozen: Vec<AttributeDescriptor> = Vec::with_capacity(attributes.len());
        for (field, descriptor) in attributes {
            let descriptor = descriptor.freeze(&field, &name);
            if frozen.iter().any(|d| d.name() == descriptor.name()) {
                return Err(ModelError::InvalidConfigValueError {
                    field: format!("{}.attributes", name),
                    value: descriptor.name().to_string(),
                    reason: "attribute declared more than once".to_string(),
                });
            }
            fields.push(field);
            frozen.push(descriptor);
        }
        let own_count = frozen.len();

        let mut lineage = Vec::new();
        if let Some(parent) = &parent_class {
            lineage.extend(parent.lineage.iter().cloned());
            for (field, inherited) in parent.fields.iter().zip(&parent.attributes) {
                if !frozen[..own_count].iter().any(|d| d.name() == inherited.name()) {
                    fields.push(field.clone());
                    frozen.push(inherited.clone());
                }
            }
        }
        lineage.push(name.clone());

        let collection = collection
            .or_else(|| parent_class.as_ref().map(|p| p.collection.clone()))
            .unwrap_or_else(|| name.to_lowercase());

        let class = Arc::new(ModelClass {
            name: name.clone(),
            parent,
            lineage,
            collection,
            own_count,
            fields,
            attributes: frozen,
        });

        tracing::debug!(
            "Defined model class {} ({} attributes, tag {})",
            class.name,
            class.attributes.len(),
            class.type_tag()
        );
        self.order.push(name.clone());
        self.classes.insert(name, Arc::clone(&class));
        Ok(class)
    }

    pub fn class(&self, name: &str) -> Result<Arc<ModelClass>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownClass {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Classes in definition order.
    pub fn classes(&self) -> impl Iterator<Item = &Arc<ModelClass>> {
        self.order.iter().filter_map(|name| self.classes.get(name))
    }

    pub fn get_attributes(&self, class: &str, recurse: bool) -> Result<Vec<AttributeDescriptor>> {
        Ok(self.class(class)?.attributes(recurse).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry
            .define(
                ModelClass::builder("Base")
                    .attribute("first_name", AttributeDescriptor::string())
                    .attribute("nick", AttributeDescriptor::string().optional()),
            )
            .unwrap();
        registry
            .define(
                ModelClass::builder("SuperBase")
                    .extends("Base")
                    .attribute("last_name", AttributeDescriptor::string()),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_attributes_own_then_inherited() {
        let registry = registry();
        let class = registry.class("SuperBase").unwrap();
        let own: Vec<_> = class.attributes(false).iter().map(|a| a.name()).collect();
        assert_eq!(own, vec!["last_name"]);
        let all: Vec<_> = class.attributes(true).iter().map(|a| a.name()).collect();
        assert_eq!(all, vec!["last_name", "first_name", "nick"]);
        assert_eq!(class.attribute("first_name").unwrap().declared_by(), "Base");
    }

    #[test]
    fn test_lineage_and_type_tag() {
        let registry = registry();
        let class = registry.class("SuperBase").unwrap();
        assert_eq!(class.type_tag(), "base,superbase");
        assert!(class.is_a("Base"));
        assert!(!registry.class("Base").unwrap().is_a("SuperBase"));
        assert_eq!(class.collection(), "base");
    }

    #[test]
    fn test_redeclared_attribute_shadows_parent() {
        let mut registry = registry();
        let class = registry
            .define(
                ModelClass::builder("Nicked")
                    .extends("Base")
                    .attribute("nick", AttributeDescriptor::string()),
            )
            .unwrap();
        let all: Vec<_> = class.attributes(true).iter().map(|a| a.name()).collect();
        assert_eq!(all, vec!["nick", "first_name"]);
        assert!(!class.attribute("nick").unwrap().is_optional());
    }

    #[test]
    fn test_define_rejects_duplicates_and_unknown_parents() {
        let mut registry = registry();
        assert!(matches!(
            registry.define(ModelClass::builder("Base")),
            Err(ModelError::DuplicateClass { .. })
        ));
        assert!(matches!(
            registry.define(ModelClass::builder("Orphan").extends("Nobody")),
            Err(ModelError::UnknownClass { .. })
        ));
        assert!(registry
            .define(
                ModelClass::builder("Twice")
                    .attribute("a", AttributeDescriptor::integer())
                    .attribute("a", AttributeDescriptor::integer())
            )
            .is_err());
    }

    #[test]
    fn test_explicit_name_and_field_lookup() {
        let mut registry = ModelRegistry::new();
        let class = registry
            .define(
                ModelClass::builder("Clip")
                    .collection("clips")
                    .attribute("source", AttributeDescriptor::string().named("src")),
            )
            .unwrap();
        assert_eq!(class.attribute("src").unwrap().name(), "src");
        assert_eq!(class.attribute("source").unwrap().name(), "src");
        assert_eq!(class.collection(), "clips");
        assert!(class.require("nope").is_err());
    }
}
