//! TOML declaration of model classes, schemas and bindings.
//!
//! ```toml
//! [[models]]
//! name = "Person"
//! attributes = [
//!     { name = "first", type = "string" },
//!     { name = "last", type = "string", optional = true },
//! ]
//!
//! [[schemas]]
//! name = "person"
//! root = { tag = "person", attributes = [{ name = "first", type = "string", mandatory = true }] }
//!
//! [[bindings]]
//! schema = "person"
//! model = "Person"
//! ```

use crate::core::attribute::{AttributeDescriptor, ValueKind};
use crate::core::binder::Binder;
use crate::core::registry::{ModelClass, ModelRegistry};
use crate::core::schema::{AttributeNode, Container, Leaf, LeafList, RootNode, SchemaNode};
use crate::core::types::{parse_timestamp, ScalarType};
use crate::core::value::Value;
use crate::utils::error::{ModelError, Result};
use crate::utils::validation::{
    validate_cardinality, validate_identifier, validate_non_empty_string, validate_one_of,
    validate_required_field, validate_unique_names, Validate,
};
use crate::xml::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const SCALAR_TYPES: &[&str] = &["bool", "int", "double", "string", "timestamp"];
const ATTRIBUTE_TYPES: &[&str] = &["bool", "int", "double", "string", "timestamp", "reference", "sequence"];
const NODE_KINDS: &[&str] = &["leaf", "leaf-list", "container"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub schemas: Vec<SchemaDef>,
    #[serde(default)]
    pub bindings: Vec<BindingDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    pub extends: Option<String>,
    pub collection: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub r#type: String,
    /// Referenced class for `reference`, or for a `sequence` of references.
    pub class: Option<String>,
    /// Element type of a `sequence`.
    pub element: Option<String>,
    #[serde(default)]
    pub optional: bool,
    pub default: Option<toml::Value>,
    pub allow_none: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDef {
    pub name: String,
    /// Namespace URI applied to every element tag of the schema.
    pub namespace: Option<String>,
    pub root: NodeDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub tag: String,
    /// `leaf`, `leaf-list` or `container` (the default).
    pub kind: Option<String>,
    #[serde(flatten)]
    pub scalar: ScalarDef,
    #[serde(default)]
    pub mandatory: bool,
    pub min_elements: Option<usize>,
    pub max_elements: Option<usize>,
    #[serde(default)]
    pub unbounded: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeNodeDef>,
    #[serde(default)]
    pub elements: Vec<NodeDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeNodeDef {
    pub name: String,
    #[serde(flatten)]
    pub scalar: ScalarDef,
    #[serde(default)]
    pub mandatory: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScalarDef {
    pub r#type: Option<String>,
    pub pattern: Option<String>,
    pub min: Option<toml::Value>,
    pub max: Option<toml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingDef {
    pub schema: String,
    pub model: String,
    #[serde(default)]
    pub aliases: Vec<AliasDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasDef {
    /// Defaults to the bound model.
    pub model: Option<String>,
    pub attribute: String,
    pub tag: String,
}

impl Definitions {
    /// 從 TOML 檔案載入定義
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ModelError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析定義
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ModelError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CMS_NAMESPACE})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ModelError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn schema(&self, name: &str) -> Result<&SchemaDef> {
        self.schemas
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ModelError::MissingConfigError {
                field: format!("schemas.{}", name),
            })
    }

    /// Defines every model (in file order), builds every schema and binds
    /// them. The registry is shared with the returned binder.
    pub fn build(&self) -> Result<(Arc<ModelRegistry>, Binder)> {
        self.validate()?;

        let mut registry = ModelRegistry::new();
        for model in &self.models {
            registry.define(model.builder()?)?;
        }
        let registry = Arc::new(registry);

        let mut roots = HashMap::new();
        for schema in &self.schemas {
            roots.insert(schema.name.as_str(), schema.build()?);
        }

        let mut binder = Binder::new(Arc::clone(&registry));
        for binding in &self.bindings {
            let root = roots
                .get(binding.schema.as_str())
                .ok_or_else(|| ModelError::MissingConfigError {
                    field: format!("schemas.{}", binding.schema),
                })?;
            let bound = binder.bind(root, &binding.model)?;
            for alias in &binding.aliases {
                let model = alias.model.as_deref().unwrap_or(&binding.model);
                bound.alias(model, &alias.attribute, &alias.tag)?;
            }
        }

        tracing::info!(
            "📋 Loaded {} models, {} schemas, {} bindings",
            self.models.len(),
            self.schemas.len(),
            self.bindings.len()
        );
        Ok((registry, binder))
    }
}

impl ModelDef {
    fn builder(&self) -> Result<crate::core::registry::ClassBuilder> {
        let mut builder = ModelClass::builder(&self.name);
        if let Some(parent) = &self.extends {
            builder = builder.extends(parent);
        }
        if let Some(collection) = &self.collection {
            builder = builder.collection(collection);
        }
        for attribute in &self.attributes {
            builder = builder.attribute(&attribute.name, attribute.descriptor(&self.name)?);
        }
        Ok(builder)
    }
}

impl AttributeDef {
    fn field(&self, model: &str, key: &str) -> String {
        format!("models.{}.{}.{}", model, self.name, key)
    }

    fn kind(&self, model: &str) -> Result<ValueKind> {
        match self.r#type.as_str() {
            "reference" => {
                let class = validate_required_field(&self.field(model, "class"), &self.class)?;
                Ok(ValueKind::Reference(class.clone()))
            }
            "sequence" => {
                let element = match (&self.element, &self.class) {
                    (_, Some(class)) => ValueKind::Reference(class.clone()),
                    (Some(element), None) => scalar_kind(&self.field(model, "element"), element)?,
                    (None, None) => {
                        return Err(ModelError::MissingConfigError {
                            field: self.field(model, "element"),
                        })
                    }
                };
                Ok(ValueKind::sequence_of(element))
            }
            other => scalar_kind(&self.field(model, "type"), other),
        }
    }

    fn descriptor(&self, model: &str) -> Result<AttributeDescriptor> {
        let kind = self.kind(model)?;
        let mut descriptor = match &kind {
            ValueKind::Reference(class) => AttributeDescriptor::reference(class),
            ValueKind::Sequence(element) => AttributeDescriptor::sequence((**element).clone()),
            _ => AttributeDescriptor::new(kind.clone()),
        };
        if self.optional {
            descriptor = descriptor.optional();
        }
        if let Some(allow) = self.allow_none {
            descriptor = descriptor.allow_none(allow);
        }
        if let Some(default) = &self.default {
            descriptor = descriptor.default_value(toml_to_value(&self.field(model, "default"), &kind, default)?);
        }
        Ok(descriptor)
    }
}

fn scalar_kind(field: &str, name: &str) -> Result<ValueKind> {
    validate_one_of(field, name, SCALAR_TYPES)?;
    Ok(match name {
        "bool" => ValueKind::Bool,
        "int" => ValueKind::Int,
        "double" => ValueKind::Double,
        "timestamp" => ValueKind::Timestamp,
        _ => ValueKind::Str,
    })
}

fn toml_to_value(field: &str, kind: &ValueKind, value: &toml::Value) -> Result<Value> {
    let converted = match (kind, value) {
        (ValueKind::Bool, toml::Value::Boolean(b)) => Some(Value::Bool(*b)),
        (ValueKind::Int, toml::Value::Integer(i)) => Some(Value::Int(*i)),
        (ValueKind::Double, toml::Value::Float(d)) => Some(Value::Double(*d)),
        (ValueKind::Double, toml::Value::Integer(i)) => Some(Value::Double(*i as f64)),
        (ValueKind::Str, toml::Value::String(s)) => Some(Value::Str(s.clone())),
        (ValueKind::Timestamp, toml::Value::String(s)) => parse_timestamp(s).map(Value::Timestamp),
        (ValueKind::Timestamp, toml::Value::Datetime(d)) => parse_timestamp(&d.to_string()).map(Value::Timestamp),
        _ => None,
    };
    converted.ok_or_else(|| ModelError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: format!("not a {} value", kind),
    })
}

impl ScalarDef {
    fn build(&self, field: &str) -> Result<ScalarType> {
        let name = self.r#type.as_deref().unwrap_or("string");
        validate_one_of(&format!("{}.type", field), name, SCALAR_TYPES)?;
        let mut ty = match name {
            "bool" => ScalarType::Bool,
            "int" => ScalarType::Int,
            "double" => ScalarType::Double,
            "timestamp" => ScalarType::Timestamp,
            _ => ScalarType::Str,
        };
        if let Some(pattern) = &self.pattern {
            ty = ScalarType::pattern(ty, pattern)?;
        }
        if self.min.is_some() || self.max.is_some() {
            let bound = |key: &str, v: &Option<toml::Value>| -> Result<Option<Value>> {
                match v {
                    None => Ok(None),
                    Some(toml::Value::Integer(i)) => Ok(Some(Value::Int(*i))),
                    Some(toml::Value::Float(d)) => Ok(Some(Value::Double(*d))),
                    Some(other) => Err(ModelError::InvalidConfigValueError {
                        field: format!("{}.{}", field, key),
                        value: other.to_string(),
                        reason: "range bounds must be numbers".to_string(),
                    }),
                }
            };
            ty = ScalarType::bounded(ty, bound("min", &self.min)?, bound("max", &self.max)?);
        }
        Ok(ty)
    }
}

impl SchemaDef {
    pub fn build(&self) -> Result<RootNode> {
        let ns = match &self.namespace {
            Some(uri) => Namespace::new(uri),
            None => Namespace::local(),
        };
        match self.root.build(&ns, &format!("schemas.{}.root", self.name))? {
            SchemaNode::Container(container) => Ok(RootNode::new(container)),
            _ => Err(ModelError::InvalidConfigValueError {
                field: format!("schemas.{}.root.kind", self.name),
                value: self.root.kind.clone().unwrap_or_default(),
                reason: "the document element must be a container".to_string(),
            }),
        }
    }
}

impl NodeDef {
    fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("container")
    }

    fn build(&self, ns: &Namespace, field: &str) -> Result<SchemaNode> {
        let tag = ns.tag(&self.tag);
        let mut attributes = Vec::with_capacity(self.attributes.len());
        for attribute in &self.attributes {
            let mut node = AttributeNode::new(
                &attribute.name,
                attribute.scalar.build(&format!("{}.{}", field, attribute.name))?,
            );
            if attribute.mandatory {
                node = node.mandatory();
            }
            attributes.push(node);
        }

        let node = match self.kind() {
            "leaf" => {
                let mut leaf = Leaf::new(tag, self.scalar.build(field)?);
                if self.mandatory {
                    leaf = leaf.mandatory();
                }
                SchemaNode::from(attributes.into_iter().fold(leaf, Leaf::attribute))
            }
            "leaf-list" => {
                let mut list = LeafList::new(tag, self.scalar.build(field)?);
                if let Some(min) = self.min_elements {
                    list = list.min_elements(min);
                }
                if let Some(max) = self.max_elements {
                    list = list.max_elements(max);
                }
                SchemaNode::from(attributes.into_iter().fold(list, LeafList::attribute))
            }
            _ => {
                let mut container = Container::new(tag);
                if let Some(min) = self.min_elements {
                    container = container.min_elements(min);
                }
                if let Some(max) = self.max_elements {
                    container = container.max_elements(max);
                }
                if self.unbounded {
                    container = container.unbounded();
                }
                container = attributes.into_iter().fold(container, Container::attribute);
                for element in &self.elements {
                    container = container.element(element.build(ns, &format!("{}.{}", field, element.tag))?);
                }
                SchemaNode::from(container)
            }
        };
        Ok(node)
    }

    fn check(&self, field: &str) -> Result<()> {
        validate_non_empty_string(&format!("{}.tag", field), &self.tag)?;
        validate_one_of(&format!("{}.kind", field), self.kind(), NODE_KINDS)?;
        validate_cardinality(field, self.min_elements, self.max_elements)?;
        validate_unique_names(
            &format!("{}.attributes", field),
            self.attributes.iter().map(|a| a.name.as_str()),
        )?;
        if self.kind() != "container" && !self.elements.is_empty() {
            return Err(ModelError::ConfigValidationError {
                field: format!("{}.elements", field),
                message: format!("a {} cannot have child elements", self.kind()),
            });
        }
        for element in &self.elements {
            element.check(&format!("{}.{}", field, element.tag))?;
        }
        Ok(())
    }
}

impl Validate for Definitions {
    fn validate(&self) -> Result<()> {
        validate_unique_names("models", self.models.iter().map(|m| m.name.as_str()))?;
        validate_unique_names("schemas", self.schemas.iter().map(|s| s.name.as_str()))?;

        let mut defined: Vec<&str> = Vec::new();
        for model in &self.models {
            validate_identifier("models.name", &model.name)?;
            if let Some(parent) = &model.extends {
                if !defined.contains(&parent.as_str()) {
                    return Err(ModelError::ConfigValidationError {
                        field: format!("models.{}.extends", model.name),
                        message: format!("{} must be declared before {}", parent, model.name),
                    });
                }
            }
            validate_unique_names(
                &format!("models.{}.attributes", model.name),
                model.attributes.iter().map(|a| a.name.as_str()),
            )?;
            for attribute in &model.attributes {
                validate_identifier(&format!("models.{}.attributes", model.name), &attribute.name)?;
                validate_one_of(&attribute.field(&model.name, "type"), &attribute.r#type, ATTRIBUTE_TYPES)?;
            }
            defined.push(&model.name);
        }

        for model in &self.models {
            for attribute in &model.attributes {
                if let Some(class) = &attribute.class {
                    if !defined.contains(&class.as_str()) {
                        return Err(ModelError::ConfigValidationError {
                            field: attribute.field(&model.name, "class"),
                            message: format!("unknown model {}", class),
                        });
                    }
                }
            }
        }

        for schema in &self.schemas {
            schema.root.check(&format!("schemas.{}.root", schema.name))?;
        }

        for binding in &self.bindings {
            self.schema(&binding.schema)?;
            if !defined.contains(&binding.model.as_str()) {
                return Err(ModelError::ConfigValidationError {
                    field: format!("bindings.{}.model", binding.schema),
                    message: format!("unknown model {}", binding.model),
                });
            }
        }
        Ok(())
    }
}
