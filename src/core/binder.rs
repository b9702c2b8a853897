//! Bidirectional model instance ↔ XML element transform.
//!
//! A [`SchemaBinding`] pairs the document element of a [`RootNode`] with a
//! model class. Both directions walk the schema (attribute nodes first,
//! then element nodes, in declared order) and match every schema child by
//! local tag, or by alias, to one attribute of the current object. Each
//! attribute can be matched once; a schema child without a partner is a
//! `SchemaMismatch`.
//!
//! An attribute that is absent from the instance, or holds none, is still
//! consumed by its schema child and simply produces no output.

use crate::core::attribute::{AttributeDescriptor, ValueKind};
use crate::core::instance::ModelInstance;
use crate::core::registry::{ModelClass, ModelRegistry};
use crate::core::schema::{element_text, Container, RootNode, SchemaNode, ValidationIssue};
use crate::core::types::ScalarType;
use crate::core::value::Value;
use crate::domain::ports::Converter;
use crate::utils::error::{ModelError, Result};
use crate::xml::{local_name, Element};
use std::collections::HashMap;
use std::sync::Arc;

/// `(declaring class, attribute name)`
type AttributeKey = (String, String);

fn key_of(descriptor: &AttributeDescriptor) -> AttributeKey {
    (descriptor.declared_by().to_string(), descriptor.name().to_string())
}

/// One schema root bound to one model class, plus per-attribute overrides.
pub struct SchemaBinding {
    root: RootNode,
    class: Arc<ModelClass>,
    registry: Arc<ModelRegistry>,
    aliases: HashMap<AttributeKey, String>,
    converters: HashMap<AttributeKey, Arc<dyn Converter>>,
}

impl SchemaBinding {
    pub fn class(&self) -> &Arc<ModelClass> {
        &self.class
    }

    pub fn root(&self) -> &RootNode {
        &self.root
    }

    /// Matches `attribute` of `class` to schema children with local tag
    /// `tag` instead of the attribute's own name.
    /// Fails with `SchemaMismatch` when the tag is already the match name
    /// of another attribute of `class`.
    pub fn alias(&mut self, class: &str, attribute: &str, tag: &str) -> Result<&mut Self> {
        let key = self.resolve(class, attribute)?;
        let tag = local_name(tag).to_string();
        let model = self.registry.class(class)?;
        for descriptor in model.attributes(true) {
            let other = key_of(descriptor);
            if other != key && self.match_name(descriptor) == tag {
                return Err(ModelError::SchemaMismatch {
                    tag,
                    class: model.name().to_string(),
                    reason: format!("alias for {} collides with attribute {}", attribute, descriptor.name()),
                });
            }
        }
        self.aliases.insert(key, tag);
        Ok(self)
    }

    pub fn converter(
        &mut self,
        class: &str,
        attribute: &str,
        converter: Arc<dyn Converter>,
    ) -> Result<&mut Self> {
        let key = self.resolve(class, attribute)?;
        self.converters.insert(key, converter);
        Ok(self)
    }

    fn resolve(&self, class: &str, attribute: &str) -> Result<AttributeKey> {
        let class = self.registry.class(class)?;
        Ok(key_of(class.require(attribute)?))
    }

    fn match_name(&self, descriptor: &AttributeDescriptor) -> String {
        self.aliases
            .get(&key_of(descriptor))
            .cloned()
            .unwrap_or_else(|| descriptor.name().to_string())
    }

    /// Match name → attribute index for every attribute of `class`.
    /// A subclass attribute can still collide with an ancestor's alias.
    fn unconsumed(&self, class: &ModelClass) -> Result<HashMap<String, usize>> {
        let mut unconsumed = HashMap::new();
        for (index, descriptor) in class.attributes(true).iter().enumerate() {
            let name = self.match_name(descriptor);
            if unconsumed.insert(name.clone(), index).is_some() {
                return Err(ModelError::SchemaMismatch {
                    tag: name,
                    class: class.name().to_string(),
                    reason: "two attributes share this match name".to_string(),
                });
            }
        }
        Ok(unconsumed)
    }

    fn take<'c>(
        &self,
        unconsumed: &mut HashMap<String, usize>,
        class: &'c ModelClass,
        tag: &str,
    ) -> Result<&'c AttributeDescriptor> {
        match unconsumed.remove(local_name(tag)) {
            Some(index) => Ok(&class.attributes(true)[index]),
            None => Err(ModelError::SchemaMismatch {
                tag: tag.to_string(),
                class: class.name().to_string(),
                reason: "no unconsumed attribute matches this schema node".to_string(),
            }),
        }
    }

    /// Effective value after `convert_from`; none when absent or none.
    fn outgoing(&self, instance: &ModelInstance, descriptor: &AttributeDescriptor) -> Result<Option<Value>> {
        let value = match instance.try_get(descriptor.name())? {
            None | Some(Value::Null) => return Ok(None),
            Some(value) => value.clone(),
        };
        match self.converters.get(&key_of(descriptor)) {
            Some(converter) => converter.convert_from(value).map(Some),
            None => Ok(Some(value)),
        }
    }

    fn incoming(&self, instance: &mut ModelInstance, descriptor: &AttributeDescriptor, value: Value) -> Result<()> {
        let value = match self.converters.get(&key_of(descriptor)) {
            Some(converter) => converter.convert_to(value)?,
            None => value,
        };
        instance.set(descriptor.name(), value)
    }

    fn write_object(&self, instance: &ModelInstance, container: &Container, element: &mut Element) -> Result<()> {
        let class = instance.class();
        let mut unconsumed = self.unconsumed(class)?;

        for node in container.attributes() {
            let descriptor = self.take(&mut unconsumed, class, node.name())?;
            check_scalar(node.name(), class, descriptor)?;
            if let Some(value) = self.outgoing(instance, descriptor)? {
                element.set(node.name(), encode(node.scalar_type(), node.name(), &value)?);
            }
        }

        for node in container.elements() {
            let descriptor = self.take(&mut unconsumed, class, node.tag())?;
            check_shape(node, class, descriptor)?;
            let value = self.outgoing(instance, descriptor)?;
            match (node, value) {
                (_, None) => {}
                (SchemaNode::Leaf(leaf), Some(value)) => {
                    let text = encode(leaf.scalar_type(), node.tag(), &value)?;
                    element.append(Element::new(node.tag()).with_text(text));
                }
                (SchemaNode::LeafList(list), Some(value)) => {
                    for item in items(node.tag(), class, &value)? {
                        let text = encode(list.scalar_type(), node.tag(), item)?;
                        element.append(Element::new(node.tag()).with_text(text));
                    }
                }
                (SchemaNode::Container(nested), Some(Value::Model(model))) => {
                    let mut child = Element::new(nested.tag());
                    self.write_object(&model, nested, &mut child)?;
                    element.append(child);
                }
                (SchemaNode::Container(nested), Some(value)) => {
                    for item in items(node.tag(), class, &value)? {
                        let model = item.as_model().ok_or_else(|| ModelError::SchemaMismatch {
                            tag: node.tag().to_string(),
                            class: class.name().to_string(),
                            reason: format!("expected a model, got {}", item.kind_name()),
                        })?;
                        let mut child = Element::new(nested.tag());
                        self.write_object(model, nested, &mut child)?;
                        element.append(child);
                    }
                }
            }
        }
        Ok(())
    }

    fn read_object(&self, class: &Arc<ModelClass>, container: &Container, element: &Element) -> Result<ModelInstance> {
        let mut instance = ModelInstance::empty(class);
        let mut unconsumed = self.unconsumed(class)?;

        for node in container.attributes() {
            let descriptor = self.take(&mut unconsumed, class, node.name())?;
            check_scalar(node.name(), class, descriptor)?;
            if let Some(text) = element.get(node.name()) {
                let tag = format!("{}[{}]", element.tag(), node.name());
                let value = decode(node.scalar_type(), &tag, text)?;
                self.incoming(&mut instance, descriptor, value)?;
            }
        }

        for node in container.elements() {
            let descriptor = self.take(&mut unconsumed, class, node.tag())?;
            check_shape(node, class, descriptor)?;
            let mut children = element.children().iter().filter(|c| c.tag() == node.tag()).peekable();
            if children.peek().is_none() {
                continue;
            }
            let value = match node {
                SchemaNode::Leaf(leaf) => match children.next() {
                    Some(child) => decode(leaf.scalar_type(), node.tag(), element_text(child))?,
                    None => continue,
                },
                SchemaNode::LeafList(list) => Value::List(
                    children
                        .map(|child| decode(list.scalar_type(), node.tag(), element_text(child)))
                        .collect::<Result<Vec<_>>>()?,
                ),
                SchemaNode::Container(nested) => {
                    let nested_class = match descriptor.kind().model_class() {
                        Some(name) => self.registry.class(name)?,
                        None => continue,
                    };
                    match descriptor.kind() {
                        ValueKind::Reference(_) => match children.next() {
                            Some(child) => Value::from(self.read_object(&nested_class, nested, child)?),
                            None => continue,
                        },
                        _ => Value::List(
                            children
                                .map(|child| self.read_object(&nested_class, nested, child).map(Value::from))
                                .collect::<Result<Vec<_>>>()?,
                        ),
                    }
                }
            };
            self.incoming(&mut instance, descriptor, value)?;
        }

        instance.finalize()?;
        Ok(instance)
    }
}

fn mismatch(tag: &str, class: &ModelClass, descriptor: &AttributeDescriptor, expected: &str) -> ModelError {
    ModelError::SchemaMismatch {
        tag: tag.to_string(),
        class: class.name().to_string(),
        reason: format!("{} is {}, schema needs {}", descriptor.name(), descriptor.kind(), expected),
    }
}

fn check_scalar(tag: &str, class: &ModelClass, descriptor: &AttributeDescriptor) -> Result<()> {
    if descriptor.kind().is_scalar() {
        Ok(())
    } else {
        Err(mismatch(tag, class, descriptor, "a scalar"))
    }
}

fn check_shape(node: &SchemaNode, class: &ModelClass, descriptor: &AttributeDescriptor) -> Result<()> {
    let fits = match (node, descriptor.kind()) {
        (SchemaNode::Leaf(_), kind) => kind.is_scalar(),
        (SchemaNode::LeafList(_), ValueKind::Sequence(element)) => element.is_scalar(),
        (SchemaNode::LeafList(_), _) => false,
        (SchemaNode::Container(_), kind) => kind.model_class().is_some(),
    };
    if fits {
        return Ok(());
    }
    let expected = match node {
        SchemaNode::Leaf(_) => "a scalar",
        SchemaNode::LeafList(_) => "a sequence of scalars",
        SchemaNode::Container(_) => "a model reference or a sequence of models",
    };
    Err(mismatch(node.tag(), class, descriptor, expected))
}

fn items<'v>(tag: &str, class: &ModelClass, value: &'v Value) -> Result<&'v [Value]> {
    value.as_list().ok_or_else(|| ModelError::SchemaMismatch {
        tag: tag.to_string(),
        class: class.name().to_string(),
        reason: format!("expected a sequence, got {}", value.kind_name()),
    })
}

fn encode(ty: &ScalarType, tag: &str, value: &Value) -> Result<String> {
    ty.encode(value).map_err(|_| ModelError::InvalidValue {
        tag: tag.to_string(),
        text: value.to_string(),
    })
}

fn decode(ty: &ScalarType, tag: &str, text: &str) -> Result<Value> {
    if !ty.validate(text) {
        return Err(ModelError::InvalidValue {
            tag: tag.to_string(),
            text: text.to_string(),
        });
    }
    ty.decode(text).map_err(|_| ModelError::InvalidValue {
        tag: tag.to_string(),
        text: text.to_string(),
    })
}

/// 管理所有 schema 與 model class 的對應
pub struct Binder {
    registry: Arc<ModelRegistry>,
    bindings: Vec<SchemaBinding>,
}

impl Binder {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            bindings: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn bindings(&self) -> &[SchemaBinding] {
        &self.bindings
    }

    /// Binds the document element of `root` to `class`. When several
    /// bindings fit an instance or element, the first registered wins.
    pub fn bind(&mut self, root: &RootNode, class: &str) -> Result<&mut SchemaBinding> {
        let class = self.registry.class(class)?;
        tracing::debug!(
            "Binding {} to model class {}",
            root.document_element().tag(),
            class.name()
        );
        self.bindings.push(SchemaBinding {
            root: root.clone(),
            class,
            registry: Arc::clone(&self.registry),
            aliases: HashMap::new(),
            converters: HashMap::new(),
        });
        let last = self.bindings.len() - 1;
        Ok(&mut self.bindings[last])
    }

    fn binding_for_class(&self, class: &str) -> Result<&SchemaBinding> {
        self.bindings
            .iter()
            .find(|b| b.class.name() == class)
            .ok_or_else(|| ModelError::MissingBinding {
                target: format!("model class {}", class),
            })
    }

    fn binding_for_tag(&self, tag: &str) -> Result<&SchemaBinding> {
        self.bindings
            .iter()
            .find(|b| b.root.document_element().tag() == tag)
            .ok_or_else(|| ModelError::MissingBinding {
                target: format!("element {}", tag),
            })
    }

    pub fn to_element(&self, instance: &ModelInstance) -> Result<Element> {
        let binding = self.binding_for_class(instance.class_name())?;
        let container = binding.root.document_element();
        tracing::debug!("Serializing {} as {}", instance.class_name(), container.tag());
        let mut element = Element::new(container.tag());
        binding.write_object(instance, container, &mut element)?;
        Ok(element)
    }

    /// Builds a finalized instance; nested objects are finalized before
    /// they are attached to their parent.
    pub fn from_element(&self, element: &Element) -> Result<ModelInstance> {
        let binding = self.binding_for_tag(element.tag())?;
        tracing::debug!("Deserializing {} as {}", element.tag(), binding.class.name());
        binding.read_object(&binding.class, binding.root.document_element(), element)
    }

    /// Schema validation for the root bound to this element's tag.
    pub fn validate(&self, element: &Element) -> Result<Vec<ValidationIssue>> {
        let binding = self.binding_for_tag(element.tag())?;
        Ok(binding.root.validate(element))
    }
}
