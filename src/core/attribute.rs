use crate::core::types::is_representable;
use crate::core::value::Value;
use crate::utils::error::{ModelError, Result};
use std::fmt;

/// What an attribute may hold.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Bool,
    Int,
    Double,
    Str,
    Timestamp,
    /// An instance of the named model class or one of its subclasses.
    Reference(String),
    /// Homogeneous ordered list of the element kind.
    Sequence(Box<ValueKind>),
}

impl ValueKind {
    pub fn sequence_of(element: ValueKind) -> Self {
        ValueKind::Sequence(Box::new(element))
    }

    /// `Null` is never accepted here; whether none is allowed is a
    /// property of the descriptor, not of the kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueKind::Bool, Value::Bool(_))
            | (ValueKind::Int, Value::Int(_))
            | (ValueKind::Double, Value::Double(_))
            | (ValueKind::Str, Value::Str(_)) => true,
            (ValueKind::Timestamp, Value::Timestamp(t)) => is_representable(t),
            (ValueKind::Reference(class), Value::Model(instance)) => instance.class().is_a(class),
            (ValueKind::Sequence(element), Value::List(items)) => {
                items.iter().all(|item| element.accepts(item))
            }
            _ => false,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, ValueKind::Reference(_) | ValueKind::Sequence(_))
    }

    /// The model class carried by a reference or a sequence of references.
    pub fn model_class(&self) -> Option<&str> {
        match self {
            ValueKind::Reference(class) => Some(class),
            ValueKind::Sequence(element) => element.model_class(),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::Double => write!(f, "double"),
            ValueKind::Str => write!(f, "string"),
            ValueKind::Timestamp => write!(f, "timestamp"),
            ValueKind::Reference(class) => write!(f, "reference<{}>", class),
            ValueKind::Sequence(element) => write!(f, "sequence<{}>", element),
        }
    }
}

/// Typed field definition of a model class.
///
/// Descriptors are built with the constructors below and frozen when the
/// declaring class is defined in a [`ModelRegistry`](crate::core::registry::ModelRegistry);
/// at that point a descriptor without an explicit name takes the name of
/// its field.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    name: Option<String>,
    kind: ValueKind,
    optional: bool,
    default: Option<Value>,
    allow_none: bool,
    declared_by: String,
}

impl AttributeDescriptor {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            name: None,
            kind,
            optional: false,
            default: None,
            allow_none: false,
            declared_by: String::new(),
        }
    }

    pub fn boolean() -> Self {
        Self::new(ValueKind::Bool)
    }

    pub fn integer() -> Self {
        Self::new(ValueKind::Int)
    }

    pub fn double() -> Self {
        Self::new(ValueKind::Double)
    }

    pub fn string() -> Self {
        Self::new(ValueKind::Str)
    }

    pub fn timestamp() -> Self {
        Self::new(ValueKind::Timestamp)
    }

    /// References default to none and admit none.
    pub fn reference(class: &str) -> Self {
        let mut descriptor = Self::new(ValueKind::Reference(class.to_string()));
        descriptor.default = Some(Value::Null);
        descriptor.allow_none = true;
        descriptor
    }

    /// Sequences default to none but reject an explicit none.
    pub fn sequence(element: ValueKind) -> Self {
        let mut descriptor = Self::new(ValueKind::sequence_of(element));
        descriptor.default = Some(Value::Null);
        descriptor
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn allow_none(mut self, allow: bool) -> Self {
        self.allow_none = allow;
        self
    }

    /// Called once by the registry while freezing the declaring class.
    pub(crate) fn freeze(mut self, field: &str, class: &str) -> Self {
        if self.name.is_none() {
            self.name = Some(field.to_string());
        }
        self.declared_by = class.to_string();
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn allows_none(&self) -> bool {
        self.allow_none
    }

    /// Name of the class that declared this attribute.
    pub fn declared_by(&self) -> &str {
        &self.declared_by
    }

    pub fn check_type(&self, value: &Value) -> bool {
        self.kind.accepts(value)
    }

    /// Admission check applied on every set.
    pub fn check_value(&self, class: &str, value: &Value) -> Result<()> {
        if value.is_null() {
            if self.allow_none {
                return Ok(());
            }
            return Err(ModelError::TypeMismatch {
                class: class.to_string(),
                attribute: self.name().to_string(),
                reason: "must not be None".to_string(),
            });
        }
        if let Value::Timestamp(t) = value {
            if !is_representable(t) {
                return Err(ModelError::TypeMismatch {
                    class: class.to_string(),
                    attribute: self.name().to_string(),
                    reason: format!("timestamp {} is outside years 0000-9999", t),
                });
            }
        }
        if !self.check_type(value) {
            return Err(ModelError::TypeMismatch {
                class: class.to_string(),
                attribute: self.name().to_string(),
                reason: format!("expected {}, got {}", self.kind, value.kind_name()),
            });
        }
        Ok(())
    }

    pub fn lt(&self, value: impl Into<Value>) -> Condition {
        Condition::new(self, Operator::Lt, value)
    }

    pub fn le(&self, value: impl Into<Value>) -> Condition {
        Condition::new(self, Operator::Le, value)
    }

    pub fn eq(&self, value: impl Into<Value>) -> Condition {
        Condition::new(self, Operator::Eq, value)
    }

    pub fn ne(&self, value: impl Into<Value>) -> Condition {
        Condition::new(self, Operator::Ne, value)
    }

    pub fn gt(&self, value: impl Into<Value>) -> Condition {
        Condition::new(self, Operator::Gt, value)
    }

    pub fn ge(&self, value: impl Into<Value>) -> Condition {
        Condition::new(self, Operator::Ge, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

/// Declarative `(attribute, operator, value)` predicate; nothing is
/// evaluated until a mapper translates it into a store query.
#[derive(Debug, Clone)]
pub struct Condition {
    pub attribute: AttributeDescriptor,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(attribute: &AttributeDescriptor, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.clone(),
            operator,
            value: value.into(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute.name(), self.operator.symbol(), self.value)
    }
}

/// Mutable view of a sequence attribute; every element is checked against
/// the element kind before it is admitted.
pub struct TypedList<'a> {
    class: &'a str,
    descriptor: &'a AttributeDescriptor,
    items: &'a mut Vec<Value>,
}

impl<'a> TypedList<'a> {
    pub(crate) fn new(class: &'a str, descriptor: &'a AttributeDescriptor, items: &'a mut Vec<Value>) -> Self {
        Self {
            class,
            descriptor,
            items,
        }
    }

    fn check_element(&self, value: &Value) -> Result<()> {
        let accepted = match self.descriptor.kind() {
            ValueKind::Sequence(element) => element.accepts(value),
            _ => false,
        };
        if accepted {
            Ok(())
        } else {
            Err(ModelError::TypeMismatch {
                class: self.class.to_string(),
                attribute: self.descriptor.name().to_string(),
                reason: format!(
                    "{} element cannot hold {}",
                    self.descriptor.kind(),
                    value.kind_name()
                ),
            })
        }
    }

    pub fn append(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check_element(&value)?;
        self.items.push(value);
        Ok(())
    }

    /// Either every element is admitted or none is.
    pub fn extend<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        for value in &values {
            self.check_element(value)?;
        }
        self.items.extend(values);
        Ok(())
    }

    pub fn remove(&mut self, value: &Value) -> bool {
        match self.items.iter().position(|item| item == value) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_kinds_check_type() {
        assert!(AttributeDescriptor::integer().check_type(&Value::Int(1)));
        assert!(!AttributeDescriptor::integer().check_type(&Value::Str("1".into())));
        assert!(AttributeDescriptor::string().check_type(&Value::Str("x".into())));
        assert!(!AttributeDescriptor::double().check_type(&Value::Int(1)));
        assert!(AttributeDescriptor::boolean().check_type(&Value::Bool(false)));
        assert!(!AttributeDescriptor::timestamp().check_type(&Value::Null));
    }

    #[test]
    fn test_sequence_checks_every_element() {
        let seq = AttributeDescriptor::sequence(ValueKind::Int);
        assert!(seq.check_type(&Value::from(vec![1i64, 2, 3])));
        assert!(!seq.check_type(&Value::List(vec![Value::Int(1), Value::Str("2".into())])));
        assert!(!seq.check_type(&Value::Int(1)));
    }

    #[test]
    fn test_timestamp_beyond_year_9999_is_refused() {
        use chrono::{TimeZone, Utc};
        let at = AttributeDescriptor::timestamp().freeze("at", "Event");
        let far = Value::Timestamp(Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap());
        assert!(!at.check_type(&far));
        let err = at.check_value("Event", &far).unwrap_err();
        assert!(matches!(err, ModelError::TypeMismatch { ref reason, .. } if reason.contains("0000-9999")));

        let near = Value::Timestamp(Utc.with_ymd_and_hms(9999, 1, 1, 0, 0, 0).unwrap());
        assert!(at.check_value("Event", &near).is_ok());
    }

    #[test]
    fn test_none_admission() {
        let name = AttributeDescriptor::string().freeze("name", "Person");
        let err = name.check_value("Person", &Value::Null).unwrap_err();
        assert!(matches!(err, ModelError::TypeMismatch { ref attribute, .. } if attribute == "name"));

        let nick = AttributeDescriptor::string().allow_none(true).freeze("nick", "Person");
        assert!(nick.check_value("Person", &Value::Null).is_ok());
    }

    #[test]
    fn test_freeze_keeps_explicit_name() {
        let d = AttributeDescriptor::string().named("last_name").freeze("last", "Person");
        assert_eq!(d.name(), "last_name");
        assert_eq!(d.declared_by(), "Person");
        let d = AttributeDescriptor::string().freeze("first", "Person");
        assert_eq!(d.name(), "first");
    }

    #[test]
    fn test_comparison_builders_produce_conditions() {
        let age = AttributeDescriptor::integer().freeze("age", "Person");
        let cond = age.ge(18i64);
        assert_eq!(cond.operator, Operator::Ge);
        assert_eq!(cond.attribute.name(), "age");
        assert_eq!(cond.value, Value::Int(18));
        assert_eq!(cond.to_string(), "age >= 18");
        assert_eq!(age.ne(3i64).operator.symbol(), "!=");
    }

    #[test]
    fn test_typed_list_rejects_wrong_elements() {
        let tags = AttributeDescriptor::sequence(ValueKind::Str).freeze("tags", "Post");
        let mut items = Vec::new();
        let mut list = TypedList::new("Post", &tags, &mut items);
        list.append("a").unwrap();
        assert!(list.append(1i64).is_err());
        assert!(list.extend(vec![Value::from("b"), Value::Int(2)]).is_err());
        assert_eq!(list.len(), 1);
        list.extend(vec!["b", "c"]).unwrap();
        assert!(list.contains(&Value::from("c")));
        assert!(list.remove(&Value::from("a")));
        assert_eq!(list.iter().count(), 2);
    }
}
