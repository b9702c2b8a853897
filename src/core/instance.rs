use crate::core::attribute::{AttributeDescriptor, TypedList, ValueKind};
use crate::core::registry::ModelClass;
use crate::core::value::Value;
use crate::utils::error::{ModelError, Result};
use std::fmt;
use std::sync::Arc;

/// An object of a [`ModelClass`].
///
/// Values live in slots indexed like the class's frozen attribute list and
/// are only changed through [`set`](Self::set) or a [`TypedList`], both of
/// which type-check first.
#[derive(Clone)]
pub struct ModelInstance {
    class: Arc<ModelClass>,
    slots: Vec<Option<Value>>,
    id: Option<String>,
    finalized: bool,
}

impl ModelInstance {
    /// Keyword construction followed by finalize.
    pub fn new<I, K, V>(class: &Arc<ModelClass>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut instance = Self::deferred(class, values)?;
        instance.finalize()?;
        Ok(instance)
    }

    /// Keyword construction without finalize; required attributes may
    /// still be filled in before calling [`finalize`](Self::finalize).
    pub fn deferred<I, K, V>(class: &Arc<ModelClass>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut instance = Self::empty(class);
        for (key, value) in values {
            instance.set(key.as_ref(), value)?;
        }
        Ok(instance)
    }

    pub fn empty(class: &Arc<ModelClass>) -> Self {
        Self {
            class: Arc::clone(class),
            slots: vec![None; class.attributes(true).len()],
            id: None,
            finalized: false,
        }
    }

    pub fn class(&self) -> &Arc<ModelClass> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Checks that every required attribute resolves to a value.
    pub fn finalize(&mut self) -> Result<()> {
        for (index, descriptor) in self.class.attributes(true).iter().enumerate() {
            if self.slots[index].is_none() && descriptor.default().is_none() && !descriptor.is_optional() {
                return Err(ModelError::AttributeMissing {
                    class: self.class.name().to_string(),
                    attribute: descriptor.name().to_string(),
                });
            }
        }
        self.finalized = true;
        Ok(())
    }

    fn index(&self, key: &str) -> Result<usize> {
        self.class.index_of(key).ok_or_else(|| ModelError::UnknownAttribute {
            class: self.class.name().to_string(),
            attribute: key.to_string(),
        })
    }

    /// Stored value, else the default, else `AttributeMissing`.
    pub fn get(&self, key: &str) -> Result<&Value> {
        let index = self.index(key)?;
        self.value_at(index).ok_or_else(|| ModelError::AttributeMissing {
            class: self.class.name().to_string(),
            attribute: self.class.attributes(true)[index].name().to_string(),
        })
    }

    /// Like [`get`](Self::get) but an unset attribute without default is
    /// `Ok(None)` rather than an error.
    pub fn try_get(&self, key: &str) -> Result<Option<&Value>> {
        let index = self.index(key)?;
        Ok(self.value_at(index))
    }

    fn value_at(&self, index: usize) -> Option<&Value> {
        self.slots[index]
            .as_ref()
            .or_else(|| self.class.attributes(true)[index].default())
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.index(key)?;
        let value = value.into();
        self.class.attributes(true)[index].check_value(self.class.name(), &value)?;
        self.slots[index] = Some(value);
        Ok(())
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.class
            .index_of(key)
            .map(|index| self.slots[index].is_some())
            .unwrap_or(false)
    }

    /// Type-checked handle on a sequence attribute. An unset or none
    /// sequence starts out empty.
    pub fn sequence_mut(&mut self, key: &str) -> Result<TypedList<'_>> {
        let index = self.index(key)?;
        let descriptor: &AttributeDescriptor = &self.class.attributes(true)[index];
        if !matches!(descriptor.kind(), ValueKind::Sequence(_)) {
            return Err(ModelError::TypeMismatch {
                class: self.class.name().to_string(),
                attribute: descriptor.name().to_string(),
                reason: format!("{} is not a sequence", descriptor.kind()),
            });
        }
        let slot = &mut self.slots[index];
        if !matches!(slot, Some(Value::List(_))) {
            *slot = Some(Value::List(Vec::new()));
        }
        match slot {
            Some(Value::List(items)) => Ok(TypedList::new(self.class.name(), descriptor, items)),
            _ => unreachable!("slot was just initialised to a list"),
        }
    }

    /// `(descriptor, effective value)` pairs in attribute order; attributes
    /// with neither a value nor a default are skipped.
    pub fn values(&self) -> impl Iterator<Item = (&AttributeDescriptor, &Value)> {
        self.class
            .attributes(true)
            .iter()
            .enumerate()
            .filter_map(|(index, descriptor)| self.value_at(index).map(|value| (descriptor, value)))
    }
}

impl PartialEq for ModelInstance {
    /// Structural equality: same class and same effective values. Identity
    /// and construction state are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.class.name() == other.class.name()
            && (0..self.slots.len()).all(|index| self.value_at(index) == other.value_at(index))
    }
}

impl fmt::Display for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.class.name())?;
        for (i, (descriptor, value)) in self.values().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}={}", sep, descriptor.name(), value)?;
        }
        write!(f, ">")
    }
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<(&str, &Value)> = self.values().map(|(d, v)| (d.name(), v)).collect();
        f.debug_struct("ModelInstance")
            .field("class", &self.class.name())
            .field("id", &self.id)
            .field("values", &values)
            .finish()
    }
}
