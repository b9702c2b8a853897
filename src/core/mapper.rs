//! Model instance ↔ document record transform.
//!
//! Every record carries `_typename`, the comma-joined lowercased lineage of
//! its class, so one collection can hold a whole class hierarchy. Queries
//! for a class are restricted with a prefix regex on that tag, which also
//! matches every subclass. `_id` is only ever written by the store.

use crate::core::attribute::{Condition, Operator, ValueKind};
use crate::core::instance::ModelInstance;
use crate::core::registry::{ModelClass, ModelRegistry};
use crate::core::types::parse_timestamp;
use crate::core::value::Value;
use crate::domain::model::{Query, Record, ID_FIELD, TYPE_FIELD};
use crate::domain::ports::{DocumentCollection, DocumentStore};
use crate::utils::error::{ModelError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub struct Mapper<S: DocumentStore> {
    store: S,
    registry: Arc<ModelRegistry>,
    tags: HashMap<String, Arc<ModelClass>>,
    collections: RwLock<HashMap<String, Arc<S::Collection>>>,
}

impl<S: DocumentStore> Mapper<S> {
    pub fn new(store: S, registry: Arc<ModelRegistry>) -> Self {
        let tags = registry
            .classes()
            .map(|class| (class.type_tag(), Arc::clone(class)))
            .collect();
        Self {
            store,
            registry,
            tags,
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cached per collection name; a lost race just builds the same handle twice.
    fn collection(&self, class: &ModelClass) -> Arc<S::Collection> {
        let name = class.collection();
        if let Some(handle) = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Arc::clone(handle);
        }
        let handle = Arc::new(self.store.collection(name));
        let mut cache = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(name.to_string()).or_insert(handle))
    }

    /// Writes the instance and attaches the identity the store assigned.
    pub async fn save(&self, instance: &mut ModelInstance) -> Result<String> {
        instance.finalize()?;
        let record = self.encode_record(instance)?;
        let collection = self.collection(instance.class());
        let id = collection.insert(record).await?;
        tracing::info!(
            "Saved {} as {} in collection {}",
            instance.class_name(),
            id,
            instance.class().collection()
        );
        instance.set_id(id.clone());
        Ok(id)
    }

    /// Instances of `class` or any subclass matching every condition.
    pub async fn find(
        &self,
        class: &str,
        conditions: &[Condition],
        limit: Option<usize>,
        skip: usize,
    ) -> Result<Vec<ModelInstance>> {
        let class = self.registry.class(class)?;
        let query = self.query_for(&class, conditions)?;
        tracing::debug!("find {}: {}", class.name(), query.clone().into_json());
        let records = self.collection(&class).find(&query, limit, skip).await?;
        records
            .iter()
            .map(|record| self.decode_stored(record, class.collection()))
            .collect()
    }

    pub async fn get(&self, class: &str, id: &str) -> Result<ModelInstance> {
        let class = self.registry.class(class)?;
        let mut query = self.query_for(&class, &[])?;
        query.insert(ID_FIELD, json!(id));
        let mut records = self.collection(&class).find(&query, Some(2), 0).await?;
        match records.len() {
            0 => Err(ModelError::UnknownIdentity {
                class: class.name().to_string(),
                id: id.to_string(),
            }),
            1 => self.decode_stored(&records.remove(0), class.collection()),
            _ => Err(ModelError::AmbiguousIdentity {
                class: class.name().to_string(),
                id: id.to_string(),
            }),
        }
    }

    /// Store filter for `class` and its subclasses, AND-combined with the
    /// conditions. A field constrained more than once goes into `$and`.
    pub fn query_for(&self, class: &ModelClass, conditions: &[Condition]) -> Result<Query> {
        let mut clauses: Vec<(String, JsonValue)> = vec![(
            TYPE_FIELD.to_string(),
            json!({ "$regex": format!("^{}(,|$)", regex::escape(&class.type_tag())) }),
        )];
        for condition in conditions {
            let name = condition.attribute.name();
            class.require(name)?;
            let value = encode_value(class.name(), name, &condition.value)?;
            let clause = match condition.operator {
                Operator::Eq => value,
                Operator::Ne => json!({ "$ne": value }),
                Operator::Lt => json!({ "$lt": value }),
                Operator::Le => json!({ "$lte": value }),
                Operator::Gt => json!({ "$gt": value }),
                Operator::Ge => json!({ "$gte": value }),
            };
            clauses.push((name.to_string(), clause));
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (field, _) in &clauses {
            *counts.entry(field.as_str()).or_default() += 1;
        }
        let repeated: Vec<String> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(field, _)| field.to_string())
            .collect();

        let mut query = Query::new();
        let mut conjunction = Vec::new();
        for (field, clause) in clauses {
            if repeated.contains(&field) {
                conjunction.push(json!({ field: clause }));
            } else {
                query.insert(field, clause);
            }
        }
        if !conjunction.is_empty() {
            query.insert("$and", JsonValue::Array(conjunction));
        }
        Ok(query)
    }

    /// Record for the instance, including `_id` once it has one.
    pub fn encode_record(&self, instance: &ModelInstance) -> Result<Record> {
        let mut record = encode_object(instance)?;
        if let Some(id) = instance.id() {
            record.insert(ID_FIELD, json!(id));
        }
        Ok(record)
    }

    /// Rebuilds the concrete class named by the record's type tag.
    pub fn decode_record(&self, record: &Record) -> Result<ModelInstance> {
        self.decode_stored(record, "<record>")
    }

    fn decode_stored(&self, record: &Record, collection: &str) -> Result<ModelInstance> {
        let mut instance = self.decode_object(record, collection)?;
        if let Some(id) = record.id() {
            instance.set_id(id.to_string());
        }
        Ok(instance)
    }

    fn resolve(&self, record: &Record, collection: &str) -> Result<&Arc<ModelClass>> {
        let tag = match record.type_tag() {
            Some(JsonValue::String(tag)) => tag,
            _ => {
                return Err(ModelError::MissingTypeTag {
                    collection: collection.to_string(),
                })
            }
        };
        self.tags
            .get(tag)
            .ok_or_else(|| ModelError::UnknownTypeTag { tag: tag.clone() })
    }

    fn decode_object(&self, record: &Record, collection: &str) -> Result<ModelInstance> {
        let class = self.resolve(record, collection)?;
        let mut instance = ModelInstance::empty(class);
        for descriptor in class.attributes(true) {
            let value = match record.get(descriptor.name()) {
                None => continue,
                Some(JsonValue::Null) if descriptor.allows_none() => Value::Null,
                // none for a sequence: leave it to the default
                Some(JsonValue::Null) => continue,
                Some(json) => self.decode_value(class, descriptor.name(), descriptor.kind(), json)?,
            };
            instance.set(descriptor.name(), value)?;
        }
        instance.finalize()?;
        Ok(instance)
    }

    fn decode_value(&self, class: &ModelClass, attribute: &str, kind: &ValueKind, json: &JsonValue) -> Result<Value> {
        let invalid = || ModelError::InvalidRecord {
            class: class.name().to_string(),
            attribute: attribute.to_string(),
            reason: format!("expected {}, got {}", kind, json),
        };
        match kind {
            ValueKind::Bool => json.as_bool().map(Value::Bool).ok_or_else(invalid),
            ValueKind::Int => json.as_i64().map(Value::Int).ok_or_else(invalid),
            ValueKind::Double => json.as_f64().map(Value::Double).ok_or_else(invalid),
            ValueKind::Str => json.as_str().map(Value::from).ok_or_else(invalid),
            ValueKind::Timestamp => json
                .as_str()
                .and_then(parse_timestamp)
                .map(Value::Timestamp)
                .ok_or_else(invalid),
            ValueKind::Reference(_) => {
                let nested = Record::from_json(json.clone()).ok_or_else(invalid)?;
                let instance = self.decode_object(&nested, class.collection())?;
                Ok(Value::from(instance))
            }
            ValueKind::Sequence(element) => json
                .as_array()
                .ok_or_else(invalid)?
                .iter()
                .map(|item| self.decode_value(class, attribute, element, item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
        }
    }
}

/// Embedded sub-records keep their type tag but never an identity.
fn encode_object(instance: &ModelInstance) -> Result<Record> {
    let class = instance.class();
    let mut record = Record::new();
    record.insert(TYPE_FIELD, JsonValue::String(class.type_tag()));
    for (descriptor, value) in instance.values() {
        record.insert(descriptor.name(), encode_value(class.name(), descriptor.name(), value)?);
    }
    Ok(record)
}

fn encode_value(class: &str, attribute: &str, value: &Value) -> Result<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => json!(i),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(JsonValue::Number)
            .ok_or_else(|| ModelError::InvalidRecord {
                class: class.to_string(),
                attribute: attribute.to_string(),
                reason: format!("{} cannot be stored", d),
            })?,
        Value::Str(s) => JsonValue::String(s.clone()),
        Value::Timestamp(t) => JsonValue::String(record_timestamp(t)),
        Value::Model(instance) => encode_object(instance)?.into_json(),
        Value::List(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| encode_value(class, attribute, item))
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

/// Always nine fractional digits, so stored strings sort in time order.
fn record_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
