use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// Identity field written by the store.
pub const ID_FIELD: &str = "_id";
/// Comma-joined lineage of the stored instance's class.
pub const TYPE_FIELD: &str = "_typename";

/// One stored document: field name to primitive, nested record or list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: HashMap<String, JsonValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.data.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: JsonValue) {
        self.data.insert(field.into(), value);
    }

    pub fn id(&self) -> Option<&str> {
        self.data.get(ID_FIELD).and_then(JsonValue::as_str)
    }

    pub fn type_tag(&self) -> Option<&JsonValue> {
        self.data.get(TYPE_FIELD)
    }

    pub fn into_json(self) -> JsonValue {
        JsonValue::Object(self.data.into_iter().collect())
    }

    /// Only JSON objects are records.
    pub fn from_json(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Object(map) => Some(Self {
                data: map.into_iter().collect(),
            }),
            _ => None,
        }
    }
}

/// A filter in the store's operator vocabulary, e.g.
/// `{"age": {"$gte": 18}, "_typename": {"$regex": "^person(,|$)"}}`.
/// Top-level fields are AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    pub filter: Map<String, JsonValue>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, condition: JsonValue) {
        self.filter.insert(field.into(), condition);
    }

    pub fn into_json(self) -> JsonValue {
        JsonValue::Object(self.filter)
    }
}
