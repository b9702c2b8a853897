use crate::domain::model::{Query, Record, ID_FIELD};
use crate::domain::ports::{DocumentCollection, DocumentStore};
use crate::utils::error::{ModelError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::Mutex;

type Collections = Arc<Mutex<HashMap<String, Vec<Record>>>>;

/// 記憶體內的文件儲存，用於測試與 CLI
///
/// Understands the operators the mapper emits: plain equality, `$eq`,
/// `$ne`, `$lt`, `$lte`, `$gt`, `$gte`, `$regex` and `$and`. Identities are
/// 24 hex digits from a per-store counter.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Collections,
    next_id: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record as is, without identity handling.
    pub async fn push_raw(&self, collection: &str, record: Record) {
        let mut collections = self.collections.lock().await;
        collections.entry(collection.to_string()).or_default().push(record);
    }

    pub async fn records(&self, collection: &str) -> Vec<Record> {
        let collections = self.collections.lock().await;
        collections.get(collection).cloned().unwrap_or_default()
    }
}

impl DocumentStore for MemoryStore {
    type Collection = MemoryCollection;

    fn collection(&self, name: &str) -> MemoryCollection {
        MemoryCollection {
            name: name.to_string(),
            collections: Arc::clone(&self.collections),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    collections: Collections,
    next_id: Arc<AtomicU64>,
}

impl MemoryCollection {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    async fn find(&self, query: &Query, limit: Option<usize>, skip: usize) -> Result<Vec<Record>> {
        let collections = self.collections.lock().await;
        let Some(records) = collections.get(&self.name) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        for record in records {
            if matches_query(record, &query.filter)? {
                found.push(record);
            }
        }
        Ok(found
            .into_iter()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn insert(&self, mut record: Record) -> Result<String> {
        let mut collections = self.collections.lock().await;
        let records = collections.entry(self.name.clone()).or_default();
        if let Some(id) = record.id().map(str::to_string) {
            match records.iter_mut().find(|r| r.id() == Some(id.as_str())) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
            return Ok(id);
        }
        let id = format!("{:024x}", self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1);
        record.insert(ID_FIELD, JsonValue::String(id.clone()));
        records.push(record);
        Ok(id)
    }
}

fn matches_query(record: &Record, filter: &Map<String, JsonValue>) -> Result<bool> {
    for (field, condition) in filter {
        let matched = if field == "$and" {
            let parts = condition.as_array().ok_or_else(|| ModelError::StoreError {
                message: "$and expects a list of filters".to_string(),
            })?;
            let mut all = true;
            for part in parts {
                let part = part.as_object().ok_or_else(|| ModelError::StoreError {
                    message: "$and expects a list of filters".to_string(),
                })?;
                if !matches_query(record, part)? {
                    all = false;
                    break;
                }
            }
            all
        } else {
            matches_field(record.get(field), condition)?
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_field(value: Option<&JsonValue>, condition: &JsonValue) -> Result<bool> {
    let operators = match condition {
        JsonValue::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map,
        _ => return Ok(value.is_some_and(|v| json_eq(v, condition))),
    };
    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => value.is_some_and(|v| json_eq(v, operand)),
            "$ne" => !value.is_some_and(|v| json_eq(v, operand)),
            "$lt" => compare(value, operand).is_some_and(Ordering::is_lt),
            "$lte" => compare(value, operand).is_some_and(Ordering::is_le),
            "$gt" => compare(value, operand).is_some_and(Ordering::is_gt),
            "$gte" => compare(value, operand).is_some_and(Ordering::is_ge),
            "$regex" => {
                let pattern = operand.as_str().ok_or_else(|| ModelError::StoreError {
                    message: "$regex expects a string".to_string(),
                })?;
                let regex = Regex::new(pattern).map_err(|e| ModelError::StoreError {
                    message: format!("invalid $regex {:?}: {}", pattern, e),
                })?;
                value.and_then(JsonValue::as_str).is_some_and(|s| regex.is_match(s))
            }
            other => {
                return Err(ModelError::StoreError {
                    message: format!("unsupported query operator {}", other),
                })
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(value: Option<&JsonValue>, operand: &JsonValue) -> Option<Ordering> {
    match (value?, operand) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
