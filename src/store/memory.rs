//! In-memory implementation of the REST adapter contract. Backs demos and
//! the test suite with the same query semantics a JSON REST backend provides.

use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ModelError, ValidationErrors};
use crate::logic::predicate;
use crate::model::{get_path, item_id, Id, Item, ModelSchema, QueryOption, Wheres};
use crate::store::{QueryPage, RestAdapter};

pub struct MemoryAdapter {
    schema: Arc<ModelSchema>,
    rows: RwLock<Vec<Item>>,
}

impl MemoryAdapter {
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        Self { schema, rows: RwLock::new(Vec::new()) }
    }

    pub fn with_rows(schema: Arc<ModelSchema>, rows: Vec<Item>) -> Self {
        Self { schema, rows: RwLock::new(rows) }
    }

    fn not_found(&self, id: &Id) -> ModelError {
        ModelError::NotFound(format!("{}/{}", self.schema.resource, id))
    }

    /// Required-field check. Full saves demand every required field; partial
    /// saves only reject supplied fields that null out a requirement.
    fn validate(&self, item: &Item, partial: bool) -> Result<(), ModelError> {
        let mut errors = ValidationErrors::default();
        for field in &self.schema.required {
            let value = item.get(field);
            let missing = matches!(value, Some(Value::Null))
                || matches!(value, Some(Value::String(s)) if s.is_empty())
                || (value.is_none() && !partial);
            if missing {
                errors.insert(field.clone(), "is required");
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ModelError::Validation(errors))
        }
    }

    fn sort_rows(rows: &mut [Item], sort: &str) {
        let (field, descending) = match sort.strip_prefix('-') {
            Some(field) => (field, true),
            None => (sort, false),
        };
        rows.sort_by(|a, b| {
            let ordering = compare_values(get_path(a, field), get_path(b, field));
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Shallow merge of `patch` fields over `base`.
fn merge_partial(base: &Item, patch: &Item) -> Item {
    let mut merged = base.clone();
    if let (Some(target), Some(fields)) = (merged.as_object_mut(), patch.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    merged
}

#[async_trait::async_trait]
impl RestAdapter for MemoryAdapter {
    async fn get(&self, id: &Id) -> Result<Item, ModelError> {
        self.rows
            .read()
            .iter()
            .find(|row| item_id(row).as_deref() == Some(id.as_str()))
            .cloned()
            .ok_or_else(|| self.not_found(id))
    }

    async fn query(&self, option: &QueryOption, wheres: &Wheres) -> Result<QueryPage, ModelError> {
        let mut filtered: Vec<Item> = self
            .rows
            .read()
            .iter()
            .filter(|row| predicate::matches(row, wheres))
            .cloned()
            .collect();
        if let Some(sort) = &option.sort {
            Self::sort_rows(&mut filtered, sort);
        }
        let total = filtered.len() as u64;
        let items: Vec<Item> = filtered
            .into_iter()
            .skip(option.skip as usize)
            .take(option.limit as usize)
            .collect();
        Ok(QueryPage { items, total })
    }

    async fn save(&self, item: &Item, partial: bool) -> Result<Item, ModelError> {
        self.validate(item, partial)?;
        let mut rows = self.rows.write();
        match item_id(item) {
            Some(id) => {
                let position = rows
                    .iter()
                    .position(|row| item_id(row).as_deref() == Some(id.as_str()));
                match position {
                    Some(index) => {
                        let stored = if partial {
                            merge_partial(&rows[index], item)
                        } else {
                            item.clone()
                        };
                        rows[index] = stored.clone();
                        Ok(stored)
                    }
                    None if partial => Err(self.not_found(&id)),
                    None => {
                        rows.push(item.clone());
                        Ok(item.clone())
                    }
                }
            }
            None => {
                let mut created = item.clone();
                if let Some(obj) = created.as_object_mut() {
                    obj.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
                }
                rows.push(created.clone());
                Ok(created)
            }
        }
    }

    async fn delete(&self, id: &Id) -> Result<(), ModelError> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|row| item_id(row).as_deref() != Some(id.as_str()));
        if rows.len() == before {
            return Err(self.not_found(id));
        }
        Ok(())
    }
}
