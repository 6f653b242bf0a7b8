//! Record edits on collection resources.
//!
//! Records are JSON objects keyed by a numeric `id`. Edits happen on the
//! whole in-memory collection, which the store then writes back as one file.

use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, StoreError};
use crate::resource::Resource;

/// Numeric id of a record, if it has one
pub fn record_id(record: &Value) -> Option<u64> {
    record.get("id").and_then(Value::as_u64)
}

/// Time-based id that does not collide with any existing record
///
/// Fails once the highest existing id leaves no room above it.
pub fn next_id(records: &[Value]) -> Result<u64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    match records.iter().filter_map(record_id).max() {
        Some(max) if max >= now => max.checked_add(1).ok_or_else(|| StoreError::InvalidRecord {
            message: format!("no id left above {}", max),
        }),
        _ => Ok(now),
    }
}

/// Append a record, assigning an id when it has none
///
/// Returns the record as stored.
pub fn insert(resource: Resource, records: &mut Vec<Value>, mut record: Value) -> Result<Value> {
    let id = match record_id(&record) {
        Some(id) => id,
        None => next_id(records)?,
    };

    let fields = record.as_object_mut().ok_or_else(|| StoreError::InvalidRecord {
        message: format!("{} records must be JSON objects", resource),
    })?;

    if records.iter().any(|r| record_id(r) == Some(id)) {
        return Err(StoreError::InvalidRecord {
            message: format!("{} already contains a record with id {}", resource, id),
        });
    }

    fields.insert("id".to_string(), Value::from(id));
    records.push(record.clone());
    Ok(record)
}

/// Shallow-merge `partial` into the record with `id`
///
/// The id itself is never overwritten. Returns the merged record.
pub fn merge(resource: Resource, records: &mut [Value], id: u64, partial: Value) -> Result<Value> {
    let Value::Object(changes) = partial else {
        return Err(StoreError::InvalidRecord {
            message: "record updates must be JSON objects".to_string(),
        });
    };

    let target = records
        .iter_mut()
        .find(|r| record_id(r) == Some(id))
        .ok_or_else(|| not_found(resource, id))?;

    let fields = target.as_object_mut().ok_or_else(|| StoreError::InvalidRecord {
        message: format!("record {} in {} is not a JSON object", id, resource),
    })?;

    for (key, value) in changes {
        if key != "id" {
            fields.insert(key, value);
        }
    }

    Ok(target.clone())
}

/// Remove the record with `id`, returning it
pub fn remove(resource: Resource, records: &mut Vec<Value>, id: u64) -> Result<Value> {
    let index = records
        .iter()
        .position(|r| record_id(r) == Some(id))
        .ok_or_else(|| not_found(resource, id))?;
    Ok(records.remove(index))
}

fn not_found(resource: Resource, id: u64) -> StoreError {
    StoreError::RecordNotFound {
        resource: resource.name().to_string(),
        id,
    }
}
