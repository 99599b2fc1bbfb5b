/* 📖 # Why an IdentityStore trait on StoreHandle?

Plural and singular handlers need the same small set of record operations: look a
record up by id, insert with a generated id, replace, merge, remove. Defining them
once as a capability of the store handle keeps the handlers free of array index
bookkeeping and gives every mutation the same persist-after-success behaviour
through `StoreHandle::mutate`.
*/

use serde_json::{Map, Value};
use tracing::debug;

use mockrest_base::{ErrorKind, MockrestResult};

use crate::config::Options;
use crate::document::{Document, Record, json_type_name};
use crate::inflect;
use crate::store::StoreHandle;

/// Identity-keyed record operations on the collections of a document.
///
/// Ids coming from paths are strings; they match records whose id is the same
/// string or a number/boolean with that textual form (`"1"` matches `1`).
pub trait IdentityStore {
    /// The record of `collection` with the given id.
    fn find_by_id(&self, collection: &str, id: &str) -> Option<Value>;

    /// Append a record, generating an id if it has none. Fails on a duplicate id.
    fn insert(&self, collection: &str, record: Value) -> MockrestResult<Value>;

    /// Replace all fields of a record, keeping its id. None if no record matched.
    fn replace_by_id(&self, collection: &str, id: &str, record: Value)
    -> MockrestResult<Option<Value>>;

    /// Merge fields into a record, keeping its id. None if no record matched.
    fn update_by_id(&self, collection: &str, id: &str, patch: Value)
    -> MockrestResult<Option<Value>>;

    /// Remove a record, returning it. None if no record matched.
    fn remove_by_id(&self, collection: &str, id: &str) -> MockrestResult<Option<Value>>;

    /// Remove records whose foreign keys point at parents that no longer exist.
    /// Returns the number of removed records.
    fn remove_dependents(&self, options: &Options) -> MockrestResult<usize>;
}

impl IdentityStore for StoreHandle {
    fn find_by_id(&self, collection: &str, id: &str) -> Option<Value> {
        let id_field = self.id_field();
        self.read(|document| {
            document
                .collection(collection)
                .and_then(|records| find_record(records, id_field, id))
                .cloned()
        })
    }

    fn insert(&self, collection: &str, record: Value) -> MockrestResult<Value> {
        let id_field = self.id_field().to_string();
        self.mutate(|document| {
            let records = collection_mut(document, collection)?;
            let mut record = into_record(collection, record)?;
            match record.get(&id_field) {
                Some(id) if !id.is_null() => {
                    if records
                        .iter()
                        .any(|existing| existing.get(&id_field).is_some_and(|e| same_id(e, id)))
                    {
                        return Err(ErrorKind::DuplicateId {
                            collection: collection.to_string(),
                            id: id_string(id),
                        }
                        .into());
                    }
                }
                _ => {
                    let id = create_id(records, &id_field);
                    record.insert(id_field.clone(), id);
                }
            }
            let record = Value::Object(record);
            records.push(record.clone());
            debug!(collection, "inserted record");
            Ok(record)
        })
    }

    fn replace_by_id(
        &self,
        collection: &str,
        id: &str,
        record: Value,
    ) -> MockrestResult<Option<Value>> {
        let id_field = self.id_field().to_string();
        self.mutate(|document| {
            let mut replacement = into_record(collection, record)?;
            let records = collection_mut(document, collection)?;
            let Some(existing) = find_record_mut(records, &id_field, id) else {
                return Ok(None);
            };
            if let Some(existing_id) = existing.get(&id_field).cloned() {
                replacement.insert(id_field, existing_id);
            }
            *existing = Value::Object(replacement);
            Ok(Some(existing.clone()))
        })
    }

    fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> MockrestResult<Option<Value>> {
        let id_field = self.id_field().to_string();
        self.mutate(|document| {
            let patch = into_record(collection, patch)?;
            let records = collection_mut(document, collection)?;
            let Some(existing) = find_record_mut(records, &id_field, id) else {
                return Ok(None);
            };
            if let Value::Object(fields) = existing {
                for (key, value) in patch {
                    if key != id_field {
                        fields.insert(key, value);
                    }
                }
            }
            Ok(Some(existing.clone()))
        })
    }

    fn remove_by_id(&self, collection: &str, id: &str) -> MockrestResult<Option<Value>> {
        let id_field = self.id_field().to_string();
        self.mutate(|document| {
            let records = collection_mut(document, collection)?;
            let position = records.iter().position(|record| {
                record
                    .get(&id_field)
                    .is_some_and(|record_id| id_matches(record_id, id))
            });
            Ok(position.map(|index| records.remove(index)))
        })
    }

    fn remove_dependents(&self, options: &Options) -> MockrestResult<usize> {
        let id_field = self.id_field().to_string();
        self.mutate(|document| {
            let orphans = removable(document, options, &id_field);
            for (collection, id) in &orphans {
                if let Some(records) = document.collection_mut(collection) {
                    records.retain(|record| {
                        !record
                            .get(&id_field)
                            .is_some_and(|record_id| id_matches(record_id, id))
                    });
                }
            }
            if !orphans.is_empty() {
                debug!(count = orphans.len(), "removed dependent records");
            }
            Ok(orphans.len())
        })
    }
}

fn collection_mut<'a>(
    document: &'a mut Document,
    collection: &str,
) -> MockrestResult<&'a mut Vec<Value>> {
    document
        .collection_mut(collection)
        .ok_or_else(|| mockrest_base::err!("\"{}\" is not a collection", collection))
}

fn into_record(collection: &str, value: Value) -> MockrestResult<Record> {
    match value {
        Value::Object(record) => Ok(record),
        other => Err(mockrest_base::err!(
            "A record of \"{}\" must be a JSON object, got {}",
            collection,
            json_type_name(&other)
        )),
    }
}

/// Find the record with the given id in a list of records.
pub fn find_record<'a>(records: &'a [Value], id_field: &str, id: &str) -> Option<&'a Value> {
    records.iter().find(|record| {
        record
            .get(id_field)
            .is_some_and(|record_id| id_matches(record_id, id))
    })
}

fn find_record_mut<'a>(
    records: &'a mut [Value],
    id_field: &str,
    id: &str,
) -> Option<&'a mut Value> {
    records.iter_mut().find(|record| {
        record
            .get(id_field)
            .is_some_and(|record_id| id_matches(record_id, id))
    })
}

/// Textual form of an id value: strings as-is, other scalars via JSON.
pub fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a record id matches an id given as text.
pub fn id_matches(record_id: &Value, id: &str) -> bool {
    match record_id {
        Value::String(s) => s == id,
        Value::Number(_) | Value::Bool(_) => record_id.to_string() == id,
        _ => false,
    }
}

/// Whether two id values identify the same record.
pub fn same_id(a: &Value, b: &Value) -> bool {
    !b.is_null() && id_matches(a, &id_string(b))
}

/// Next id for a collection: one above the largest integer id, or a random
/// 7 character string once any id is not an integer. An empty collection starts at 1.
pub fn create_id(records: &[Value], id_field: &str) -> Value {
    let ids: Vec<&Value> = records
        .iter()
        .filter_map(|record| record.get(id_field))
        .collect();
    if ids.is_empty() {
        return Value::from(1);
    }
    let integers: Option<Vec<i64>> = ids.iter().map(|id| id.as_i64()).collect();
    match integers.and_then(|ids| ids.into_iter().max()) {
        Some(max) => Value::from(max + 1),
        None => Value::String(nanoid::nanoid!(7)),
    }
}

/// Case-insensitive substring search over every scalar leaf of `value`.
///
/// `q` must already be lowercase. Empty strings, zero, false and null never match.
pub fn deep_query(value: &Value, q: &str) -> bool {
    if q.is_empty() {
        return false;
    }
    match value {
        Value::Array(items) => items.iter().any(|item| deep_query(item, q)),
        Value::Object(fields) => fields.values().any(|field| deep_query(field, q)),
        Value::String(s) => s.to_lowercase().contains(q),
        Value::Number(n) => n.as_f64() != Some(0.0) && n.to_string().contains(q),
        Value::Bool(true) => "true".contains(q),
        Value::Bool(false) | Value::Null => false,
    }
}

/// Records whose foreign key (`{singular}{suffix}`) references a missing parent
/// in an existing parent collection, as (collection, id) pairs.
pub fn removable(document: &Document, options: &Options, id_field: &str) -> Vec<(String, String)> {
    let suffix = options.foreign_key_suffix.as_str();
    if suffix.is_empty() {
        return Vec::new();
    }
    let mut orphans = Vec::new();
    for (collection, entry) in document.iter() {
        let Some(records) = entry.as_array() else {
            continue;
        };
        for record in records {
            let Some(fields) = record.as_object() else {
                continue;
            };
            let orphaned = fields.iter().any(|(key, value)| {
                let Some(stem) = key.strip_suffix(suffix).filter(|stem| !stem.is_empty()) else {
                    return false;
                };
                document
                    .collection(&inflect::plural(stem))
                    .is_some_and(|parents| {
                        !parents
                            .iter()
                            .any(|parent| parent.get(id_field).is_some_and(|id| same_id(id, value)))
                    })
            });
            if let (true, Some(id)) = (orphaned, record.get(id_field)) {
                orphans.push((collection.clone(), id_string(id)));
            }
        }
    }
    orphans
}

/// An empty JSON object.
pub fn empty_object() -> Value {
    Value::Object(Map::new())
}
