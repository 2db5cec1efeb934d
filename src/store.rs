use std::rc::Rc;

use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::error::{FinwiseError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Deep-merge into an existing document instead of replacing it.
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }
}

pub trait DocumentStore {
    fn get(&self, path: &str) -> Result<Option<Value>>;
    fn set(&self, path: &str, data: Value, options: SetOptions) -> Result<()>;
    /// Replace the given top-level fields of an existing document.
    /// Fails with `NotFound` when the document does not exist.
    fn update(&self, path: &str, data: Value) -> Result<()>;
    /// Create a document with a generated id in `collection`; returns the id.
    fn add(&self, collection: &str, data: Value) -> Result<String>;
    /// All documents directly inside `collection`, as `(id, data)` pairs ordered by id.
    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>>;
}

pub fn doc_path(segments: &[&str]) -> String {
    segments.join("/")
}

/// Split a document path into `(collection, id)`.
pub fn split_doc_path(path: &str) -> Result<(&str, &str)> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 2 || segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
        return Err(FinwiseError::Other(format!("Invalid document path: {path}")));
    }
    let idx = path.rfind('/').unwrap_or(0);
    Ok((&path[..idx], &path[idx + 1..]))
}

fn validate_collection(collection: &str) -> Result<()> {
    let segments: Vec<&str> = collection.split('/').collect();
    if segments.len() % 2 != 1 || segments.iter().any(|s| s.is_empty()) {
        return Err(FinwiseError::Other(format!("Invalid collection path: {collection}")));
    }
    Ok(())
}

fn into_object(data: Value, path: &str) -> Result<Map<String, Value>> {
    match data {
        Value::Object(map) => Ok(map),
        _ => Err(FinwiseError::Other(format!(
            "Document data for {path} must be a JSON object"
        ))),
    }
}

/// Deep-merge `incoming` into `target`: nested objects merge, everything else replaces.
pub fn merge_json(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => merge_json(existing, nested),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

pub struct LocalStore {
    conn: Rc<Connection>,
}

impl LocalStore {
    pub fn new(conn: Rc<Connection>) -> Self {
        Self { conn }
    }

    fn read(&self, path: &str) -> Result<Option<Map<String, Value>>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT data FROM documents WHERE path = ?1", [path], |r| r.get(0))
            .optional()?;
        match raw {
            Some(text) => Ok(Some(into_object(serde_json::from_str(&text)?, path)?)),
            None => Ok(None),
        }
    }

    fn write(&self, path: &str, collection: &str, data: &Map<String, Value>) -> Result<()> {
        let text = serde_json::to_string(data)?;
        self.conn.execute(
            "INSERT INTO documents (path, collection, data, updated_at) VALUES (?1, ?2, ?3, datetime('now')) \
             ON CONFLICT(path) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            rusqlite::params![path, collection, text],
        )?;
        Ok(())
    }
}

impl DocumentStore for LocalStore {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        split_doc_path(path)?;
        Ok(self.read(path)?.map(Value::Object))
    }

    fn set(&self, path: &str, data: Value, options: SetOptions) -> Result<()> {
        let (collection, _) = split_doc_path(path)?;
        let incoming = into_object(data, path)?;
        let merged = match (options.merge, self.read(path)?) {
            (true, Some(mut existing)) => {
                merge_json(&mut existing, incoming);
                existing
            }
            _ => incoming,
        };
        self.write(path, collection, &merged)?;
        log::debug!("set {path} (merge={})", options.merge);
        Ok(())
    }

    fn update(&self, path: &str, data: Value) -> Result<()> {
        let (collection, _) = split_doc_path(path)?;
        let incoming = into_object(data, path)?;
        let mut existing = self
            .read(path)?
            .ok_or_else(|| FinwiseError::NotFound(format!("No document to update: {path}")))?;
        for (key, value) in incoming {
            existing.insert(key, value);
        }
        self.write(path, collection, &existing)?;
        log::debug!("update {path}");
        Ok(())
    }

    fn add(&self, collection: &str, data: Value) -> Result<String> {
        validate_collection(collection)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = doc_path(&[collection, &id]);
        self.set(&path, data, SetOptions::default())?;
        Ok(id)
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        validate_collection(collection)?;
        let mut stmt = self
            .conn
            .prepare("SELECT path, data FROM documents WHERE collection = ?1 ORDER BY path")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([collection], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut docs = Vec::with_capacity(rows.len());
        for (path, text) in rows {
            let (_, id) = split_doc_path(&path)?;
            docs.push((id.to_string(), serde_json::from_str(&text)?));
        }
        Ok(docs)
    }
}
