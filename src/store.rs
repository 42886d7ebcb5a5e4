//! Named schema persistence.
//!
//! The editor only hands this layer compiled documents and reads them back;
//! documents are stored exactly as `compile` produced them.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::path_de;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSchema {
    pub id: Uuid,
    pub name: String,
    pub document: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaPatch {
    pub name: Option<String>,
    pub document: Option<Value>,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, page_size: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

pub trait SchemaStore {
    fn create(&mut self, name: &str, document: Value) -> Result<StoredSchema>;
    fn update(&mut self, id: Uuid, patch: SchemaPatch) -> Result<StoredSchema>;
    fn get(&self, id: Uuid) -> Result<StoredSchema>;
    /// Newest first, by last update.
    fn list(&self, pagination: Pagination) -> Result<Page<StoredSchema>>;
    fn delete(&mut self, id: Uuid) -> Result<()>;
}

// ————————————————————————————————————————————————————————————————————————————
// SHARED HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn ensure_document(document: &Value) -> Result<()> {
    if !document.is_object() {
        bail!("a schema document must be a JSON object");
    }
    Ok(())
}

fn new_record(name: &str, document: Value) -> Result<StoredSchema> {
    ensure_document(&document)?;
    let now = Utc::now();
    Ok(StoredSchema {
        id: Uuid::new_v4(),
        name: name.to_string(),
        document,
        created_at: now,
        updated_at: now,
    })
}

fn apply_patch(record: &mut StoredSchema, patch: SchemaPatch) -> Result<()> {
    if let Some(document) = &patch.document {
        ensure_document(document)?;
    }
    if let Some(name) = patch.name {
        record.name = name;
    }
    if let Some(document) = patch.document {
        record.document = document;
    }
    record.updated_at = Utc::now();
    Ok(())
}

fn paginate(mut records: Vec<StoredSchema>, pagination: Pagination) -> Page<StoredSchema> {
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.name.cmp(&b.name)));
    let page_size = pagination.page_size.max(1);
    let page = pagination.page.max(1);
    let total = records.len();
    let skip = (page - 1).saturating_mul(page_size);
    let items = records.into_iter().skip(skip).take(page_size).collect();
    Page { items, total, page, page_size, total_pages: total.div_ceil(page_size) }
}

// ————————————————————————————————————————————————————————————————————————————
// MEMORY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: IndexMap<Uuid, StoredSchema>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchemaStore for MemoryStore {
    fn create(&mut self, name: &str, document: Value) -> Result<StoredSchema> {
        let record = new_record(name, document)?;
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    fn update(&mut self, id: Uuid, patch: SchemaPatch) -> Result<StoredSchema> {
        let record = self.records.get_mut(&id).ok_or_else(|| anyhow!("no schema with id {id}"))?;
        apply_patch(record, patch)?;
        Ok(record.clone())
    }

    fn get(&self, id: Uuid) -> Result<StoredSchema> {
        self.records.get(&id).cloned().ok_or_else(|| anyhow!("no schema with id {id}"))
    }

    fn list(&self, pagination: Pagination) -> Result<Page<StoredSchema>> {
        Ok(paginate(self.records.values().cloned().collect(), pagination))
    }

    fn delete(&mut self, id: Uuid) -> Result<()> {
        self.records
            .shift_remove(&id)
            .map(|_| ())
            .ok_or_else(|| anyhow!("no schema with id {id}"))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DIRECTORY
// ————————————————————————————————————————————————————————————————————————————

/// One pretty-printed JSON file per schema, named `<id>.json`.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create store directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn read(&self, path: &Path) -> Result<StoredSchema> {
        let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        path_de::from_slice_with_path(&bytes).with_context(|| format!("corrupt schema file {}", path.display()))
    }

    fn write(&self, record: &StoredSchema) -> Result<()> {
        let path = self.path_for(record.id);
        let src = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, src).with_context(|| format!("failed to write {}", path.display()))?;
        debug!(id = %record.id, path = %path.display(), "wrote schema");
        Ok(())
    }
}

impl SchemaStore for DirStore {
    fn create(&mut self, name: &str, document: Value) -> Result<StoredSchema> {
        let record = new_record(name, document)?;
        self.write(&record)?;
        Ok(record)
    }

    fn update(&mut self, id: Uuid, patch: SchemaPatch) -> Result<StoredSchema> {
        let mut record = self.get(id)?;
        apply_patch(&mut record, patch)?;
        self.write(&record)?;
        Ok(record)
    }

    fn get(&self, id: Uuid) -> Result<StoredSchema> {
        let path = self.path_for(id);
        if !path.exists() {
            bail!("no schema with id {id}");
        }
        self.read(&path)
    }

    fn list(&self, pagination: Pagination) -> Result<Page<StoredSchema>> {
        // the root itself may contain glob metacharacters
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let pattern = Path::new(&root).join("*.json");
        let mut records = Vec::new();
        for entry in glob::glob(&pattern.to_string_lossy())? {
            records.push(self.read(&entry?)?);
        }
        Ok(paginate(records, pagination))
    }

    fn delete(&mut self, id: Uuid) -> Result<()> {
        let path = self.path_for(id);
        if !path.exists() {
            bail!("no schema with id {id}");
        }
        std::fs::remove_file(&path).with_context(|| format!("failed to delete {}", path.display()))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exercise(store: &mut dyn SchemaStore) {
        let a = store.create("alpha", json!({"type": "object", "properties": {}})).unwrap();
        let b = store.create("beta", json!({"type": "string"})).unwrap();
        assert!(store.create("bad", json!([1])).is_err());

        let updated = store
            .update(a.id, SchemaPatch { name: Some("alpha v2".into()), document: None })
            .unwrap();
        assert_eq!(updated.name, "alpha v2");
        assert_eq!(updated.document, a.document);
        assert!(updated.updated_at >= a.updated_at);
        assert!(store.update(a.id, SchemaPatch { name: None, document: Some(json!(3)) }).is_err());
        assert_eq!(store.get(a.id).unwrap().name, "alpha v2");

        let page = store.list(Pagination { page: 1, page_size: 1 }).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, a.id, "most recently updated first");
        let second = store.list(Pagination { page: 2, page_size: 1 }).unwrap();
        assert_eq!(second.items[0].id, b.id);
        assert!(store.list(Pagination { page: 3, page_size: 1 }).unwrap().items.is_empty());

        store.delete(b.id).unwrap();
        assert!(store.get(b.id).is_err());
        assert!(store.delete(b.id).is_err());
        assert_eq!(store.list(Pagination::default()).unwrap().total, 1);
    }

    #[test]
    fn memory_store_crud() {
        exercise(&mut MemoryStore::new());
    }

    #[test]
    fn dir_store_crud() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirStore::open(dir.path().join("schemas")).unwrap();
        exercise(&mut store);
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 1);
    }

    #[test]
    fn dir_store_root_with_glob_characters() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirStore::open(dir.path().join("team[1]*")).unwrap();
        let record = store.create("only", json!({"type": "null"})).unwrap();
        std::fs::create_dir_all(dir.path().join("team1x")).unwrap();
        std::fs::write(dir.path().join("team1x").join("stray.json"), "not json").unwrap();

        let page = store.list(Pagination::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, record.id);
    }

    #[test]
    fn huge_page_numbers_are_empty_not_overflowing() {
        let mut store = MemoryStore::new();
        store.create("a", json!({"type": "string"})).unwrap();
        let page = store.list(Pagination { page: usize::MAX, page_size: usize::MAX / 2 }).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn page_wire_shape() {
        let page = paginate(Vec::new(), Pagination::default());
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({"items": [], "total": 0, "page": 1, "pageSize": 20, "totalPages": 0})
        );
    }
}
