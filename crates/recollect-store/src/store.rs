use std::path::Path;

use async_trait::async_trait;
use recollect_llm::cosine_distance;
use recollect_model::{ConsolidatedFact, Filter, MemoryFact};
use recollect_shared::{AppError, AppErrorKind};
use redb::{Database, ReadableTable, TableDefinition};

use crate::filter_match::matches_filter;
use crate::object::{ObjectClass, ScoredObject, StoredObject, StoredRecord};

/// Object table: `id (str) -> json(StoredRecord)`. A single table covers
/// both facts and consolidated facts — the tagged `StoredObject` enum is
/// what keeps them distinguishable (§4.5).
const OBJECTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");

/// The opaque vector-store contract the pipeline talks to: schema
/// bootstrap, insert, `NearVector`, and `GetByID` (§4.5). Implementations
/// are swappable; nothing upstream should assume `redb` specifically.
#[async_trait]
pub trait VectorStore: Send + Sync {
  async fn ensure_schema(&self) -> Result<(), AppError>;
  async fn store_fact(&self, fact: MemoryFact, embedding: Vec<f32>) -> Result<(), AppError>;
  async fn store_consolidated(
    &self,
    fact: ConsolidatedFact,
    embedding: Vec<f32>,
  ) -> Result<(), AppError>;
  async fn near_vector(
    &self,
    class: ObjectClass,
    embedding: &[f32],
    filter: &Filter,
  ) -> Result<Vec<ScoredObject>, AppError>;
  async fn get_by_id(&self, class: ObjectClass, id: &str) -> Result<Option<StoredObject>, AppError>;
}

/// An embedded key-value store (`redb`) plus brute-force cosine similarity,
/// realizing the spec's "opaque vector database runtime" without standing up
/// an external service (§4.5 design notes).
pub struct RedbStore {
  db: Database,
}

impl RedbStore {
  /// Open (creating if absent) the store file at `path`.
  pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
    }
    let db = Database::create(path).map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
    Ok(Self { db })
  }

  fn insert_record(&self, id: &str, record: &StoredRecord) -> Result<(), AppError> {
    let bytes = serde_json::to_vec(record)?;
    let tx = self
      .db
      .begin_write()
      .map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
    {
      let mut table = tx
        .open_table(OBJECTS_TABLE)
        .map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
      table
        .insert(id, bytes.as_slice())
        .map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
    }
    tx.commit().map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
    Ok(())
  }

  fn scan_all(&self) -> Result<Vec<StoredRecord>, AppError> {
    let tx = self
      .db
      .begin_read()
      .map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
    let table = match tx.open_table(OBJECTS_TABLE) {
      Ok(table) => table,
      Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
      Err(e) => return Err(AppError::with_kind(AppErrorKind::VectorStore, e)),
    };

    let mut records = Vec::new();
    let iter = table.iter().map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
    for entry in iter {
      let (_, value) = entry.map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
      let record: StoredRecord = serde_json::from_slice(value.value())?;
      records.push(record);
    }
    Ok(records)
  }
}

#[async_trait]
impl VectorStore for RedbStore {
  async fn ensure_schema(&self) -> Result<(), AppError> {
    let tx = self
      .db
      .begin_write()
      .map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
    tx.open_table(OBJECTS_TABLE)
      .map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
    tx.commit().map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
    Ok(())
  }

  async fn store_fact(&self, fact: MemoryFact, embedding: Vec<f32>) -> Result<(), AppError> {
    let id = fact.id.clone();
    let record = StoredRecord {
      embedding,
      object: StoredObject::Fact(fact),
    };
    self.insert_record(&id, &record)
  }

  async fn store_consolidated(
    &self,
    fact: ConsolidatedFact,
    embedding: Vec<f32>,
  ) -> Result<(), AppError> {
    let id = fact.id.clone();
    let record = StoredRecord {
      embedding,
      object: StoredObject::Consolidated(fact),
    };
    self.insert_record(&id, &record)
  }

  async fn near_vector(
    &self,
    class: ObjectClass,
    embedding: &[f32],
    filter: &Filter,
  ) -> Result<Vec<ScoredObject>, AppError> {
    if filter.limit == Some(0) {
      return Ok(Vec::new());
    }

    let max_distance = filter.effective_distance();
    let mut hits: Vec<ScoredObject> = self
      .scan_all()?
      .into_iter()
      .filter(|record| record.object.class() == class)
      .filter(|record| matches_filter(&record.object, filter))
      .map(|record| ScoredObject {
        distance: cosine_distance(embedding, &record.embedding),
        object: record.object,
      })
      .filter(|hit| hit.distance <= max_distance)
      .collect();

    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    if let Some(limit) = filter.limit {
      hits.truncate(limit);
    }
    Ok(hits)
  }

  async fn get_by_id(&self, class: ObjectClass, id: &str) -> Result<Option<StoredObject>, AppError> {
    let tx = self
      .db
      .begin_read()
      .map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))?;
    let table = match tx.open_table(OBJECTS_TABLE) {
      Ok(table) => table,
      Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
      Err(e) => return Err(AppError::with_kind(AppErrorKind::VectorStore, e)),
    };

    match table.get(id).map_err(|e| AppError::with_kind(AppErrorKind::VectorStore, e))? {
      None => Ok(None),
      Some(value) => {
        let record: StoredRecord = serde_json::from_slice(value.value())?;
        if record.object.class() != class {
          return Ok(None);
        }
        Ok(Some(record.object))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use recollect_model::{FactCategory, Sensitivity, Source};

  use super::*;

  fn fact(id: &str, subject: &str) -> MemoryFact {
    MemoryFact {
      id: id.to_owned(),
      content: format!("{subject} likes coffee"),
      category: FactCategory::Preference,
      subject: subject.to_owned(),
      attribute: "beverage".to_owned(),
      value: "coffee".to_owned(),
      importance: 2,
      sensitivity: Sensitivity::Low,
      timestamp: Utc::now(),
      source: Source::Whatsapp,
      source_document_id: "whatsapp-1".to_owned(),
      temporal_context: None,
    }
  }

  #[tokio::test]
  async fn round_trips_a_fact_through_get_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = RedbStore::open(dir.path().join("store.redb")).unwrap();
    store.ensure_schema().await.unwrap();

    store.store_fact(fact("f1", "alice"), vec![1.0, 0.0, 0.0]).await.unwrap();

    let fetched = store.get_by_id(ObjectClass::Fact, "f1").await.unwrap().unwrap();
    assert_eq!(fetched.id(), "f1");
    assert_eq!(fetched.subject(), "alice");

    assert!(store.get_by_id(ObjectClass::Consolidated, "f1").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn near_vector_respects_distance_bound_and_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let store = RedbStore::open(dir.path().join("store.redb")).unwrap();
    store.ensure_schema().await.unwrap();

    store.store_fact(fact("close", "alice"), vec![1.0, 0.0]).await.unwrap();
    store.store_fact(fact("far", "bob"), vec![0.0, 1.0]).await.unwrap();

    let mut filter = Filter::new();
    filter.distance = Some(0.5);
    let hits = store.near_vector(ObjectClass::Fact, &[1.0, 0.0], &filter).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].object.id(), "close");
    assert!(hits[0].distance <= 0.5);
  }

  #[tokio::test]
  async fn near_vector_is_scoped_to_its_class() {
    let dir = tempfile::tempdir().unwrap();
    let store = RedbStore::open(dir.path().join("store.redb")).unwrap();
    store.ensure_schema().await.unwrap();

    store.store_fact(fact("f1", "alice"), vec![1.0, 0.0]).await.unwrap();

    let mut filter = Filter::new();
    filter.distance = Some(1.0);
    let consolidated_hits = store.near_vector(ObjectClass::Consolidated, &[1.0, 0.0], &filter).await.unwrap();
    assert!(consolidated_hits.is_empty());

    let fact_hits = store.near_vector(ObjectClass::Fact, &[1.0, 0.0], &filter).await.unwrap();
    assert_eq!(fact_hits.len(), 1);
  }

  #[tokio::test]
  async fn near_vector_with_zero_limit_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = RedbStore::open(dir.path().join("store.redb")).unwrap();
    store.ensure_schema().await.unwrap();
    store.store_fact(fact("f1", "alice"), vec![1.0, 0.0]).await.unwrap();

    let mut filter = Filter::new();
    filter.distance = Some(1.0);
    filter.limit = Some(0);
    let hits = store.near_vector(ObjectClass::Fact, &[1.0, 0.0], &filter).await.unwrap();
    assert!(hits.is_empty());
  }

  #[tokio::test]
  async fn near_vector_applies_category_filter() {
    let dir = tempfile::tempdir().unwrap();
    let store = RedbStore::open(dir.path().join("store.redb")).unwrap();
    store.ensure_schema().await.unwrap();

    let mut health_fact = fact("h1", "alice");
    health_fact.category = FactCategory::Health;
    store.store_fact(health_fact, vec![1.0, 0.0]).await.unwrap();
    store.store_fact(fact("p1", "alice"), vec![1.0, 0.0]).await.unwrap();

    let mut filter = Filter::new();
    filter.fact_category = Some(FactCategory::Health);
    filter.distance = Some(1.0);
    let hits = store.near_vector(ObjectClass::Fact, &[1.0, 0.0], &filter).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].object.id(), "h1");
  }
}
