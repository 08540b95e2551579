use chrono::{DateTime, Utc};
use recollect_model::{ConsolidatedFact, FactCategory, ImportanceValue, MemoryFact, Sensitivity, Source};
use serde::{Deserialize, Serialize};

/// The vector store's two schema classes (§4.5): `MemoryFact` and
/// `ConsolidatedFact`. `NearVector`/`GetByID` are always scoped to one class —
/// a stage 1 consolidated-insight search must never surface raw facts, and a
/// stage 3 raw-fact search must never surface consolidated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
  Fact,
  Consolidated,
}

/// The vector store holds two kinds of object side by side (§4.5) — raw
/// extracted facts and the consolidated facts produced from them. Retrieval
/// treats both uniformly; only provenance differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoredObject {
  Fact(MemoryFact),
  Consolidated(ConsolidatedFact),
}

impl StoredObject {
  #[must_use]
  pub fn id(&self) -> &str {
    match self {
      Self::Fact(f) => &f.id,
      Self::Consolidated(f) => &f.id,
    }
  }

  #[must_use]
  pub fn class(&self) -> ObjectClass {
    match self {
      Self::Fact(_) => ObjectClass::Fact,
      Self::Consolidated(_) => ObjectClass::Consolidated,
    }
  }

  #[must_use]
  pub fn source(&self) -> Source {
    match self {
      Self::Fact(f) => f.source,
      Self::Consolidated(f) => f.source,
    }
  }

  #[must_use]
  pub fn category(&self) -> FactCategory {
    match self {
      Self::Fact(f) => f.category,
      Self::Consolidated(f) => f.category,
    }
  }

  #[must_use]
  pub fn subject(&self) -> &str {
    match self {
      Self::Fact(f) => &f.subject,
      Self::Consolidated(f) => &f.subject,
    }
  }

  #[must_use]
  pub fn attribute(&self) -> &str {
    match self {
      Self::Fact(f) => &f.attribute,
      Self::Consolidated(f) => &f.attribute,
    }
  }

  #[must_use]
  pub fn value(&self) -> &str {
    match self {
      Self::Fact(f) => &f.value,
      Self::Consolidated(f) => &f.value,
    }
  }

  #[must_use]
  pub fn sensitivity(&self) -> Sensitivity {
    match self {
      Self::Fact(f) => f.sensitivity,
      Self::Consolidated(f) => f.sensitivity,
    }
  }

  #[must_use]
  pub fn importance(&self) -> ImportanceValue {
    match self {
      Self::Fact(f) => f.importance,
      Self::Consolidated(f) => f.importance,
    }
  }

  #[must_use]
  pub fn timestamp(&self) -> DateTime<Utc> {
    match self {
      Self::Fact(f) => f.timestamp,
      Self::Consolidated(f) => f.timestamp,
    }
  }

  #[must_use]
  pub fn temporal_context(&self) -> Option<&str> {
    match self {
      Self::Fact(f) => f.temporal_context.as_deref(),
      Self::Consolidated(f) => f.temporal_context.as_deref(),
    }
  }
}

/// The on-disk unit: one stored object plus the embedding it was indexed
/// under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
  pub embedding: Vec<f32>,
  pub object: StoredObject,
}

/// A `NearVector` hit: the stored object plus its cosine distance from the
/// query embedding (§4.5, lower is closer).
#[derive(Debug, Clone)]
pub struct ScoredObject {
  pub object: StoredObject,
  pub distance: f32,
}
