use chrono::{DateTime, Utc};

use crate::document::Source;
use crate::fact::{FactCategory, Sensitivity};

/// Query-time constraints applied by the vector store and the retrieval
/// engine (§4.5, §4.7). Every field is optional; an unset field imposes no
/// constraint. `distance` is the maximum cosine distance a candidate may
/// have from the query vector to be considered a match.
#[derive(Debug, Clone, Default)]
pub struct Filter {
  pub source: Option<Source>,
  pub distance: Option<f32>,
  pub limit: Option<usize>,
  pub fact_category: Option<FactCategory>,
  pub fact_subject: Option<String>,
  pub fact_attribute: Option<String>,
  /// Matched as a case-insensitive substring of the stored `value`.
  pub fact_value: Option<String>,
  pub fact_sensitivity: Option<Sensitivity>,
  /// Matched as a case-insensitive substring of the stored `temporalContext`.
  pub fact_temporal_context: Option<String>,
  pub fact_importance: Option<u8>,
  pub fact_importance_min: Option<u8>,
  pub fact_importance_max: Option<u8>,
  pub timestamp_after: Option<DateTime<Utc>>,
  pub timestamp_before: Option<DateTime<Utc>>,
}

/// Default maximum cosine distance for a `NearVector` match when a caller
/// doesn't specify one (§4.5).
pub const DEFAULT_DISTANCE: f32 = 0.7;

impl Filter {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn effective_distance(&self) -> f32 {
    self.distance.unwrap_or(DEFAULT_DISTANCE)
  }
}
