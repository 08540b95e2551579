use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::document::Source;

/// Coarse classification of a memory fact (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
  Preference,
  GoalPlan,
  Health,
  Relationship,
  Profile,
  Environment,
  Event,
  Other,
}

/// How sensitive a fact's content is, used to gate retrieval/consolidation
/// handling (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
  Low,
  Medium,
  High,
}

/// Importance is an integer on the 1–3 scale defined in §3 ("1 = trivial, 3 =
/// critical"), stored as a plain `u8` rather than an enum so it serializes as
/// the bare number the spec's JSON examples show. [`is_valid_importance`] is
/// the single place that enforces the range.
pub type ImportanceValue = u8;

#[must_use]
pub const fn is_valid_importance(v: ImportanceValue) -> bool {
  matches!(v, 1..=3)
}

/// A single atomic fact extracted from one document by the extraction stage
/// (§4.3). `id` and `source`/`sourceDocumentId` are assigned by the pipeline,
/// not the LLM. `subject` is the topical bucket the fact belongs to (it
/// should land on one of [`crate::CANONICAL_SUBJECTS`], though the extractor
/// isn't hard-constrained to that list) — it is what the consolidation
/// stage groups facts by, distinct from `attribute`/`value` which name the
/// specific detail within that topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFact {
  pub id: String,
  pub content: String,
  pub category: FactCategory,
  pub subject: String,
  pub attribute: String,
  pub value: String,
  pub importance: ImportanceValue,
  pub sensitivity: Sensitivity,
  pub timestamp: DateTime<Utc>,
  pub source: Source,
  #[serde(rename = "sourceDocumentID")]
  pub source_document_id: String,
  /// Free text carried over from the source message(s), e.g. "as of last
  /// summer" — never parsed, only stored (§3, §9 open question).
  #[serde(default, rename = "temporalContext")]
  pub temporal_context: Option<String>,
}

/// The shape an LLM extraction call is asked to emit for one fact, before the
/// pipeline assigns `id`/`source`/`sourceDocumentID` (§4.3). Kept separate
/// from `MemoryFact` because the pipeline-assigned fields must never be
/// something the model is free to hallucinate.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedFact {
  pub content: String,
  pub category: FactCategory,
  pub subject: String,
  pub attribute: String,
  pub value: String,
  #[schemars(range(min = 1, max = 3))]
  pub importance: ImportanceValue,
  pub sensitivity: Sensitivity,
  #[serde(default)]
  pub temporal_context: Option<String>,
}

/// Wrapper schema an extraction call's structured output is forced into:
/// a flat list, matching how `async-openai` strict mode wants a single
/// top-level object rather than a bare array (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedFacts {
  pub facts: Vec<ExtractedFact>,
}
