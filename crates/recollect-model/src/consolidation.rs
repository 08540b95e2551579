use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::document::Source;
use crate::fact::{FactCategory, ImportanceValue, Sensitivity};

/// The fixed, ordered list of subjects the consolidation stage enumerates
/// over (§4.6). Order matters only for deterministic scan order in tests and
/// logs — consolidation itself treats subjects independently and in
/// parallel.
pub const CANONICAL_SUBJECTS: [&str; 20] = [
  "Physical Health & Fitness",
  "Mental Health & Emotional Wellbeing",
  "Diet & Nutrition",
  "Career & Professional Life",
  "Education & Learning",
  "Finances & Money Management",
  "Housing & Living Situation",
  "Family Relationships",
  "Friendships & Social Life",
  "Romantic Relationships",
  "Parenting & Children",
  "Pets & Animal Companions",
  "Travel & Places Lived",
  "Hobbies & Recreational Interests",
  "Technology & Digital Life",
  "Goals & Future Plans",
  "Habits & Daily Routines",
  "Values, Beliefs & Spirituality",
  "Possessions & Belongings",
  "Significant Life Events",
];

/// One fact folded into a consolidated record, as produced by the
/// consolidation LLM call before the pipeline stamps provenance (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedFactDraft {
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
  /// Indices into the subject's input fact list that this consolidated fact
  /// was derived from — the model cites which raw facts it merged.
  pub source_fact_indices: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedFactDrafts {
  pub facts: Vec<ConsolidatedFactDraft>,
}

/// A fact produced by merging one or more `MemoryFact`s that share a subject
/// (§4.6). Every `source_fact_ids` entry must name a `MemoryFact.id` that
/// was actually given to that consolidation run — an invariant enforced at
/// assembly time, not by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedFact {
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
  #[serde(rename = "sourceFactIDs")]
  pub source_fact_ids: Vec<String>,
  #[serde(rename = "consolidationSubject")]
  pub consolidation_subject: String,
  #[serde(rename = "isConsolidated")]
  pub is_consolidated: bool,
  #[serde(default, rename = "temporalContext")]
  pub temporal_context: Option<String>,
}

/// Summary of one subject's consolidation run, emitted alongside the
/// `ConsolidatedFact`s themselves so an operator can audit fan-in (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationReport {
  pub subject: String,
  #[serde(rename = "sourceFactCount")]
  pub source_fact_count: usize,
  #[serde(rename = "consolidatedFacts")]
  pub consolidated_facts: Vec<ConsolidatedFact>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn canonical_subjects_has_no_duplicates() {
    let mut seen = std::collections::HashSet::new();
    for subject in CANONICAL_SUBJECTS {
      assert!(seen.insert(subject), "duplicate canonical subject: {subject}");
    }
  }
}
