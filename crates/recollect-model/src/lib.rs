mod consolidation;
mod document;
mod fact;
mod filter;

pub use consolidation::{
  ConsolidatedFact, ConsolidatedFactDraft, ConsolidatedFactDrafts, ConsolidationReport,
  CANONICAL_SUBJECTS,
};
pub use document::{ConversationDocument, Message, ParticipantList, Source};
pub use fact::{
  is_valid_importance, ExtractedFact, ExtractedFacts, FactCategory, ImportanceValue, MemoryFact,
  Sensitivity,
};
pub use filter::{Filter, DEFAULT_DISTANCE};
