//! Per-document fact extraction (§4.3): one LLM call per chunked
//! [`ConversationDocument`], parallelized across chunks by
//! `recollect_pool::run_bounded`.

use std::fmt::Write as _;

use chrono::Utc;
use recollect_llm::{
  generate_object, ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
  ChatCompletionRequestUserMessage,
};
use recollect_model::{
  is_valid_importance, ConversationDocument, ExtractedFacts, MemoryFact, CANONICAL_SUBJECTS,
};
use recollect_shared::{AppError, APP_ENV};
use uuid::Uuid;

fn extraction_system_prompt() -> String {
  let mut subjects = String::new();
  for s in CANONICAL_SUBJECTS {
    let _ = write!(subjects, "{s}, ");
  }
  let subjects = subjects.trim_end_matches(", ");

  format!(
    "\
You are extracting durable facts about the export owner from one conversation \
document. A fact is something that remains true beyond the conversation it \
was mentioned in — a preference, a plan, a health detail, a relationship, a \
profile detail, an environment detail, or a notable event. Ignore purely \
transient statements (\"I'm tired right now\" is not a fact).

For every fact, emit:
  content           — one sentence stating the fact in natural language
  category          — one of: preference, goal_plan, health, relationship, profile, environment, event, other
  subject           — the topic the fact belongs to; prefer one of: {subjects}
  attribute         — the specific detail within that topic (e.g. \"job_title\", \"favorite_cuisine\")
  value             — the attribute's value
  importance        — 1 (trivial) to 3 (critical)
  sensitivity       — low, medium, or high
  temporal_context  — optional free text like \"as of last summer\", only if the source text implies one

If the document carries no durable facts, return an empty `facts` array. \
Never invent a fact the text does not support."
  )
}

/// Check one LLM-emitted record against §3's MemoryFact invariants before
/// it's trusted enough to become a stored fact. Returns the first violated
/// invariant's name as `Err` for logging; `Ok` means the record is usable.
fn validate_extracted(extracted: &ExtractedFact) -> Result<(), &'static str> {
  if !is_valid_importance(extracted.importance) {
    return Err("importance out of range 1..=3");
  }
  if extracted.content.trim().is_empty() {
    return Err("empty content");
  }
  if extracted.subject.trim().is_empty() {
    return Err("empty subject");
  }
  if extracted.attribute.trim().is_empty() {
    return Err("empty attribute");
  }
  if extracted.value.trim().is_empty() {
    return Err("empty value");
  }
  Ok(())
}

fn render_document(document: &ConversationDocument) -> String {
  let mut body = String::new();
  let _ = writeln!(body, "Source: {}", document.source);
  let _ = writeln!(body, "Owner: {}", document.user);
  for message in &document.conversation {
    let _ = writeln!(body, "[{}] {}: {}", message.time.to_rfc3339(), message.speaker, message.text);
  }
  body
}

/// Run one extraction call against `document`, returning validated
/// `MemoryFact`s with pipeline-assigned `id`/`source`/`sourceDocumentID`.
///
/// Facts that fail validation (importance out of `1..=3`, or a blank
/// `subject`/`attribute`/`value`) are dropped rather than failing the whole
/// call — a single malformed record from the model shouldn't discard the
/// rest of the document's facts (§4.3 edge case).
pub async fn extract_facts_from_document(
  document: &ConversationDocument,
) -> Result<Vec<MemoryFact>, AppError> {
  if document.conversation.is_empty() {
    return Ok(Vec::new());
  }

  let system = ChatCompletionRequestSystemMessage::from(extraction_system_prompt());
  let user = ChatCompletionRequestUserMessage::from(render_document(document));

  let output = generate_object::<ExtractedFacts>(
    vec![
      ChatCompletionRequestMessage::System(system),
      ChatCompletionRequestMessage::User(user),
    ],
    "conversation_facts".to_owned(),
    Some("Durable facts extracted from one conversation document".to_owned()),
  )
  .await?;

  let now = Utc::now();
  let mut facts = Vec::with_capacity(output.facts.len());

  for extracted in output.facts {
    if let Err(reason) = validate_extracted(&extracted) {
      tracing::warn!(document_id = %document.id, reason, "dropping invalid extracted fact");
      continue;
    }

    facts.push(MemoryFact {
      id: Uuid::now_v7().to_string(),
      content: extracted.content,
      category: extracted.category,
      subject: extracted.subject,
      attribute: extracted.attribute,
      value: extracted.value,
      importance: extracted.importance,
      sensitivity: extracted.sensitivity,
      timestamp: document.conversation.last().map_or(now, |m| m.time),
      source: document.source,
      source_document_id: document.id.clone(),
      temporal_context: extracted.temporal_context,
    });
  }

  Ok(facts)
}

/// Extract facts from every document in `documents`, bounded by
/// `APP_ENV.extraction_workers` concurrent LLM calls (§4.4). One document's
/// failure doesn't block the rest; failures are returned alongside the
/// successful per-document fact lists so the caller can report them.
pub async fn extract_facts_from_documents(
  documents: Vec<ConversationDocument>,
) -> Vec<Result<Vec<MemoryFact>, AppError>> {
  let concurrency = APP_ENV.extraction_workers as usize;
  recollect_pool::run_bounded(documents, concurrency, 10, "fact extraction", |document| async move {
    extract_facts_from_document(&document).await
  })
  .await
}

#[cfg(test)]
mod tests {
  use recollect_model::{ParticipantList, Source};

  use super::*;

  fn empty_document() -> ConversationDocument {
    ConversationDocument {
      id: "whatsapp-1".to_owned(),
      source: Source::Whatsapp,
      user: "me".to_owned(),
      people: ParticipantList::new(),
      conversation: Vec::new(),
      tags: Default::default(),
      metadata: Default::default(),
    }
  }

  #[tokio::test]
  async fn empty_conversation_skips_the_llm_call_entirely() {
    let facts = extract_facts_from_document(&empty_document()).await.unwrap();
    assert!(facts.is_empty());
  }

  fn valid_extracted() -> ExtractedFact {
    ExtractedFact {
      content: "User likes coffee".to_owned(),
      category: recollect_model::FactCategory::Preference,
      subject: "primaryUser".to_owned(),
      attribute: "beverage".to_owned(),
      value: "coffee".to_owned(),
      importance: 2,
      sensitivity: recollect_model::Sensitivity::Low,
      temporal_context: None,
    }
  }

  #[test]
  fn rejects_empty_content() {
    let mut extracted = valid_extracted();
    extracted.content = String::new();
    assert!(validate_extracted(&extracted).is_err());
  }

  #[test]
  fn rejects_out_of_range_importance() {
    let mut extracted = valid_extracted();
    extracted.importance = 0;
    assert!(validate_extracted(&extracted).is_err());
  }

  #[test]
  fn accepts_a_well_formed_record() {
    assert!(validate_extracted(&valid_extracted()).is_ok());
  }
}
