//! Deterministic message-boundary chunker (§4.2).
//!
//! Splits one [`ConversationDocument`] into smaller documents targeting
//! roughly `chunk_target_tokens` worth of content each, never splitting a
//! single message across two chunks. Purely a function of its input: the
//! same document with the same target always chunks identically, so
//! extraction can be re-run against a chunk file without re-chunking.

use recollect_model::{ConversationDocument, Message};

/// `(chars + 3) / 4`, the common whitespace-agnostic token estimate used
/// when an exact tokenizer isn't worth the dependency for a chunk-sizing
/// heuristic (§9 open question: chunk sizing is approximate by design).
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
  (text.chars().count() as u64 + 3) / 4
}

fn message_tokens(message: &Message) -> u64 {
  estimate_tokens(&message.speaker) + estimate_tokens(&message.text)
}

/// Chunk `document` into one or more documents, each roughly `target_tokens`
/// of aggregated message content, in original message order.
///
/// A conversation with no messages yields no chunks. A single message larger
/// than `target_tokens` still becomes its own chunk rather than being split
/// (§4.2 invariant: never split a message).
#[must_use]
pub fn chunk(document: &ConversationDocument, target_tokens: u64) -> Vec<ConversationDocument> {
  if document.conversation.is_empty() {
    return Vec::new();
  }

  let target_tokens = target_tokens.max(1);
  let mut chunks: Vec<Vec<Message>> = Vec::new();
  let mut current: Vec<Message> = Vec::new();
  let mut current_tokens: u64 = 0;

  for message in &document.conversation {
    let tokens = message_tokens(message);
    if !current.is_empty() && current_tokens + tokens > target_tokens {
      chunks.push(std::mem::take(&mut current));
      current_tokens = 0;
    }
    current_tokens += tokens;
    current.push(message.clone());
  }
  if !current.is_empty() {
    chunks.push(current);
  }

  chunks
    .into_iter()
    .enumerate()
    .map(|(idx, messages)| ConversationDocument {
      id: ConversationDocument::chunk_id(&document.id, idx + 1),
      source: document.source,
      user: document.user.clone(),
      people: document.people.clone(),
      conversation: messages,
      tags: document.tags.clone(),
      metadata: document.metadata.clone(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use recollect_model::{ParticipantList, Source};

  use super::*;

  fn msg(speaker: &str, text: &str) -> Message {
    Message {
      speaker: speaker.to_owned(),
      text: text.to_owned(),
      time: Utc::now(),
    }
  }

  fn doc(messages: Vec<Message>) -> ConversationDocument {
    ConversationDocument {
      id: "whatsapp-123".to_owned(),
      source: Source::Whatsapp,
      user: "me".to_owned(),
      people: ParticipantList::new(),
      conversation: messages,
      tags: Default::default(),
      metadata: Default::default(),
    }
  }

  #[test]
  fn empty_conversation_yields_no_chunks() {
    assert!(chunk(&doc(vec![]), 100).is_empty());
  }

  #[test]
  fn single_small_conversation_fits_in_one_chunk() {
    let d = doc(vec![msg("a", "hi"), msg("b", "hello")]);
    let chunks = chunk(&d, 4000);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].id, "whatsapp-123-chunk-1");
    assert_eq!(chunks[0].conversation.len(), 2);
  }

  #[test]
  fn splits_preserve_message_order_and_never_split_a_message() {
    let messages: Vec<Message> = (0..50).map(|i| msg("a", &"word ".repeat(i % 7 + 1))).collect();
    let d = doc(messages.clone());
    let chunks = chunk(&d, 20);

    assert!(chunks.len() > 1);

    let mut reassembled: Vec<Message> = Vec::new();
    for (idx, c) in chunks.iter().enumerate() {
      assert_eq!(c.id, ConversationDocument::chunk_id(&d.id, idx + 1));
      reassembled.extend(c.conversation.iter().cloned());
    }
    assert_eq!(reassembled, messages);
  }

  #[test]
  fn oversized_single_message_still_gets_its_own_chunk() {
    let huge = msg("a", &"word ".repeat(1000));
    let d = doc(vec![huge.clone(), msg("b", "hi")]);
    let chunks = chunk(&d, 10);
    assert_eq!(chunks[0].conversation, vec![huge]);
  }
}
