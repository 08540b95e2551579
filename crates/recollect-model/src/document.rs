use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag identifying which source adapter produced a document (§3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
  Whatsapp,
  Telegram,
  Chatgpt,
  Gmail,
}

impl Source {
  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      Source::Whatsapp => "whatsapp",
      Source::Telegram => "telegram",
      Source::Chatgpt => "chatgpt",
      Source::Gmail => "gmail",
    }
  }
}

impl std::fmt::Display for Source {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// A single turn in a conversation. Empty `text` is permitted and preserved
/// (spec §3 invariant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub speaker: String,
  pub text: String,
  pub time: DateTime<Utc>,
}

/// An append-only, order-preserving, duplicate-free list of participant ids.
///
/// `people` is documented as "a set... but preserves first-seen order" (§3) —
/// `BTreeSet`/`HashSet` would both lose that ordering, so this wraps a `Vec`
/// with membership tracking instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantList(Vec<String>);

impl ParticipantList {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert `id` if not already present. Returns `true` if it was newly added.
  pub fn insert(&mut self, id: impl Into<String>) -> bool {
    let id = id.into();
    if self.0.contains(&id) {
      return false;
    }
    self.0.push(id);
    true
  }

  #[must_use]
  pub fn contains(&self, id: &str) -> bool {
    self.0.iter().any(|p| p == id)
  }

  #[must_use]
  pub fn as_slice(&self) -> &[String] {
    &self.0
  }

  pub fn iter(&self) -> std::slice::Iter<'_, String> {
    self.0.iter()
  }
}

impl FromIterator<String> for ParticipantList {
  fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
    let mut list = Self::new();
    for id in iter {
      list.insert(id);
    }
    list
  }
}

/// The canonical cross-source representation of one conversation, or of one
/// chunk of a conversation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDocument {
  /// `<source>-<nativeID>` for an X0 document, `<x0-id>-chunk-<n>` for a chunk.
  pub id: String,
  pub source: Source,
  /// The export's owner, as it appears in the conversation. Must be a member
  /// of `people` whenever the user appears at all.
  pub user: String,
  pub people: ParticipantList,
  /// Authoritative source order — not necessarily timestamp order.
  pub conversation: Vec<Message>,
  #[serde(default)]
  pub tags: BTreeSet<String>,
  #[serde(default)]
  pub metadata: BTreeMap<String, String>,
}

impl ConversationDocument {
  /// Build the chunk id `<parent-id>-chunk-<n>` for 1-indexed `n`.
  #[must_use]
  pub fn chunk_id(parent_id: &str, n: usize) -> String {
    format!("{parent_id}-chunk-{n}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn participant_list_preserves_first_seen_order_and_dedups() {
    let mut people = ParticipantList::new();
    assert!(people.insert("alice"));
    assert!(people.insert("bob"));
    assert!(!people.insert("alice"));
    assert_eq!(people.as_slice(), ["alice".to_owned(), "bob".to_owned()]);
  }

  #[test]
  fn source_round_trips_through_json() {
    let json = serde_json::to_string(&Source::Whatsapp).unwrap();
    assert_eq!(json, "\"whatsapp\"");
    let back: Source = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Source::Whatsapp);
  }
}
