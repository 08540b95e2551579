use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use recollect_model::{ConversationDocument, Message, ParticipantList, Source};
use recollect_shared::{AppError, AppErrorKind};
use serde::Deserialize;

/// One exported conversation from `conversations.json`. The export is a flat
/// `conversations.json` array; ChatGPT itself may export a single object
/// instead when downloading one conversation, so both shapes are accepted.
#[derive(Debug, Deserialize)]
struct ChatgptConversation {
  id: Option<String>,
  title: Option<String>,
  mapping: HashMap<String, ChatgptNode>,
}

#[derive(Debug, Deserialize)]
struct ChatgptNode {
  id: String,
  message: Option<ChatgptMessage>,
  parent: Option<String>,
  #[serde(default)]
  children: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatgptMessage {
  author: ChatgptAuthor,
  content: ChatgptContent,
  create_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatgptAuthor {
  role: String,
}

#[derive(Debug, Deserialize)]
struct ChatgptContent {
  #[serde(default)]
  parts: Vec<serde_json::Value>,
  content_type: Option<String>,
}

/// Parse a ChatGPT data export (`conversations.json`) into one
/// [`ConversationDocument`] per conversation, preserving the active thread of
/// the export's mapping tree in chronological (not necessarily linear-array)
/// order.
///
/// Grounded in the standard `mapping`-as-DAG export shape: every node has an
/// optional `parent` and a `children` list; root nodes have `parent: None`.
/// We walk depth-first from each root, always following the *first* child —
/// the export format supports branching regenerations, but this pipeline
/// only cares about the conversation as it was actually read (§4.1 Non-goals:
/// branch selection UI is out of scope).
pub fn parse_chatgpt(path: impl AsRef<Path>, owner: &str) -> Result<Vec<ConversationDocument>, AppError> {
  let path = path.as_ref();
  let raw = std::fs::read_to_string(path)
    .map_err(|e| AppError::with_kind(AppErrorKind::Input, anyhow::anyhow!("reading {}: {e}", path.display())))?;

  let root: serde_json::Value = serde_json::from_str(&raw).map_err(|e| AppError::with_kind(AppErrorKind::Input, e))?;
  let conversations: Vec<ChatgptConversation> = match root {
    serde_json::Value::Array(_) => {
      serde_json::from_value(root).map_err(|e| AppError::with_kind(AppErrorKind::Input, e))?
    }
    other => vec![serde_json::from_value(other).map_err(|e| AppError::with_kind(AppErrorKind::Input, e))?],
  };

  conversations
    .into_iter()
    .enumerate()
    .map(|(idx, conversation)| convert_conversation(conversation, idx, owner))
    .collect()
}

fn convert_conversation(conversation: ChatgptConversation, idx: usize, owner: &str) -> Result<ConversationDocument, AppError> {
  let native_id = conversation.id.clone().unwrap_or_else(|| idx.to_string());
  let messages = traverse_messages(&conversation.mapping);

  let mut people = ParticipantList::new();
  let mut document_messages = Vec::with_capacity(messages.len());

  for msg in messages {
    let speaker = match msg.author.role.as_str() {
      "user" => owner.to_owned(),
      "assistant" => "assistant".to_owned(),
      other => other.to_owned(),
    };
    let text = flatten_parts(&msg.content);
    let time = msg
      .create_time
      .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
      .unwrap_or_else(Utc::now);

    people.insert(speaker.clone());
    document_messages.push(Message { speaker, text, time });
  }

  people.insert(owner);

  let _ = conversation.title;
  Ok(ConversationDocument {
    id: format!("chatgpt-{native_id}"),
    source: Source::Chatgpt,
    user: owner.to_owned(),
    people,
    conversation: document_messages,
    tags: Default::default(),
    metadata: Default::default(),
  })
}

/// Depth-first walk from every root node (`parent: None`), always following
/// the first listed child, skipping nodes with no message (the export's
/// synthetic root/system placeholder nodes) or an unrecognized role/content
/// type.
fn traverse_messages(mapping: &HashMap<String, ChatgptNode>) -> Vec<ChatgptMessage> {
  let mut roots: Vec<&ChatgptNode> = mapping.values().filter(|n| n.parent.is_none()).collect();
  roots.sort_by(|a, b| a.id.cmp(&b.id));

  let mut out = Vec::new();
  for root in roots {
    walk(root, mapping, &mut out);
  }
  out
}

fn walk(node: &ChatgptNode, mapping: &HashMap<String, ChatgptNode>, out: &mut Vec<ChatgptMessage>) {
  if let Some(message) = &node.message {
    if is_conversational(message) {
      out.push(clone_message(message));
    }
  }
  if let Some(first_child_id) = node.children.first() {
    if let Some(child) = mapping.get(first_child_id) {
      walk(child, mapping, out);
    }
  }
}

fn is_conversational(message: &ChatgptMessage) -> bool {
  let role_ok = matches!(message.author.role.as_str(), "user" | "assistant");
  let content_type_ok = !matches!(message.content.content_type.as_deref(), Some("system"));
  role_ok && content_type_ok && !message.content.parts.is_empty()
}

fn clone_message(message: &ChatgptMessage) -> ChatgptMessage {
  ChatgptMessage {
    author: ChatgptAuthor {
      role: message.author.role.clone(),
    },
    content: ChatgptContent {
      parts: message.content.parts.clone(),
      content_type: message.content.content_type.clone(),
    },
    create_time: message.create_time,
  }
}

fn flatten_parts(content: &ChatgptContent) -> String {
  content
    .parts
    .iter()
    .filter_map(|part| part.as_str())
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fixture() -> serde_json::Value {
    serde_json::json!([{
      "id": "conv-1",
      "title": "Trip planning",
      "mapping": {
        "root": {"id": "root", "message": null, "parent": null, "children": ["m1"]},
        "m1": {
          "id": "m1",
          "parent": "root",
          "children": ["m2"],
          "message": {
            "author": {"role": "user"},
            "content": {"content_type": "text", "parts": ["where should I go in March?"]},
            "create_time": 1704103200.0
          }
        },
        "m2": {
          "id": "m2",
          "parent": "m1",
          "children": [],
          "message": {
            "author": {"role": "assistant"},
            "content": {"content_type": "text", "parts": ["Lisbon is lovely in March."]},
            "create_time": 1704103260.0
          }
        }
      }
    }])
  }

  #[test]
  fn walks_the_mapping_tree_from_root_to_leaf_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conversations.json");
    std::fs::write(&path, serde_json::to_string(&fixture()).unwrap()).unwrap();

    let docs = parse_chatgpt(&path, "alice").unwrap();
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.id, "chatgpt-conv-1");
    assert_eq!(doc.conversation.len(), 2);
    assert_eq!(doc.conversation[0].speaker, "alice");
    assert_eq!(doc.conversation[1].speaker, "assistant");
    assert_eq!(doc.conversation[1].text, "Lisbon is lovely in March.");
  }
}
