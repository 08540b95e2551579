use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use recollect_model::{ConversationDocument, Message, ParticipantList, Source};
use recollect_shared::{AppError, AppErrorKind};
use serde_json::Value;

/// Telegram Desktop's JSON export (`result.json`) nests each chat as
/// `{name, id, type, messages: [...]}`. `text` is either a plain string or an
/// array of "text entities" (`{"type": "...", "text": "..."}` or bare
/// strings) that we flatten back into plain text — formatting is not part of
/// this pipeline's concern.
pub fn parse_telegram(path: impl AsRef<Path>, owner: &str) -> Result<ConversationDocument, AppError> {
  let path = path.as_ref();
  let raw = std::fs::read_to_string(path)
    .map_err(|e| AppError::with_kind(AppErrorKind::Input, anyhow::anyhow!("reading {}: {e}", path.display())))?;
  let root: Value = serde_json::from_str(&raw).map_err(|e| AppError::with_kind(AppErrorKind::Input, e))?;

  let chat_id = root
    .get("id")
    .and_then(Value::as_i64)
    .map(|id| id.to_string())
    .unwrap_or_else(|| "export".to_owned());

  let messages = root
    .get("messages")
    .and_then(Value::as_array)
    .ok_or_else(|| AppError::with_kind(AppErrorKind::Input, anyhow::anyhow!("missing \"messages\" array")))?;

  let mut conversation = Vec::new();
  let mut people = ParticipantList::new();

  for entry in messages {
    // Service messages (pin, join, call log, ...) have no "from"/"text" and
    // aren't part of the conversation content.
    let Some(speaker) = entry.get("from").and_then(Value::as_str) else {
      continue;
    };
    let text = flatten_text(entry.get("text"));
    let time = parse_timestamp(entry)?;

    people.insert(speaker);
    conversation.push(Message {
      speaker: speaker.to_owned(),
      text,
      time,
    });
  }

  people.insert(owner);

  Ok(ConversationDocument {
    id: format!("telegram-{chat_id}"),
    source: Source::Telegram,
    user: owner.to_owned(),
    people,
    conversation,
    tags: Default::default(),
    metadata: Default::default(),
  })
}

fn flatten_text(text: Option<&Value>) -> String {
  match text {
    Some(Value::String(s)) => s.clone(),
    Some(Value::Array(entities)) => entities
      .iter()
      .map(|entity| match entity {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj.get("text").and_then(Value::as_str).unwrap_or_default().to_owned(),
        _ => String::new(),
      })
      .collect::<Vec<_>>()
      .join(""),
    _ => String::new(),
  }
}

fn parse_timestamp(entry: &Value) -> Result<DateTime<Utc>, AppError> {
  if let Some(unixtime) = entry.get("date_unixtime").and_then(Value::as_str).and_then(|s| s.parse::<i64>().ok()) {
    return Utc
      .timestamp_opt(unixtime, 0)
      .single()
      .ok_or_else(|| AppError::with_kind(AppErrorKind::Input, anyhow::anyhow!("bad date_unixtime {unixtime}")));
  }
  if let Some(date) = entry.get("date").and_then(Value::as_str) {
    // Telegram's "date" field has no timezone marker; treat it as UTC since
    // export timezone handling is out of scope (§4.1 Non-goals).
    let naive = chrono::NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S")
      .map_err(|e| AppError::with_kind(AppErrorKind::Input, e))?;
    return Ok(naive.and_utc());
  }
  Err(AppError::with_kind(AppErrorKind::Input, anyhow::anyhow!("message has no date field")))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write_fixture(path: &Path) {
    let json = serde_json::json!({
      "name": "Alice & Bob",
      "id": 12345,
      "type": "personal_chat",
      "messages": [
        {"id": 1, "type": "message", "date": "2024-01-01T10:00:00", "date_unixtime": "1704103200", "from": "alice", "text": "hey"},
        {"id": 2, "type": "service", "action": "pin_message", "date": "2024-01-01T10:01:00"},
        {"id": 3, "type": "message", "date": "2024-01-01T10:02:00", "date_unixtime": "1704103320", "from": "bob", "text": [
          {"type": "plain", "text": "hi "},
          {"type": "bold", "text": "there"}
        ]}
      ]
    });
    std::fs::write(path, serde_json::to_string(&json).unwrap()).unwrap();
  }

  #[test]
  fn flattens_entity_arrays_and_skips_service_messages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.json");
    write_fixture(&path);

    let doc = parse_telegram(&path, "alice").unwrap();
    assert_eq!(doc.conversation.len(), 2);
    assert_eq!(doc.conversation[1].text, "hi there");
    assert_eq!(doc.id, "telegram-12345");
  }
}
