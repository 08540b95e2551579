use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use recollect_model::{ConversationDocument, Message, ParticipantList, Source};
use recollect_shared::{AppError, AppErrorKind};
use rusqlite::Connection;

/// Expected schema of a WhatsApp export database (§4.1): one flat table,
/// `messages(sender TEXT NOT NULL, text TEXT, timestamp_ms INTEGER NOT NULL)`,
/// one conversation per file. `text` may be `NULL` for media-only messages
/// and is treated as an empty string (§3 invariant: empty text is preserved,
/// not dropped). Ordered by `rowid`, the export's own insertion order, not by
/// `timestamp_ms` — §3 requires the source's authoritative order, and a
/// source may carry out-of-order timestamps.
const SELECT_MESSAGES: &str = "SELECT sender, text, timestamp_ms FROM messages ORDER BY rowid ASC";

/// Parse a WhatsApp export SQLite database at `path` into one
/// [`ConversationDocument`].
pub fn parse_whatsapp(path: impl AsRef<Path>, owner: &str) -> Result<ConversationDocument, AppError> {
  let path = path.as_ref();
  let conn = Connection::open(path)
    .map_err(|e| AppError::with_kind(AppErrorKind::Input, anyhow::anyhow!("opening {}: {e}", path.display())))?;

  let mut stmt = conn
    .prepare(SELECT_MESSAGES)
    .map_err(|e| AppError::with_kind(AppErrorKind::Input, e))?;

  let rows = stmt
    .query_map([], |row| {
      let sender: String = row.get(0)?;
      let text: Option<String> = row.get(1)?;
      let timestamp_ms: i64 = row.get(2)?;
      Ok((sender, text.unwrap_or_default(), timestamp_ms))
    })
    .map_err(|e| AppError::with_kind(AppErrorKind::Input, e))?;

  let mut conversation = Vec::new();
  let mut people = ParticipantList::new();

  for row in rows {
    let (sender, text, timestamp_ms) = row.map_err(|e| AppError::with_kind(AppErrorKind::Input, e))?;
    let time: DateTime<Utc> = Utc
      .timestamp_millis_opt(timestamp_ms)
      .single()
      .ok_or_else(|| AppError::with_kind(AppErrorKind::Input, anyhow::anyhow!("bad timestamp {timestamp_ms}")))?;

    people.insert(sender.clone());
    conversation.push(Message { speaker: sender, text, time });
  }

  let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("export");
  people.insert(owner);

  Ok(ConversationDocument {
    id: format!("whatsapp-{stem}"),
    source: Source::Whatsapp,
    user: owner.to_owned(),
    people,
    conversation,
    tags: Default::default(),
    metadata: Default::default(),
  })
}
