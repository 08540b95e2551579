use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mail_parser::MessageParser;
use recollect_model::{ConversationDocument, Message, ParticipantList, Source};
use recollect_shared::{AppError, AppErrorKind};
use serde::{Deserialize, Serialize};

/// Whether a correspondent was ever on the receiving end of an owner-sent
/// message, the sending end of a message the owner received, or both (§4.1
/// sender-analysis mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
  Inbound,
  Outbound,
  Both,
}

impl Interaction {
  fn observe_inbound(self) -> Self {
    match self {
      Self::Outbound | Self::Both => Self::Both,
      Self::Inbound => Self::Inbound,
    }
  }

  fn observe_outbound(self) -> Self {
    match self {
      Self::Inbound | Self::Both => Self::Both,
      Self::Outbound => Self::Outbound,
    }
  }

  #[must_use]
  fn has_outbound(self) -> bool {
    matches!(self, Self::Outbound | Self::Both)
  }
}

/// One correspondent's activity summary, as written to `senders.json` (§4.1,
/// §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderRecord {
  pub email: String,
  pub count: u64,
  pub interaction: Interaction,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
}

/// `senders.json`: every correspondent partitioned into `included` (worth
/// ingesting) and `excluded` (the remainder), per §4.1's default rule —
/// message count over [`INCLUDE_COUNT_THRESHOLD`], or any outbound
/// interaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SenderSurvey {
  pub included: Vec<SenderRecord>,
  pub excluded: Vec<SenderRecord>,
}

/// Message-count threshold above which a correspondent is included
/// regardless of interaction direction (§4.1).
const INCLUDE_COUNT_THRESHOLD: u64 = 5;

/// Scan an mbox file and partition its correspondents into `included` and
/// `excluded` per §4.1's default rule: a correspondent is included if the
/// owner exchanged more than [`INCLUDE_COUNT_THRESHOLD`] messages with them,
/// or if any of those messages were outbound (the owner wrote to them) —
/// otherwise excluded. Used ahead of a full import decision; [`parse_gmail_mbox`]
/// consults the same shape again if `senders.json` is present on disk.
pub fn survey_senders(path: impl AsRef<Path>, owner: &str) -> Result<SenderSurvey, AppError> {
  let raw = read_mbox(path.as_ref())?;

  let mut counts: BTreeMap<String, (u64, Interaction)> = BTreeMap::new();
  for raw_message in split_mbox(&raw) {
    let Some(parsed) = MessageParser::default().parse(&raw_message) else {
      continue;
    };
    let from = from_address(&parsed);

    if from.eq_ignore_ascii_case(owner) {
      for recipient in to_recipients(&parsed) {
        if recipient.eq_ignore_ascii_case(owner) {
          continue;
        }
        let entry = counts.entry(recipient).or_insert((0, Interaction::Outbound));
        entry.0 += 1;
        entry.1 = entry.1.observe_outbound();
      }
    } else if addresses_contain(&parsed, owner) {
      let entry = counts.entry(from).or_insert((0, Interaction::Inbound));
      entry.0 += 1;
      entry.1 = entry.1.observe_inbound();
    }
  }

  let mut included = Vec::new();
  let mut excluded = Vec::new();
  for (email, (count, interaction)) in counts {
    let reason = if count > INCLUDE_COUNT_THRESHOLD {
      Some(format!("message count {count} exceeds threshold {INCLUDE_COUNT_THRESHOLD}"))
    } else if interaction.has_outbound() {
      Some("outbound interaction observed".to_owned())
    } else {
      None
    };

    let record = SenderRecord { email, count, interaction, reason };
    if record.reason.is_some() {
      included.push(record);
    } else {
      excluded.push(record);
    }
  }

  Ok(SenderSurvey { included, excluded })
}

/// Parse every message in an mbox file at `path` into one
/// [`ConversationDocument`] per message (a mailbox has no inherent grouping
/// into multi-turn conversations the way a chat export does; each email
/// becomes a single-message document with the sender as the lone
/// conversational counterpart).
///
/// If a `senders.json` produced by [`survey_senders`] exists alongside
/// `path`, any message whose sender isn't in its `included` list is skipped
/// (§4.1: "when the adapter is later invoked in ingest mode, it must read
/// this file if present and skip any sender not in `included`").
pub fn parse_gmail_mbox(path: impl AsRef<Path>, owner: &str) -> Result<Vec<ConversationDocument>, AppError> {
  let path = path.as_ref();
  let raw = read_mbox(path)?;
  let allowed = load_included_senders(path)?;

  let mut documents = Vec::new();
  for (idx, raw_message) in split_mbox(&raw).into_iter().enumerate() {
    let Some(parsed) = MessageParser::default().parse(&raw_message) else {
      tracing::warn!(idx, "skipping unparseable message in mbox");
      continue;
    };

    let from = from_address(&parsed);
    if let Some(allowed) = &allowed {
      if !from.eq_ignore_ascii_case(owner) && !allowed.iter().any(|a| a.eq_ignore_ascii_case(&from)) {
        continue;
      }
    }

    let subject = parsed.subject().unwrap_or("(no subject)").to_owned();
    let body = parsed.body_text(0).map(|s| s.into_owned()).unwrap_or_default();
    let time = message_time(&parsed);

    let mut people = ParticipantList::new();
    people.insert(from.clone());
    people.insert(owner);

    documents.push(ConversationDocument {
      id: format!("gmail-{idx}"),
      source: Source::Gmail,
      user: owner.to_owned(),
      people,
      conversation: vec![Message {
        speaker: from,
        text: format!("Subject: {subject}\n\n{body}"),
        time,
      }],
      tags: Default::default(),
      metadata: Default::default(),
    });
  }

  Ok(documents)
}

/// `senders.json` lives alongside the mbox file being ingested (§6).
fn senders_json_path(mbox_path: &Path) -> PathBuf {
  mbox_path
    .parent()
    .map(|p| p.join("senders.json"))
    .unwrap_or_else(|| PathBuf::from("senders.json"))
}

fn load_included_senders(mbox_path: &Path) -> Result<Option<Vec<String>>, AppError> {
  let path = senders_json_path(mbox_path);
  if !path.exists() {
    return Ok(None);
  }
  let raw = std::fs::read_to_string(&path)
    .map_err(|e| AppError::with_kind(AppErrorKind::Input, anyhow::anyhow!("reading {}: {e}", path.display())))?;
  let survey: SenderSurvey = serde_json::from_str(&raw).map_err(|e| AppError::with_kind(AppErrorKind::Input, e))?;
  Ok(Some(survey.included.into_iter().map(|r| r.email).collect()))
}

fn read_mbox(path: &Path) -> Result<Vec<u8>, AppError> {
  std::fs::read(path).map_err(|e| AppError::with_kind(AppErrorKind::Input, anyhow::anyhow!("reading {}: {e}", path.display())))
}

fn from_address(parsed: &mail_parser::Message<'_>) -> String {
  parsed
    .from()
    .and_then(|addrs| addrs.first())
    .and_then(|addr| addr.address())
    .unwrap_or("unknown@unknown")
    .to_owned()
}

fn to_recipients(parsed: &mail_parser::Message<'_>) -> Vec<String> {
  parsed
    .to()
    .map(|addrs| addrs.iter().filter_map(|a| a.address().map(str::to_owned)).collect())
    .unwrap_or_default()
}

fn addresses_contain(parsed: &mail_parser::Message<'_>, owner: &str) -> bool {
  to_recipients(parsed).iter().any(|a| a.eq_ignore_ascii_case(owner))
}

fn message_time(parsed: &mail_parser::Message<'_>) -> DateTime<Utc> {
  parsed
    .date()
    .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
    .map(|d| d.with_timezone(&Utc))
    .unwrap_or_else(Utc::now)
}

/// Split a concatenated mbox file on `From ` separator lines (the standard
/// mbox envelope delimiter, which `mail-parser` itself doesn't interpret —
/// it parses a single RFC 5322 message at a time).
fn split_mbox(raw: &[u8]) -> Vec<Vec<u8>> {
  let text = String::from_utf8_lossy(raw);
  let mut messages = Vec::new();
  let mut current = String::new();

  for line in text.lines() {
    if line.starts_with("From ") && !current.is_empty() {
      messages.push(std::mem::take(&mut current).into_bytes());
    }
    if !(line.starts_with("From ") && current.is_empty()) {
      current.push_str(line);
      current.push('\n');
    }
  }
  if !current.is_empty() {
    messages.push(current.into_bytes());
  }
  messages
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fixture_mbox() -> String {
    "From alice@example.com Mon Jan  1 10:00:00 2024\r\n\
From: alice@example.com\r\n\
To: me@example.com\r\n\
Subject: Hello\r\n\
Date: Mon, 1 Jan 2024 10:00:00 +0000\r\n\
\r\n\
Hi there.\r\n\
From bob@example.com Mon Jan  1 11:00:00 2024\r\n\
From: bob@example.com\r\n\
To: me@example.com\r\n\
Subject: Re: Hello\r\n\
Date: Mon, 1 Jan 2024 11:00:00 +0000\r\n\
\r\n\
Hey back.\r\n\
From me@example.com Mon Jan  1 12:00:00 2024\r\n\
From: me@example.com\r\n\
To: alice@example.com\r\n\
Subject: Re: Hello\r\n\
Date: Mon, 1 Jan 2024 12:00:00 +0000\r\n\
\r\n\
Good to hear.\r\n"
      .to_owned()
  }

  #[test]
  fn splits_mbox_into_one_document_per_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mbox");
    std::fs::write(&path, fixture_mbox()).unwrap();

    let docs = parse_gmail_mbox(&path, "me@example.com").unwrap();
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0].conversation[0].speaker, "alice@example.com");
    assert_eq!(docs[1].conversation[0].speaker, "bob@example.com");
  }

  #[test]
  fn outbound_correspondents_are_included_regardless_of_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mbox");
    std::fs::write(&path, fixture_mbox()).unwrap();

    let survey = survey_senders(&path, "me@example.com").unwrap();
    let alice = survey.included.iter().find(|r| r.email == "alice@example.com");
    assert!(alice.is_some(), "alice has an outbound reply and should be included");
    assert_eq!(alice.unwrap().interaction, Interaction::Both);

    let bob = survey.excluded.iter().find(|r| r.email == "bob@example.com");
    assert!(bob.is_some(), "bob has only one inbound message and should be excluded");
  }

  #[test]
  fn high_volume_inbound_only_correspondent_is_included() {
    let mut body = String::new();
    for i in 0..10 {
      body.push_str(&format!(
        "From carol@example.com Mon Jan  1 1{i}:00:00 2024\r\n\
From: carol@example.com\r\n\
To: me@example.com\r\n\
Subject: Update {i}\r\n\
Date: Mon, 1 Jan 2024 1{i}:00:00 +0000\r\n\
\r\n\
Message {i}.\r\n"
      ));
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mbox");
    std::fs::write(&path, body).unwrap();

    let survey = survey_senders(&path, "me@example.com").unwrap();
    let carol = survey.included.iter().find(|r| r.email == "carol@example.com");
    assert!(carol.is_some());
    assert_eq!(carol.unwrap().interaction, Interaction::Inbound);
  }

  #[test]
  fn ingest_mode_skips_senders_not_in_an_existing_senders_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mbox");
    std::fs::write(&path, fixture_mbox()).unwrap();

    let survey = SenderSurvey {
      included: vec![SenderRecord {
        email: "alice@example.com".to_owned(),
        count: 2,
        interaction: Interaction::Both,
        reason: Some("outbound interaction observed".to_owned()),
      }],
      excluded: vec![SenderRecord {
        email: "bob@example.com".to_owned(),
        count: 1,
        interaction: Interaction::Inbound,
        reason: None,
      }],
    };
    std::fs::write(dir.path().join("senders.json"), serde_json::to_string(&survey).unwrap()).unwrap();

    let docs = parse_gmail_mbox(&path, "me@example.com").unwrap();
    let speakers: Vec<&str> = docs.iter().map(|d| d.conversation[0].speaker.as_str()).collect();
    assert!(speakers.contains(&"alice@example.com"));
    assert!(speakers.contains(&"me@example.com"));
    assert!(!speakers.contains(&"bob@example.com"));
  }
}
