//! Source format adapters (§4.1): each native export format has its own
//! parser, but every one of them ends at the same place — one or more
//! [`recollect_model::ConversationDocument`]s.

mod chatgpt;
mod gmail;
mod telegram;
mod whatsapp;

pub use chatgpt::parse_chatgpt;
pub use gmail::{parse_gmail_mbox, survey_senders, Interaction, SenderRecord, SenderSurvey};
pub use telegram::parse_telegram;
pub use whatsapp::parse_whatsapp;

use std::path::Path;

use recollect_model::{ConversationDocument, Source};
use recollect_shared::AppError;

/// Parse `path` as `source`, normalizing every adapter's return shape
/// (single document or several) to a `Vec`.
pub fn parse(source: Source, path: impl AsRef<Path>, owner: &str) -> Result<Vec<ConversationDocument>, AppError> {
  match source {
    Source::Whatsapp => parse_whatsapp(path, owner).map(|doc| vec![doc]),
    Source::Telegram => parse_telegram(path, owner).map(|doc| vec![doc]),
    Source::Chatgpt => parse_chatgpt(path, owner),
    Source::Gmail => parse_gmail_mbox(path, owner),
  }
}
