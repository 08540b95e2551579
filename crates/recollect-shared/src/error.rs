use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt::Display;

/// The error taxonomy from the pipeline's error-handling design: every
/// `AppError` is tagged with the class of failure it represents so callers
/// can match on it instead of string-matching the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorKind {
  /// Missing file, malformed native export format. Fatal for the invoked stage.
  Input,
  /// Malformed intermediate (X0..X3) file. Fatal; caller should re-run the
  /// previous stage.
  Parse,
  /// LLM transport, timeout, or malformed JSON reply. Local to one item.
  Llm,
  /// An individual LLM-emitted record failed schema/enum validation.
  Validation,
  /// A single vector-store object write or query failed.
  VectorStore,
  /// The operation observed a cancelled context.
  Cancelled,
  /// Anything else (configuration, IO not covered above).
  Other,
}

#[derive(Debug)]
pub struct AppError {
  err: anyhow::Error,
  kind: AppErrorKind,
}

impl AppError {
  /// Create with `Other` kind.
  pub fn new<E: Into<anyhow::Error>>(err: E) -> Self {
    Self {
      err: err.into(),
      kind: AppErrorKind::Other,
    }
  }

  /// Create tagged with a specific taxonomy kind.
  pub fn with_kind<E: Into<anyhow::Error>>(kind: AppErrorKind, err: E) -> Self {
    Self { err: err.into(), kind }
  }

  #[must_use]
  pub const fn kind(&self) -> AppErrorKind {
    self.kind
  }

  /// Get backtrace from anyhow (requires `RUST_BACKTRACE=1` to capture).
  pub fn backtrace(&self) -> &Backtrace {
    self.err.backtrace()
  }
}

impl Display for AppError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let bt = self.err.backtrace();
    if cfg!(debug_assertions) && bt.status() == BacktraceStatus::Captured {
      write!(f, "[{:?}] {}\nBacktrace:\n{}", self.kind, self.err, bt)
    } else {
      write!(f, "[{:?}] {}", self.kind, self.err)
    }
  }
}

impl std::error::Error for AppError {}

impl<E> From<E> for AppError
where
  E: Into<anyhow::Error>,
{
  fn from(err: E) -> Self {
    Self::new(err)
  }
}
