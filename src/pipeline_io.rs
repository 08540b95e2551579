//! Pipeline-stage file I/O (§6): every stage reads the previous stage's file
//! under `pipeline_output/` and writes its own, JSON-lines unless noted.

use std::path::{Path, PathBuf};

use recollect_model::ConversationDocument;
use recollect_shared::{AppError, AppErrorKind};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const PIPELINE_DIR: &str = "pipeline_output";

#[must_use]
pub fn pipeline_path(name: &str) -> PathBuf {
  Path::new(PIPELINE_DIR).join(name)
}

fn ensure_pipeline_dir() -> Result<(), AppError> {
  std::fs::create_dir_all(PIPELINE_DIR).map_err(|e| AppError::with_kind(AppErrorKind::Other, e))
}

/// Write `items`, one JSON object per line, to `path` (creating
/// `pipeline_output/` if needed). Overwrites any existing file at `path`
/// (§3: "X0..X3 files are overwritten by their producing stage").
pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<(), AppError> {
  ensure_pipeline_dir()?;
  let mut body = String::new();
  for item in items {
    let line = serde_json::to_string(item).map_err(|e| AppError::with_kind(AppErrorKind::Other, e))?;
    body.push_str(&line);
    body.push('\n');
  }
  std::fs::write(path, body).map_err(|e| AppError::with_kind(AppErrorKind::Other, e))
}

/// Read one JSON-decodable value per non-empty line from `path`. A fatal
/// parse error on any line fails the whole read (§7 Parse errors: "fatal;
/// the user is directed to re-run the previous stage").
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AppError> {
  let raw = std::fs::read_to_string(path)
    .map_err(|e| AppError::with_kind(AppErrorKind::Input, anyhow::anyhow!("reading {}: {e}", path.display())))?;

  let mut items = Vec::new();
  for line in raw.lines() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let item: T = serde_json::from_str(line)
      .map_err(|e| AppError::with_kind(AppErrorKind::Parse, anyhow::anyhow!("{}: {e}", path.display())))?;
    items.push(item);
  }
  Ok(items)
}

/// Read `ConversationDocument`s from `path`, accepting either a JSON array
/// (a whole-file document list) or JSON-lines (§6: "array or JSON-lines of
/// ConversationDocument"). Tries the array shape first, falls back to
/// JSON-lines.
pub fn read_documents(path: &Path) -> Result<Vec<ConversationDocument>, AppError> {
  let raw = std::fs::read_to_string(path)
    .map_err(|e| AppError::with_kind(AppErrorKind::Input, anyhow::anyhow!("reading {}: {e}", path.display())))?;

  if let Ok(docs) = serde_json::from_str::<Vec<ConversationDocument>>(&raw) {
    return Ok(docs);
  }
  read_jsonl(path)
}

/// Every X0 document file currently present in `pipeline_output/`, i.e.
/// every file matching `X_0_<source>.jsonl`, in a deterministic (sorted)
/// order. Subsequent stages (`chunks`) operate over the union of every
/// source ingested so far in this pipeline run.
pub fn list_x0_files() -> Result<Vec<PathBuf>, AppError> {
  let dir = Path::new(PIPELINE_DIR);
  if !dir.exists() {
    return Ok(Vec::new());
  }
  let mut paths = Vec::new();
  for entry in std::fs::read_dir(dir).map_err(|e| AppError::with_kind(AppErrorKind::Other, e))? {
    let entry = entry.map_err(|e| AppError::with_kind(AppErrorKind::Other, e))?;
    let name = entry.file_name();
    let name = name.to_string_lossy();
    if name.starts_with("X_0_") && name.ends_with(".jsonl") {
      paths.push(entry.path());
    }
  }
  paths.sort();
  Ok(paths)
}
