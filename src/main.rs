//! `recollect`: a single binary dispatching on its first positional argument
//! (§6 CLI surface) that drives the ingestion/consolidation/query pipeline
//! stage by stage, each stage reading the previous stage's
//! `pipeline_output/` file and writing its own.

mod pipeline_io;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use recollect_consolidation::{batch_consolidate, default_consolidation_filter, store_consolidation_reports};
use recollect_model::{ConsolidationReport, Filter, MemoryFact, Source};
use recollect_query::intelligent_query;
use recollect_shared::{init_tracing, AppError, AppErrorKind, APP_ENV};
use recollect_store::{ObjectClass, RedbStore, StoredObject, VectorStore};
use serde::Serialize;

use pipeline_io::{list_x0_files, pipeline_path, read_documents, read_jsonl, write_jsonl};

#[derive(Parser)]
#[command(name = "recollect", about = "Semantic memory pipeline for heterogeneous conversation exports")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Ingest a WhatsApp export SQLite database.
  Whatsapp {
    path: PathBuf,
    #[arg(long, default_value = "primaryUser")]
    owner: String,
  },
  /// Ingest a Telegram Desktop JSON export.
  Telegram {
    path: PathBuf,
    #[arg(long, default_value = "primaryUser")]
    owner: String,
  },
  /// Ingest a ChatGPT `conversations.json` export.
  Chatgpt {
    path: PathBuf,
    #[arg(long, default_value = "primaryUser")]
    owner: String,
  },
  /// Ingest a Gmail mbox export, or (with `--senders`) only survey it.
  Gmail {
    path: PathBuf,
    #[arg(long, default_value = "primaryUser")]
    owner: String,
    /// Produce `senders.json` next to `path` instead of ingesting.
    #[arg(long)]
    senders: bool,
  },
  /// Chunk every ingested X0 document (§4.2).
  Chunks,
  /// Extract facts from every chunk (§4.3, §4.4).
  Facts,
  /// Embed and persist every extracted fact into the vector store (§4.5).
  Store,
  /// Consolidate facts per canonical subject (§4.4, §4.6).
  Consolidation,
  /// Persist consolidation reports into the vector store (§4.6).
  StoreConsolidations,
  /// Run the three-stage intelligent query engine (§4.7).
  QueryConsolidations { query: String },
}

fn store_path() -> PathBuf {
  PathBuf::from(&APP_ENV.store_dir).join("store.redb")
}

fn open_store() -> Result<RedbStore, AppError> {
  RedbStore::open(store_path())
}

async fn run(command: Command) -> Result<(), AppError> {
  match command {
    Command::Whatsapp { path, owner } => ingest(Source::Whatsapp, path, owner, false).await,
    Command::Telegram { path, owner } => ingest(Source::Telegram, path, owner, false).await,
    Command::Chatgpt { path, owner } => ingest(Source::Chatgpt, path, owner, false).await,
    Command::Gmail { path, owner, senders } => ingest(Source::Gmail, path, owner, senders).await,
    Command::Chunks => chunks().await,
    Command::Facts => facts().await,
    Command::Store => store().await,
    Command::Consolidation => consolidation().await,
    Command::StoreConsolidations => store_consolidations().await,
    Command::QueryConsolidations { query } => query_consolidations(&query).await,
  }
}

async fn ingest(source: Source, path: PathBuf, owner: String, senders_only: bool) -> Result<(), AppError> {
  if senders_only {
    if source != Source::Gmail {
      return Err(AppError::with_kind(
        AppErrorKind::Input,
        anyhow::anyhow!("--senders is only meaningful for the gmail adapter"),
      ));
    }
    let survey = recollect_adapters::survey_senders(&path, &owner)?;
    let senders_path = path
      .parent()
      .map(|p| p.join("senders.json"))
      .unwrap_or_else(|| PathBuf::from("senders.json"));
    let body = serde_json::to_string_pretty(&survey)?;
    std::fs::write(&senders_path, body).map_err(|e| AppError::with_kind(AppErrorKind::Other, e))?;
    tracing::info!(
      included = survey.included.len(),
      excluded = survey.excluded.len(),
      path = %senders_path.display(),
      "wrote sender survey"
    );
    return Ok(());
  }

  let documents = recollect_adapters::parse(source, &path, &owner)?;
  tracing::info!(source = %source, count = documents.len(), "parsed conversation documents");
  write_jsonl(&pipeline_path(&format!("X_0_{source}.jsonl")), &documents)?;
  Ok(())
}

async fn chunks() -> Result<(), AppError> {
  let x0_files = list_x0_files()?;
  if x0_files.is_empty() {
    return Err(AppError::with_kind(
      AppErrorKind::Input,
      anyhow::anyhow!("no X_0_*.jsonl files found under pipeline_output/; run a source adapter first"),
    ));
  }

  let mut documents = Vec::new();
  for path in &x0_files {
    documents.extend(read_documents(path)?);
  }

  let mut chunked = Vec::new();
  for document in &documents {
    chunked.extend(recollect_chunker::chunk(document, APP_ENV.chunk_target_tokens));
  }

  tracing::info!(documents = documents.len(), chunks = chunked.len(), "chunked conversation documents");
  write_jsonl(&pipeline_path("X_1_chunked_documents.jsonl"), &chunked)?;
  Ok(())
}

async fn facts() -> Result<(), AppError> {
  let documents = read_jsonl(&pipeline_path("X_1_chunked_documents.jsonl"))?;
  let results = recollect_extraction::extract_facts_from_documents(documents).await;

  let mut facts = Vec::new();
  let mut failures = 0usize;
  for result in results {
    match result {
      Ok(document_facts) => facts.extend(document_facts),
      Err(err) => {
        failures += 1;
        tracing::warn!(error = %err, "chunk failed fact extraction");
      }
    }
  }

  tracing::info!(facts = facts.len(), failures, "extracted facts");
  write_jsonl(&pipeline_path("X_2_extracted_facts.jsonl"), &facts)?;
  Ok(())
}

async fn store() -> Result<(), AppError> {
  let facts: Vec<MemoryFact> = read_jsonl(&pipeline_path("X_2_extracted_facts.jsonl"))?;
  let store = open_store()?;
  store.ensure_schema().await?;

  let mut stored = 0usize;
  let mut failures = 0usize;
  for (idx, fact) in facts.into_iter().enumerate() {
    let outcome = match recollect_llm::embed(&fact.content).await {
      Ok(embedding) => store.store_fact(fact, embedding).await,
      Err(err) => Err(err),
    };
    match outcome {
      Ok(()) => stored += 1,
      Err(err) => {
        failures += 1;
        tracing::warn!(error = %err, "failed to store fact");
      }
    }
    if (idx + 1) % 10 == 0 {
      tracing::info!(processed = idx + 1, "storing facts");
    }
  }

  tracing::info!(stored, failures, "stored facts");
  Ok(())
}

async fn consolidation() -> Result<(), AppError> {
  let store: Arc<dyn VectorStore> = Arc::new(open_store()?);
  store.ensure_schema().await?;

  let results = batch_consolidate(store, default_consolidation_filter()).await;

  let mut reports: Vec<ConsolidationReport> = Vec::new();
  let mut failures = 0usize;
  for result in results {
    match result {
      Ok(report) => reports.push(report),
      Err(err) => {
        failures += 1;
        tracing::warn!(error = %err, "subject consolidation failed");
      }
    }
  }

  tracing::info!(reports = reports.len(), failures, "consolidated subjects");
  write_jsonl(&pipeline_path("X_3_consolidation_reports.jsonl"), &reports)?;
  Ok(())
}

async fn store_consolidations() -> Result<(), AppError> {
  let reports: Vec<ConsolidationReport> = read_jsonl(&pipeline_path("X_3_consolidation_reports.jsonl"))?;
  let store = open_store()?;
  store.ensure_schema().await?;

  let stored = store_consolidation_reports(&reports, &store, |processed| {
    if processed % 5 == 0 {
      tracing::info!(processed, "storing consolidated facts");
    }
  })
  .await;

  tracing::info!(stored, "stored consolidated facts");
  Ok(())
}

/// Mirrors `recollect_query::QueryMetadata`, but serializable with the exact
/// field names §4.7/§6 specify for the X4 output file.
#[derive(Serialize)]
struct QueryMetadataJson {
  #[serde(rename = "totalResults")]
  total_results: usize,
  #[serde(rename = "consolidatedInsightCount")]
  consolidated_insight_count: usize,
  #[serde(rename = "citedEvidenceCount")]
  cited_evidence_count: usize,
  #[serde(rename = "additionalContextCount")]
  additional_context_count: usize,
  #[serde(rename = "stage1Found")]
  stage1_found: usize,
  #[serde(rename = "stage2Found")]
  stage2_found: usize,
  #[serde(rename = "stage2Retrieved")]
  stage2_retrieved: usize,
  #[serde(rename = "stage3Found")]
  stage3_found: usize,
  #[serde(rename = "stage3Filtered")]
  stage3_filtered: usize,
  #[serde(rename = "executionTimeMs")]
  execution_time_ms: u128,
  #[serde(rename = "queryStrategy")]
  query_strategy: &'static str,
  #[serde(rename = "deduplicationSuccessful")]
  deduplication_successful: bool,
}

#[derive(Serialize)]
struct QueryResultsFile {
  query: String,
  #[serde(rename = "queriedAt")]
  queried_at: u64,
  #[serde(rename = "intelligentQueryResults")]
  intelligent_query_results: IntelligentQueryResultsJson,
  #[serde(rename = "legacyVectorSearchResults")]
  legacy_vector_search_results: Vec<StoredObject>,
  #[serde(rename = "queryMetadata")]
  query_metadata: QueryMetadataJson,
}

#[derive(Serialize)]
struct IntelligentQueryResultsJson {
  #[serde(rename = "consolidatedInsights")]
  consolidated_insights: Vec<recollect_model::ConsolidatedFact>,
  #[serde(rename = "citedEvidence")]
  cited_evidence: Vec<MemoryFact>,
  #[serde(rename = "additionalContext")]
  additional_context: Vec<StoredObject>,
}

async fn query_consolidations(query: &str) -> Result<(), AppError> {
  let store = open_store()?;
  store.ensure_schema().await?;

  let filter = Filter::new();
  let result = intelligent_query(query, &filter, &store).await?;

  // The plain, single-stage search an older client would have run before the
  // three-stage engine existed: whatever is near the query among raw facts,
  // unfiltered by citation bookkeeping.
  let legacy_embedding = recollect_llm::embed(query).await?;
  let legacy_hits = store.near_vector(ObjectClass::Fact, &legacy_embedding, &filter).await?;
  let legacy_vector_search_results: Vec<StoredObject> = legacy_hits.into_iter().map(|hit| hit.object).collect();

  let queried_at = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map_err(|e| AppError::with_kind(AppErrorKind::Other, anyhow::anyhow!(e)))?
    .as_secs();

  let output = QueryResultsFile {
    query: query.to_owned(),
    queried_at,
    intelligent_query_results: IntelligentQueryResultsJson {
      consolidated_insights: result.insights,
      cited_evidence: result.evidence,
      additional_context: result.additional_context,
    },
    legacy_vector_search_results,
    query_metadata: QueryMetadataJson {
      total_results: result.metadata.total_results,
      consolidated_insight_count: result.metadata.consolidated_insight_count,
      cited_evidence_count: result.metadata.cited_evidence_count,
      additional_context_count: result.metadata.additional_context_count,
      stage1_found: result.metadata.stage1_found,
      stage2_found: result.metadata.stage2_found,
      stage2_retrieved: result.metadata.stage2_retrieved,
      stage3_found: result.metadata.stage3_found,
      stage3_filtered: result.metadata.stage3_filtered,
      execution_time_ms: result.metadata.execution_time_ms,
      query_strategy: result.metadata.query_strategy,
      deduplication_successful: result.metadata.deduplication_successful,
    },
  };

  let path = pipeline_path(&format!("X_4_query_results_{queried_at}.json"));
  std::fs::create_dir_all(pipeline_io::PIPELINE_DIR).map_err(|e| AppError::with_kind(AppErrorKind::Other, e))?;
  let body = serde_json::to_string_pretty(&output).map_err(|e| AppError::with_kind(AppErrorKind::Other, e))?;
  std::fs::write(&path, &body).map_err(|e| AppError::with_kind(AppErrorKind::Other, e))?;

  println!("{body}");
  tracing::info!(path = %path.display(), "wrote query results");
  Ok(())
}

#[tokio::main]
async fn main() {
  init_tracing("recollect");
  let cli = Cli::parse();

  if let Err(err) = run(cli.command).await {
    eprintln!("{err}");
    std::process::exit(1);
  }
}
