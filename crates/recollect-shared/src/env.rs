use std::env;
use std::sync::LazyLock;

fn required_env(key: &str) -> String {
  env::var(key).unwrap_or_else(|_| panic!("env {key} must be set"))
}

fn optional_env_u64(key: &str, default: u64) -> u64 {
  env::var(key)
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(default)
}

pub struct AppEnv {
  pub completions_api_key: String,
  pub completions_api_url: String,
  pub completions_model: String,
  pub embeddings_api_key: String,
  pub embeddings_api_url: String,
  pub embeddings_model: String,
  /// Base directory for the embedded vector store (mirrors the role
  /// `WEAVIATE_PORT` played for the original external vector-store service).
  pub store_dir: String,
  /// Worker-pool size for fact extraction (§4.4; default 100).
  pub extraction_workers: u64,
  /// Worker-pool size for consolidation (§4.4; default 20).
  pub consolidation_workers: u64,
  /// Chunk size target in approximate tokens of aggregated message content
  /// (§9 open question; default ~4000).
  pub chunk_target_tokens: u64,
}

impl AppEnv {
  fn new() -> Self {
    dotenvy::dotenv().ok();

    Self {
      completions_api_key: required_env("COMPLETIONS_API_KEY"),
      completions_api_url: required_env("COMPLETIONS_API_URL"),
      completions_model: required_env("COMPLETIONS_MODEL"),
      embeddings_api_key: required_env("EMBEDDINGS_API_KEY"),
      embeddings_api_url: required_env("EMBEDDINGS_API_URL"),
      embeddings_model: required_env("EMBEDDINGS_MODEL"),
      store_dir: env::var("WEAVIATE_PORT").unwrap_or_else(|_| "pipeline_output/store".to_owned()),
      extraction_workers: optional_env_u64("EXTRACTION_WORKERS", 100),
      consolidation_workers: optional_env_u64("CONSOLIDATION_WORKERS", 20),
      chunk_target_tokens: optional_env_u64("CHUNK_TARGET_TOKENS", 4000),
    }
  }
}

pub static APP_ENV: LazyLock<AppEnv> = LazyLock::new(AppEnv::new);
