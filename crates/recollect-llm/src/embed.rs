use anyhow::anyhow;
use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::CreateEmbeddingRequestArgs;
use async_openai::Client;
use recollect_shared::{AppError, APP_ENV};

use crate::embed_shared::process_embedding;

fn client() -> Client<OpenAIConfig> {
  let config = OpenAIConfig::new()
    .with_api_key(&APP_ENV.embeddings_api_key)
    .with_api_base(&APP_ENV.embeddings_api_url);
  Client::with_config(config)
}

/// Embed a single text, returning a [`embed_shared::TARGET_DIM`]-length
/// L2-normalized vector.
pub async fn embed(input: &str) -> Result<Vec<f32>, AppError> {
  let request = CreateEmbeddingRequestArgs::default()
    .model(&APP_ENV.embeddings_model)
    .input(input)
    .build()?;

  let embedding = client()
    .embeddings()
    .create(request)
    .await
    .map(|r| r.data.into_iter())?
    .map(|e| e.embedding)
    .next_back()
    .ok_or_else(|| anyhow!("empty embedding"))?;

  process_embedding(embedding)
}

/// Embed multiple texts in a single API call. Returns one vector per input,
/// in the same order (§4.3 batches facts through one embeddings call where
/// possible).
pub async fn embed_many(inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
  if inputs.is_empty() {
    return Ok(vec![]);
  }

  let request = CreateEmbeddingRequestArgs::default()
    .model(&APP_ENV.embeddings_model)
    .input(inputs.to_vec())
    .build()?;

  let response = client().embeddings().create(request).await?;

  let mut data = response.data;
  data.sort_by_key(|e| e.index);

  if data.len() != inputs.len() {
    return Err(AppError::new(anyhow!(
      "embedding count mismatch: expected {}, got {}",
      inputs.len(),
      data.len()
    )));
  }

  data.into_iter().map(|e| process_embedding(e.embedding)).collect()
}
