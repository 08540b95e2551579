use anyhow::anyhow;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{ChatCompletionRequestMessage, CreateChatCompletionRequestArgs};
use async_openai::Client;
use recollect_shared::{AppError, AppErrorKind, APP_ENV};

/// Plain chat completion, used where a caller doesn't need structured output
/// (e.g. the retrieval engine's final synthesis step, §4.7).
pub async fn generate_text(messages: Vec<ChatCompletionRequestMessage>) -> Result<String, AppError> {
  let config = OpenAIConfig::new()
    .with_api_key(&APP_ENV.completions_api_key)
    .with_api_base(&APP_ENV.completions_api_url);
  let client = Client::with_config(config);

  let request = CreateChatCompletionRequestArgs::default()
    .model(&APP_ENV.completions_model)
    .messages(messages)
    .build()?;

  client
    .chat()
    .create(request)
    .await
    .map(|r| r.choices.into_iter())?
    .filter_map(|c| c.message.content)
    .next_back()
    .ok_or_else(|| AppError::with_kind(AppErrorKind::Llm, anyhow!("empty message content")))
}
