pub use async_openai::types::chat::{
  ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
  ChatCompletionRequestUserMessage,
};

mod embed;
pub use embed::{embed, embed_many};

mod embed_shared;
pub use embed_shared::TARGET_DIM;

mod generate_object;
pub use generate_object::generate_object;

mod generate_text;
pub use generate_text::generate_text;

mod similarity;
pub use similarity::{cosine_distance, cosine_similarity};
