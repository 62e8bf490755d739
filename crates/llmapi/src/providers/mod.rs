mod anthropic;
pub mod gemini;
mod openai;

use crate::error::LLMError;
use crate::types::{LLMClient, LLMMessage, LLMProvider};

pub use anthropic::send_message as anthropic_chat;
pub use gemini::{chat as gemini_chat, convert_body_parts_gemini, send_generate_request};
pub use openai::send_chat_completion as openai_chat;

/// Sends one conversation to the client's provider and returns the reply.
///
/// Exactly one HTTP request is issued; failures are returned as-is so the
/// caller decides whether to skip, abort or retry.
pub async fn send_chat(
    client: &LLMClient,
    messages: Vec<LLMMessage>,
) -> Result<LLMMessage, LLMError> {
    log::debug!(
        "Sending {} message(s) to {} model {}",
        messages.len(),
        client.provider().name(),
        client.default_model()
    );

    match client.provider() {
        LLMProvider::OpenAI => openai_chat(client, messages).await,
        LLMProvider::Anthropic => anthropic_chat(client, messages).await,
        LLMProvider::Gemini => gemini_chat(client, messages).await,
    }
}
