use llmapi::{LLMClient, LLMError, LLMMessage, LLMMessageType};

use crate::constants::CAPTION_CONTEXT_PREFIX;
use crate::error::DescribeError;
use crate::models::ImageFile;

/// One outbound description request per call. Implementations must not retry;
/// the orchestrator decides what a failure means for the batch.
#[allow(async_fn_in_trait)]
pub trait DescriptionClient {
    /// `data` is the content of `image`, already read by the caller.
    async fn describe(
        &self,
        image: &ImageFile,
        data: &[u8],
        prompt: &str,
    ) -> Result<String, DescribeError>;
}

/// Describes images through a multimodal chat model.
#[derive(Debug, Clone)]
pub struct LlmDescriptionClient {
    client: LLMClient,
}

impl LlmDescriptionClient {
    pub fn new(client: LLMClient) -> Self {
        Self { client }
    }
}

impl DescriptionClient for LlmDescriptionClient {
    async fn describe(
        &self,
        image: &ImageFile,
        data: &[u8],
        prompt: &str,
    ) -> Result<String, DescribeError> {
        if data.is_empty() {
            return Err(DescribeError::InvalidImage(format!("{} is empty", image)));
        }

        let messages = vec![LLMMessage::new(
            None,
            "Human",
            vec![
                LLMMessageType::text(prompt),
                LLMMessageType::image_bytes(data, image.base_name.clone()),
            ],
        )];

        let reply = llmapi::send_chat(&self.client, messages)
            .await
            .map_err(classify_error)?;

        Ok(reply.text_content())
    }
}

/// Maps a transport failure onto the batch error taxonomy.
pub fn classify_error(err: LLMError) -> DescribeError {
    let message = err.to_string();
    match err.status() {
        Some(401 | 403) => DescribeError::AuthenticationFailed(message),
        Some(429) => DescribeError::RateLimited(message),
        Some(400 | 413 | 415 | 422) => DescribeError::InvalidImage(message),
        _ => DescribeError::TransientNetworkError(message),
    }
}

/// The prompt sent for one image: the base prompt, enriched with the caption
/// already stored in the file when there is one.
pub fn build_prompt(base_prompt: &str, caption: Option<&str>) -> String {
    let base_prompt = base_prompt.trim();
    match caption.map(str::trim).filter(|caption| !caption.is_empty()) {
        Some(caption) => format!(
            "{}. {} {}",
            base_prompt.trim_end_matches('.'),
            CAPTION_CONTEXT_PREFIX,
            caption
        ),
        None => base_prompt.to_string(),
    }
}
