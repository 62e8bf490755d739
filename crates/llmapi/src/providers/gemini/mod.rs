mod api;
pub mod models;
pub use api::{
    convert_body_parts_gemini, convert_messages_to_gemini_contents, response_to_text_data,
    send_generate_request,
};

use crate::error::LLMError;
use crate::types::{LLMClient, LLMMessage, LLMMessageType};

pub async fn chat(client: &LLMClient, messages: Vec<LLMMessage>) -> Result<LLMMessage, LLMError> {
    let response = send_generate_request(client, messages).await?;
    let text = response_to_text_data(&response)?;
    Ok(LLMMessage::new(
        response.response_id.clone(),
        "AI",
        vec![LLMMessageType::text(text)],
    ))
}
