use serde_json::{Value, json};

use crate::error::LLMError;
use crate::types::{LLMClient, LLMMessage, LLMMessageType, LLMUserType};
use crate::utils::{decode_json, detect_mime_type, http_client, read_success_body};

use super::models::{ChatCompletionResponse, ChatContent, ChatContentPart};

const PROVIDER: &str = "OpenAI";

pub async fn send_chat_completion(
    client: &LLMClient,
    messages: Vec<LLMMessage>,
) -> Result<LLMMessage, LLMError> {
    let url = format!(
        "{}/chat/completions",
        client.endpoint().trim_end_matches('/')
    );
    let payload = json!({
        "model": client.default_model(),
        "messages": convert_messages_to_openai(messages),
        "max_tokens": client.max_tokens()
    });

    let response = http_client(client)?
        .post(url)
        .bearer_auth(client.api_key())
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await?;

    let response_text = read_success_body(PROVIDER, response).await?;
    let response: ChatCompletionResponse = decode_json(PROVIDER, &response_text)?;

    convert_openai_response(response)
}

fn convert_messages_to_openai(messages: Vec<LLMMessage>) -> Vec<Value> {
    messages.into_iter().map(convert_message).collect()
}

fn convert_message(message: LLMMessage) -> Value {
    let role = match message.role {
        LLMUserType::Human => "user",
        LLMUserType::AI => "assistant",
        LLMUserType::System => "system",
    };

    let mut content_items = Vec::new();
    let mut text_segments = Vec::new();
    let mut only_text = true;

    for part in message.content {
        match part {
            LLMMessageType::TEXT(text) => {
                text_segments.push(text.clone());
                content_items.push(json!({
                    "type": "text",
                    "text": text
                }));
            }
            LLMMessageType::IMAGE {
                data_b64,
                file_path,
            } => {
                only_text = false;
                let mime = file_path
                    .as_deref()
                    .map(detect_mime_type)
                    .unwrap_or_else(|| "image/jpeg".to_string());
                let data_url = format!("data:{mime};base64,{data_b64}");
                content_items.push(json!({
                    "type": "image_url",
                    "image_url": { "url": data_url }
                }));
            }
        }
    }

    if content_items.is_empty() {
        return json!({
            "role": role,
            "content": ""
        });
    }

    if only_text {
        json!({
            "role": role,
            "content": text_segments.join("\n")
        })
    } else {
        json!({
            "role": role,
            "content": content_items
        })
    }
}

fn convert_openai_response(response: ChatCompletionResponse) -> Result<LLMMessage, LLMError> {
    let first_choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(LLMError::EmptyResponse(PROVIDER))?;

    let role = first_choice
        .message
        .role
        .unwrap_or_else(|| "assistant".to_string());

    let contents = match first_choice.message.content {
        Some(ChatContent::Text(text)) => vec![LLMMessageType::text(text)],
        Some(ChatContent::Parts(parts)) => convert_openai_parts(parts),
        None => Vec::new(),
    };

    if contents.is_empty() {
        return Err(LLMError::EmptyResponse(PROVIDER));
    }

    Ok(LLMMessage::new(response.id, &role, contents))
}

fn convert_openai_parts(parts: Vec<ChatContentPart>) -> Vec<LLMMessageType> {
    parts
        .into_iter()
        .filter_map(|part| match part.kind.as_str() {
            "text" | "output_text" => part.text.map(LLMMessageType::text),
            other => {
                log::debug!("Ignoring OpenAI content part of type {other}");
                None
            }
        })
        .collect()
}
