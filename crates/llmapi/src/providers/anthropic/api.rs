use serde_json::{Value, json};

use crate::error::LLMError;
use crate::types::{LLMClient, LLMMessage, LLMMessageType, LLMUserType};
use crate::utils::{decode_json, detect_mime_type, http_client, read_success_body};

use super::models::{AnthropicContent, AnthropicResponse};

const PROVIDER: &str = "Anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub async fn send_message(
    client: &LLMClient,
    messages: Vec<LLMMessage>,
) -> Result<LLMMessage, LLMError> {
    let url = format!("{}/messages", client.endpoint().trim_end_matches('/'));

    let (anthropic_messages, system_prompt) = convert_messages_to_anthropic(messages);

    let mut payload = json!({
        "model": client.default_model(),
        "messages": anthropic_messages,
        "max_tokens": client.max_tokens()
    });

    if let Some(system) = system_prompt {
        payload["system"] = Value::String(system);
    }

    let response = http_client(client)?
        .post(url)
        .header("x-api-key", client.api_key())
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("Content-Type", "application/json")
        .header("accept", "application/json")
        .json(&payload)
        .send()
        .await?;

    let response_text = read_success_body(PROVIDER, response).await?;
    let response: AnthropicResponse = decode_json(PROVIDER, &response_text)?;

    convert_anthropic_response(response)
}

fn convert_messages_to_anthropic(messages: Vec<LLMMessage>) -> (Vec<Value>, Option<String>) {
    let mut system_segments = Vec::new();
    let mut converted = Vec::new();

    for message in messages {
        let role_str = match message.role {
            LLMUserType::System => {
                let text = message.text_content();
                if !text.is_empty() {
                    system_segments.push(text);
                }
                continue;
            }
            LLMUserType::Human => "user",
            LLMUserType::AI => "assistant",
        };

        converted.push(json!({
            "role": role_str,
            "content": convert_message_content_to_anthropic(message.content)
        }));
    }

    let system_prompt = if system_segments.is_empty() {
        None
    } else {
        Some(system_segments.join("\n"))
    };

    (converted, system_prompt)
}

fn convert_message_content_to_anthropic(content: Vec<LLMMessageType>) -> Vec<Value> {
    let mut parts = Vec::new();

    for item in content {
        match item {
            LLMMessageType::TEXT(text) => parts.push(json!({
                "type": "text",
                "text": text
            })),
            LLMMessageType::IMAGE {
                data_b64,
                file_path,
            } => {
                let mime = file_path
                    .as_deref()
                    .map(detect_mime_type)
                    .unwrap_or_else(|| "image/jpeg".to_string());
                parts.push(json!({
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": mime,
                        "data": data_b64
                    }
                }));
            }
        }
    }

    if parts.is_empty() {
        parts.push(json!({
            "type": "text",
            "text": ""
        }));
    }

    parts
}

fn convert_anthropic_response(response: AnthropicResponse) -> Result<LLMMessage, LLMError> {
    let role = response
        .role
        .clone()
        .unwrap_or_else(|| "assistant".to_string());
    let contents = convert_anthropic_parts(response.content);

    if contents.is_empty() {
        return Err(LLMError::EmptyResponse(PROVIDER));
    }

    Ok(LLMMessage::new(response.id, &role, contents))
}

fn convert_anthropic_parts(parts: Vec<AnthropicContent>) -> Vec<LLMMessageType> {
    parts
        .into_iter()
        .filter_map(|part| match part.kind.as_str() {
            "text" => part.text.map(LLMMessageType::text),
            other => {
                log::debug!("Ignoring Anthropic content block of type {other}");
                None
            }
        })
        .collect()
}
