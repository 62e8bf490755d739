use serde_json::{Value, json};

use crate::error::LLMError;
use crate::types::{LLMClient, LLMMessage, LLMMessageType, LLMUserType};
use crate::utils::{decode_json, detect_mime_type, http_client, read_success_body};

use super::models::GeminiResponse;

const PROVIDER: &str = "Gemini";

pub fn convert_body_parts_gemini(body_part: Vec<LLMMessageType>) -> Vec<Value> {
    body_part
        .into_iter()
        .map(|part| match part {
            LLMMessageType::TEXT(text) => json!({ "text": text }),
            LLMMessageType::IMAGE {
                data_b64,
                file_path,
            } => {
                let mime = file_path
                    .as_ref()
                    .map(detect_mime_type)
                    .unwrap_or_else(|| "image/jpeg".into());
                json!({
                    "inlineData": {
                        "mimeType": mime,
                        "data": data_b64
                    }
                })
            }
        })
        .collect()
}

pub fn convert_messages_to_gemini_contents(messages: Vec<LLMMessage>) -> Vec<Value> {
    messages
        .into_iter()
        .map(|m| {
            json!({
                "role": role_to_str(m.role),
                "parts": convert_body_parts_gemini(m.content)
            })
        })
        .collect()
}

fn role_to_str(role: LLMUserType) -> &'static str {
    match role {
        LLMUserType::Human | LLMUserType::System => "user",
        LLMUserType::AI => "model",
    }
}

pub async fn send_generate_request(
    api_client: &LLMClient,
    body_part: Vec<LLMMessage>,
) -> Result<GeminiResponse, LLMError> {
    let endpoint = api_client.endpoint().trim_end_matches('/');
    let model = api_client.default_model();
    let url = format!(
        "{}/{}:generateContent",
        endpoint,
        model.strip_prefix("models/").unwrap_or(model)
    );

    let body = json!({
        "contents": convert_messages_to_gemini_contents(body_part),
        "generationConfig": { "maxOutputTokens": api_client.max_tokens() }
    });

    let response = http_client(api_client)?
        .post(url)
        .header("x-goog-api-key", api_client.api_key())
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let response_text = read_success_body(PROVIDER, response).await?;
    decode_json(PROVIDER, &response_text)
}

/// Text of the first candidate, parts concatenated.
pub fn response_to_text_data(response: &GeminiResponse) -> Result<String, LLMError> {
    let candidate = response
        .candidates
        .first()
        .ok_or(LLMError::EmptyResponse(PROVIDER))?;

    let full_text: String = candidate
        .content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect();

    if full_text.trim().is_empty() {
        return Err(LLMError::EmptyResponse(PROVIDER));
    }
    Ok(full_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_parts_become_inline_data() {
        let parts = convert_body_parts_gemini(vec![
            LLMMessageType::text("Describe"),
            LLMMessageType::IMAGE {
                data_b64: "AAAA".into(),
                file_path: Some("x.jpg".into()),
            },
        ]);
        assert_eq!(parts[0]["text"], "Describe");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "AAAA");
    }

    #[test]
    fn first_candidate_text_is_joined() {
        let raw = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "Title: A" }, { "text": "\nDescription: B" } ], "role": "model" } },
                { "content": { "parts": [ { "text": "ignored" } ] } }
            ],
            "responseId": "r1"
        }"#;
        let response: GeminiResponse = decode_json(PROVIDER, raw).unwrap();
        assert_eq!(
            response_to_text_data(&response).unwrap(),
            "Title: A\nDescription: B"
        );
    }

    #[test]
    fn no_candidates_is_empty() {
        let response: GeminiResponse = decode_json(PROVIDER, r#"{ "candidates": [] }"#).unwrap();
        assert!(matches!(
            response_to_text_data(&response),
            Err(LLMError::EmptyResponse(_))
        ));
    }
}
